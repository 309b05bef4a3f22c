#![cfg(not(target_arch = "wasm32"))]

use dxbc2glsl_dxbc::test_utils::{
    build_container, build_signature_chunk, CbufferDesc, RdefBuilder, ResourceDesc, VariableDesc,
};
use dxbc2glsl_dxbc::{
    parse_rdef_chunk, parse_signature_chunk, ComponentType, DxbcError, DxbcFile, SignatureEntry,
    SignatureKind, SignatureLayout, SystemValue, FOURCC_ISGN, FOURCC_RDEF, FOURCC_SHEX,
};
use proptest::prelude::*;

fn sample_container() -> Vec<u8> {
    let isgn = build_signature_chunk(
        SignatureLayout::Legacy,
        &[SignatureEntry {
            semantic_name: "POSITION".into(),
            semantic_index: 0,
            system_value: SystemValue::Undefined,
            component_type: ComponentType::Float32,
            register: 0,
            mask: 0xf,
            read_write_mask: 0xf,
            stream: 0,
            min_precision: 0,
        }],
    );
    let rdef = RdefBuilder::new(5, 0, 0xfffe)
        .resource(ResourceDesc::texture2d("tex", 0))
        .cbuffer(
            CbufferDesc::new("cb", 80)
                .variable(VariableDesc::float4x4("m", 0))
                .variable(VariableDesc::float_n("v", 64, 4)),
            0,
        )
        .build();
    build_container(&[
        (FOURCC_ISGN, &isgn),
        (FOURCC_RDEF, &rdef),
        (FOURCC_SHEX, &[0u8; 16]),
    ])
}

fn parse_everything(bytes: &[u8]) -> Result<(), DxbcError> {
    let file = DxbcFile::parse(bytes)?;
    for kind in [
        SignatureKind::Input,
        SignatureKind::Output,
        SignatureKind::PatchConstant,
    ] {
        if let Some(sig) = file.get_signature(kind) {
            sig?;
        }
    }
    if let Some(rdef) = file.get_rdef() {
        rdef?;
    }
    Ok(())
}

#[test]
fn every_strict_prefix_is_rejected() {
    let bytes = sample_container();
    assert!(parse_everything(&bytes).is_ok());
    for k in 0..bytes.len() {
        let res = std::panic::catch_unwind(|| DxbcFile::parse(&bytes[..k]));
        let res = res.unwrap_or_else(|_| panic!("parse panicked on prefix of {k} bytes"));
        let err = res.expect_err("strict prefix must not parse");
        if k >= 4 {
            // Magic intact: the blob is merely short.
            assert!(matches!(err, DxbcError::TruncatedData { .. }), "k={k}: {err}");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        rng_algorithm: proptest::test_runner::RngAlgorithm::ChaCha,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0xD8_BC_01),
        .. ProptestConfig::default()
    })]

    #[test]
    fn random_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let res = std::panic::catch_unwind(|| parse_everything(&bytes));
        prop_assert!(res.is_ok(), "parser panicked (len={})", bytes.len());
    }

    #[test]
    fn corrupted_container_never_panics(
        pos in 0usize..4096,
        value in any::<u8>(),
    ) {
        let mut bytes = sample_container();
        let pos = pos % bytes.len();
        bytes[pos] = value;
        let res = std::panic::catch_unwind(|| parse_everything(&bytes));
        prop_assert!(res.is_ok(), "parser panicked after writing {value:#x} at {pos}");
    }

    #[test]
    fn chunk_parsers_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let res = std::panic::catch_unwind(|| {
            let _ = parse_signature_chunk(&bytes);
            let _ = parse_rdef_chunk(&bytes);
        });
        prop_assert!(res.is_ok(), "chunk parser panicked (len={})", bytes.len());
    }
}
