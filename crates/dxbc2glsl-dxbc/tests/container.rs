use dxbc2glsl_dxbc::test_utils::{build_container, build_signature_chunk, CbufferDesc, RdefBuilder, VariableDesc};
use dxbc2glsl_dxbc::{
    ComponentType, DxbcError, DxbcFile, FourCC, SignatureEntry, SignatureKind, SignatureLayout,
    SystemValue, FOURCC_ISG1, FOURCC_ISGN, FOURCC_OSG1, FOURCC_OSG5, FOURCC_OSGN, FOURCC_PCSG,
    FOURCC_RD11, FOURCC_RDEF, FOURCC_SHDR, FOURCC_SHEX,
};
use pretty_assertions::assert_eq;

fn entry(name: &str, index: u32, register: u32) -> SignatureEntry {
    SignatureEntry {
        semantic_name: name.to_owned(),
        semantic_index: index,
        system_value: SystemValue::Undefined,
        component_type: ComponentType::Float32,
        register,
        mask: 0xf,
        read_write_mask: 0xf,
        stream: 0,
        min_precision: 0,
    }
}

#[test]
fn get_chunk_returns_payload_range_inside_blob() {
    let rdef = [9u8; 12];
    let shdr = [7u8; 8];
    let bytes = build_container(&[(FOURCC_RDEF, &rdef), (FOURCC_SHDR, &shdr)]);
    let file = DxbcFile::parse(&bytes).unwrap();

    let chunk = file.get_chunk(FOURCC_SHDR).expect("SHDR present");
    let start = chunk.offset as usize;
    assert!(start + chunk.data.len() <= bytes.len());
    assert_eq!(&bytes[start..start + chunk.data.len()], &shdr);

    assert!(file.get_chunk(FourCC(*b"PCSG")).is_none());
    assert_eq!(file.get_chunks(FOURCC_RDEF).count(), 1);
}

#[test]
fn chunk_extending_past_end_is_truncated_data() {
    let mut bytes = build_container(&[(FOURCC_SHEX, &[0u8; 16])]);
    // Grow the declared chunk size by one dword.
    let size_pos = 36 + 4;
    bytes[size_pos..size_pos + 4].copy_from_slice(&20u32.to_le_bytes());
    let err = DxbcFile::parse(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::TruncatedData { .. }), "{err}");
}

#[test]
fn big_endian_authored_fixture_decodes_identically() {
    // Header + one empty chunk, written as logical dwords.
    let words: [u32; 10] = [
        u32::from_le_bytes(*b"DXBC"),
        0,
        0,
        0,
        0,
        1,
        44,
        1,
        36,
        u32::from_le_bytes(*b"SHDR"),
    ];
    let le: Vec<u8> = words
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .chain(0u32.to_le_bytes())
        .collect();
    // Author the same fixture big-endian, then pre-swap every dword.
    let be_swapped: Vec<u8> = words
        .iter()
        .flat_map(|w| {
            let mut b = w.to_be_bytes();
            b.reverse();
            b
        })
        .chain(0u32.to_le_bytes())
        .collect();

    let a = DxbcFile::parse(&le).unwrap();
    let b = DxbcFile::parse(&be_swapped).unwrap();
    assert_eq!(a.header(), b.header());
    assert_eq!(a.header().total_size, 44);
    let ca: Vec<_> = a.chunks().collect();
    let cb: Vec<_> = b.chunks().collect();
    assert_eq!(ca, cb);
    assert_eq!(ca[0].fourcc, FOURCC_SHDR);
    assert!(ca[0].data.is_empty());
}

#[test]
fn input_signature_prefers_isg1_over_isgn() {
    let mut newer = entry("TEXCOORD", 1, 0);
    newer.min_precision = 1;
    let isg1 = build_signature_chunk(SignatureLayout::Extended, &[newer.clone()]);
    let isgn = build_signature_chunk(SignatureLayout::Legacy, &[entry("TEXCOORD", 0, 0)]);

    // File order puts the legacy chunk first; lookup order must still win.
    let bytes = build_container(&[(FOURCC_ISGN, &isgn), (FOURCC_ISG1, &isg1)]);
    let file = DxbcFile::parse(&bytes).unwrap();
    let sig = file.get_signature(SignatureKind::Input).unwrap().unwrap();
    assert_eq!(sig.entries, vec![newer]);
}

#[test]
fn output_signature_fallback_order_is_osg1_osg5_osgn() {
    let mut streamed = entry("COLOR", 0, 1);
    streamed.stream = 2;
    let osg5 = build_signature_chunk(SignatureLayout::Stream, &[streamed.clone()]);
    let osgn = build_signature_chunk(SignatureLayout::Legacy, &[entry("COLOR", 0, 0)]);

    let bytes = build_container(&[(FOURCC_OSGN, &osgn), (FOURCC_OSG5, &osg5)]);
    let file = DxbcFile::parse(&bytes).unwrap();
    let sig = file.get_signature(SignatureKind::Output).unwrap().unwrap();
    assert_eq!(sig.entries, vec![streamed]);

    let mut extended = entry("COLOR", 3, 4);
    extended.stream = 1;
    let osg1 = build_signature_chunk(SignatureLayout::Extended, &[extended.clone()]);
    let bytes = build_container(&[
        (FOURCC_OSGN, &osgn),
        (FOURCC_OSG5, &osg5),
        (FOURCC_OSG1, &osg1),
    ]);
    let file = DxbcFile::parse(&bytes).unwrap();
    let sig = file.get_signature(SignatureKind::Output).unwrap().unwrap();
    assert_eq!(sig.entries, vec![extended]);
}

#[test]
fn malformed_preferred_signature_does_not_fall_back() {
    let good = build_signature_chunk(SignatureLayout::Legacy, &[entry("A", 0, 0)]);
    let bad = [1u8, 0, 0, 0];
    let bytes = build_container(&[(FOURCC_ISGN, &good), (FOURCC_ISG1, &bad)]);
    let file = DxbcFile::parse(&bytes).unwrap();
    let err = file.get_signature(SignatureKind::Input).unwrap().unwrap_err();
    assert!(err.context().starts_with("ISG1"), "{err}");
}

#[test]
fn missing_patch_constant_signature_is_none() {
    let bytes = build_container(&[(FOURCC_SHEX, &[0u8; 8])]);
    let file = DxbcFile::parse(&bytes).unwrap();
    assert!(file.get_signature(SignatureKind::PatchConstant).is_none());
    assert!(file.get_rdef().is_none());

    let pcsg = build_signature_chunk(SignatureLayout::Legacy, &[entry("SV_TessFactor", 0, 0)]);
    let bytes = build_container(&[(FOURCC_PCSG, &pcsg)]);
    let file = DxbcFile::parse(&bytes).unwrap();
    let sig = file.get_signature(SignatureKind::PatchConstant).unwrap().unwrap();
    assert_eq!(sig.entries.len(), 1);
}

#[test]
fn rdef_falls_back_to_rd11_tag() {
    let rdef = RdefBuilder::new(4, 0, 0xfffe)
        .cbuffer(
            CbufferDesc::new("cb", 16).variable(VariableDesc::float_n("v", 0, 4)),
            0,
        )
        .build();
    let bytes = build_container(&[(FOURCC_RD11, &rdef)]);
    let file = DxbcFile::parse(&bytes).unwrap();
    let parsed = file.get_rdef().unwrap().unwrap();
    assert_eq!(parsed.constant_buffers[0].name, "cb");
}

#[cfg(feature = "md5")]
#[test]
fn zero_checksum_does_not_match() {
    let bytes = build_container(&[(FOURCC_SHDR, &[0u8; 4])]);
    let file = DxbcFile::parse(&bytes).unwrap();
    assert!(!file.checksum_matches());
}
