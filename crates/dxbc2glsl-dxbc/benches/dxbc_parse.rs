#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, Criterion};
#[cfg(not(target_arch = "wasm32"))]
use dxbc2glsl_dxbc::test_utils::{
    build_container, build_signature_chunk, CbufferDesc, RdefBuilder, ResourceDesc, VariableDesc,
};
#[cfg(not(target_arch = "wasm32"))]
use dxbc2glsl_dxbc::{
    ComponentType, DxbcFile, SignatureEntry, SignatureKind, SignatureLayout, SystemValue,
    FOURCC_ISGN, FOURCC_OSGN, FOURCC_RDEF, FOURCC_SHEX,
};

#[cfg(not(target_arch = "wasm32"))]
fn signature(prefix: &str, count: u32) -> Vec<u8> {
    let entries: Vec<_> = (0..count)
        .map(|i| SignatureEntry {
            semantic_name: prefix.to_owned(),
            semantic_index: i,
            system_value: SystemValue::Undefined,
            component_type: ComponentType::Float32,
            register: i,
            mask: 0xf,
            read_write_mask: 0xf,
            stream: 0,
            min_precision: 0,
        })
        .collect();
    build_signature_chunk(SignatureLayout::Legacy, &entries)
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_container(c: &mut Criterion) {
    let mut cb = CbufferDesc::new("Globals", 16 * 4 * 16);
    for i in 0..16 {
        cb = cb.variable(VariableDesc::float4x4(&format!("m{i}"), i * 64));
    }
    let rdef = RdefBuilder::new(5, 0, 0xffff)
        .resource(ResourceDesc::sampler("s", 0))
        .resource(ResourceDesc::texture2d("t", 0))
        .cbuffer(cb, 0)
        .build();
    let blob = build_container(&[
        (FOURCC_RDEF, &rdef),
        (FOURCC_ISGN, &signature("TEXCOORD", 8)),
        (FOURCC_OSGN, &signature("SV_Target", 4)),
        (FOURCC_SHEX, &[0u8; 1024]),
    ]);

    let mut group = c.benchmark_group("dxbc_parse");
    group.bench_function("container", |b| {
        b.iter(|| {
            let file = DxbcFile::parse(black_box(&blob)).unwrap();
            black_box(file.chunks().count());
        })
    });
    group.bench_function("reflection", |b| {
        let file = DxbcFile::parse(&blob).unwrap();
        b.iter(|| {
            let input = file.get_signature(SignatureKind::Input).unwrap().unwrap();
            let rdef = file.get_rdef().unwrap().unwrap();
            black_box(input.entries.len());
            black_box(rdef.constant_buffers.len());
        })
    });
    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_container);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
