#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
#[path = "../tests/common/mod.rs"]
mod common;

#[cfg(not(target_arch = "wasm32"))]
use common::*;
#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
#[cfg(not(target_arch = "wasm32"))]
use dxbc2glsl::dxbc::test_utils::{CbufferDesc, RdefBuilder, VariableDesc};
#[cfg(not(target_arch = "wasm32"))]
use dxbc2glsl::dxbc::SystemValue;
#[cfg(not(target_arch = "wasm32"))]
use dxbc2glsl::sm4::opcode::{Opcode, OperandType};
#[cfg(not(target_arch = "wasm32"))]
use dxbc2glsl::{emit_glsl, DxbcFile, GlslConfig, GlslVersion, ShaderModule};

/// Vertex shader doing `iterations` matrix-vector products inside a loop.
#[cfg(not(target_arch = "wasm32"))]
fn skinning_vs(iterations: usize) -> Vec<u8> {
    let rdef = RdefBuilder::new(4, 0, 0xfffe)
        .cbuffer(
            CbufferDesc::new("Bones", 256)
                .variable(VariableDesc::float4x4("bone", 0).array(4)),
            0,
        )
        .build();
    let mut shader = ShaderBuilder::new(VS, 4, 0)
        .op(Opcode::DclConstantBuffer, &[&cb(0, 16)])
        .op(Opcode::DclInput, &[&dst(OperandType::Input, 0, 0xf)])
        .op(Opcode::DclOutputSiv, &[&dst(OperandType::Output, 0, 0xf), &[1]])
        .op(Opcode::DclTemps, &[&[2]])
        .op(Opcode::Mov, &[&dst(OperandType::Temp, 0, 0xf), &src(OperandType::Input, 0, XYZW)])
        .op(Opcode::Loop, &[]);
    for i in 0..iterations {
        for row in 0..4u32 {
            shader = shader.op(
                Opcode::Dp4,
                &[
                    &dst(OperandType::Temp, 1, 1 << row),
                    &src(OperandType::Temp, 0, XYZW),
                    &cb(0, (i as u32 % 4) * 4 + row),
                ],
            );
        }
        shader = shader.op(
            Opcode::Mov,
            &[&dst(OperandType::Temp, 0, 0xf), &src(OperandType::Temp, 1, XYZW)],
        );
    }
    let shader = shader
        .op(Opcode::Break, &[])
        .op(Opcode::EndLoop, &[])
        .op(Opcode::Mov, &[&dst(OperandType::Output, 0, 0xf), &src(OperandType::Temp, 0, XYZW)])
        .op(Opcode::Ret, &[]);
    container(
        &[entry("POSITION", 0, SystemValue::Undefined, 0, 0xf)],
        &[entry("SV_Position", 0, SystemValue::Position, 0, 0xf)],
        Some(&rdef),
        &shader,
    )
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("dxbc_glsl");
    for iterations in [4usize, 64] {
        let bytes = skinning_vs(iterations);
        let dxbc = DxbcFile::parse(&bytes).expect("container should parse");
        let module = ShaderModule::build(&dxbc).expect("module should build");

        group.bench_with_input(BenchmarkId::new("model", iterations), &bytes, |b, bytes| {
            b.iter(|| {
                let dxbc = DxbcFile::parse(black_box(bytes)).unwrap();
                let module = ShaderModule::build(&dxbc).unwrap();
                black_box(module.instructions.len());
            })
        });

        for version in [GlslVersion::V330, GlslVersion::V430, GlslVersion::Es300] {
            let config = GlslConfig::new(version);
            let id = BenchmarkId::new(format!("emit/{}", version.token()), iterations);
            group.bench_with_input(id, &module, |b, module| {
                b.iter(|| {
                    let glsl = emit_glsl(black_box(module), &config).unwrap();
                    black_box(glsl.len());
                })
            });
        }
    }
    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_pipeline);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
