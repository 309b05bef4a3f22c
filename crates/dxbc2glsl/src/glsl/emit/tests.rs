use pretty_assertions::assert_eq;

use dxbc2glsl_dxbc::test_utils::{CbufferDesc, RdefBuilder, VariableDesc};
use dxbc2glsl_dxbc::{parse_rdef_chunk, ComponentType, RdefChunk, SignatureChunk, SignatureEntry, SystemValue};

use crate::error::ShaderTranslateError;
use crate::glsl::{emit_glsl, GlslConfig, GlslVersion};
use crate::model::{ShaderModule, Signatures};
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4::{ShaderModel, ShaderStage};
use crate::sm4_ir::{
    ComponentSelection, Declaration, DecodedItem, Immediate, InterpolationMode, Instruction, Operand,
    OperandIndex, ResourceDimension, ReturnType, SamplerMode, Swizzle, WriteMask,
};

fn entry(name: &str, sv: SystemValue, register: u32, mask: u8) -> SignatureEntry {
    SignatureEntry {
        semantic_name: name.to_owned(),
        semantic_index: 0,
        system_value: sv,
        component_type: ComponentType::Float32,
        register,
        mask,
        read_write_mask: mask,
        stream: 0,
        min_precision: 0,
    }
}

fn signatures(input: Vec<SignatureEntry>, output: Vec<SignatureEntry>) -> Signatures {
    Signatures {
        input: SignatureChunk { entries: input },
        output: SignatureChunk { entries: output },
        patch_constant: SignatureChunk::default(),
    }
}

fn reg(ty: OperandType, indices: &[u32]) -> Operand {
    let mut op = Operand::new(ty);
    op.num_components = 4;
    op.indices = indices.iter().copied().map(OperandIndex::Imm32).collect();
    op
}

fn dst(ty: OperandType, indices: &[u32], mask: u8) -> Operand {
    let mut op = reg(ty, indices);
    op.selection = ComponentSelection::Mask(WriteMask(mask));
    op
}

fn src(ty: OperandType, indices: &[u32], swizzle: [u8; 4]) -> Operand {
    let mut op = reg(ty, indices);
    op.selection = ComponentSelection::Swizzle(Swizzle(swizzle));
    op
}

fn scalar(ty: OperandType, indices: &[u32], component: u8) -> Operand {
    let mut op = reg(ty, indices);
    op.selection = ComponentSelection::Select1(component);
    op
}

fn imm(value: u32) -> Operand {
    let mut op = Operand::new(OperandType::Immediate32);
    op.num_components = 1;
    op.imm = Some(Immediate::Bits32([value; 4]));
    op
}

fn inst(opcode: Opcode, operands: Vec<Operand>) -> DecodedItem {
    let mut inst = Instruction::new(opcode, 0);
    inst.operands = operands;
    DecodedItem::Instruction(inst)
}

fn decl(d: Declaration) -> DecodedItem {
    DecodedItem::Declaration(d)
}

const XYZW: [u8; 4] = [0, 1, 2, 3];

fn module(
    stage: ShaderStage,
    items: Vec<DecodedItem>,
    signatures: Signatures,
    reflection: Option<RdefChunk>,
) -> ShaderModule {
    ShaderModule::from_parts(stage, ShaderModel { major: 5, minor: 0 }, items, signatures, reflection)
        .expect("module should build")
}

fn glsl(module: &ShaderModule, version: GlslVersion) -> String {
    emit_glsl(module, &GlslConfig::new(version)).expect("shader should translate")
}

fn assert_line(glsl: &str, line: &str) {
    assert!(
        glsl.lines().any(|l| l.trim() == line),
        "missing line `{line}` in:\n{glsl}"
    );
}

/// `mul o0.xyzw, v0.xyzw, cb0[0].xyzw` in a vertex shader.
fn transform_vs(reflection: Option<RdefChunk>) -> ShaderModule {
    let items = vec![
        decl(Declaration::ConstantBuffer { slot: 0, size_vec4: 2, dynamic_indexed: false }),
        decl(Declaration::Input { operand: dst(OperandType::Input, &[0], 0xf), system_value: None, interpolation: None }),
        decl(Declaration::Output { operand: dst(OperandType::Output, &[0], 0xf), system_value: Some(1) }),
        inst(
            Opcode::Mul,
            vec![
                dst(OperandType::Output, &[0], 0xf),
                src(OperandType::Input, &[0], XYZW),
                src(OperandType::ConstantBuffer, &[0, 0], XYZW),
            ],
        ),
        inst(Opcode::Ret, Vec::new()),
    ];
    let sigs = signatures(
        vec![entry("POSITION", SystemValue::Undefined, 0, 0xf)],
        vec![entry("SV_Position", SystemValue::Position, 0, 0xf)],
    );
    module(ShaderStage::Vertex, items, sigs, reflection)
}

#[test]
fn vertex_shader_without_reflection_uses_raw_cbuffer() {
    let out = glsl(&transform_vs(None), GlslVersion::V430);
    assert!(out.starts_with("#version 430\n"), "{out}");
    assert_line(&out, "layout(std140, binding = 0) uniform cb0 {");
    assert_line(&out, "vec4 cb0_data[2];");
    assert_line(&out, "layout(location = 0) in vec4 POSITION0;");
    assert_line(&out, "vec4 v[1];");
    assert_line(&out, "vec4 o[1];");
    assert_line(&out, "v[0] = POSITION0;");
    assert_line(&out, "o[0] = v[0] * cb0_data[0];");
    assert_line(&out, "gl_Position = o[0];");
    // The trailing `ret` folds into the epilogue.
    assert!(!out.contains("return;"), "{out}");
}

#[test]
fn reflected_cbuffer_declares_only_used_members() {
    let rdef = RdefBuilder::new(5, 0, 0xfffe)
        .cbuffer(
            CbufferDesc::new("Globals", 32)
                .variable(VariableDesc::float_n("scale", 0, 4))
                .variable(VariableDesc::float_n("unused", 16, 4)),
            0,
        )
        .build();
    let rdef = parse_rdef_chunk(&rdef).expect("RDEF should parse");
    let module = transform_vs(Some(rdef));
    assert_eq!(module.usage.used_variables, vec![vec![true, false]]);

    let out = glsl(&module, GlslVersion::V430);
    assert_line(&out, "layout(std140, binding = 0) uniform Globals {");
    assert_line(&out, "vec4 scale;");
    assert!(!out.contains("unused"), "{out}");
    assert_line(&out, "o[0] = v[0] * scale;");
}

#[test]
fn old_desktop_versions_are_rejected() {
    let err = emit_glsl(&transform_vs(None), &GlslConfig::new(GlslVersion::V120)).unwrap_err();
    assert_eq!(err, ShaderTranslateError::UnsupportedGlslVersion(GlslVersion::V120));
}

fn textured_ps() -> ShaderModule {
    let items = vec![
        decl(Declaration::Resource {
            slot: 0,
            dimension: ResourceDimension::Texture2D,
            sample_count: 0,
            return_type: [ReturnType::Float; 4],
        }),
        decl(Declaration::Sampler { slot: 0, mode: SamplerMode::Default }),
        decl(Declaration::Input {
            operand: dst(OperandType::Input, &[0], 0b0011),
            system_value: None,
            interpolation: Some(InterpolationMode::Linear),
        }),
        decl(Declaration::Output { operand: dst(OperandType::Output, &[0], 0xf), system_value: None }),
        inst(
            Opcode::Sample,
            vec![
                dst(OperandType::Output, &[0], 0xf),
                src(OperandType::Input, &[0], [0, 1, 0, 0]),
                src(OperandType::Resource, &[0], XYZW),
                reg(OperandType::Sampler, &[0]),
            ],
        ),
        inst(Opcode::Ret, Vec::new()),
    ];
    let sigs = signatures(
        vec![entry("TEXCOORD", SystemValue::Undefined, 0, 0b0011)],
        vec![entry("SV_Target", SystemValue::Target, 0, 0xf)],
    );
    module(ShaderStage::Pixel, items, sigs, None)
}

#[test]
fn pixel_shader_samples_through_combined_sampler() {
    let out = glsl(&textured_ps(), GlslVersion::V430);
    assert_line(&out, "layout(binding = 0) uniform sampler2D t0_s0;");
    assert_line(&out, "in vec2 v_TEXCOORD0;");
    assert_line(&out, "layout(location = 0) out vec4 v_SV_Target0;");
    assert_line(&out, "v[0].xy = v_TEXCOORD0;");
    assert_line(&out, "o[0] = texture(t0_s0, v[0].xy);");
    assert_line(&out, "v_SV_Target0 = o[0];");
}

#[test]
fn es_targets_get_precision_qualifiers() {
    let out = glsl(&textured_ps(), GlslVersion::Es300);
    assert!(out.starts_with("#version 300 es\n"), "{out}");
    assert_line(&out, "precision highp float;");
    assert_line(&out, "uniform highp sampler2D t0_s0;");
}

#[test]
fn integer_arithmetic_bitcasts_through_float_registers() {
    let items = vec![
        decl(Declaration::Temps(2)),
        inst(
            Opcode::Iadd,
            vec![dst(OperandType::Temp, &[1], 0b0001), scalar(OperandType::Temp, &[0], 0), imm(1)],
        ),
    ];
    let out = glsl(&module(ShaderStage::Pixel, items, Signatures::default(), None), GlslVersion::V330);
    assert_line(&out, "vec4 r0 = vec4(0.0);");
    assert_line(&out, "float r1 = 0.0;");
    assert_line(&out, "r1 = intBitsToFloat(floatBitsToInt(r0.x) + 1);");
}

#[test]
fn structured_control_flow_maps_to_blocks() {
    let mut if_nz = Instruction::new(Opcode::If, 0);
    if_nz.test_nonzero = true;
    if_nz.operands = vec![scalar(OperandType::Temp, &[0], 0)];
    let mut breakc = Instruction::new(Opcode::Breakc, 0);
    breakc.operands = vec![scalar(OperandType::Temp, &[0], 1)];
    let items = vec![
        DecodedItem::Instruction(if_nz),
        inst(Opcode::Mov, vec![dst(OperandType::Temp, &[0], 0b0100), imm(0x3f80_0000)]),
        inst(Opcode::Else, Vec::new()),
        inst(Opcode::Loop, Vec::new()),
        DecodedItem::Instruction(breakc),
        inst(Opcode::EndLoop, Vec::new()),
        inst(Opcode::EndIf, Vec::new()),
        inst(Opcode::Ret, Vec::new()),
    ];
    let out = glsl(&module(ShaderStage::Pixel, items, Signatures::default(), None), GlslVersion::V430);
    let body: Vec<&str> = out
        .lines()
        .skip_while(|l| *l != "void main() {")
        .collect();
    assert_eq!(
        body,
        vec![
            "void main() {",
            "\tif (floatBitsToUint(r0.x) != 0u) {",
            "\t\tr0.z = 1.0;",
            "\t} else {",
            "\t\twhile (true) {",
            "\t\t\tif (floatBitsToUint(r0.y) == 0u) break;",
            "\t\t}",
            "\t}",
            "}",
        ]
    );
}

#[test]
fn compute_shader_uses_shared_memory_and_barriers() {
    let mut sync = Instruction::new(Opcode::Sync, 0);
    sync.controls = 0b0011;
    let items = vec![
        decl(Declaration::ThreadGroup([8, 8, 1])),
        decl(Declaration::TgsmRaw { slot: 0, byte_count: 64 }),
        inst(
            Opcode::StoreRaw,
            vec![dst(OperandType::ThreadGroupSharedMemory, &[0], 0b0001), imm(4), imm(7)],
        ),
        DecodedItem::Instruction(sync),
        inst(Opcode::Ret, Vec::new()),
    ];
    let module = module(ShaderStage::Compute, items, Signatures::default(), None);
    let out = glsl(&module, GlslVersion::V430);
    assert_line(&out, "layout(local_size_x = 8, local_size_y = 8, local_size_z = 1) in;");
    assert_line(&out, "shared uint g0[16];");
    assert_line(&out, "uint _t0 = 4u >> 2u;");
    assert_line(&out, "uint _t1 = 7u;");
    assert_line(&out, "g0[_t0] = _t1;");
    assert_line(&out, "memoryBarrierShared();");
    assert_line(&out, "barrier();");

    let err = emit_glsl(&module, &GlslConfig::new(GlslVersion::V330)).unwrap_err();
    assert_eq!(err, ShaderTranslateError::UnsupportedStage(ShaderStage::Compute));
}

#[test]
fn missing_features_name_the_instruction() {
    let items = vec![inst(
        Opcode::Countbits,
        vec![dst(OperandType::Temp, &[0], 0b0001), scalar(OperandType::Temp, &[1], 0)],
    )];
    let module = module(ShaderStage::Pixel, items, Signatures::default(), None);
    assert_eq!(
        emit_glsl(&module, &GlslConfig::new(GlslVersion::V330)).unwrap_err(),
        ShaderTranslateError::MissingFeature { index: 0, opcode: Opcode::Countbits, feature: "bitCount" }
    );
    let out = glsl(&module, GlslVersion::V430);
    assert_line(&out, "r0 = intBitsToFloat(bitCount(floatBitsToUint(r1.x)));");
}
