//! Token-level builders for hand-assembled SM4 shaders.

#![allow(dead_code)]

use dxbc2glsl::dxbc::test_utils::{build_container, build_signature_chunk};
use dxbc2glsl::dxbc::{
    ComponentType, SignatureEntry, SignatureLayout, SystemValue, FOURCC_ISGN, FOURCC_OSGN,
    FOURCC_RDEF, FOURCC_SHDR,
};
use dxbc2glsl::sm4::opcode::{
    Opcode, OperandType, OPCODE_CONTROLS_SHIFT, OPCODE_LEN_SHIFT, OPERAND_SEL_MASK,
    OPERAND_SEL_SELECT1, OPERAND_SEL_SWIZZLE,
};

pub const XYZW: u32 = 0b11_10_01_00;

pub const PS: u32 = 0;
pub const VS: u32 = 1;
pub const GS: u32 = 2;
pub const HS: u32 = 3;
pub const DS: u32 = 4;

/// Register operand with a write mask.
pub fn dst(ty: OperandType, reg: u32, mask: u32) -> Vec<u32> {
    vec![2 | (OPERAND_SEL_MASK << 2) | (mask << 4) | (ty.to_u32() << 12) | (1 << 20), reg]
}

/// Register operand with a swizzle.
pub fn src(ty: OperandType, reg: u32, swizzle: u32) -> Vec<u32> {
    vec![2 | (OPERAND_SEL_SWIZZLE << 2) | (swizzle << 4) | (ty.to_u32() << 12) | (1 << 20), reg]
}

/// Single component of a register.
pub fn scalar(ty: OperandType, reg: u32, component: u32) -> Vec<u32> {
    vec![2 | (OPERAND_SEL_SELECT1 << 2) | (component << 4) | (ty.to_u32() << 12) | (1 << 20), reg]
}

/// Operand without components (samplers, resources in declarations).
pub fn bare(ty: OperandType, reg: u32) -> Vec<u32> {
    vec![(ty.to_u32() << 12) | (1 << 20), reg]
}

/// `cb{slot}[{register}]`.
pub fn cb(slot: u32, register: u32) -> Vec<u32> {
    let ty = OperandType::ConstantBuffer.to_u32();
    vec![2 | (OPERAND_SEL_SWIZZLE << 2) | (XYZW << 4) | (ty << 12) | (2 << 20), slot, register]
}

pub fn imm(value: u32) -> Vec<u32> {
    vec![1 | (OperandType::Immediate32.to_u32() << 12), value]
}

/// Assembles a `SHDR` token stream.
pub struct ShaderBuilder {
    tokens: Vec<u32>,
}

impl ShaderBuilder {
    pub fn new(program_type: u32, major: u32, minor: u32) -> Self {
        Self {
            tokens: vec![(program_type << 16) | (major << 4) | minor, 0],
        }
    }

    pub fn op(self, opcode: Opcode, operands: &[&[u32]]) -> Self {
        self.op_with(opcode, 0, operands)
    }

    /// Instruction or declaration with opcode-specific control bits; trailing
    /// raw tokens go in `operands` as well.
    pub fn op_with(mut self, opcode: Opcode, controls: u32, operands: &[&[u32]]) -> Self {
        let len = 1 + operands.iter().map(|o| o.len()).sum::<usize>();
        self.tokens.push(
            opcode.to_u32() | (controls << OPCODE_CONTROLS_SHIFT) | ((len as u32) << OPCODE_LEN_SHIFT),
        );
        for operand in operands {
            self.tokens.extend_from_slice(operand);
        }
        self
    }

    pub fn tokens(&self) -> Vec<u32> {
        let mut tokens = self.tokens.clone();
        tokens[1] = tokens.len() as u32;
        tokens
    }

    pub fn build(&self) -> Vec<u8> {
        self.tokens().iter().flat_map(|t| t.to_le_bytes()).collect()
    }
}

pub fn entry(name: &str, index: u32, sv: SystemValue, register: u32, mask: u8) -> SignatureEntry {
    SignatureEntry {
        semantic_name: name.to_owned(),
        semantic_index: index,
        system_value: sv,
        component_type: ComponentType::Float32,
        register,
        mask,
        read_write_mask: mask,
        stream: 0,
        min_precision: 0,
    }
}

/// `ISGN` + `OSGN` + optional `RDEF` + `SHDR` container.
pub fn container(
    inputs: &[SignatureEntry],
    outputs: &[SignatureEntry],
    rdef: Option<&[u8]>,
    shader: &ShaderBuilder,
) -> Vec<u8> {
    let isgn = build_signature_chunk(SignatureLayout::Legacy, inputs);
    let osgn = build_signature_chunk(SignatureLayout::Legacy, outputs);
    let shdr = shader.build();
    let mut chunks = vec![(FOURCC_ISGN, isgn.as_slice()), (FOURCC_OSGN, osgn.as_slice())];
    if let Some(rdef) = rdef {
        chunks.push((FOURCC_RDEF, rdef));
    }
    chunks.push((FOURCC_SHDR, shdr.as_slice()));
    build_container(&chunks)
}
