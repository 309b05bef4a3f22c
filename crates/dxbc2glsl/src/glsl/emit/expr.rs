//! Register reads and writes.
//!
//! Every D3D register is a `vec4` of raw 32-bit patterns. A read resolves
//! each requested component to a [`Comp`], groups runs that come from the
//! same GLSL value into one swizzle, and bit-casts the result into the type
//! the instruction computes in. Writes cast back to the storage type of the
//! destination.

use super::{Emitter, Result};
use crate::sm4::opcode::OperandType;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{
    Immediate, Instruction, Operand, OperandIndex, OperandModifier, WriteMask, COMPONENT_CHARS,
};

/// Numeric interpretation of 32-bit register contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum NumType {
    Float,
    Int,
    Uint,
}

impl NumType {
    pub(super) fn scalar(self) -> &'static str {
        match self {
            NumType::Float => "float",
            NumType::Int => "int",
            NumType::Uint => "uint",
        }
    }

    /// `vecN`/`ivecN`/`uvecN`, or the scalar type for `n <= 1`.
    pub(super) fn vec(self, n: usize) -> String {
        if n <= 1 {
            return self.scalar().to_owned();
        }
        format!("{}vec{n}", self.prefix())
    }

    /// Prefix of sampler, image and vector type names.
    pub(super) fn prefix(self) -> &'static str {
        match self {
            NumType::Float => "",
            NumType::Int => "i",
            NumType::Uint => "u",
        }
    }

    pub(super) fn zero(self) -> &'static str {
        match self {
            NumType::Float => "0.0",
            NumType::Int => "0",
            NumType::Uint => "0u",
        }
    }
}

/// Reinterprets an `n`-component value stored as `from` as `to`.
pub(super) fn bitcast(expr: String, from: NumType, to: NumType, n: usize) -> String {
    match (from, to) {
        (NumType::Float, NumType::Float)
        | (NumType::Int, NumType::Int)
        | (NumType::Uint, NumType::Uint) => expr,
        (NumType::Float, NumType::Int) => format!("floatBitsToInt({expr})"),
        (NumType::Float, NumType::Uint) => format!("floatBitsToUint({expr})"),
        (NumType::Int, NumType::Float) => format!("intBitsToFloat({expr})"),
        (NumType::Uint, NumType::Float) => format!("uintBitsToFloat({expr})"),
        (NumType::Int, NumType::Uint) | (NumType::Uint, NumType::Int) => {
            format!("{}({expr})", to.vec(n))
        }
    }
}

/// GLSL literal with the bit pattern `bits`.
pub(super) fn literal(bits: u32, ty: NumType) -> String {
    match ty {
        NumType::Float => {
            let f = f32::from_bits(bits);
            if f.is_normal() || f == 0.0 {
                format!("{f:?}")
            } else {
                // NaN, infinities and denormals have no portable spelling.
                format!("uintBitsToFloat(0x{bits:x}u)")
            }
        }
        NumType::Int => match bits as i32 {
            i32::MIN => "int(0x80000000u)".to_owned(),
            v => v.to_string(),
        },
        NumType::Uint if bits > 0xffff => format!("0x{bits:x}u"),
        NumType::Uint => format!("{bits}u"),
    }
}

/// `false` for expressions that need parentheses as an operand.
pub(super) fn is_atom(expr: &str) -> bool {
    if expr.starts_with('-') || expr.starts_with('~') {
        return false;
    }
    let mut depth = 0i32;
    for ch in expr.chars() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ' ' if depth == 0 => return false,
            _ => {}
        }
    }
    true
}

pub(super) fn paren(expr: String) -> String {
    if is_atom(&expr) {
        expr
    } else {
        format!("({expr})")
    }
}

pub(super) fn apply_modifier(expr: String, modifier: OperandModifier, ty: NumType) -> String {
    let abs = |e: String| match ty {
        // GLSL has no `abs(uint)`.
        NumType::Uint => format!("uint(abs(int({e})))"),
        _ => format!("abs({e})"),
    };
    match modifier {
        OperandModifier::None => expr,
        OperandModifier::Neg => format!("-{}", paren(expr)),
        OperandModifier::Abs => abs(expr),
        OperandModifier::AbsNeg => format!("-{}", abs(expr)),
    }
}

/// `".xzw"` for the given components; empty for the identity `xyzw`.
pub(super) fn swizzle_suffix(components: impl IntoIterator<Item = u8>) -> String {
    let s: String = components
        .into_iter()
        .map(|c| COMPONENT_CHARS[usize::from(c & 3)])
        .collect();
    if s.is_empty() || s == "xyzw" {
        String::new()
    } else {
        format!(".{s}")
    }
}

/// Left-hand swizzle for `mask` on a `width`-component value.
pub(super) fn mask_suffix(mask: WriteMask, width: u8) -> String {
    if width <= 1 || mask == WriteMask::first(width) {
        String::new()
    } else {
        mask.suffix()
    }
}

/// `value` replicated to `n` components.
pub(super) fn splat(value: String, ty: NumType, n: usize) -> String {
    if n <= 1 {
        value
    } else {
        format!("{}({value})", ty.vec(n))
    }
}

/// One 32-bit component of a register operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Comp {
    /// Component `sel` of `base`, a `width`-component GLSL value holding
    /// `native` numbers. `width == 1` means `base` is a scalar.
    Reg {
        base: String,
        width: u8,
        sel: u8,
        native: NumType,
    },
    /// Raw 32-bit literal.
    Lit(u32),
}

impl Comp {
    pub(super) fn vector(base: impl Into<String>, width: u8, sel: u8, native: NumType) -> Self {
        if width <= 1 {
            return Self::scalar(base, native);
        }
        Comp::Reg {
            base: base.into(),
            width,
            sel,
            native,
        }
    }

    pub(super) fn scalar(base: impl Into<String>, native: NumType) -> Self {
        Comp::Reg {
            base: base.into(),
            width: 1,
            sel: 0,
            native,
        }
    }
}

/// Builds an expression of type `ty` (`ty.vec(comps.len())`) from `comps`.
pub(super) fn combine(comps: &[Comp], ty: NumType) -> String {
    if let [Comp::Lit(first), rest @ ..] = comps {
        if rest.iter().all(|c| *c == Comp::Lit(*first)) {
            return splat(literal(*first, ty), ty, comps.len());
        }
    }

    let mut parts = Vec::new();
    let mut i = 0;
    while i < comps.len() {
        match &comps[i] {
            Comp::Lit(bits) => {
                parts.push(literal(*bits, ty));
                i += 1;
            }
            Comp::Reg {
                base,
                width,
                sel,
                native,
            } => {
                let mut sels = vec![*sel];
                let mut j = i + 1;
                if *width > 1 {
                    while let Some(Comp::Reg {
                        base: b,
                        width: w,
                        sel: s,
                        native: n,
                    }) = comps.get(j)
                    {
                        if b != base || w != width || n != native {
                            break;
                        }
                        sels.push(*s);
                        j += 1;
                    }
                }
                let identity = usize::from(*width) == sels.len()
                    && sels.iter().enumerate().all(|(k, &s)| usize::from(s) == k);
                let value = if *width == 1 || identity {
                    base.clone()
                } else {
                    let swizzle: String = sels
                        .iter()
                        .map(|&s| COMPONENT_CHARS[usize::from(s & 3)])
                        .collect();
                    format!("{base}.{swizzle}")
                };
                parts.push(bitcast(value, *native, ty, sels.len()));
                i = j;
            }
        }
    }
    match parts.len() {
        0 => ty.zero().to_owned(),
        1 => parts.remove(0),
        _ => format!("{}({})", ty.vec(comps.len()), parts.join(", ")),
    }
}

/// Heuristic type of an immediate: float when every component looks like one.
fn immediate_type(values: &[u32]) -> NumType {
    let looks_float = values.iter().all(|&bits| {
        let f = f32::from_bits(bits);
        f == 0.0 || (f.is_normal() && f.abs() >= 1e-6 && f.abs() <= 1e12)
    });
    if looks_float {
        NumType::Float
    } else {
        NumType::Uint
    }
}

impl Emitter<'_> {
    pub(super) fn temp_width(&self, reg: u32) -> u8 {
        self.module.usage.temp_widths.get(&reg).copied().unwrap_or(4)
    }

    fn indexable_components(&self, reg: u32) -> Result<u8> {
        self.module
            .usage
            .indexable_temps
            .get(&reg)
            .map(|info| info.components.clamp(1, 4) as u8)
            .ok_or_else(|| self.unsupported())
    }

    /// Source operand `n` (after the destinations).
    pub(super) fn src<'i>(&self, inst: &'i Instruction, n: usize) -> Result<&'i Operand> {
        inst.operands
            .get(inst.opcode.dst_count() + n)
            .ok_or_else(|| self.unsupported())
    }

    /// Destination operand `n`.
    pub(super) fn dst<'i>(&self, inst: &'i Instruction, n: usize) -> Result<&'i Operand> {
        inst.operands.get(n).ok_or_else(|| self.unsupported())
    }

    /// GLSL integer expression for a register index.
    pub(super) fn index_expr(&self, index: &OperandIndex) -> Result<String> {
        Ok(match index {
            OperandIndex::Imm32(v) => v.to_string(),
            OperandIndex::Imm64(v) => v.to_string(),
            OperandIndex::Relative(rel) => self.read_lane(rel, 0, NumType::Int)?,
            OperandIndex::Imm32PlusRelative(_, rel) | OperandIndex::Imm64PlusRelative(_, rel) => {
                let dynamic = self.read_lane(rel, 0, NumType::Int)?;
                match index.imm() {
                    0 => dynamic,
                    base => format!("{dynamic} + {base}"),
                }
            }
        })
    }

    pub(super) fn index_at(&self, op: &Operand, n: usize) -> Result<String> {
        let index = op.indices.get(n).ok_or_else(|| self.unsupported())?;
        self.index_expr(index)
    }

    /// Register component `c` of `op`, before swizzling and modifiers.
    pub(super) fn component(&self, op: &Operand, c: u8) -> Result<Comp> {
        let uint = NumType::Uint;
        let int = NumType::Int;
        Ok(match op.ty {
            OperandType::Temp => {
                let reg = op.reg();
                let width = self.temp_width(reg);
                if c >= width {
                    Comp::Lit(0)
                } else {
                    Comp::vector(format!("r{reg}"), width, c, NumType::Float)
                }
            }
            OperandType::Immediate32 => match op.imm {
                Some(Immediate::Bits32(values)) => Comp::Lit(values[usize::from(c & 3)]),
                _ => return Err(self.unsupported()),
            },
            OperandType::Input | OperandType::InputControlPoint => self.input_component(op, c)?,
            OperandType::Output => {
                Comp::vector(format!("o[{}]", self.index_at(op, 0)?), 4, c, NumType::Float)
            }
            OperandType::IndexableTemp => {
                let reg = op.reg();
                let width = self.indexable_components(reg)?;
                if c >= width {
                    Comp::Lit(0)
                } else {
                    let index = self.index_at(op, 1)?;
                    Comp::vector(format!("x{reg}[{index}]"), width, c, NumType::Float)
                }
            }
            OperandType::ConstantBuffer => self.cbuffer_component(op, c)?,
            OperandType::ImmediateConstantBuffer => {
                Comp::vector(format!("icb[{}]", self.index_at(op, 0)?), 4, c, uint)
            }
            OperandType::InputPrimitiveId if self.module.stage == ShaderStage::Geometry => {
                Comp::scalar("gl_PrimitiveIDIn", int)
            }
            OperandType::InputPrimitiveId => Comp::scalar("gl_PrimitiveID", int),
            OperandType::InputGsInstanceId | OperandType::OutputControlPointId => {
                Comp::scalar("gl_InvocationID", int)
            }
            OperandType::InputForkInstanceId | OperandType::InputJoinInstanceId => {
                Comp::scalar("phase_instance", int)
            }
            OperandType::InputDomainPoint if c < 3 => {
                Comp::vector("gl_TessCoord", 3, c, NumType::Float)
            }
            OperandType::InputThreadId if c < 3 => {
                Comp::vector("gl_GlobalInvocationID", 3, c, uint)
            }
            OperandType::InputThreadGroupId if c < 3 => {
                Comp::vector("gl_WorkGroupID", 3, c, uint)
            }
            OperandType::InputThreadIdInGroup if c < 3 => {
                Comp::vector("gl_LocalInvocationID", 3, c, uint)
            }
            OperandType::InputDomainPoint
            | OperandType::InputThreadId
            | OperandType::InputThreadGroupId
            | OperandType::InputThreadIdInGroup => Comp::Lit(0),
            OperandType::InputThreadIdInGroupFlattened => {
                Comp::scalar("gl_LocalInvocationIndex", uint)
            }
            OperandType::InputCoverageMask => Comp::scalar("gl_SampleMaskIn[0]", int),
            OperandType::OutputControlPoint => {
                let (vertex, reg) = self.vertex_and_register(op)?;
                self.io
                    .output_component(reg, c, Some(&vertex))
                    .ok_or_else(|| self.unsupported())?
            }
            OperandType::InputPatchConstant => {
                let reg = op.indices.last().ok_or_else(|| self.unsupported())?;
                if reg.relative().is_some() {
                    return Err(self.unsupported());
                }
                if self.module.stage == ShaderStage::Hull {
                    // Join phases read what the fork phases staged.
                    Comp::vector(format!("o[{}]", reg.imm()), 4, c, NumType::Float)
                } else {
                    self.io
                        .patch_component(reg.imm(), c)
                        .ok_or_else(|| self.unsupported())?
                }
            }
            _ => return Err(self.unsupported()),
        })
    }

    /// `(vertex index expression, register)` of a 2D per-vertex operand.
    fn vertex_and_register(&self, op: &Operand) -> Result<(String, u32)> {
        match op.indices.as_slice() {
            [vertex, reg] if reg.relative().is_none() => {
                Ok((self.index_expr(vertex)?, reg.imm()))
            }
            _ => Err(self.unsupported()),
        }
    }

    fn input_component(&self, op: &Operand, c: u8) -> Result<Comp> {
        if self.io.arrayed_inputs {
            let (vertex, reg) = self.vertex_and_register(op)?;
            return Ok(Comp::vector(format!("v{reg}[{vertex}]"), 4, c, NumType::Float));
        }
        Ok(Comp::vector(format!("v[{}]", self.index_at(op, 0)?), 4, c, NumType::Float))
    }

    /// Reads `op` for destination `lanes` as `ty`, with swizzle and modifier.
    pub(super) fn read(&self, op: &Operand, lanes: &[u8], ty: NumType) -> Result<String> {
        let swizzle = op.swizzle();
        let comps = lanes
            .iter()
            .map(|&lane| self.component(op, swizzle.lane(lane)))
            .collect::<Result<Vec<_>>>()?;
        Ok(apply_modifier(combine(&comps, ty), op.modifier, ty))
    }

    pub(super) fn read_mask(&self, op: &Operand, mask: WriteMask, ty: NumType) -> Result<String> {
        let lanes: Vec<u8> = mask.components().collect();
        self.read(op, &lanes, ty)
    }

    /// The first `n` lanes of `op`.
    pub(super) fn read_n(&self, op: &Operand, n: u8, ty: NumType) -> Result<String> {
        let lanes: Vec<u8> = (0..n).collect();
        self.read(op, &lanes, ty)
    }

    pub(super) fn read_lane(&self, op: &Operand, lane: u8, ty: NumType) -> Result<String> {
        self.read(op, &[lane], ty)
    }

    /// Type a plain move should read `op` in to avoid cast round trips.
    pub(super) fn preferred_type(&self, op: &Operand, mask: WriteMask) -> NumType {
        if op.modifier != OperandModifier::None {
            return NumType::Float;
        }
        if let (OperandType::Immediate32, Some(Immediate::Bits32(values))) = (op.ty, op.imm) {
            let swizzle = op.swizzle();
            let used: Vec<u32> = mask
                .components()
                .map(|lane| values[usize::from(swizzle.lane(lane))])
                .collect();
            return immediate_type(&used);
        }
        let first = mask.components().next().unwrap_or(0);
        match self.component(op, op.swizzle().lane(first)) {
            Ok(Comp::Reg { native, .. }) => native,
            _ => NumType::Float,
        }
    }

    /// Left-hand side and storage type for writing `mask` of `dst`.
    fn dest(&self, dst: &Operand, mask: WriteMask) -> Result<(String, NumType)> {
        Ok(match dst.ty {
            OperandType::Temp => {
                let reg = dst.reg();
                let width = self.temp_width(reg);
                (format!("r{reg}{}", mask_suffix(mask, width)), NumType::Float)
            }
            OperandType::Output => (
                format!("o[{}]{}", self.index_at(dst, 0)?, mask_suffix(mask, 4)),
                NumType::Float,
            ),
            OperandType::IndexableTemp => {
                let reg = dst.reg();
                let width = self.indexable_components(reg)?;
                let index = self.index_at(dst, 1)?;
                (
                    format!("x{reg}[{index}]{}", mask_suffix(mask, width)),
                    NumType::Float,
                )
            }
            OperandType::OutputDepth
            | OperandType::OutputDepthGreaterEqual
            | OperandType::OutputDepthLessEqual => ("gl_FragDepth".to_owned(), NumType::Float),
            OperandType::OutputCoverageMask => ("gl_SampleMask[0]".to_owned(), NumType::Int),
            _ => return Err(self.unsupported()),
        })
    }

    /// Writes `value` (an `ty` expression with one component per mask bit).
    pub(super) fn store_masked(
        &mut self,
        dst: &Operand,
        mask: WriteMask,
        value: String,
        ty: NumType,
    ) -> Result<()> {
        if mask.is_empty() || dst.ty == OperandType::Null {
            return Ok(());
        }
        let (lhs, native) = self.dest(dst, mask)?;
        let value = bitcast(value, ty, native, usize::from(mask.count()));
        self.w.line(&format!("{lhs} = {value};"));
        Ok(())
    }

    pub(super) fn store(&mut self, dst: &Operand, value: String, ty: NumType) -> Result<()> {
        self.store_masked(dst, dst.mask(), value, ty)
    }

    /// Stores into destination `n` of `inst`, applying `_sat`.
    pub(super) fn store_result(
        &mut self,
        inst: &Instruction,
        n: usize,
        value: String,
        ty: NumType,
    ) -> Result<()> {
        let dst = self.dst(inst, n)?;
        let (value, ty) = if inst.saturate {
            let n = usize::from(dst.mask().count());
            let value = bitcast(value, ty, NumType::Float, n);
            (format!("clamp({value}, 0.0, 1.0)"), NumType::Float)
        } else {
            (value, ty)
        };
        self.store(dst, value, ty)
    }

    /// Stores into the first destination of `inst`.
    pub(super) fn assign(&mut self, inst: &Instruction, value: String, ty: NumType) -> Result<()> {
        self.store_result(inst, 0, value, ty)
    }
}
