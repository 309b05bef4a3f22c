//! Raw/structured buffers, group-shared memory, typed UAVs and atomics.
//!
//! Raw and structured resources and `g#` registers are all `uint` arrays
//! addressed in dwords.

use super::decls::{shared_stride, word_stride, ResourceKind};
use super::expr::{paren, swizzle_suffix, NumType};
use super::{Emitter, Result};
use crate::error::ShaderTranslateError;
use crate::glsl::version::{GlslRules, GlslVersion};
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4_ir::{Instruction, Operand, ResourceDimension};

/// A dword-addressed array and its structure stride in bytes.
#[derive(Debug, Clone)]
struct WordArray {
    name: String,
    stride: Option<u32>,
}

#[derive(Debug, Clone)]
struct Image {
    name: String,
    dim: ResourceDimension,
    ret: NumType,
}

/// `elements` of `base` as one `uint`/`uvecN` value.
fn gather_words(array: &str, base: &str, words: &[u8]) -> String {
    let parts: Vec<String> = words
        .iter()
        .map(|&w| match w {
            0 => format!("{array}[{base}]"),
            w => format!("{array}[{base} + {w}u]"),
        })
        .collect();
    if parts.len() == 1 {
        parts.join("")
    } else {
        format!("{}({})", NumType::Uint.vec(parts.len()), parts.join(", "))
    }
}

fn atomic_function(opcode: Opcode) -> Option<&'static str> {
    Some(match opcode {
        Opcode::AtomicIadd | Opcode::ImmAtomicIadd => "Add",
        Opcode::AtomicAnd | Opcode::ImmAtomicAnd => "And",
        Opcode::AtomicOr | Opcode::ImmAtomicOr => "Or",
        Opcode::AtomicXor | Opcode::ImmAtomicXor => "Xor",
        Opcode::AtomicImax | Opcode::AtomicUmax | Opcode::ImmAtomicImax | Opcode::ImmAtomicUmax => "Max",
        Opcode::AtomicImin | Opcode::AtomicUmin | Opcode::ImmAtomicImin | Opcode::ImmAtomicUmin => "Min",
        Opcode::ImmAtomicExch => "Exchange",
        Opcode::AtomicCmpStore | Opcode::ImmAtomicCmpExch => "CompSwap",
        _ => return None,
    })
}

/// Operand type an atomic's arithmetic is defined on, if it cares.
fn atomic_signedness(opcode: Opcode) -> Option<NumType> {
    match opcode {
        Opcode::AtomicImax | Opcode::AtomicImin | Opcode::ImmAtomicImax | Opcode::ImmAtomicImin => Some(NumType::Int),
        Opcode::AtomicUmax | Opcode::AtomicUmin | Opcode::ImmAtomicUmax | Opcode::ImmAtomicUmin => {
            Some(NumType::Uint)
        }
        _ => None,
    }
}

impl Emitter<'_> {
    fn word_array(&self, op: &Operand) -> Result<WordArray> {
        if op.has_relative_index() {
            return Err(self.unsupported());
        }
        let slot = op.reg();
        let (name, kind) = match op.ty {
            OperandType::ThreadGroupSharedMemory => {
                let stride = shared_stride(self.module, slot)
                    .ok_or(ShaderTranslateError::MissingResource { kind: "shared memory", slot })?;
                return Ok(WordArray { name: format!("g{slot}"), stride });
            }
            OperandType::Resource => {
                let plan = self
                    .resources
                    .textures
                    .get(&slot)
                    .ok_or(ShaderTranslateError::MissingResource { kind: "texture", slot })?;
                (plan.name.clone(), plan.kind)
            }
            OperandType::UnorderedAccessView => {
                let plan = self
                    .resources
                    .uavs
                    .get(&slot)
                    .ok_or(ShaderTranslateError::MissingResource { kind: "UAV", slot })?;
                (plan.name.clone(), plan.kind)
            }
            _ => return Err(self.unsupported()),
        };
        self.require(GlslRules::STORAGE, "storage buffers")?;
        match kind {
            ResourceKind::Raw => Ok(WordArray { name, stride: None }),
            ResourceKind::Structured { stride } => Ok(WordArray { name, stride: Some(stride) }),
            ResourceKind::Typed { .. } => Err(self.unsupported()),
        }
    }

    fn image(&self, op: &Operand) -> Result<Image> {
        if op.ty != OperandType::UnorderedAccessView || op.has_relative_index() {
            return Err(self.unsupported());
        }
        self.require(GlslRules::STORAGE, "images")?;
        let slot = op.reg();
        let plan = self
            .resources
            .uavs
            .get(&slot)
            .ok_or(ShaderTranslateError::MissingResource { kind: "UAV", slot })?;
        let ResourceKind::Typed { dim, ret } = plan.kind else {
            return Err(self.unsupported());
        };
        Ok(Image { name: plan.name.clone(), dim, ret })
    }

    /// Dword index of a byte offset, or of an `(index, byte offset)` pair.
    fn word_address(&self, array: &WordArray, index: (&Operand, u8), offset: Option<(&Operand, u8)>) -> Result<String> {
        let first = paren(self.read_lane(index.0, index.1, NumType::Uint)?);
        Ok(match (array.stride, offset) {
            (None, _) => format!("{first} >> 2u"),
            (Some(stride), Some((op, lane))) => {
                let offset = paren(self.read_lane(op, lane, NumType::Uint)?);
                format!("{first} * {}u + ({offset} >> 2u)", word_stride(stride))
            }
            (Some(_), None) => return Err(self.unsupported()),
        })
    }

    /// `ld_raw` and `ld_structured`.
    pub(super) fn ld_words(&mut self, inst: &Instruction) -> Result<()> {
        let structured = inst.opcode == Opcode::LdStructured;
        let resource = self.src(inst, if structured { 2 } else { 1 })?;
        let array = self.word_array(resource)?;
        let offset = if structured { Some((self.src(inst, 1)?, 0)) } else { None };
        let address = self.word_address(&array, (self.src(inst, 0)?, 0), offset)?;

        let swizzle = resource.swizzle();
        let words: Vec<u8> = self.dst(inst, 0)?.mask().components().map(|l| swizzle.lane(l)).collect();
        if words.is_empty() {
            return Ok(());
        }
        self.w.open("");
        self.w.line(&format!("uint _t0 = {address};"));
        self.assign(inst, gather_words(&array.name, "_t0", &words), NumType::Uint)?;
        self.w.close("");
        Ok(())
    }

    /// `store_raw` and `store_structured`.
    pub(super) fn store_words(&mut self, inst: &Instruction) -> Result<()> {
        let structured = inst.opcode == Opcode::StoreStructured;
        let target = self.dst(inst, 0)?;
        let array = self.word_array(target)?;
        let offset = if structured { Some((self.src(inst, 1)?, 0)) } else { None };
        let address = self.word_address(&array, (self.src(inst, 0)?, 0), offset)?;
        let value_op = self.src(inst, if structured { 2 } else { 1 })?;

        let mask = target.mask();
        let n = usize::from(mask.count());
        if n == 0 {
            return Ok(());
        }
        let value = self.read_mask(value_op, mask, NumType::Uint)?;
        self.w.open("");
        self.w.line(&format!("uint _t0 = {address};"));
        self.w.line(&format!("{} _t1 = {value};", NumType::Uint.vec(n)));
        for (k, c) in mask.components().enumerate() {
            let lane = if n == 1 { String::new() } else { swizzle_suffix([k as u8]) };
            let element = match c {
                0 => format!("{}[_t0]", array.name),
                c => format!("{}[_t0 + {c}u]", array.name),
            };
            self.w.line(&format!("{element} = _t1{lane};"));
        }
        self.w.close("");
        Ok(())
    }

    fn image_coord(&self, op: &Operand, dim: ResourceDimension) -> Result<String> {
        self.read_n(op, dim.coord_count().max(1), NumType::Int)
    }

    pub(super) fn ld_uav_typed(&mut self, inst: &Instruction) -> Result<()> {
        let target = self.src(inst, 1)?;
        let image = self.image(target)?;
        let coord = self.image_coord(self.src(inst, 0)?, image.dim)?;
        let swizzle = target.swizzle();
        let suffix = swizzle_suffix(self.dst(inst, 0)?.mask().components().map(|l| swizzle.lane(l)));
        self.assign(inst, format!("imageLoad({}, {coord}){suffix}", image.name), image.ret)
    }

    pub(super) fn store_uav_typed(&mut self, inst: &Instruction) -> Result<()> {
        let image = self.image(self.dst(inst, 0)?)?;
        let coord = self.image_coord(self.src(inst, 0)?, image.dim)?;
        let value = self.read_n(self.src(inst, 1)?, 4, image.ret)?;
        self.w.line(&format!("imageStore({}, {coord}, {value});", image.name));
        Ok(())
    }

    /// `atomic_*` and `imm_atomic_*` on buffers, shared memory and images.
    pub(super) fn atomic(&mut self, inst: &Instruction) -> Result<()> {
        let function = atomic_function(inst.opcode).ok_or_else(|| self.unsupported())?;
        let returns = inst.opcode.dst_count() == 2;
        let target = self.dst(inst, usize::from(returns))?;
        let address = self.src(inst, 0)?;
        let compare_swap = function == "CompSwap";

        let (call_target, ty) = if target.ty == OperandType::UnorderedAccessView
            && matches!(self.resources.uavs.get(&target.reg()).map(|u| u.kind), Some(ResourceKind::Typed { .. }))
        {
            let image = self.image(target)?;
            if self.config.version.is_es() && self.config.version < GlslVersion::Es320 {
                return Err(self.missing("image atomics"));
            }
            if image.ret == NumType::Float {
                return Err(self.unsupported());
            }
            if atomic_signedness(inst.opcode).is_some_and(|t| t != image.ret) {
                return Err(self.unsupported());
            }
            let coord = self.image_coord(address, image.dim)?;
            (format!("imageAtomic{function}({}, {coord}", image.name), image.ret)
        } else {
            let array = self.word_array(target)?;
            if atomic_signedness(inst.opcode) == Some(NumType::Int) {
                return Err(self.unsupported());
            }
            let word = self.word_address(&array, (address, 0), Some((address, 1)))?;
            (format!("atomic{function}({}[{word}]", array.name), NumType::Uint)
        };

        let value = self.read_lane(self.src(inst, 1)?, 0, ty)?;
        let args = if compare_swap {
            let data = self.read_lane(self.src(inst, 2)?, 0, ty)?;
            format!("{value}, {data}")
        } else {
            value
        };
        let call = format!("{call_target}, {args})");
        if returns {
            self.assign(inst, call, ty)
        } else {
            self.w.line(&format!("{call};"));
            Ok(())
        }
    }
}
