use core::fmt;
use core::iter::FusedIterator;

use tracing::{debug, trace};

use crate::sm4_ir::{
    ComponentSelection, DecodedItem, Declaration, GlobalFlags, Immediate, Instruction,
    InterpolationMode, Operand, OperandIndex, OperandModifier, Primitive, PrimitiveTopology,
    ResourceDimension, ReturnType, SamplerMode, Swizzle, TessDomain, TessOutputPrimitive,
    TessPartitioning, WriteMask,
};

use super::limits::{self, *};
use super::opcode::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sm4DecodeError {
    pub at_dword: usize,
    pub kind: Sm4DecodeErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sm4DecodeErrorKind {
    MisalignedLength {
        len: usize,
    },
    UnexpectedEof {
        wanted: usize,
        remaining: usize,
    },
    InvalidDeclaredLength {
        declared: usize,
        available: usize,
    },
    InstructionOutOfBounds {
        start: usize,
        len: usize,
        available: usize,
    },
    UnsupportedOpcode {
        opcode: u32,
        len: usize,
    },
    InvalidOperand {
        reason: &'static str,
        value: u32,
    },
    /// A register index or declared count exceeds the hardware limit.
    OutOfRange {
        what: &'static str,
        value: u64,
        /// Exclusive bound.
        limit: u32,
    },
}

impl fmt::Display for Sm4DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SM4/5 decode error at dword {}: ", self.at_dword)?;
        match &self.kind {
            Sm4DecodeErrorKind::MisalignedLength { len } => {
                write!(f, "shader chunk length {len} is not a multiple of 4")
            }
            Sm4DecodeErrorKind::UnexpectedEof { wanted, remaining } => write!(
                f,
                "unexpected end of token stream (wanted {wanted} dwords, {remaining} remaining)"
            ),
            Sm4DecodeErrorKind::InvalidDeclaredLength {
                declared,
                available,
            } => write!(
                f,
                "declared program length {declared} is out of bounds (available {available})"
            ),
            Sm4DecodeErrorKind::InstructionOutOfBounds {
                start,
                len,
                available,
            } => write!(
                f,
                "instruction at {start} with length {len} overruns program (available {available})"
            ),
            Sm4DecodeErrorKind::UnsupportedOpcode { opcode, len } => {
                write!(f, "opcode {opcode:#x} has unsupported length {len}")
            }
            Sm4DecodeErrorKind::InvalidOperand { reason, value } => {
                write!(f, "invalid operand: {reason} ({value:#x})")
            }
            Sm4DecodeErrorKind::OutOfRange { what, value, limit } => {
                write!(f, "{what} {value} is out of range (limit {limit})")
            }
        }
    }
}

impl std::error::Error for Sm4DecodeError {}

/// Lazy decoder over a program's token stream.
///
/// Yields one item per declaration/instruction, skipping unknown opcodes and
/// non-ICB `customdata` blocks. After the first error the iterator is fused.
#[derive(Debug, Clone)]
pub struct InstructionIter<'a> {
    toks: &'a [u32],
    pos: usize,
    failed: bool,
}

impl<'a> InstructionIter<'a> {
    /// `toks` must start with the version and length tokens.
    pub fn new(toks: &'a [u32]) -> Self {
        Self {
            toks,
            pos: toks.len().min(2),
            failed: false,
        }
    }

    /// DWORD offset of the next token to decode.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_item(&mut self) -> Option<Result<DecodedItem, Sm4DecodeError>> {
        loop {
            let at = self.pos;
            let token = *self.toks.get(at)?;
            let opcode_id = token & OPCODE_MASK;
            let available = self.toks.len();

            let len = if opcode_id == Opcode::CustomData.to_u32() {
                let Some(&len) = self.toks.get(at + 1) else {
                    return Some(Err(Sm4DecodeError {
                        at_dword: at + 1,
                        kind: Sm4DecodeErrorKind::UnexpectedEof {
                            wanted: 1,
                            remaining: 0,
                        },
                    }));
                };
                let len = len as usize;
                if len < 2 {
                    return Some(Err(Sm4DecodeError {
                        at_dword: at,
                        kind: Sm4DecodeErrorKind::UnsupportedOpcode {
                            opcode: opcode_id,
                            len,
                        },
                    }));
                }
                len
            } else {
                let len = ((token >> OPCODE_LEN_SHIFT) & OPCODE_LEN_MASK) as usize;
                if len == 0 {
                    return Some(Err(Sm4DecodeError {
                        at_dword: at,
                        kind: Sm4DecodeErrorKind::UnsupportedOpcode {
                            opcode: opcode_id,
                            len,
                        },
                    }));
                }
                len
            };

            if len > available - at {
                return Some(Err(Sm4DecodeError {
                    at_dword: at,
                    kind: Sm4DecodeErrorKind::InstructionOutOfBounds {
                        start: at,
                        len,
                        available,
                    },
                }));
            }
            self.pos = at + len;
            let inst_toks = &self.toks[at..at + len];

            let Some(opcode) = Opcode::from_u32(opcode_id) else {
                debug!(opcode = opcode_id, at_dword = at, len, "skipping unknown SM4 opcode");
                continue;
            };

            if opcode == Opcode::CustomData {
                let class = token >> OPCODE_CONTROLS_SHIFT;
                if class == CUSTOMDATA_CLASS_ICB {
                    return Some(Ok(DecodedItem::Declaration(
                        Declaration::ImmediateConstantBuffer(decode_icb(&inst_toks[2..])),
                    )));
                }
                trace!(class, at_dword = at, len, "skipping customdata block");
                continue;
            }

            let r = InstrReader::new(inst_toks, at);
            let item = if opcode.is_declaration() {
                decode_decl(opcode, token, r).map(DecodedItem::Declaration)
            } else {
                decode_instruction(opcode, token, r).map(DecodedItem::Instruction)
            };
            return Some(item);
        }
    }
}

impl Iterator for InstructionIter<'_> {
    type Item = Result<DecodedItem, Sm4DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_item();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

impl FusedIterator for InstructionIter<'_> {}

fn decode_icb(payload: &[u32]) -> Vec<[u32; 4]> {
    payload
        .chunks(4)
        .map(|c| {
            let mut v = [0u32; 4];
            v[..c.len()].copy_from_slice(c);
            v
        })
        .collect()
}

fn decode_instruction(
    opcode: Opcode,
    token: u32,
    mut r: InstrReader<'_>,
) -> Result<Instruction, Sm4DecodeError> {
    r.read_u32()?;
    let mut inst = Instruction::new(opcode, r.base_at);
    inst.controls = (token >> OPCODE_CONTROLS_SHIFT) & OPCODE_CONTROLS_MASK;
    inst.saturate = opcode.allows_saturate() && (token & OPCODE_SATURATE_BIT) != 0;
    inst.test_nonzero = opcode.has_test() && (token & OPCODE_TEST_NONZERO_BIT) != 0;
    inst.precise_mask = ((token >> OPCODE_PRECISE_SHIFT) & 0xf) as u8;

    let mut extended = (token & OPCODE_EXTENDED_BIT) != 0;
    while extended {
        let ext = r.read_u32()?;
        extended = (ext & OPCODE_EXTENDED_BIT) != 0;
        match ext & 0x3f {
            EXTENDED_OPCODE_SAMPLE_CONTROLS => {
                inst.sample_offsets = [
                    sign_extend4(ext >> 9),
                    sign_extend4(ext >> 13),
                    sign_extend4(ext >> 17),
                ];
            }
            EXTENDED_OPCODE_RESOURCE_DIM => {
                inst.resource_dim = Some(ResourceDimension::from_u32((ext >> 6) & 0x1f));
            }
            EXTENDED_OPCODE_RESOURCE_RETURN_TYPE => {
                inst.resource_return = Some(ReturnType::unpack(ext >> 6));
            }
            other => trace!(ty = other, "ignoring extended opcode token"),
        }
    }

    if opcode == Opcode::InterfaceCall {
        // Function-table index precedes the interface operand.
        r.read_u32()?;
    }

    while !r.is_eof() {
        inst.operands.push(decode_operand(&mut r)?);
    }
    Ok(inst)
}

fn decode_decl(
    opcode: Opcode,
    token: u32,
    mut r: InstrReader<'_>,
) -> Result<Declaration, Sm4DecodeError> {
    r.read_u32()?;
    let mut extended = (token & OPCODE_EXTENDED_BIT) != 0;
    while extended {
        extended = (r.read_u32()? & OPCODE_EXTENDED_BIT) != 0;
    }
    let controls = (token >> OPCODE_CONTROLS_SHIFT) & OPCODE_CONTROLS_MASK;
    let globally_coherent = (controls & (1 << 5)) != 0;

    let decl = match opcode {
        Opcode::DclGlobalFlags => {
            Declaration::GlobalFlags(GlobalFlags::from_bits_truncate(controls))
        }
        Opcode::DclResource => {
            let op = decode_operand(&mut r)?;
            let return_type = ReturnType::unpack(r.read_u32()?);
            Declaration::Resource {
                slot: op.reg(),
                dimension: ResourceDimension::from_u32(controls & 0x1f),
                sample_count: (controls >> 5) & 0x7f,
                return_type,
            }
        }
        Opcode::DclConstantBuffer => {
            let op = decode_operand(&mut r)?;
            Declaration::ConstantBuffer {
                slot: op.reg(),
                size_vec4: op.index(1).unwrap_or(0),
                dynamic_indexed: (controls & 1) != 0,
            }
        }
        Opcode::DclSampler => {
            let op = decode_operand(&mut r)?;
            Declaration::Sampler {
                slot: op.reg(),
                mode: SamplerMode::from_u32(controls & 0xf),
            }
        }
        Opcode::DclIndexRange => {
            let operand = decode_operand(&mut r)?;
            let at = r.at();
            let count = r.read_u32()?;
            if let (Some(first), Some(limit)) = (
                operand.indices.last().map(OperandIndex::imm),
                limits::register_count(operand.ty),
            ) {
                let end = u64::from(first) + u64::from(count);
                r.bounded(at, "index range end", end, limit + 1)?;
            }
            Declaration::IndexRange { operand, count }
        }
        Opcode::DclGsOutputPrimitiveTopology => {
            Declaration::GsOutputTopology(PrimitiveTopology::from_u32(controls & 0x3f))
        }
        Opcode::DclGsInputPrimitive => {
            Declaration::GsInputPrimitive(Primitive::from_u32(controls & 0x3f))
        }
        Opcode::DclMaxOutputVertexCount => Declaration::GsMaxOutputVertexCount(r.read_count(
            "geometry shader output vertex count",
            MAX_GS_OUTPUT_VERTICES,
        )?),
        Opcode::DclGsInstanceCount => Declaration::GsInstanceCount(
            r.read_count("geometry shader instance count", MAX_GS_INSTANCES)?,
        ),
        Opcode::DclStream => Declaration::Stream(decode_operand(&mut r)?.reg()),
        Opcode::DclInput
        | Opcode::DclInputSgv
        | Opcode::DclInputSiv
        | Opcode::DclInputPs
        | Opcode::DclInputPsSgv
        | Opcode::DclInputPsSiv => {
            let operand = decode_operand(&mut r)?;
            let system_value = match opcode {
                Opcode::DclInputSgv
                | Opcode::DclInputSiv
                | Opcode::DclInputPsSgv
                | Opcode::DclInputPsSiv => Some(r.read_u32()? & 0xffff),
                _ => None,
            };
            let interpolation = match opcode {
                Opcode::DclInputPs | Opcode::DclInputPsSgv | Opcode::DclInputPsSiv => {
                    Some(InterpolationMode::from_u32(controls & 0xf))
                }
                _ => None,
            };
            Declaration::Input {
                operand,
                system_value,
                interpolation,
            }
        }
        Opcode::DclOutput | Opcode::DclOutputSgv | Opcode::DclOutputSiv => {
            let operand = decode_operand(&mut r)?;
            let system_value = if opcode == Opcode::DclOutput {
                None
            } else {
                Some(r.read_u32()? & 0xffff)
            };
            Declaration::Output {
                operand,
                system_value,
            }
        }
        Opcode::DclTemps => Declaration::Temps(r.read_count("temp count", MAX_TEMP_REGISTERS)?),
        Opcode::DclIndexableTemp => Declaration::IndexableTemp {
            reg: r.read_count("indexable temp register", MAX_TEMP_REGISTERS - 1)?,
            size: r.read_count("indexable temp size", MAX_TEMP_REGISTERS)?,
            components: r.read_count("indexable temp components", 4)?,
        },
        Opcode::DclInputControlPointCount => Declaration::InputControlPointCount(controls & 0x3f),
        Opcode::DclOutputControlPointCount => {
            Declaration::OutputControlPointCount(controls & 0x3f)
        }
        Opcode::DclTessDomain => Declaration::TessDomain(TessDomain::from_u32(controls & 0x3)),
        Opcode::DclTessPartitioning => {
            Declaration::TessPartitioning(TessPartitioning::from_u32(controls & 0x7))
        }
        Opcode::DclTessOutputPrimitive => {
            Declaration::TessOutputPrimitive(TessOutputPrimitive::from_u32(controls & 0x7))
        }
        Opcode::DclHsMaxTessFactor => Declaration::HsMaxTessFactor(f32::from_bits(r.read_u32()?)),
        Opcode::DclHsForkPhaseInstanceCount => Declaration::HsForkPhaseInstanceCount(
            r.read_count("fork phase instance count", MAX_PHASE_INSTANCES)?,
        ),
        Opcode::DclHsJoinPhaseInstanceCount => Declaration::HsJoinPhaseInstanceCount(
            r.read_count("join phase instance count", MAX_PHASE_INSTANCES)?,
        ),
        Opcode::DclThreadGroup => {
            let at = r.at();
            let size = [
                r.read_count("thread group width", MAX_THREADS_PER_GROUP)?,
                r.read_count("thread group height", MAX_THREADS_PER_GROUP)?,
                r.read_count("thread group depth", MAX_THREAD_GROUP_Z)?,
            ];
            let threads = size.iter().map(|&n| u64::from(n)).product();
            r.bounded(at, "threads per group", threads, MAX_THREADS_PER_GROUP + 1)?;
            Declaration::ThreadGroup(size)
        }
        Opcode::DclUavTyped => {
            let op = decode_operand(&mut r)?;
            let return_type = ReturnType::unpack(r.read_u32()?);
            Declaration::UavTyped {
                slot: op.reg(),
                dimension: ResourceDimension::from_u32(controls & 0x1f),
                return_type,
                globally_coherent,
            }
        }
        Opcode::DclUavRaw => Declaration::UavRaw {
            slot: decode_operand(&mut r)?.reg(),
            globally_coherent,
        },
        Opcode::DclUavStructured => Declaration::UavStructured {
            slot: decode_operand(&mut r)?.reg(),
            stride: r.read_u32()?,
            globally_coherent,
        },
        Opcode::DclTgsmRaw => Declaration::TgsmRaw {
            slot: decode_operand(&mut r)?.reg(),
            byte_count: r.read_count("shared memory size", MAX_SHARED_MEMORY_BYTES)?,
        },
        Opcode::DclTgsmStructured => {
            let slot = decode_operand(&mut r)?.reg();
            let at = r.at();
            let stride = r.read_count("shared memory stride", MAX_SHARED_MEMORY_BYTES)?;
            let count = r.read_count("shared memory element count", MAX_SHARED_MEMORY_BYTES)?;
            let bytes = u64::from(stride) * u64::from(count);
            r.bounded(at, "shared memory size", bytes, MAX_SHARED_MEMORY_BYTES + 1)?;
            Declaration::TgsmStructured {
                slot,
                stride,
                count,
            }
        }
        Opcode::DclResourceRaw => Declaration::ResourceRaw {
            slot: decode_operand(&mut r)?.reg(),
        },
        Opcode::DclResourceStructured => Declaration::ResourceStructured {
            slot: decode_operand(&mut r)?.reg(),
            stride: r.read_u32()?,
        },
        Opcode::DclFunctionBody => Declaration::FunctionBody(r.read_u32()?),
        Opcode::DclFunctionTable => {
            let index = r.read_u32()?;
            let count = r.read_u32()?;
            let mut bodies = Vec::new();
            for _ in 0..count {
                bodies.push(r.read_u32()?);
            }
            Declaration::FunctionTable { index, bodies }
        }
        Opcode::DclInterface => {
            let index = r.read_u32()?;
            let _expected_table_len = r.read_u32()?;
            let lens = r.read_u32()?;
            let table_count = lens & 0xffff;
            for _ in 0..table_count {
                r.read_u32()?;
            }
            Declaration::Interface {
                index,
                table_count,
                array_len: lens >> 16,
            }
        }
        other => {
            return Err(Sm4DecodeError {
                at_dword: r.base_at,
                kind: Sm4DecodeErrorKind::UnsupportedOpcode {
                    opcode: other.to_u32(),
                    len: r.toks.len(),
                },
            })
        }
    };

    r.expect_eof()?;
    Ok(decl)
}

fn sign_extend4(v: u32) -> i8 {
    (((v & 0xf) as i8) << 4) >> 4
}

fn decode_swizzle(sel: u32) -> Swizzle {
    let x = (sel & 0x3) as u8;
    let y = ((sel >> 2) & 0x3) as u8;
    let z = ((sel >> 4) & 0x3) as u8;
    let w = ((sel >> 6) & 0x3) as u8;
    Swizzle([x, y, z, w])
}

fn decode_operand(r: &mut InstrReader<'_>) -> Result<Operand, Sm4DecodeError> {
    let at = r.at();
    let token = r.read_u32()?;

    let ty_raw = (token >> OPERAND_TYPE_SHIFT) & OPERAND_TYPE_MASK;
    let ty = OperandType::from_u32(ty_raw)
        .ok_or_else(|| r.invalid(at, "unknown operand type", ty_raw))?;
    let mut op = Operand::new(ty);

    op.num_components = match token & OPERAND_NUM_COMPONENTS_MASK {
        0 => 0,
        1 => 1,
        2 => 4,
        other => return Err(r.invalid(at, "unsupported component count", other)),
    };

    let sel = token >> OPERAND_COMPONENT_SELECTION_SHIFT;
    op.selection = match op.num_components {
        4 => match (token >> OPERAND_SELECTION_MODE_SHIFT) & OPERAND_SELECTION_MODE_MASK {
            OPERAND_SEL_MASK => ComponentSelection::Mask(WriteMask((sel & 0xf) as u8)),
            OPERAND_SEL_SWIZZLE => ComponentSelection::Swizzle(decode_swizzle(sel & 0xff)),
            OPERAND_SEL_SELECT1 => ComponentSelection::Select1((sel & 0x3) as u8),
            other => return Err(r.invalid(at, "unknown selection mode", other)),
        },
        1 => ComponentSelection::Select1(0),
        _ => ComponentSelection::Mask(WriteMask(0)),
    };

    let mut extended = (token & OPERAND_EXTENDED_BIT) != 0;
    while extended {
        let ext_at = r.at();
        let ext = r.read_u32()?;
        extended = (ext & OPERAND_EXTENDED_BIT) != 0;
        let ext_ty = ext & 0x3f;
        if ext_ty != EXTENDED_OPERAND_MODIFIER {
            trace!(ty = ext_ty, "ignoring extended operand token");
            continue;
        }
        op.modifier = match (ext >> 6) & 0xff {
            0 => OperandModifier::None,
            1 => OperandModifier::Neg,
            2 => OperandModifier::Abs,
            3 => OperandModifier::AbsNeg,
            other => return Err(r.invalid(ext_at, "unknown operand modifier", other)),
        };
    }

    let dim = (token >> OPERAND_INDEX_DIMENSION_SHIFT) & OPERAND_INDEX_DIMENSION_MASK;
    for shift in OPERAND_INDEX_REP_SHIFTS.iter().take(dim as usize) {
        let rep = (token >> shift) & OPERAND_INDEX_REP_MASK;
        let index = match rep {
            OPERAND_INDEX_REP_IMMEDIATE32 => OperandIndex::Imm32(r.read_u32()?),
            OPERAND_INDEX_REP_IMMEDIATE64 => OperandIndex::Imm64(r.read_u64()?),
            OPERAND_INDEX_REP_RELATIVE => OperandIndex::Relative(Box::new(decode_operand(r)?)),
            OPERAND_INDEX_REP_IMMEDIATE32_PLUS_RELATIVE => {
                let disp = r.read_u32()?;
                OperandIndex::Imm32PlusRelative(disp, Box::new(decode_operand(r)?))
            }
            OPERAND_INDEX_REP_IMMEDIATE64_PLUS_RELATIVE => {
                let disp = r.read_u64()?;
                OperandIndex::Imm64PlusRelative(disp, Box::new(decode_operand(r)?))
            }
            other => return Err(r.invalid(at, "unknown index representation", other)),
        };
        op.indices.push(index);
    }
    for (index, &limit) in op.indices.iter().zip(limits::index_bounds(ty)) {
        let value = match *index {
            OperandIndex::Imm32(v) | OperandIndex::Imm32PlusRelative(v, _) => u64::from(v),
            OperandIndex::Imm64(v) | OperandIndex::Imm64PlusRelative(v, _) => v,
            OperandIndex::Relative(_) => 0,
        };
        r.bounded(at, "register index", value, limit)?;
    }

    match ty {
        OperandType::Immediate32 => {
            let imm = match op.num_components {
                1 => [r.read_u32()?; 4],
                4 => [r.read_u32()?, r.read_u32()?, r.read_u32()?, r.read_u32()?],
                _ => return Err(r.invalid(at, "immediate without components", 0)),
            };
            op.imm = Some(Immediate::Bits32(imm));
        }
        OperandType::Immediate64 => {
            let imm = match op.num_components {
                1 => [r.read_u64()?; 4],
                4 => [r.read_u64()?, r.read_u64()?, r.read_u64()?, r.read_u64()?],
                _ => return Err(r.invalid(at, "immediate without components", 0)),
            };
            op.imm = Some(Immediate::Bits64(imm));
        }
        _ => {}
    }

    Ok(op)
}

// ---- Token reader ----

struct InstrReader<'a> {
    toks: &'a [u32],
    pos: usize,
    base_at: usize,
}

impl<'a> InstrReader<'a> {
    fn new(toks: &'a [u32], base_at: usize) -> Self {
        Self {
            toks,
            pos: 0,
            base_at,
        }
    }

    fn at(&self) -> usize {
        self.base_at + self.pos
    }

    fn read_u32(&mut self) -> Result<u32, Sm4DecodeError> {
        let v = self
            .toks
            .get(self.pos)
            .copied()
            .ok_or_else(|| Sm4DecodeError {
                at_dword: self.base_at + self.pos,
                kind: Sm4DecodeErrorKind::UnexpectedEof {
                    wanted: 1,
                    remaining: 0,
                },
            })?;
        self.pos += 1;
        Ok(v)
    }

    /// 64-bit value stored low dword first.
    fn read_u64(&mut self) -> Result<u64, Sm4DecodeError> {
        let lo = self.read_u32()?;
        let hi = self.read_u32()?;
        Ok(u64::from(lo) | (u64::from(hi) << 32))
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn expect_eof(&self) -> Result<(), Sm4DecodeError> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.invalid(
                self.at(),
                "trailing tokens after declaration",
                self.toks[self.pos],
            ))
        }
    }

    /// Reads a count that may not exceed `max`.
    fn read_count(&mut self, what: &'static str, max: u32) -> Result<u32, Sm4DecodeError> {
        let at = self.at();
        let value = self.read_u32()?;
        self.bounded(at, what, u64::from(value), max + 1)?;
        Ok(value)
    }

    /// Fails unless `value < limit`.
    fn bounded(
        &self,
        at_dword: usize,
        what: &'static str,
        value: u64,
        limit: u32,
    ) -> Result<(), Sm4DecodeError> {
        if value < u64::from(limit) {
            return Ok(());
        }
        Err(Sm4DecodeError {
            at_dword,
            kind: Sm4DecodeErrorKind::OutOfRange { what, value, limit },
        })
    }

    fn invalid(&self, at_dword: usize, reason: &'static str, value: u32) -> Sm4DecodeError {
        Sm4DecodeError {
            at_dword,
            kind: Sm4DecodeErrorKind::InvalidOperand { reason, value },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm4::Sm4Program;

    fn opcode_token(opcode: u32, len_dwords: u32) -> u32 {
        opcode | (len_dwords << OPCODE_LEN_SHIFT)
    }

    /// 4-component operand token with a write mask and a 1D immediate index.
    fn mask_operand(ty: OperandType, mask: u32) -> u32 {
        2 | (OPERAND_SEL_MASK << 2) | (mask << 4) | (ty.to_u32() << 12) | (1 << 20)
    }

    fn swizzle_operand(ty: OperandType, swizzle: u32, dim: u32) -> u32 {
        2 | (OPERAND_SEL_SWIZZLE << 2) | (swizzle << 4) | (ty.to_u32() << 12) | (dim << 20)
    }

    const XYZW: u32 = 0b11_10_01_00;

    fn decode(body: &[u32]) -> Vec<Result<DecodedItem, Sm4DecodeError>> {
        let mut tokens = vec![0x50u32, 0];
        tokens.extend_from_slice(body);
        tokens[1] = tokens.len() as u32;
        InstructionIter::new(&tokens).collect()
    }

    fn instructions(body: &[u32]) -> Vec<Instruction> {
        decode(body)
            .into_iter()
            .map(|item| match item.expect("decode should succeed") {
                DecodedItem::Instruction(inst) => inst,
                DecodedItem::Declaration(decl) => panic!("unexpected declaration {decl:?}"),
            })
            .collect()
    }

    #[test]
    fn mov_immediate_and_ret() {
        let insts = instructions(&[
            opcode_token(Opcode::Mov.to_u32(), 8),
            mask_operand(OperandType::Temp, 0xf),
            0,
            2 | (OperandType::Immediate32.to_u32() << 12),
            0x3f80_0000,
            0x4000_0000,
            0x4040_0000,
            0x4080_0000,
            opcode_token(Opcode::Ret.to_u32(), 1),
        ]);
        assert_eq!(insts.len(), 2);
        let mov = &insts[0];
        assert_eq!(mov.opcode, Opcode::Mov);
        assert_eq!(mov.at_dword, 2);
        assert_eq!(mov.operands[0].ty, OperandType::Temp);
        assert_eq!(mov.operands[0].mask(), WriteMask::XYZW);
        assert_eq!(
            mov.operands[1].imm,
            Some(Immediate::Bits32([0x3f80_0000, 0x4000_0000, 0x4040_0000, 0x4080_0000]))
        );
        assert_eq!(insts[1].opcode, Opcode::Ret);
        assert_eq!(insts[1].at_dword, 10);
    }

    #[test]
    fn scalar_immediate_is_replicated() {
        let insts = instructions(&[
            opcode_token(Opcode::Mov.to_u32(), 5),
            mask_operand(OperandType::Temp, 0x1),
            3,
            1 | (OperandType::Immediate32.to_u32() << 12),
            7,
        ]);
        let src = &insts[0].operands[1];
        assert_eq!(src.imm, Some(Immediate::Bits32([7; 4])));
        assert_eq!(src.swizzle(), Swizzle::XXXX);
        assert_eq!(insts[0].operands[0].reg(), 3);
    }

    #[test]
    fn saturate_and_modifiers() {
        // mov_sat r0.xy, -|v1.yxzw|
        let insts = instructions(&[
            opcode_token(Opcode::Mov.to_u32(), 6) | OPCODE_SATURATE_BIT,
            mask_operand(OperandType::Temp, 0x3),
            0,
            swizzle_operand(OperandType::Input, 0b11_10_00_01, 1) | OPERAND_EXTENDED_BIT,
            EXTENDED_OPERAND_MODIFIER | (3 << 6),
            1,
        ]);
        let mov = &insts[0];
        assert!(mov.saturate);
        let src = &mov.operands[1];
        assert_eq!(src.modifier, OperandModifier::AbsNeg);
        assert_eq!(src.swizzle(), Swizzle([1, 0, 2, 3]));
        assert_eq!(src.reg(), 1);
    }

    #[test]
    fn relative_constant_buffer_index() {
        // mov r0.xyzw, cb0[r1.x + 2].xyzw
        let cb_token = swizzle_operand(OperandType::ConstantBuffer, XYZW, 2)
            | (OPERAND_INDEX_REP_IMMEDIATE32_PLUS_RELATIVE << 25);
        let rel_token =
            2 | (OPERAND_SEL_SELECT1 << 2) | (OperandType::Temp.to_u32() << 12) | (1 << 20);
        let insts = instructions(&[
            opcode_token(Opcode::Mov.to_u32(), 8),
            mask_operand(OperandType::Temp, 0xf),
            0,
            cb_token,
            0,
            2,
            rel_token,
            1,
        ]);
        let src = &insts[0].operands[1];
        assert_eq!(src.indices.len(), 2);
        assert_eq!(src.indices[0], OperandIndex::Imm32(0));
        assert_eq!(src.index(1), Some(2));
        let rel = src.indices[1].relative().expect("relative index");
        assert_eq!(rel.ty, OperandType::Temp);
        assert_eq!(rel.reg(), 1);
        assert_eq!(rel.selection, ComponentSelection::Select1(0));
        assert!(src.has_relative_index());
    }

    #[test]
    fn sample_offsets_from_extended_opcode() {
        // sample_aoffimmi(-1, 2, 0) r0, v0, t0, s0
        let ext = EXTENDED_OPCODE_SAMPLE_CONTROLS | (0xf << 9) | (2 << 13);
        let insts = instructions(&[
            opcode_token(Opcode::Sample.to_u32(), 10) | OPCODE_EXTENDED_BIT,
            ext,
            mask_operand(OperandType::Temp, 0xf),
            0,
            swizzle_operand(OperandType::Input, XYZW, 1),
            0,
            swizzle_operand(OperandType::Resource, XYZW, 1),
            0,
            (OperandType::Sampler.to_u32() << 12) | (1 << 20),
            0,
        ]);
        assert_eq!(insts[0].sample_offsets, [-1, 2, 0]);
        assert!(insts[0].has_offsets());
        assert_eq!(insts[0].operands.len(), 4);
        assert_eq!(insts[0].operands[3].ty, OperandType::Sampler);
        assert_eq!(insts[0].operands[3].num_components, 0);
    }

    #[test]
    fn declarations_are_typed() {
        let items = decode(&[
            // dcl_input_ps linear centroid v1.xy
            opcode_token(Opcode::DclInputPs.to_u32(), 3) | (3 << 11),
            mask_operand(OperandType::Input, 0x3),
            1,
            // dcl_input_siv v0.xyzw, position
            opcode_token(Opcode::DclInputSiv.to_u32(), 4),
            mask_operand(OperandType::Input, 0xf),
            0,
            1,
            // dcl_constantbuffer cb2[4], dynamicIndexed
            opcode_token(Opcode::DclConstantBuffer.to_u32(), 4) | (1 << 11),
            swizzle_operand(OperandType::ConstantBuffer, XYZW, 2),
            2,
            4,
            // dcl_resource_texture2d (float,float,float,float) t3
            opcode_token(Opcode::DclResource.to_u32(), 4) | (3 << 11),
            (OperandType::Resource.to_u32() << 12) | (1 << 20),
            3,
            0x5555,
            // dcl_thread_group 8, 4, 1
            opcode_token(Opcode::DclThreadGroup.to_u32(), 4),
            8,
            4,
            1,
        ]);
        let decls: Vec<_> = items
            .into_iter()
            .map(|i| match i.unwrap() {
                DecodedItem::Declaration(d) => d,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(matches!(
            &decls[0],
            Declaration::Input {
                system_value: None,
                interpolation: Some(InterpolationMode::LinearCentroid),
                operand,
            } if operand.reg() == 1 && operand.mask() == WriteMask::XY
        ));
        assert!(matches!(
            &decls[1],
            Declaration::Input {
                system_value: Some(1),
                interpolation: None,
                ..
            }
        ));
        assert_eq!(
            decls[2],
            Declaration::ConstantBuffer {
                slot: 2,
                size_vec4: 4,
                dynamic_indexed: true
            }
        );
        assert_eq!(
            decls[3],
            Declaration::Resource {
                slot: 3,
                dimension: ResourceDimension::Texture2D,
                sample_count: 0,
                return_type: [ReturnType::Float; 4],
            }
        );
        assert_eq!(decls[4], Declaration::ThreadGroup([8, 4, 1]));
    }

    #[test]
    fn unknown_opcode_is_skipped_by_length() {
        let insts = instructions(&[
            opcode_token(0x6b, 3),
            0xdead_beef,
            0xdead_beef,
            opcode_token(Opcode::Ret.to_u32(), 1),
        ]);
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].opcode, Opcode::Ret);
        assert_eq!(insts[0].at_dword, 5);
    }

    #[test]
    fn customdata_blocks() {
        let items = decode(&[
            // comment block (class 0)
            opcode_token(Opcode::CustomData.to_u32(), 0),
            4,
            0x1234_5678,
            0x9abc_def0,
            // immediate constant buffer (class 3) with two vec4s
            Opcode::CustomData.to_u32() | (CUSTOMDATA_CLASS_ICB << 11),
            10,
            1,
            2,
            3,
            4,
            5,
            6,
            7,
            8,
            opcode_token(Opcode::Ret.to_u32(), 1),
        ]);
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            Ok(DecodedItem::Declaration(Declaration::ImmediateConstantBuffer(
                vec![[1, 2, 3, 4], [5, 6, 7, 8]]
            )))
        );
        assert!(matches!(&items[1], Ok(DecodedItem::Instruction(i)) if i.opcode == Opcode::Ret));
    }

    #[test]
    fn customdata_length_below_two_errors() {
        let items = decode(&[Opcode::CustomData.to_u32(), 1]);
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(Sm4DecodeError {
                at_dword: 2,
                kind: Sm4DecodeErrorKind::UnsupportedOpcode { len: 1, .. }
            })
        ));
    }

    #[test]
    fn zero_length_instruction_errors_and_fuses() {
        let mut tokens = vec![
            0x50u32,
            0,
            opcode_token(Opcode::Ret.to_u32(), 0),
            opcode_token(Opcode::Ret.to_u32(), 1),
        ];
        tokens[1] = tokens.len() as u32;
        let mut iter = InstructionIter::new(&tokens);
        let err = iter.next().unwrap().unwrap_err();
        assert_eq!(
            err.kind,
            Sm4DecodeErrorKind::UnsupportedOpcode {
                opcode: Opcode::Ret.to_u32(),
                len: 0
            }
        );
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn instruction_past_declared_end_errors() {
        let items = decode(&[opcode_token(Opcode::Mov.to_u32(), 5), 0]);
        assert!(matches!(
            items[0],
            Err(Sm4DecodeError {
                kind: Sm4DecodeErrorKind::InstructionOutOfBounds { start: 2, len: 5, .. },
                ..
            })
        ));
    }

    fn out_of_range(item: &Result<DecodedItem, Sm4DecodeError>) -> (&'static str, u64, u32) {
        match item {
            Err(Sm4DecodeError {
                kind: Sm4DecodeErrorKind::OutOfRange { what, value, limit },
                ..
            }) => (*what, *value, *limit),
            other => panic!("expected an out-of-range error, got {other:?}"),
        }
    }

    #[test]
    fn stream_index_is_bounded() {
        let stream = (OperandType::Stream.to_u32() << 12) | (1 << 20);
        let items = decode(&[opcode_token(Opcode::DclStream.to_u32(), 3), stream, 3]);
        assert_eq!(items[0], Ok(DecodedItem::Declaration(Declaration::Stream(3))));

        let items = decode(&[opcode_token(Opcode::DclStream.to_u32(), 3), stream, 0xf000_0000]);
        assert_eq!(out_of_range(&items[0]), ("register index", 0xf000_0000, MAX_STREAMS));
    }

    #[test]
    fn phase_instance_counts_are_bounded() {
        let items = decode(&[
            opcode_token(Opcode::DclHsForkPhaseInstanceCount.to_u32(), 2),
            32,
            opcode_token(Opcode::DclHsJoinPhaseInstanceCount.to_u32(), 2),
            33,
        ]);
        assert_eq!(
            items[0],
            Ok(DecodedItem::Declaration(Declaration::HsForkPhaseInstanceCount(32)))
        );
        assert_eq!(out_of_range(&items[1]), ("join phase instance count", 33, 33));

        let items = decode(&[
            opcode_token(Opcode::DclHsForkPhaseInstanceCount.to_u32(), 2),
            0xffff_ffff,
        ]);
        assert_eq!(
            out_of_range(&items[0]),
            ("fork phase instance count", 0xffff_ffff, MAX_PHASE_INSTANCES + 1)
        );
    }

    #[test]
    fn index_range_must_fit_register_file() {
        // dcl_indexrange o30.xyzw, 2 covers o30..o31.
        let items = decode(&[
            opcode_token(Opcode::DclIndexRange.to_u32(), 4),
            mask_operand(OperandType::Output, 0xf),
            30,
            2,
        ]);
        assert!(matches!(
            &items[0],
            Ok(DecodedItem::Declaration(Declaration::IndexRange { count: 2, .. }))
        ));

        let items = decode(&[
            opcode_token(Opcode::DclIndexRange.to_u32(), 4),
            mask_operand(OperandType::Output, 0xf),
            30,
            0xffff_fff0,
        ]);
        assert_eq!(
            out_of_range(&items[0]),
            ("index range end", 30 + 0xffff_fff0, MAX_IO_REGISTERS + 1)
        );
    }

    #[test]
    fn huge_constant_buffer_register_is_rejected() {
        // mov r0.xyzw, cb0[0x10000000].xyzw
        let items = decode(&[
            opcode_token(Opcode::Mov.to_u32(), 6),
            mask_operand(OperandType::Temp, 0xf),
            0,
            swizzle_operand(OperandType::ConstantBuffer, XYZW, 2),
            0,
            0x1000_0000,
        ]);
        assert_eq!(
            out_of_range(&items[0]),
            ("register index", 0x1000_0000, MAX_CBUFFER_REGISTERS + 1)
        );
    }

    #[test]
    fn thread_group_size_is_bounded() {
        let items = decode(&[opcode_token(Opcode::DclThreadGroup.to_u32(), 4), 64, 32, 1]);
        assert_eq!(out_of_range(&items[0]), ("threads per group", 2048, 1025));
    }

    #[test]
    fn program_iterates_only_declared_tokens() {
        let mut bytes = Vec::new();
        for t in [0x50u32, 3, opcode_token(Opcode::Ret.to_u32(), 1), 0xffff_ffff] {
            bytes.extend_from_slice(&t.to_le_bytes());
        }
        let program = Sm4Program::parse(&bytes).unwrap();
        let items: Vec<_> = program.instructions().collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }
}
