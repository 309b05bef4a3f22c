//! ALU, bit-manipulation, flow-control and synchronisation instructions.

use super::expr::{mask_suffix, paren, splat, NumType};
use super::{Emitter, Result};
use crate::glsl::version::GlslRules;
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4::ShaderStage;
use crate::sm4_ir::{Instruction, Operand, SyncFlags, WriteMask};

const TRUE_BITS: &str = "0xffffffffu";

/// `name` restricted to `mask` when it names a 4-component temporary.
fn lanes(name: &str, mask: WriteMask) -> String {
    format!("{name}{}", mask_suffix(mask, 4))
}

/// Component-wise `cond ? a : b` over `n` float components.
fn select(cond: &str, a: &str, b: &str, n: usize) -> String {
    if n <= 1 {
        format!("{} != 0u ? {a} : {b}", paren(cond.to_owned()))
    } else {
        format!("mix({b}, {a}, notEqual({cond}, {}))", splat("0u".to_owned(), NumType::Uint, n))
    }
}

fn vector_compare(op: &str) -> &'static str {
    match op {
        "==" => "equal",
        "!=" => "notEqual",
        "<" => "lessThan",
        _ => "greaterThanEqual",
    }
}

/// D3D boolean (`~0u`/`0u`) from a comparison of `n`-component values.
pub(super) fn compare_expr(a: &str, op: &str, b: &str, n: usize) -> String {
    if n <= 1 {
        format!("{} {op} {} ? {TRUE_BITS} : 0u", paren(a.to_owned()), paren(b.to_owned()))
    } else {
        format!("{}({}({a}, {b})) * {TRUE_BITS}", NumType::Uint.vec(n), vector_compare(op))
    }
}

impl Emitter<'_> {
    pub(super) fn emit_instruction(&mut self, inst: &Instruction) -> Result<()> {
        use NumType::{Float, Int, Uint};
        use Opcode::*;
        match inst.opcode {
            Add => self.binary(inst, "+", Float),
            Mul => self.binary(inst, "*", Float),
            Div => self.binary(inst, "/", Float),
            Mad => self.mad(inst, Float),
            Min => self.call2(inst, "min", Float),
            Max => self.call2(inst, "max", Float),
            Dp2 => self.dot(inst, 2),
            Dp3 => self.dot(inst, 3),
            Dp4 => self.dot(inst, 4),
            Exp => self.call1(inst, "exp2", Float),
            Log => self.call1(inst, "log2", Float),
            Sqrt => self.call1(inst, "sqrt", Float),
            Rsq => self.call1(inst, "inversesqrt", Float),
            Frc => self.call1(inst, "fract", Float),
            RoundNe => self.call1(inst, "roundEven", Float),
            RoundNi => self.call1(inst, "floor", Float),
            RoundPi => self.call1(inst, "ceil", Float),
            RoundZ => self.call1(inst, "trunc", Float),
            Rcp => {
                let (n, a) = self.unary_src(inst, Float)?;
                let one = splat("1.0".to_owned(), Float, n);
                self.assign(inst, format!("{one} / {}", paren(a)), Float)
            }
            Sincos => self.sincos(inst),

            Mov => self.mov(inst),
            Movc => self.movc(inst),
            Swapc => self.swapc(inst),

            Eq => self.compare(inst, "==", Float),
            Ne => self.compare(inst, "!=", Float),
            Lt => self.compare(inst, "<", Float),
            Ge => self.compare(inst, ">=", Float),
            Ieq => self.compare(inst, "==", Int),
            Ine => self.compare(inst, "!=", Int),
            Ilt => self.compare(inst, "<", Int),
            Ige => self.compare(inst, ">=", Int),
            Ult => self.compare(inst, "<", Uint),
            Uge => self.compare(inst, ">=", Uint),

            Iadd => self.binary(inst, "+", Int),
            Imad => self.mad(inst, Int),
            Umad => self.mad(inst, Uint),
            Imax => self.call2(inst, "max", Int),
            Imin => self.call2(inst, "min", Int),
            Umax => self.call2(inst, "max", Uint),
            Umin => self.call2(inst, "min", Uint),
            Ineg => {
                let (_, a) = self.unary_src(inst, Int)?;
                self.assign(inst, format!("-{}", paren(a)), Int)
            }
            Imul => self.mul_extended(inst, Int),
            Umul => self.mul_extended(inst, Uint),
            Udiv => self.udiv(inst),
            Uaddc => self.carry(inst, true),
            Usubb => self.carry(inst, false),

            And => self.binary(inst, "&", Uint),
            Or => self.binary(inst, "|", Uint),
            Xor => self.binary(inst, "^", Uint),
            Not => {
                let (_, a) = self.unary_src(inst, Uint)?;
                self.assign(inst, format!("~{}", paren(a)), Uint)
            }
            Ishl => self.shift(inst, "<<", Int),
            Ishr => self.shift(inst, ">>", Int),
            Ushr => self.shift(inst, ">>", Uint),

            Ftoi => self.convert(inst, Float, Int),
            Ftou => self.convert(inst, Float, Uint),
            Itof => self.convert(inst, Int, Float),
            Utof => self.convert(inst, Uint, Float),
            F32ToF16 => {
                self.require(GlslRules::PACK_HALF, "packHalf2x16")?;
                self.per_lane(inst, Uint, |e, src, lane| {
                    Ok(format!("packHalf2x16(vec2({}, 0.0))", e.read_lane(src, lane, Float)?))
                })
            }
            F16ToF32 => {
                self.require(GlslRules::PACK_HALF, "unpackHalf2x16")?;
                self.per_lane(inst, Float, |e, src, lane| {
                    Ok(format!("unpackHalf2x16({}).x", e.read_lane(src, lane, Uint)?))
                })
            }

            Countbits => {
                self.require(GlslRules::BIT_OPS, "bitCount")?;
                self.call1(inst, "bitCount", Uint)
            }
            FirstbitLo => {
                self.require(GlslRules::BIT_OPS, "findLSB")?;
                self.call1(inst, "findLSB", Uint)
            }
            FirstbitHi | FirstbitShi => {
                self.require(GlslRules::BIT_OPS, "findMSB")?;
                let ty = if inst.opcode == FirstbitHi { Uint } else { Int };
                // Counted from the most significant bit; -1 when no bit is found.
                self.per_lane(inst, Int, |e, src, lane| {
                    let msb = format!("findMSB({})", e.read_lane(src, lane, ty)?);
                    Ok(format!("({msb} < 0 ? -1 : 31 - {msb})"))
                })
            }
            Ubfe | Ibfe => {
                self.require(GlslRules::BIT_OPS, "bitfieldExtract")?;
                let ty = if inst.opcode == Ubfe { Uint } else { Int };
                self.per_lane(inst, ty, |e, _, lane| {
                    let width = paren(e.read_lane(e.src(inst, 0)?, lane, Uint)?);
                    let offset = paren(e.read_lane(e.src(inst, 1)?, lane, Uint)?);
                    let value = e.read_lane(e.src(inst, 2)?, lane, ty)?;
                    Ok(format!(
                        "bitfieldExtract({value}, int({offset} & 31u), int(min({width} & 31u, 32u - ({offset} & 31u))))"
                    ))
                })
            }
            Bfi => self.bfi(inst),
            Bfrev => {
                self.require(GlslRules::BIT_OPS, "bitfieldReverse")?;
                self.call1(inst, "bitfieldReverse", Uint)
            }

            DerivRtx => self.call1(inst, "dFdx", Float),
            DerivRty => self.call1(inst, "dFdy", Float),
            DerivRtxCoarse | DerivRtxFine | DerivRtyCoarse | DerivRtyFine => {
                let func = match (inst.opcode, self.rules.contains(GlslRules::DERIVATIVE_CONTROL)) {
                    (DerivRtxCoarse, true) => "dFdxCoarse",
                    (DerivRtxFine, true) => "dFdxFine",
                    (DerivRtyCoarse, true) => "dFdyCoarse",
                    (DerivRtyFine, true) => "dFdyFine",
                    (DerivRtxCoarse | DerivRtxFine, false) => "dFdx",
                    _ => "dFdy",
                };
                self.call1(inst, func, Float)
            }

            Break => {
                self.w.line("break;");
                Ok(())
            }
            Continue => {
                self.w.line("continue;");
                Ok(())
            }
            Breakc | Continuec | Discard => {
                let cond = self.condition(inst)?;
                let stmt = match inst.opcode {
                    Breakc => "break",
                    Continuec => "continue",
                    _ => "discard",
                };
                self.w.line(&format!("if ({cond}) {stmt};"));
                Ok(())
            }
            Ret => {
                self.emit_return();
                Ok(())
            }
            Retc => {
                let cond = self.condition(inst)?;
                self.w.open(&format!("if ({cond})"));
                self.emit_return();
                self.w.close("");
                Ok(())
            }
            Call => {
                let label = self.src(inst, 0)?.reg();
                self.w.line(&format!("sub_{label}();"));
                Ok(())
            }
            Callc => {
                let cond = self.condition(inst)?;
                let label = self.src(inst, 1)?.reg();
                self.w.line(&format!("if ({cond}) sub_{label}();"));
                Ok(())
            }
            Nop | CustomData => Ok(()),

            Emit | Cut | EmitThenCut | EmitStream | CutStream | EmitThenCutStream => self.gs_emit(inst),
            Sync => self.sync(inst),
            EvalSnapped | EvalSampleIndex | EvalCentroid => self.eval(inst),

            Sample | SampleB | SampleL | SampleD | SampleC | SampleCLz => self.sample(inst),
            Gather4 | Gather4C | Gather4Po | Gather4PoC => self.gather(inst),
            Lod => self.lod(inst),
            Ld | LdMs => self.ld(inst),
            Resinfo => self.resinfo(inst),
            SampleInfo => self.sampleinfo(inst),
            Bufinfo => self.bufinfo(inst),

            LdRaw | LdStructured => self.ld_words(inst),
            StoreRaw | StoreStructured => self.store_words(inst),
            LdUavTyped => self.ld_uav_typed(inst),
            StoreUavTyped => self.store_uav_typed(inst),
            AtomicAnd | AtomicOr | AtomicXor | AtomicCmpStore | AtomicIadd | AtomicImax
            | AtomicImin | AtomicUmax | AtomicUmin | ImmAtomicIadd | ImmAtomicAnd
            | ImmAtomicOr | ImmAtomicXor | ImmAtomicExch | ImmAtomicCmpExch | ImmAtomicImax
            | ImmAtomicImin | ImmAtomicUmax | ImmAtomicUmin => self.atomic(inst),

            Dadd | Dmax | Dmin | Dmul | Deq | Dge | Dlt | Dne | Dmov | Dmovc | Dtof | Ftod => {
                self.double(inst)
            }

            // Structure is carried by the control-flow tree.
            If | Else | EndIf | Loop | EndLoop | Switch | Case | Default | EndSwitch | Label
            | HsDecls | HsControlPointPhase | HsForkPhase | HsJoinPhase => Err(self.unsupported()),
            InterfaceCall | ImmAtomicAlloc | ImmAtomicConsume | SamplePos => Err(self.unsupported()),
            DclResource | DclConstantBuffer | DclSampler | DclIndexRange
            | DclGsOutputPrimitiveTopology | DclGsInputPrimitive | DclMaxOutputVertexCount
            | DclInput | DclInputSgv | DclInputSiv | DclInputPs | DclInputPsSgv | DclInputPsSiv
            | DclOutput | DclOutputSgv | DclOutputSiv | DclTemps | DclIndexableTemp
            | DclGlobalFlags | DclStream | DclFunctionBody | DclFunctionTable | DclInterface
            | DclInputControlPointCount | DclOutputControlPointCount | DclTessDomain
            | DclTessPartitioning | DclTessOutputPrimitive | DclHsMaxTessFactor
            | DclHsForkPhaseInstanceCount | DclHsJoinPhaseInstanceCount | DclThreadGroup
            | DclUavTyped | DclUavRaw | DclUavStructured | DclTgsmRaw | DclTgsmStructured
            | DclResourceRaw | DclResourceStructured | DclGsInstanceCount => Err(self.unsupported()),
        }
    }

    /// Destination mask and width of the first destination.
    fn dst_mask(&self, inst: &Instruction) -> Result<(WriteMask, usize)> {
        let mask = self.dst(inst, 0)?.mask();
        Ok((mask, usize::from(mask.count())))
    }

    fn unary_src(&self, inst: &Instruction, ty: NumType) -> Result<(usize, String)> {
        let (mask, n) = self.dst_mask(inst)?;
        Ok((n, self.read_mask(self.src(inst, 0)?, mask, ty)?))
    }

    fn call1(&mut self, inst: &Instruction, func: &str, ty: NumType) -> Result<()> {
        let (_, a) = self.unary_src(inst, ty)?;
        // `bitCount`/`findLSB` return signed values.
        let result_ty = if matches!(func, "bitCount" | "findLSB") { NumType::Int } else { ty };
        self.assign(inst, format!("{func}({a})"), result_ty)
    }

    fn binary(&mut self, inst: &Instruction, op: &str, ty: NumType) -> Result<()> {
        let (mask, _) = self.dst_mask(inst)?;
        let a = self.read_mask(self.src(inst, 0)?, mask, ty)?;
        let b = self.read_mask(self.src(inst, 1)?, mask, ty)?;
        self.assign(inst, format!("{} {op} {}", paren(a), paren(b)), ty)
    }

    fn call2(&mut self, inst: &Instruction, func: &str, ty: NumType) -> Result<()> {
        let (mask, _) = self.dst_mask(inst)?;
        let a = self.read_mask(self.src(inst, 0)?, mask, ty)?;
        let b = self.read_mask(self.src(inst, 1)?, mask, ty)?;
        self.assign(inst, format!("{func}({a}, {b})"), ty)
    }

    fn mad(&mut self, inst: &Instruction, ty: NumType) -> Result<()> {
        let (mask, _) = self.dst_mask(inst)?;
        let a = self.read_mask(self.src(inst, 0)?, mask, ty)?;
        let b = self.read_mask(self.src(inst, 1)?, mask, ty)?;
        let c = self.read_mask(self.src(inst, 2)?, mask, ty)?;
        self.assign(inst, format!("{} * {} + {}", paren(a), paren(b), paren(c)), ty)
    }

    fn dot(&mut self, inst: &Instruction, width: u8) -> Result<()> {
        let (_, n) = self.dst_mask(inst)?;
        let a = self.read_n(self.src(inst, 0)?, width, NumType::Float)?;
        let b = self.read_n(self.src(inst, 1)?, width, NumType::Float)?;
        let value = format!("dot({a}, {b})");
        self.assign(inst, splat(value, NumType::Float, n), NumType::Float)
    }

    fn compare(&mut self, inst: &Instruction, op: &str, ty: NumType) -> Result<()> {
        let (mask, n) = self.dst_mask(inst)?;
        let a = self.read_mask(self.src(inst, 0)?, mask, ty)?;
        let b = self.read_mask(self.src(inst, 1)?, mask, ty)?;
        self.assign(inst, compare_expr(&a, op, &b, n), NumType::Uint)
    }

    fn mov(&mut self, inst: &Instruction) -> Result<()> {
        let (mask, _) = self.dst_mask(inst)?;
        let src = self.src(inst, 0)?;
        let ty = if inst.saturate { NumType::Float } else { self.preferred_type(src, mask) };
        let value = self.read_mask(src, mask, ty)?;
        self.assign(inst, value, ty)
    }

    fn movc(&mut self, inst: &Instruction) -> Result<()> {
        let (mask, n) = self.dst_mask(inst)?;
        let ty = if n > 1 || inst.saturate {
            NumType::Float
        } else {
            self.preferred_type(self.src(inst, 1)?, mask)
        };
        let cond = self.read_mask(self.src(inst, 0)?, mask, NumType::Uint)?;
        let a = self.read_mask(self.src(inst, 1)?, mask, ty)?;
        let b = self.read_mask(self.src(inst, 2)?, mask, ty)?;
        self.assign(inst, select(&cond, &a, &b, n), ty)
    }

    /// `swapc`: both destinations may alias the sources.
    fn swapc(&mut self, inst: &Instruction) -> Result<()> {
        let cond = self.read_n(self.src(inst, 0)?, 4, NumType::Uint)?;
        let a = self.read_n(self.src(inst, 1)?, 4, NumType::Float)?;
        let b = self.read_n(self.src(inst, 2)?, 4, NumType::Float)?;
        self.w.open("");
        self.w.line(&format!("uvec4 _t0 = {cond};"));
        self.w.line(&format!("vec4 _t1 = {a};"));
        self.w.line(&format!("vec4 _t2 = {b};"));
        for (k, (first, second)) in [("_t2", "_t1"), ("_t1", "_t2")].into_iter().enumerate() {
            let mask = self.dst(inst, k)?.mask();
            let n = usize::from(mask.count());
            let value = select(&lanes("_t0", mask), &lanes(first, mask), &lanes(second, mask), n);
            self.store_result(inst, k, value, NumType::Float)?;
        }
        self.w.close("");
        Ok(())
    }

    fn sincos(&mut self, inst: &Instruction) -> Result<()> {
        let src = self.read_n(self.src(inst, 0)?, 4, NumType::Float)?;
        self.w.open("");
        self.w.line(&format!("vec4 _t0 = {src};"));
        for (k, func) in ["sin", "cos"].into_iter().enumerate() {
            let mask = self.dst(inst, k)?.mask();
            self.store_result(inst, k, format!("{func}({})", lanes("_t0", mask)), NumType::Float)?;
        }
        self.w.close("");
        Ok(())
    }

    fn udiv(&mut self, inst: &Instruction) -> Result<()> {
        let a = self.read_n(self.src(inst, 0)?, 4, NumType::Uint)?;
        let b = self.read_n(self.src(inst, 1)?, 4, NumType::Uint)?;
        self.w.open("");
        self.w.line(&format!("uvec4 _t0 = {a};"));
        self.w.line(&format!("uvec4 _t1 = {b};"));
        for (k, op) in ["/", "%"].into_iter().enumerate() {
            let mask = self.dst(inst, k)?.mask();
            let value = format!("{} {op} {}", lanes("_t0", mask), lanes("_t1", mask));
            self.store_result(inst, k, value, NumType::Uint)?;
        }
        self.w.close("");
        Ok(())
    }

    /// `imul`/`umul`: high bits to the first destination, low bits to the second.
    fn mul_extended(&mut self, inst: &Instruction, ty: NumType) -> Result<()> {
        if self.dst(inst, 0)?.ty == OperandType::Null {
            let mask = self.dst(inst, 1)?.mask();
            let a = self.read_mask(self.src(inst, 0)?, mask, ty)?;
            let b = self.read_mask(self.src(inst, 1)?, mask, ty)?;
            return self.store_result(inst, 1, format!("{} * {}", paren(a), paren(b)), ty);
        }
        self.require(GlslRules::BIT_OPS, "64-bit multiplication")?;
        let func = if ty == NumType::Int { "imulExtended" } else { "umulExtended" };
        let a = self.read_n(self.src(inst, 0)?, 4, ty)?;
        let b = self.read_n(self.src(inst, 1)?, 4, ty)?;
        let vec = ty.vec(4);
        self.w.open("");
        self.w.line(&format!("{vec} _t0, _t1;"));
        self.w.line(&format!("{func}({a}, {b}, _t0, _t1);"));
        for (k, temp) in ["_t0", "_t1"].into_iter().enumerate() {
            let mask = self.dst(inst, k)?.mask();
            self.store_result(inst, k, lanes(temp, mask), ty)?;
        }
        self.w.close("");
        Ok(())
    }

    /// `uaddc`/`usubb`: result, then carry or borrow.
    fn carry(&mut self, inst: &Instruction, add: bool) -> Result<()> {
        let a = self.read_n(self.src(inst, 0)?, 4, NumType::Uint)?;
        let b = self.read_n(self.src(inst, 1)?, 4, NumType::Uint)?;
        self.w.open("");
        self.w.line(&format!("uvec4 _t0 = {a};"));
        self.w.line(&format!("uvec4 _t1 = {b};"));
        if add {
            self.w.line("uvec4 _t2 = _t0 + _t1;");
            self.w.line("uvec4 _t3 = uvec4(lessThan(_t2, _t0));");
        } else {
            self.w.line("uvec4 _t2 = _t0 - _t1;");
            self.w.line("uvec4 _t3 = uvec4(lessThan(_t0, _t1));");
        }
        for (k, temp) in ["_t2", "_t3"].into_iter().enumerate() {
            let mask = self.dst(inst, k)?.mask();
            self.store_result(inst, k, lanes(temp, mask), NumType::Uint)?;
        }
        self.w.close("");
        Ok(())
    }

    fn shift(&mut self, inst: &Instruction, op: &str, ty: NumType) -> Result<()> {
        let (mask, _) = self.dst_mask(inst)?;
        let a = self.read_mask(self.src(inst, 0)?, mask, ty)?;
        let b = self.read_mask(self.src(inst, 1)?, mask, ty)?;
        let bits = if ty == NumType::Uint { "31u" } else { "31" };
        self.assign(inst, format!("{} {op} ({} & {bits})", paren(a), paren(b)), ty)
    }

    fn convert(&mut self, inst: &Instruction, from: NumType, to: NumType) -> Result<()> {
        let (n, a) = self.unary_src(inst, from)?;
        self.assign(inst, format!("{}({a})", to.vec(n)), to)
    }

    /// Builds the result one destination lane at a time.
    fn per_lane(
        &mut self,
        inst: &Instruction,
        ty: NumType,
        lane: impl Fn(&Self, &Operand, u8) -> Result<String>,
    ) -> Result<()> {
        let (mask, n) = self.dst_mask(inst)?;
        let src = self.src(inst, 0)?;
        let mut parts = Vec::with_capacity(n);
        for l in mask.components() {
            parts.push(lane(self, src, l)?);
        }
        let value = match parts.len() {
            0 => return Ok(()),
            1 => parts.remove(0),
            _ => format!("{}({})", ty.vec(n), parts.join(", ")),
        };
        self.assign(inst, value, ty)
    }

    /// `bfi dst, width, offset, insert, base`.
    fn bfi(&mut self, inst: &Instruction) -> Result<()> {
        let (mask, n) = self.dst_mask(inst)?;
        let ty = NumType::Uint.vec(n);
        let width = self.read_mask(self.src(inst, 0)?, mask, NumType::Uint)?;
        let offset = self.read_mask(self.src(inst, 1)?, mask, NumType::Uint)?;
        let insert = self.read_mask(self.src(inst, 2)?, mask, NumType::Uint)?;
        let base = self.read_mask(self.src(inst, 3)?, mask, NumType::Uint)?;
        let one = splat("1u".to_owned(), NumType::Uint, n);
        self.w.open("");
        self.w.line(&format!("{ty} _t0 = {} & 31u;", paren(offset)));
        self.w.line(&format!("{ty} _t1 = (({one} << ({} & 31u)) - 1u) << _t0;", paren(width)));
        let value = format!("(({} << _t0) & _t1) | ({} & ~_t1)", paren(insert), paren(base));
        self.assign(inst, value, NumType::Uint)?;
        self.w.close("");
        Ok(())
    }

    fn gs_emit(&mut self, inst: &Instruction) -> Result<()> {
        if self.module.stage != ShaderStage::Geometry {
            return Err(self.unsupported());
        }
        let streamed = matches!(inst.opcode, Opcode::EmitStream | Opcode::CutStream | Opcode::EmitThenCutStream);
        let stream = if streamed { Some(self.dst(inst, 0)?.reg()) } else { None };
        let multi = self.rules.contains(GlslRules::MULTI_STREAM) && self.module.gs.streams.len() > 1;
        let (emit, cut) = match inst.opcode {
            Opcode::Emit | Opcode::EmitStream => (true, false),
            Opcode::Cut | Opcode::CutStream => (false, true),
            _ => (true, true),
        };
        if emit {
            match stream {
                Some(s) if multi => {
                    self.emit_store_outputs(Some(s));
                    self.w.line(&format!("EmitStreamVertex({s});"));
                }
                _ => {
                    self.emit_store_outputs(None);
                    self.w.line("EmitVertex();");
                }
            }
        }
        if cut {
            match stream {
                Some(s) if multi => self.w.line(&format!("EndStreamPrimitive({s});")),
                _ => self.w.line("EndPrimitive();"),
            }
        }
        Ok(())
    }

    fn sync(&mut self, inst: &Instruction) -> Result<()> {
        let flags = inst.sync_flags();
        if flags.contains(SyncFlags::THREAD_GROUP_SHARED_MEMORY) {
            self.w.line("memoryBarrierShared();");
        }
        if flags.contains(SyncFlags::UAV_MEMORY_GLOBAL) {
            self.w.line("memoryBarrier();");
        } else if flags.contains(SyncFlags::UAV_MEMORY_GROUP) {
            self.w.line("groupMemoryBarrier();");
        }
        if flags.contains(SyncFlags::THREADS_IN_GROUP) {
            self.w.line("barrier();");
        }
        Ok(())
    }
}
