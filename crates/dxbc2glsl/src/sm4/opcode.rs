//! SM4/SM5 opcode and operand-type tables.
//!
//! Numeric IDs follow `d3d10tokenizedprogramformat.hpp` /
//! `d3d11tokenizedprogramformat.hpp`. Both enums are closed: values outside
//! the tables are reported by `from_u32` returning `None`, and the decoder
//! skips such instructions by their length.

/// Opcode ID in bits 0..=10 of the opcode token.
pub const OPCODE_MASK: u32 = 0x7ff;
/// Opcode-specific control bits 11..=23.
pub const OPCODE_CONTROLS_SHIFT: u32 = 11;
pub const OPCODE_CONTROLS_MASK: u32 = 0x1fff;
/// Instruction length in DWORDs (including the opcode token), bits 24..=30.
pub const OPCODE_LEN_SHIFT: u32 = 24;
pub const OPCODE_LEN_MASK: u32 = 0x7f;
/// If set on an opcode token, one or more extended opcode tokens follow.
pub const OPCODE_EXTENDED_BIT: u32 = 0x8000_0000;

pub const OPCODE_SATURATE_BIT: u32 = 1 << 13;
pub const OPCODE_TEST_NONZERO_BIT: u32 = 1 << 18;
pub const OPCODE_PRECISE_SHIFT: u32 = 19;

/// `customdata` class holding an immediate constant buffer.
pub const CUSTOMDATA_CLASS_ICB: u32 = 3;

pub const EXTENDED_OPCODE_SAMPLE_CONTROLS: u32 = 1;
pub const EXTENDED_OPCODE_RESOURCE_DIM: u32 = 2;
pub const EXTENDED_OPCODE_RESOURCE_RETURN_TYPE: u32 = 3;

// ---- Operand token layout ----

pub const OPERAND_NUM_COMPONENTS_MASK: u32 = 0x3;
pub const OPERAND_SELECTION_MODE_SHIFT: u32 = 2;
pub const OPERAND_SELECTION_MODE_MASK: u32 = 0x3;
pub const OPERAND_COMPONENT_SELECTION_SHIFT: u32 = 4;
pub const OPERAND_TYPE_SHIFT: u32 = 12;
pub const OPERAND_TYPE_MASK: u32 = 0xff;
pub const OPERAND_INDEX_DIMENSION_SHIFT: u32 = 20;
pub const OPERAND_INDEX_DIMENSION_MASK: u32 = 0x3;
pub const OPERAND_INDEX_REP_SHIFTS: [u32; 3] = [22, 25, 28];
pub const OPERAND_INDEX_REP_MASK: u32 = 0x7;
pub const OPERAND_EXTENDED_BIT: u32 = 0x8000_0000;

pub const OPERAND_SEL_MASK: u32 = 0;
pub const OPERAND_SEL_SWIZZLE: u32 = 1;
pub const OPERAND_SEL_SELECT1: u32 = 2;

pub const OPERAND_INDEX_REP_IMMEDIATE32: u32 = 0;
pub const OPERAND_INDEX_REP_IMMEDIATE64: u32 = 1;
pub const OPERAND_INDEX_REP_RELATIVE: u32 = 2;
pub const OPERAND_INDEX_REP_IMMEDIATE32_PLUS_RELATIVE: u32 = 3;
pub const OPERAND_INDEX_REP_IMMEDIATE64_PLUS_RELATIVE: u32 = 4;

pub const EXTENDED_OPERAND_MODIFIER: u32 = 1;

macro_rules! opcodes {
    ($($variant:ident = $value:literal => $name:literal,)*) => {
        /// An SM4/SM4.1/SM5 opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            /// Decodes an opcode ID; `None` for IDs outside the table.
            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// Returns the numeric opcode ID.
            pub fn to_u32(self) -> u32 {
                match self {
                    $(Opcode::$variant => $value,)*
                }
            }

            /// Assembly mnemonic.
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }
        }
    };
}

opcodes! {
    Add = 0x00 => "add",
    And = 0x01 => "and",
    Break = 0x02 => "break",
    Breakc = 0x03 => "breakc",
    Call = 0x04 => "call",
    Callc = 0x05 => "callc",
    Case = 0x06 => "case",
    Continue = 0x07 => "continue",
    Continuec = 0x08 => "continuec",
    Cut = 0x09 => "cut",
    Default = 0x0a => "default",
    DerivRtx = 0x0b => "deriv_rtx",
    DerivRty = 0x0c => "deriv_rty",
    Discard = 0x0d => "discard",
    Div = 0x0e => "div",
    Dp2 = 0x0f => "dp2",
    Dp3 = 0x10 => "dp3",
    Dp4 = 0x11 => "dp4",
    Else = 0x12 => "else",
    Emit = 0x13 => "emit",
    EmitThenCut = 0x14 => "emitthencut",
    EndIf = 0x15 => "endif",
    EndLoop = 0x16 => "endloop",
    EndSwitch = 0x17 => "endswitch",
    Eq = 0x18 => "eq",
    Exp = 0x19 => "exp",
    Frc = 0x1a => "frc",
    Ftoi = 0x1b => "ftoi",
    Ftou = 0x1c => "ftou",
    Ge = 0x1d => "ge",
    Iadd = 0x1e => "iadd",
    If = 0x1f => "if",
    Ieq = 0x20 => "ieq",
    Ige = 0x21 => "ige",
    Ilt = 0x22 => "ilt",
    Imad = 0x23 => "imad",
    Imax = 0x24 => "imax",
    Imin = 0x25 => "imin",
    Imul = 0x26 => "imul",
    Ine = 0x27 => "ine",
    Ineg = 0x28 => "ineg",
    Ishl = 0x29 => "ishl",
    Ishr = 0x2a => "ishr",
    Itof = 0x2b => "itof",
    Label = 0x2c => "label",
    Ld = 0x2d => "ld",
    LdMs = 0x2e => "ld_ms",
    Log = 0x2f => "log",
    Loop = 0x30 => "loop",
    Lt = 0x31 => "lt",
    Mad = 0x32 => "mad",
    Min = 0x33 => "min",
    Max = 0x34 => "max",
    CustomData = 0x35 => "customdata",
    Mov = 0x36 => "mov",
    Movc = 0x37 => "movc",
    Mul = 0x38 => "mul",
    Ne = 0x39 => "ne",
    Nop = 0x3a => "nop",
    Not = 0x3b => "not",
    Or = 0x3c => "or",
    Resinfo = 0x3d => "resinfo",
    Ret = 0x3e => "ret",
    Retc = 0x3f => "retc",
    RoundNe = 0x40 => "round_ne",
    RoundNi = 0x41 => "round_ni",
    RoundPi = 0x42 => "round_pi",
    RoundZ = 0x43 => "round_z",
    Rsq = 0x44 => "rsq",
    Sample = 0x45 => "sample",
    SampleC = 0x46 => "sample_c",
    SampleCLz = 0x47 => "sample_c_lz",
    SampleL = 0x48 => "sample_l",
    SampleD = 0x49 => "sample_d",
    SampleB = 0x4a => "sample_b",
    Sqrt = 0x4b => "sqrt",
    Switch = 0x4c => "switch",
    Sincos = 0x4d => "sincos",
    Udiv = 0x4e => "udiv",
    Ult = 0x4f => "ult",
    Uge = 0x50 => "uge",
    Umul = 0x51 => "umul",
    Umad = 0x52 => "umad",
    Umax = 0x53 => "umax",
    Umin = 0x54 => "umin",
    Ushr = 0x55 => "ushr",
    Utof = 0x56 => "utof",
    Xor = 0x57 => "xor",
    DclResource = 0x58 => "dcl_resource",
    DclConstantBuffer = 0x59 => "dcl_constantbuffer",
    DclSampler = 0x5a => "dcl_sampler",
    DclIndexRange = 0x5b => "dcl_indexrange",
    DclGsOutputPrimitiveTopology = 0x5c => "dcl_outputtopology",
    DclGsInputPrimitive = 0x5d => "dcl_inputprimitive",
    DclMaxOutputVertexCount = 0x5e => "dcl_maxout",
    DclInput = 0x5f => "dcl_input",
    DclInputSgv = 0x60 => "dcl_input_sgv",
    DclInputSiv = 0x61 => "dcl_input_siv",
    DclInputPs = 0x62 => "dcl_input_ps",
    DclInputPsSgv = 0x63 => "dcl_input_ps_sgv",
    DclInputPsSiv = 0x64 => "dcl_input_ps_siv",
    DclOutput = 0x65 => "dcl_output",
    DclOutputSgv = 0x66 => "dcl_output_sgv",
    DclOutputSiv = 0x67 => "dcl_output_siv",
    DclTemps = 0x68 => "dcl_temps",
    DclIndexableTemp = 0x69 => "dcl_indexableTemp",
    DclGlobalFlags = 0x6a => "dcl_globalFlags",
    Lod = 0x6c => "lod",
    Gather4 = 0x6d => "gather4",
    SamplePos = 0x6e => "samplepos",
    SampleInfo = 0x6f => "sampleinfo",
    HsDecls = 0x71 => "hs_decls",
    HsControlPointPhase = 0x72 => "hs_control_point_phase",
    HsForkPhase = 0x73 => "hs_fork_phase",
    HsJoinPhase = 0x74 => "hs_join_phase",
    EmitStream = 0x75 => "emit_stream",
    CutStream = 0x76 => "cut_stream",
    EmitThenCutStream = 0x77 => "emitThenCut_stream",
    InterfaceCall = 0x78 => "fcall",
    Bufinfo = 0x79 => "bufinfo",
    DerivRtxCoarse = 0x7a => "deriv_rtx_coarse",
    DerivRtxFine = 0x7b => "deriv_rtx_fine",
    DerivRtyCoarse = 0x7c => "deriv_rty_coarse",
    DerivRtyFine = 0x7d => "deriv_rty_fine",
    Gather4C = 0x7e => "gather4_c",
    Gather4Po = 0x7f => "gather4_po",
    Gather4PoC = 0x80 => "gather4_po_c",
    Rcp = 0x81 => "rcp",
    F32ToF16 = 0x82 => "f32tof16",
    F16ToF32 = 0x83 => "f16tof32",
    Uaddc = 0x84 => "uaddc",
    Usubb = 0x85 => "usubb",
    Countbits = 0x86 => "countbits",
    FirstbitHi = 0x87 => "firstbit_hi",
    FirstbitLo = 0x88 => "firstbit_lo",
    FirstbitShi = 0x89 => "firstbit_shi",
    Ubfe = 0x8a => "ubfe",
    Ibfe = 0x8b => "ibfe",
    Bfi = 0x8c => "bfi",
    Bfrev = 0x8d => "bfrev",
    Swapc = 0x8e => "swapc",
    DclStream = 0x8f => "dcl_stream",
    DclFunctionBody = 0x90 => "dcl_function_body",
    DclFunctionTable = 0x91 => "dcl_function_table",
    DclInterface = 0x92 => "dcl_interface",
    DclInputControlPointCount = 0x93 => "dcl_input_control_point_count",
    DclOutputControlPointCount = 0x94 => "dcl_output_control_point_count",
    DclTessDomain = 0x95 => "dcl_tessellator_domain",
    DclTessPartitioning = 0x96 => "dcl_tessellator_partitioning",
    DclTessOutputPrimitive = 0x97 => "dcl_tessellator_output_primitive",
    DclHsMaxTessFactor = 0x98 => "dcl_hs_max_tessfactor",
    DclHsForkPhaseInstanceCount = 0x99 => "dcl_hs_fork_phase_instance_count",
    DclHsJoinPhaseInstanceCount = 0x9a => "dcl_hs_join_phase_instance_count",
    DclThreadGroup = 0x9b => "dcl_thread_group",
    DclUavTyped = 0x9c => "dcl_uav_typed",
    DclUavRaw = 0x9d => "dcl_uav_raw",
    DclUavStructured = 0x9e => "dcl_uav_structured",
    DclTgsmRaw = 0x9f => "dcl_tgsm_raw",
    DclTgsmStructured = 0xa0 => "dcl_tgsm_structured",
    DclResourceRaw = 0xa1 => "dcl_resource_raw",
    DclResourceStructured = 0xa2 => "dcl_resource_structured",
    LdUavTyped = 0xa3 => "ld_uav_typed",
    StoreUavTyped = 0xa4 => "store_uav_typed",
    LdRaw = 0xa5 => "ld_raw",
    StoreRaw = 0xa6 => "store_raw",
    LdStructured = 0xa7 => "ld_structured",
    StoreStructured = 0xa8 => "store_structured",
    AtomicAnd = 0xa9 => "atomic_and",
    AtomicOr = 0xaa => "atomic_or",
    AtomicXor = 0xab => "atomic_xor",
    AtomicCmpStore = 0xac => "atomic_cmp_store",
    AtomicIadd = 0xad => "atomic_iadd",
    AtomicImax = 0xae => "atomic_imax",
    AtomicImin = 0xaf => "atomic_imin",
    AtomicUmax = 0xb0 => "atomic_umax",
    AtomicUmin = 0xb1 => "atomic_umin",
    ImmAtomicAlloc = 0xb2 => "imm_atomic_alloc",
    ImmAtomicConsume = 0xb3 => "imm_atomic_consume",
    ImmAtomicIadd = 0xb4 => "imm_atomic_iadd",
    ImmAtomicAnd = 0xb5 => "imm_atomic_and",
    ImmAtomicOr = 0xb6 => "imm_atomic_or",
    ImmAtomicXor = 0xb7 => "imm_atomic_xor",
    ImmAtomicExch = 0xb8 => "imm_atomic_exch",
    ImmAtomicCmpExch = 0xb9 => "imm_atomic_cmp_exch",
    ImmAtomicImax = 0xba => "imm_atomic_imax",
    ImmAtomicImin = 0xbb => "imm_atomic_imin",
    ImmAtomicUmax = 0xbc => "imm_atomic_umax",
    ImmAtomicUmin = 0xbd => "imm_atomic_umin",
    Sync = 0xbe => "sync",
    Dadd = 0xbf => "dadd",
    Dmax = 0xc0 => "dmax",
    Dmin = 0xc1 => "dmin",
    Dmul = 0xc2 => "dmul",
    Deq = 0xc3 => "deq",
    Dge = 0xc4 => "dge",
    Dlt = 0xc5 => "dlt",
    Dne = 0xc6 => "dne",
    Dmov = 0xc7 => "dmov",
    Dmovc = 0xc8 => "dmovc",
    Dtof = 0xc9 => "dtof",
    Ftod = 0xca => "ftod",
    EvalSnapped = 0xcb => "eval_snapped",
    EvalSampleIndex = 0xcc => "eval_sample_index",
    EvalCentroid = 0xcd => "eval_centroid",
    DclGsInstanceCount = 0xce => "dcl_gsinstances",
}

impl Opcode {
    /// `true` for `dcl_*` tokens, which decode into [`crate::sm4_ir::Declaration`].
    pub fn is_declaration(self) -> bool {
        let v = self.to_u32();
        (0x58..=0x6a).contains(&v) || (0x8f..=0xa2).contains(&v) || v == 0xce
    }

    /// Number of leading operands that are written by the instruction.
    pub fn dst_count(self) -> usize {
        use Opcode::*;
        match self {
            Break | Breakc | Call | Callc | Case | Continue | Continuec | Cut | Default
            | Discard | Else | Emit | EmitThenCut | EndIf | EndLoop | EndSwitch | If | Label
            | Loop | Nop | Ret | Retc | Switch | Sync | HsDecls | HsControlPointPhase
            | HsForkPhase | HsJoinPhase | EmitStream | CutStream | EmitThenCutStream
            | InterfaceCall | CustomData => 0,
            Imul | Umul | Udiv | Sincos | Uaddc | Usubb | Swapc | ImmAtomicAlloc
            | ImmAtomicConsume | ImmAtomicIadd | ImmAtomicAnd | ImmAtomicOr | ImmAtomicXor
            | ImmAtomicExch | ImmAtomicCmpExch | ImmAtomicImax | ImmAtomicImin
            | ImmAtomicUmax | ImmAtomicUmin => 2,
            _ if self.is_declaration() => 0,
            _ => 1,
        }
    }

    /// `true` if bit 13 of the opcode token means `_sat` for this opcode.
    pub fn allows_saturate(self) -> bool {
        !self.is_declaration() && self != Opcode::Sync && self.dst_count() > 0
    }

    /// `true` for instructions whose first source carries a `_z`/`_nz` test.
    pub fn has_test(self) -> bool {
        matches!(
            self,
            Opcode::If
                | Opcode::Breakc
                | Opcode::Continuec
                | Opcode::Retc
                | Opcode::Discard
                | Opcode::Callc
        )
    }

    /// Texture sampling instructions that take a sampler operand.
    pub fn is_sample(self) -> bool {
        matches!(
            self,
            Opcode::Sample
                | Opcode::SampleC
                | Opcode::SampleCLz
                | Opcode::SampleL
                | Opcode::SampleD
                | Opcode::SampleB
                | Opcode::Gather4
                | Opcode::Gather4C
                | Opcode::Gather4Po
                | Opcode::Gather4PoC
                | Opcode::Lod
        )
    }

    /// Sampling that compares against a reference value (needs a shadow sampler).
    pub fn is_comparison_sample(self) -> bool {
        matches!(
            self,
            Opcode::SampleC | Opcode::SampleCLz | Opcode::Gather4C | Opcode::Gather4PoC
        )
    }
}

macro_rules! operand_types {
    ($($variant:ident = $value:literal => $prefix:literal,)*) => {
        /// Register file named by an operand token (bits 12..=19).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub enum OperandType {
            $($variant,)*
        }

        impl OperandType {
            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(OperandType::$variant),)*
                    _ => None,
                }
            }

            pub fn to_u32(self) -> u32 {
                match self {
                    $(OperandType::$variant => $value,)*
                }
            }

            /// Register prefix used by the disassembler.
            pub fn prefix(self) -> &'static str {
                match self {
                    $(OperandType::$variant => $prefix,)*
                }
            }
        }
    };
}

operand_types! {
    Temp = 0 => "r",
    Input = 1 => "v",
    Output = 2 => "o",
    IndexableTemp = 3 => "x",
    Immediate32 = 4 => "l",
    Immediate64 = 5 => "d",
    Sampler = 6 => "s",
    Resource = 7 => "t",
    ConstantBuffer = 8 => "cb",
    ImmediateConstantBuffer = 9 => "icb",
    Label = 10 => "l",
    InputPrimitiveId = 11 => "vPrim",
    OutputDepth = 12 => "oDepth",
    Null = 13 => "null",
    Rasterizer = 14 => "rasterizer",
    OutputCoverageMask = 15 => "oMask",
    Stream = 16 => "m",
    FunctionBody = 17 => "fb",
    FunctionTable = 18 => "ft",
    Interface = 19 => "fp",
    FunctionInput = 20 => "fi",
    FunctionOutput = 21 => "fo",
    OutputControlPointId = 22 => "vOutputControlPointID",
    InputForkInstanceId = 23 => "vForkInstanceID",
    InputJoinInstanceId = 24 => "vJoinInstanceID",
    InputControlPoint = 25 => "vicp",
    OutputControlPoint = 26 => "vocp",
    InputPatchConstant = 27 => "vpc",
    InputDomainPoint = 28 => "vDomain",
    ThisPointer = 29 => "this",
    UnorderedAccessView = 30 => "u",
    ThreadGroupSharedMemory = 31 => "g",
    InputThreadId = 32 => "vThreadID",
    InputThreadGroupId = 33 => "vThreadGroupID",
    InputThreadIdInGroup = 34 => "vThreadIDInGroup",
    InputCoverageMask = 35 => "vCoverage",
    InputThreadIdInGroupFlattened = 36 => "vThreadIDInGroupFlattened",
    InputGsInstanceId = 37 => "vGSInstanceID",
    OutputDepthGreaterEqual = 38 => "oDepthGE",
    OutputDepthLessEqual = 39 => "oDepthLE",
    CycleCounter = 40 => "vCycleCounter",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_table_round_trips_and_has_gaps() {
        let mut known = 0;
        for v in 0..=0xffu32 {
            if let Some(op) = Opcode::from_u32(v) {
                assert_eq!(op.to_u32(), v, "{}", op.name());
                known += 1;
            }
        }
        assert_eq!(known, 0xcf - 2);
        assert_eq!(Opcode::from_u32(0x6b), None);
        assert_eq!(Opcode::from_u32(0x70), None);
        assert_eq!(Opcode::from_u32(0xcf), None);
    }

    #[test]
    fn declaration_ranges() {
        assert!(Opcode::DclResource.is_declaration());
        assert!(Opcode::DclGlobalFlags.is_declaration());
        assert!(Opcode::DclThreadGroup.is_declaration());
        assert!(Opcode::DclGsInstanceCount.is_declaration());
        assert!(!Opcode::Lod.is_declaration());
        assert!(!Opcode::HsForkPhase.is_declaration());
        assert!(!Opcode::EvalCentroid.is_declaration());
    }

    #[test]
    fn destination_counts() {
        assert_eq!(Opcode::Mov.dst_count(), 1);
        assert_eq!(Opcode::Sincos.dst_count(), 2);
        assert_eq!(Opcode::ImmAtomicCmpExch.dst_count(), 2);
        assert_eq!(Opcode::If.dst_count(), 0);
        assert_eq!(Opcode::DclTemps.dst_count(), 0);
        assert!(!Opcode::Sync.allows_saturate());
        assert!(Opcode::Mad.allows_saturate());
    }

    #[test]
    fn operand_types_cover_sm5() {
        for v in 0..=40u32 {
            assert_eq!(OperandType::from_u32(v).map(OperandType::to_u32), Some(v));
        }
        assert_eq!(OperandType::from_u32(41), None);
        assert_eq!(OperandType::ConstantBuffer.prefix(), "cb");
    }
}
