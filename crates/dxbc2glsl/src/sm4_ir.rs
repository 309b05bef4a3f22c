//! SM4/SM5 intermediate representation produced by [`crate::sm4::decode`].
//!
//! Instructions keep their operands in token order; the meaning of each
//! operand position is defined by the opcode. Declarations are decoded into
//! the typed [`Declaration`] enum.

use bitflags::bitflags;

use crate::sm4::opcode::{Opcode, OperandType};

/// Component letters in register order.
pub const COMPONENT_CHARS: [char; 4] = ['x', 'y', 'z', 'w'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WriteMask(pub u8);

impl WriteMask {
    pub const XYZW: Self = Self(0b1111);
    pub const X: Self = Self(0b0001);
    pub const Y: Self = Self(0b0010);
    pub const Z: Self = Self(0b0100);
    pub const W: Self = Self(0b1000);
    pub const XY: Self = Self(0b0011);
    pub const XYZ: Self = Self(0b0111);

    /// Mask covering the first `n` components.
    pub fn first(n: u8) -> Self {
        Self(((1u16 << n.min(4)) - 1) as u8)
    }

    /// `true` if component `c` (0..=3) is written.
    pub fn has(self, c: u8) -> bool {
        c < 4 && (self.0 >> c) & 1 != 0
    }

    pub fn count(self) -> u8 {
        (self.0 & 0xf).count_ones() as u8
    }

    pub fn is_empty(self) -> bool {
        self.0 & 0xf == 0
    }

    /// Written components in ascending order.
    pub fn components(self) -> impl Iterator<Item = u8> {
        (0..4u8).filter(move |&c| self.has(c))
    }

    /// Highest written component, if any.
    pub fn highest(self) -> Option<u8> {
        self.components().last()
    }

    /// `".xyz"`-style suffix (empty for an empty mask).
    pub fn suffix(self) -> String {
        let mut s = String::new();
        if !self.is_empty() {
            s.push('.');
            s.extend(self.components().map(|c| COMPONENT_CHARS[c as usize]));
        }
        s
    }
}

/// 4-component swizzle.
///
/// Each lane is 0..=3 for x/y/z/w.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [u8; 4]);

impl Swizzle {
    pub const XYZW: Self = Self([0, 1, 2, 3]);
    pub const XXXX: Self = Self([0, 0, 0, 0]);

    pub fn is_identity(self) -> bool {
        self == Self::XYZW
    }

    /// Source component feeding destination lane `lane`.
    pub fn lane(self, lane: u8) -> u8 {
        self.0[(lane & 3) as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperandModifier {
    #[default]
    None,
    Neg,
    Abs,
    AbsNeg,
}

/// How an operand picks components from its register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentSelection {
    /// Destination write mask.
    Mask(WriteMask),
    Swizzle(Swizzle),
    /// Scalar select (`r0.y`), replicated across lanes.
    Select1(u8),
}

impl ComponentSelection {
    /// Swizzle equivalent; masks read their components in place.
    pub fn swizzle(self) -> Swizzle {
        match self {
            ComponentSelection::Mask(_) => Swizzle::XYZW,
            ComponentSelection::Swizzle(s) => s,
            ComponentSelection::Select1(c) => Swizzle([c; 4]),
        }
    }

    /// Write mask; sources report all four components.
    pub fn mask(self) -> WriteMask {
        match self {
            ComponentSelection::Mask(m) => m,
            _ => WriteMask::XYZW,
        }
    }
}

/// One register index of an operand.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandIndex {
    Imm32(u32),
    Imm64(u64),
    Relative(Box<Operand>),
    Imm32PlusRelative(u32, Box<Operand>),
    Imm64PlusRelative(u64, Box<Operand>),
}

impl OperandIndex {
    /// Immediate displacement (0 for a purely relative index).
    pub fn imm(&self) -> u32 {
        match self {
            OperandIndex::Imm32(v) | OperandIndex::Imm32PlusRelative(v, _) => *v,
            // Register indices never exceed 32 bits in practice.
            OperandIndex::Imm64(v) | OperandIndex::Imm64PlusRelative(v, _) => *v as u32,
            OperandIndex::Relative(_) => 0,
        }
    }

    /// Nested register supplying the dynamic part of the index.
    pub fn relative(&self) -> Option<&Operand> {
        match self {
            OperandIndex::Relative(op)
            | OperandIndex::Imm32PlusRelative(_, op)
            | OperandIndex::Imm64PlusRelative(_, op) => Some(op),
            OperandIndex::Imm32(_) | OperandIndex::Imm64(_) => None,
        }
    }
}

/// Literal operand payload (`l(...)` / `d(...)`), replicated for scalars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    Bits32([u32; 4]),
    Bits64([u64; 4]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub ty: OperandType,
    /// 0, 1 or 4.
    pub num_components: u8,
    pub selection: ComponentSelection,
    pub indices: Vec<OperandIndex>,
    pub modifier: OperandModifier,
    pub imm: Option<Immediate>,
}

impl Operand {
    pub fn new(ty: OperandType) -> Self {
        Self {
            ty,
            num_components: 0,
            selection: ComponentSelection::Mask(WriteMask(0)),
            indices: Vec::new(),
            modifier: OperandModifier::None,
            imm: None,
        }
    }

    /// Immediate part of index `n`, when present.
    pub fn index(&self, n: usize) -> Option<u32> {
        self.indices.get(n).map(OperandIndex::imm)
    }

    /// Immediate part of the first index (the register number for most files).
    pub fn reg(&self) -> u32 {
        self.index(0).unwrap_or(0)
    }

    pub fn has_relative_index(&self) -> bool {
        self.indices.iter().any(|i| i.relative().is_some())
    }

    pub fn swizzle(&self) -> Swizzle {
        if self.num_components == 1 {
            return Swizzle::XXXX;
        }
        self.selection.swizzle()
    }

    pub fn mask(&self) -> WriteMask {
        match self.num_components {
            0 => WriteMask(0),
            1 => WriteMask::X,
            _ => self.selection.mask(),
        }
    }
}

bitflags! {
    /// Synchronisation scope of a `sync` instruction (controls bits 11..=14).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SyncFlags: u32 {
        const THREADS_IN_GROUP = 1 << 0;
        const THREAD_GROUP_SHARED_MEMORY = 1 << 1;
        const UAV_MEMORY_GROUP = 1 << 2;
        const UAV_MEMORY_GLOBAL = 1 << 3;
    }
}

bitflags! {
    /// `dcl_globalFlags` bits (controls bits 11..).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GlobalFlags: u32 {
        const REFACTORING_ALLOWED = 1 << 0;
        const ENABLE_DOUBLE_PRECISION = 1 << 1;
        const FORCE_EARLY_DEPTH_STENCIL = 1 << 2;
        const ENABLE_RAW_AND_STRUCTURED_BUFFERS = 1 << 3;
        const SKIP_OPTIMIZATION = 1 << 4;
        const ENABLE_MINIMUM_PRECISION = 1 << 5;
        const ENABLE_11_1_DOUBLE_EXTENSIONS = 1 << 6;
        const ENABLE_11_1_SHADER_EXTENSIONS = 1 << 7;
    }
}

/// `resinfo` result conversion (controls bits 11..=12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResinfoReturnType {
    Float,
    RcpFloat,
    Uint,
}

/// Resource dimension from `dcl_resource`/`dcl_uav_typed` or the extended
/// opcode token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ResourceDimension {
    Unknown,
    Buffer,
    Texture1D,
    Texture2D,
    Texture2DMs,
    Texture3D,
    TextureCube,
    Texture1DArray,
    Texture2DArray,
    Texture2DMsArray,
    TextureCubeArray,
    RawBuffer,
    StructuredBuffer,
}

impl ResourceDimension {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => ResourceDimension::Buffer,
            2 => ResourceDimension::Texture1D,
            3 => ResourceDimension::Texture2D,
            4 => ResourceDimension::Texture2DMs,
            5 => ResourceDimension::Texture3D,
            6 => ResourceDimension::TextureCube,
            7 => ResourceDimension::Texture1DArray,
            8 => ResourceDimension::Texture2DArray,
            9 => ResourceDimension::Texture2DMsArray,
            10 => ResourceDimension::TextureCubeArray,
            11 => ResourceDimension::RawBuffer,
            12 => ResourceDimension::StructuredBuffer,
            _ => ResourceDimension::Unknown,
        }
    }

    /// Components of the sampling coordinate (including the array slice).
    pub fn coord_count(self) -> u8 {
        match self {
            ResourceDimension::Buffer | ResourceDimension::Texture1D => 1,
            ResourceDimension::Texture1DArray
            | ResourceDimension::Texture2D
            | ResourceDimension::Texture2DMs => 2,
            ResourceDimension::Texture2DArray
            | ResourceDimension::Texture2DMsArray
            | ResourceDimension::Texture3D
            | ResourceDimension::TextureCube => 3,
            ResourceDimension::TextureCubeArray => 4,
            ResourceDimension::Unknown
            | ResourceDimension::RawBuffer
            | ResourceDimension::StructuredBuffer => 1,
        }
    }

    /// Components of texel offsets and gradients.
    pub fn offset_count(self) -> u8 {
        match self {
            ResourceDimension::Texture1D | ResourceDimension::Texture1DArray => 1,
            ResourceDimension::Texture2D
            | ResourceDimension::Texture2DArray
            | ResourceDimension::Texture2DMs
            | ResourceDimension::Texture2DMsArray => 2,
            ResourceDimension::Texture3D => 3,
            _ => 0,
        }
    }

    /// Components returned by `textureSize`.
    pub fn size_count(self) -> u8 {
        match self {
            ResourceDimension::TextureCube => 2,
            ResourceDimension::TextureCubeArray => 3,
            other => other.coord_count(),
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            ResourceDimension::Texture1DArray
                | ResourceDimension::Texture2DArray
                | ResourceDimension::Texture2DMsArray
                | ResourceDimension::TextureCubeArray
        )
    }

    pub fn is_multisampled(self) -> bool {
        matches!(
            self,
            ResourceDimension::Texture2DMs | ResourceDimension::Texture2DMsArray
        )
    }

    /// Lower-case name used by the disassembler.
    pub fn name(self) -> &'static str {
        match self {
            ResourceDimension::Unknown => "unknown",
            ResourceDimension::Buffer => "buffer",
            ResourceDimension::Texture1D => "texture1d",
            ResourceDimension::Texture2D => "texture2d",
            ResourceDimension::Texture2DMs => "texture2dms",
            ResourceDimension::Texture3D => "texture3d",
            ResourceDimension::TextureCube => "texturecube",
            ResourceDimension::Texture1DArray => "texture1darray",
            ResourceDimension::Texture2DArray => "texture2darray",
            ResourceDimension::Texture2DMsArray => "texture2dmsarray",
            ResourceDimension::TextureCubeArray => "texturecubearray",
            ResourceDimension::RawBuffer => "raw_buffer",
            ResourceDimension::StructuredBuffer => "structured_buffer",
        }
    }
}

/// Per-component return type of a typed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ReturnType {
    Unorm,
    Snorm,
    Sint,
    Uint,
    Float,
    Mixed,
    Double,
    Continued,
    Unused,
    Other(u32),
}

impl ReturnType {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => ReturnType::Unorm,
            2 => ReturnType::Snorm,
            3 => ReturnType::Sint,
            4 => ReturnType::Uint,
            5 => ReturnType::Float,
            6 => ReturnType::Mixed,
            7 => ReturnType::Double,
            8 => ReturnType::Continued,
            9 => ReturnType::Unused,
            other => ReturnType::Other(other),
        }
    }

    /// Decodes the 4x4-bit return type token.
    pub fn unpack(token: u32) -> [ReturnType; 4] {
        core::array::from_fn(|i| ReturnType::from_u32((token >> (i * 4)) & 0xf))
    }

    pub fn name(self) -> &'static str {
        match self {
            ReturnType::Unorm => "unorm",
            ReturnType::Snorm => "snorm",
            ReturnType::Sint => "sint",
            ReturnType::Uint => "uint",
            ReturnType::Float => "float",
            ReturnType::Mixed => "mixed",
            ReturnType::Double => "double",
            ReturnType::Continued => "continued",
            ReturnType::Unused => "unused",
            ReturnType::Other(_) => "unknown",
        }
    }
}

/// Pixel shader input interpolation (`dcl_input_ps` controls bits 11..=14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InterpolationMode {
    Undefined,
    Constant,
    Linear,
    LinearCentroid,
    LinearNoPerspective,
    LinearNoPerspectiveCentroid,
    LinearSample,
    LinearNoPerspectiveSample,
}

impl InterpolationMode {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => InterpolationMode::Constant,
            2 => InterpolationMode::Linear,
            3 => InterpolationMode::LinearCentroid,
            4 => InterpolationMode::LinearNoPerspective,
            5 => InterpolationMode::LinearNoPerspectiveCentroid,
            6 => InterpolationMode::LinearSample,
            7 => InterpolationMode::LinearNoPerspectiveSample,
            _ => InterpolationMode::Undefined,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InterpolationMode::Undefined => "undefined",
            InterpolationMode::Constant => "constant",
            InterpolationMode::Linear => "linear",
            InterpolationMode::LinearCentroid => "linear centroid",
            InterpolationMode::LinearNoPerspective => "linear noperspective",
            InterpolationMode::LinearNoPerspectiveCentroid => "linear noperspective centroid",
            InterpolationMode::LinearSample => "linear sample",
            InterpolationMode::LinearNoPerspectiveSample => "linear noperspective sample",
        }
    }
}

/// Geometry shader output topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PrimitiveTopology {
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    Other(u32),
}

impl PrimitiveTopology {
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => PrimitiveTopology::Undefined,
            1 => PrimitiveTopology::PointList,
            2 => PrimitiveTopology::LineList,
            3 => PrimitiveTopology::LineStrip,
            4 => PrimitiveTopology::TriangleList,
            5 => PrimitiveTopology::TriangleStrip,
            other => PrimitiveTopology::Other(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveTopology::Undefined | PrimitiveTopology::Other(_) => "undefined",
            PrimitiveTopology::PointList => "pointlist",
            PrimitiveTopology::LineList => "linelist",
            PrimitiveTopology::LineStrip => "linestrip",
            PrimitiveTopology::TriangleList => "trianglelist",
            PrimitiveTopology::TriangleStrip => "trianglestrip",
        }
    }
}

/// Geometry shader input primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Primitive {
    Undefined,
    Point,
    Line,
    Triangle,
    LineAdj,
    TriangleAdj,
    /// Patch with the given number of control points (1..=32).
    Patch(u32),
    Other(u32),
}

impl Primitive {
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => Primitive::Undefined,
            1 => Primitive::Point,
            2 => Primitive::Line,
            3 => Primitive::Triangle,
            6 => Primitive::LineAdj,
            7 => Primitive::TriangleAdj,
            8..=39 => Primitive::Patch(v - 7),
            other => Primitive::Other(other),
        }
    }

    /// Vertices per input primitive, `None` when undefined.
    pub fn vertex_count(self) -> Option<u32> {
        match self {
            Primitive::Point => Some(1),
            Primitive::Line => Some(2),
            Primitive::Triangle => Some(3),
            Primitive::LineAdj => Some(4),
            Primitive::TriangleAdj => Some(6),
            Primitive::Patch(n) => Some(n),
            Primitive::Undefined | Primitive::Other(_) => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Undefined | Primitive::Other(_) => "undefined",
            Primitive::Point => "point",
            Primitive::Line => "line",
            Primitive::Triangle => "triangle",
            Primitive::LineAdj => "lineadj",
            Primitive::TriangleAdj => "triangleadj",
            Primitive::Patch(_) => "patch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TessDomain {
    Undefined,
    Isoline,
    Triangle,
    Quad,
}

impl TessDomain {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => TessDomain::Isoline,
            2 => TessDomain::Triangle,
            3 => TessDomain::Quad,
            _ => TessDomain::Undefined,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TessDomain::Undefined => "undefined",
            TessDomain::Isoline => "domain_isoline",
            TessDomain::Triangle => "domain_tri",
            TessDomain::Quad => "domain_quad",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TessPartitioning {
    Undefined,
    Integer,
    Pow2,
    FractionalOdd,
    FractionalEven,
}

impl TessPartitioning {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => TessPartitioning::Integer,
            2 => TessPartitioning::Pow2,
            3 => TessPartitioning::FractionalOdd,
            4 => TessPartitioning::FractionalEven,
            _ => TessPartitioning::Undefined,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TessPartitioning::Undefined => "undefined",
            TessPartitioning::Integer => "partitioning_integer",
            TessPartitioning::Pow2 => "partitioning_pow2",
            TessPartitioning::FractionalOdd => "partitioning_fractional_odd",
            TessPartitioning::FractionalEven => "partitioning_fractional_even",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TessOutputPrimitive {
    Undefined,
    Point,
    Line,
    TriangleCw,
    TriangleCcw,
}

impl TessOutputPrimitive {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => TessOutputPrimitive::Point,
            2 => TessOutputPrimitive::Line,
            3 => TessOutputPrimitive::TriangleCw,
            4 => TessOutputPrimitive::TriangleCcw,
            _ => TessOutputPrimitive::Undefined,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TessOutputPrimitive::Undefined => "undefined",
            TessOutputPrimitive::Point => "output_point",
            TessOutputPrimitive::Line => "output_line",
            TessOutputPrimitive::TriangleCw => "output_triangle_cw",
            TessOutputPrimitive::TriangleCcw => "output_triangle_ccw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerMode {
    Default,
    Comparison,
    Mono,
}

impl SamplerMode {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => SamplerMode::Comparison,
            2 => SamplerMode::Mono,
            _ => SamplerMode::Default,
        }
    }
}

/// A decoded `dcl_*` token (or an immediate constant buffer).
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    GlobalFlags(GlobalFlags),
    Resource {
        slot: u32,
        dimension: ResourceDimension,
        sample_count: u32,
        return_type: [ReturnType; 4],
    },
    ConstantBuffer {
        slot: u32,
        size_vec4: u32,
        dynamic_indexed: bool,
    },
    Sampler {
        slot: u32,
        mode: SamplerMode,
    },
    IndexRange {
        operand: Operand,
        count: u32,
    },
    GsOutputTopology(PrimitiveTopology),
    GsInputPrimitive(Primitive),
    GsMaxOutputVertexCount(u32),
    GsInstanceCount(u32),
    Stream(u32),
    Input {
        operand: Operand,
        /// Raw `D3D10_SB_NAME` for `_sgv`/`_siv` forms.
        system_value: Option<u32>,
        /// Set for `dcl_input_ps*`.
        interpolation: Option<InterpolationMode>,
    },
    Output {
        operand: Operand,
        system_value: Option<u32>,
    },
    Temps(u32),
    IndexableTemp {
        reg: u32,
        size: u32,
        components: u32,
    },
    InputControlPointCount(u32),
    OutputControlPointCount(u32),
    TessDomain(TessDomain),
    TessPartitioning(TessPartitioning),
    TessOutputPrimitive(TessOutputPrimitive),
    HsMaxTessFactor(f32),
    HsForkPhaseInstanceCount(u32),
    HsJoinPhaseInstanceCount(u32),
    ThreadGroup([u32; 3]),
    UavTyped {
        slot: u32,
        dimension: ResourceDimension,
        return_type: [ReturnType; 4],
        globally_coherent: bool,
    },
    UavRaw {
        slot: u32,
        globally_coherent: bool,
    },
    UavStructured {
        slot: u32,
        stride: u32,
        globally_coherent: bool,
    },
    TgsmRaw {
        slot: u32,
        byte_count: u32,
    },
    TgsmStructured {
        slot: u32,
        stride: u32,
        count: u32,
    },
    ResourceRaw {
        slot: u32,
    },
    ResourceStructured {
        slot: u32,
        stride: u32,
    },
    FunctionBody(u32),
    FunctionTable {
        index: u32,
        bodies: Vec<u32>,
    },
    Interface {
        index: u32,
        table_count: u32,
        array_len: u32,
    },
    ImmediateConstantBuffer(Vec<[u32; 4]>),
}

/// A decoded executable instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub saturate: bool,
    /// `_nz` (true) vs `_z` test for conditional instructions.
    pub test_nonzero: bool,
    /// Per-component `precise` mask.
    pub precise_mask: u8,
    /// Raw opcode-specific control bits 11..=23.
    pub controls: u32,
    /// Immediate texel offsets (`aoffimmi`).
    pub sample_offsets: [i8; 3],
    pub resource_dim: Option<ResourceDimension>,
    pub resource_return: Option<[ReturnType; 4]>,
    pub operands: Vec<Operand>,
    /// Position of the opcode token in the shader chunk.
    pub at_dword: usize,
}

impl Instruction {
    pub fn new(opcode: Opcode, at_dword: usize) -> Self {
        Self {
            opcode,
            saturate: false,
            test_nonzero: false,
            precise_mask: 0,
            controls: 0,
            sample_offsets: [0; 3],
            resource_dim: None,
            resource_return: None,
            operands: Vec::new(),
            at_dword,
        }
    }

    pub fn resinfo_return_type(&self) -> ResinfoReturnType {
        match self.controls & 0x3 {
            1 => ResinfoReturnType::RcpFloat,
            2 => ResinfoReturnType::Uint,
            _ => ResinfoReturnType::Float,
        }
    }

    /// `sampleinfo_uint`.
    pub fn sampleinfo_uint(&self) -> bool {
        self.controls & 0x1 != 0
    }

    pub fn sync_flags(&self) -> SyncFlags {
        SyncFlags::from_bits_truncate(self.controls & 0xf)
    }

    pub fn has_offsets(&self) -> bool {
        self.sample_offsets != [0; 3]
    }

    /// Operands after the destinations.
    pub fn sources(&self) -> &[Operand] {
        let n = self.opcode.dst_count().min(self.operands.len());
        &self.operands[n..]
    }
}

/// One item of the decoded token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedItem {
    Declaration(Declaration),
    Instruction(Instruction),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_mask_helpers() {
        let m = WriteMask(0b1010);
        assert_eq!(m.count(), 2);
        assert_eq!(m.components().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(m.highest(), Some(3));
        assert_eq!(m.suffix(), ".yw");
        assert_eq!(WriteMask::first(3), WriteMask::XYZ);
        assert_eq!(WriteMask(0).suffix(), "");
    }

    #[test]
    fn scalar_operands_replicate_x() {
        let mut op = Operand::new(OperandType::Immediate32);
        op.num_components = 1;
        op.selection = ComponentSelection::Select1(0);
        assert_eq!(op.swizzle(), Swizzle::XXXX);
        assert_eq!(op.mask(), WriteMask::X);
    }

    #[test]
    fn return_type_token_unpacks_per_component() {
        // float, float, sint, uint
        let token = 5 | (5 << 4) | (3 << 8) | (4 << 12);
        assert_eq!(
            ReturnType::unpack(token),
            [
                ReturnType::Float,
                ReturnType::Float,
                ReturnType::Sint,
                ReturnType::Uint
            ]
        );
    }

    #[test]
    fn primitive_patch_counts() {
        assert_eq!(Primitive::from_u32(8), Primitive::Patch(1));
        assert_eq!(Primitive::from_u32(39).vertex_count(), Some(32));
        assert_eq!(Primitive::from_u32(7).vertex_count(), Some(6));
        assert_eq!(Primitive::from_u32(0).vertex_count(), None);
    }
}
