//! Parser for DXBC resource definition chunks (`RDEF`/`RD11`).
//!
//! The chunk describes constant buffers (with their variables and packed type
//! descriptions) and the resources bound to each shader register slot. All
//! sub-records are reached through offsets relative to the chunk start.

use crate::fourcc::{FourCC, FOURCC_RD11};
use crate::reader::{
    read_bytes, read_cstring, read_u16_le, read_u32_le, reserve_vec, table_range,
};
use crate::DxbcError;

const RDEF_HEADER_LEN: usize = 28;
const RD11_HEADER_LEN: usize = 56;
const RESOURCE_BINDING_LEN: usize = 32;
const RESOURCE_BINDING_LEN_SM51: usize = 40;
const CONSTANT_BUFFER_LEN: usize = 24;
const VARIABLE_LEN: usize = 24;
const VARIABLE_LEN_SM5: usize = 40;
const TYPE_LEN: usize = 16;
const TYPE_LEN_SM5: usize = 36;
const MEMBER_LEN: usize = 12;
const MAX_TYPE_DEPTH: usize = 32;

/// Program type stored in the high half of the `RDEF` target word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RdefProgramType {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
    Other(u16),
}

impl RdefProgramType {
    fn from_u16(v: u16) -> Self {
        match v {
            0xfffe => RdefProgramType::Vertex,
            0xffff => RdefProgramType::Pixel,
            0x4753 => RdefProgramType::Geometry,
            0x4853 => RdefProgramType::Hull,
            0x4453 => RdefProgramType::Domain,
            0x4353 => RdefProgramType::Compute,
            other => RdefProgramType::Other(other),
        }
    }
}

/// Compilation target recorded in the chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RdefTarget {
    pub major: u8,
    pub minor: u8,
    pub program_type: RdefProgramType,
}

impl RdefTarget {
    /// Decodes the packed target word (minor in bits 0-7, major in bits 8-15,
    /// program type in bits 16-31).
    pub fn from_u32(raw: u32) -> Self {
        Self {
            minor: (raw & 0xff) as u8,
            major: ((raw >> 8) & 0xff) as u8,
            program_type: RdefProgramType::from_u16((raw >> 16) as u16),
        }
    }
}

/// Kind of resource bound to a register slot (`D3D_SHADER_INPUT_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ShaderInputType {
    ConstantBuffer,
    TextureBuffer,
    Texture,
    Sampler,
    UavTyped,
    Structured,
    UavStructured,
    ByteAddress,
    UavByteAddress,
    UavAppendStructured,
    UavConsumeStructured,
    UavStructuredWithCounter,
    Other(u32),
}

impl ShaderInputType {
    /// Decodes a raw `D3D_SHADER_INPUT_TYPE`.
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => ShaderInputType::ConstantBuffer,
            1 => ShaderInputType::TextureBuffer,
            2 => ShaderInputType::Texture,
            3 => ShaderInputType::Sampler,
            4 => ShaderInputType::UavTyped,
            5 => ShaderInputType::Structured,
            6 => ShaderInputType::UavStructured,
            7 => ShaderInputType::ByteAddress,
            8 => ShaderInputType::UavByteAddress,
            9 => ShaderInputType::UavAppendStructured,
            10 => ShaderInputType::UavConsumeStructured,
            11 => ShaderInputType::UavStructuredWithCounter,
            other => ShaderInputType::Other(other),
        }
    }

    /// Register file the resource is bound in (`b`, `t`, `s` or `u`).
    pub fn register_class(self) -> RegisterClass {
        match self {
            ShaderInputType::ConstantBuffer => RegisterClass::ConstantBuffer,
            ShaderInputType::Sampler => RegisterClass::Sampler,
            ShaderInputType::UavTyped
            | ShaderInputType::UavStructured
            | ShaderInputType::UavByteAddress
            | ShaderInputType::UavAppendStructured
            | ShaderInputType::UavConsumeStructured
            | ShaderInputType::UavStructuredWithCounter => RegisterClass::Uav,
            ShaderInputType::TextureBuffer
            | ShaderInputType::Texture
            | ShaderInputType::Structured
            | ShaderInputType::ByteAddress
            | ShaderInputType::Other(_) => RegisterClass::ShaderResource,
        }
    }
}

/// HLSL register file a binding lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RegisterClass {
    /// `b#`
    ConstantBuffer,
    /// `t#`
    ShaderResource,
    /// `s#`
    Sampler,
    /// `u#`
    Uav,
}

/// Return type of a typed resource (`D3D_RESOURCE_RETURN_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ResourceReturnType {
    None,
    Unorm,
    Snorm,
    Sint,
    Uint,
    Float,
    Mixed,
    Double,
    Continued,
    Other(u32),
}

impl ResourceReturnType {
    /// Decodes a raw return type value.
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => ResourceReturnType::None,
            1 => ResourceReturnType::Unorm,
            2 => ResourceReturnType::Snorm,
            3 => ResourceReturnType::Sint,
            4 => ResourceReturnType::Uint,
            5 => ResourceReturnType::Float,
            6 => ResourceReturnType::Mixed,
            7 => ResourceReturnType::Double,
            8 => ResourceReturnType::Continued,
            other => ResourceReturnType::Other(other),
        }
    }
}

/// Shader resource view dimension (`D3D_SRV_DIMENSION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SrvDimension {
    Unknown,
    Buffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMs,
    Texture2DMsArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    BufferEx,
    Other(u32),
}

impl SrvDimension {
    /// Decodes a raw dimension value.
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => SrvDimension::Unknown,
            1 => SrvDimension::Buffer,
            2 => SrvDimension::Texture1D,
            3 => SrvDimension::Texture1DArray,
            4 => SrvDimension::Texture2D,
            5 => SrvDimension::Texture2DArray,
            6 => SrvDimension::Texture2DMs,
            7 => SrvDimension::Texture2DMsArray,
            8 => SrvDimension::Texture3D,
            9 => SrvDimension::TextureCube,
            10 => SrvDimension::TextureCubeArray,
            11 => SrvDimension::BufferEx,
            other => SrvDimension::Other(other),
        }
    }
}

/// Kind of a constant buffer record (`D3D_CBUFFER_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CbufferKind {
    Cbuffer,
    Tbuffer,
    InterfacePointers,
    ResourceBindInfo,
    Other(u32),
}

impl CbufferKind {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => CbufferKind::Cbuffer,
            1 => CbufferKind::Tbuffer,
            2 => CbufferKind::InterfacePointers,
            3 => CbufferKind::ResourceBindInfo,
            other => CbufferKind::Other(other),
        }
    }
}

/// Class of a variable type (`D3D_SHADER_VARIABLE_CLASS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VariableClass {
    Scalar,
    Vector,
    /// Row-major matrix: each register holds one row.
    MatrixRows,
    /// Column-major matrix: each register holds one column.
    MatrixColumns,
    Object,
    Struct,
    InterfaceClass,
    InterfacePointer,
    Other(u16),
}

impl VariableClass {
    /// Decodes a raw class value.
    pub fn from_u16(v: u16) -> Self {
        match v {
            0 => VariableClass::Scalar,
            1 => VariableClass::Vector,
            2 => VariableClass::MatrixRows,
            3 => VariableClass::MatrixColumns,
            4 => VariableClass::Object,
            5 => VariableClass::Struct,
            6 => VariableClass::InterfaceClass,
            7 => VariableClass::InterfacePointer,
            other => VariableClass::Other(other),
        }
    }

    /// Returns the raw value.
    pub fn to_u16(self) -> u16 {
        match self {
            VariableClass::Scalar => 0,
            VariableClass::Vector => 1,
            VariableClass::MatrixRows => 2,
            VariableClass::MatrixColumns => 3,
            VariableClass::Object => 4,
            VariableClass::Struct => 5,
            VariableClass::InterfaceClass => 6,
            VariableClass::InterfacePointer => 7,
            VariableClass::Other(v) => v,
        }
    }
}

/// Base type of a variable (`D3D_SHADER_VARIABLE_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VariableType {
    Void,
    Bool,
    Int,
    Float,
    String,
    Texture,
    Sampler,
    Uint,
    Uint8,
    Double,
    Other(u16),
}

impl VariableType {
    /// Decodes a raw type value.
    pub fn from_u16(v: u16) -> Self {
        match v {
            0 => VariableType::Void,
            1 => VariableType::Bool,
            2 => VariableType::Int,
            3 => VariableType::Float,
            4 => VariableType::String,
            5..=9 => VariableType::Texture,
            10 => VariableType::Sampler,
            19 => VariableType::Uint,
            20 => VariableType::Uint8,
            39 => VariableType::Double,
            other => VariableType::Other(other),
        }
    }

    /// Returns the raw value (`Texture` maps to the generic texture type).
    pub fn to_u16(self) -> u16 {
        match self {
            VariableType::Void => 0,
            VariableType::Bool => 1,
            VariableType::Int => 2,
            VariableType::Float => 3,
            VariableType::String => 4,
            VariableType::Texture => 5,
            VariableType::Sampler => 10,
            VariableType::Uint => 19,
            VariableType::Uint8 => 20,
            VariableType::Double => 39,
            VariableType::Other(v) => v,
        }
    }
}

/// A parsed `RDEF` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RdefChunk {
    pub target: RdefTarget,
    pub flags: u32,
    /// Compiler identification string, if present.
    pub creator: Option<String>,
    /// Number of interface slots (SM5 only).
    pub interface_slot_count: Option<u32>,
    pub constant_buffers: Vec<RdefConstantBuffer>,
    pub bound_resources: Vec<RdefResourceBinding>,
}

impl RdefChunk {
    /// Finds the constant buffer bound at `b{slot}`.
    pub fn constant_buffer_at(&self, slot: u32) -> Option<&RdefConstantBuffer> {
        self.constant_buffers
            .iter()
            .find(|cb| cb.kind == CbufferKind::Cbuffer && cb.bind_point == Some(slot))
    }

    /// Finds the binding covering `slot` in the given register file.
    pub fn resource_at(&self, class: RegisterClass, slot: u32) -> Option<&RdefResourceBinding> {
        self.bound_resources.iter().find(|r| {
            r.input_type.register_class() == class
                && slot >= r.bind_point
                && slot - r.bind_point < r.bind_count.max(1)
        })
    }
}

/// A bound resource (`D3D11_SHADER_INPUT_BIND_DESC`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RdefResourceBinding {
    pub name: String,
    pub input_type: ShaderInputType,
    pub return_type: ResourceReturnType,
    pub dimension: SrvDimension,
    pub sample_count: u32,
    pub bind_point: u32,
    pub bind_count: u32,
    pub flags: u32,
    /// Register space (SM5.1 only, otherwise 0).
    pub space: u32,
}

impl RdefResourceBinding {
    /// `D3D_SIF_COMPARISON_SAMPLER`.
    pub fn is_comparison_sampler(&self) -> bool {
        self.input_type == ShaderInputType::Sampler && (self.flags & 0x2) != 0
    }
}

/// A constant buffer and its variables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RdefConstantBuffer {
    pub name: String,
    pub kind: CbufferKind,
    pub flags: u32,
    /// Declared size in bytes.
    pub size: u32,
    /// `b#` register, taken from the binding with the same name.
    pub bind_point: Option<u32>,
    /// Variables; sorted by start offset for `cbuffer` kind.
    pub variables: Vec<RdefVariable>,
}

/// A variable inside a constant buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RdefVariable {
    pub name: String,
    pub start_offset: u32,
    pub size: u32,
    pub flags: u32,
    pub ty: RdefType,
    /// Default value bytes, when the compiler recorded one.
    pub default_value: Option<Vec<u8>>,
    /// First texture slot and count (SM5 layouts only).
    pub texture_slots: Option<(u32, u32)>,
    /// First sampler slot and count (SM5 layouts only).
    pub sampler_slots: Option<(u32, u32)>,
}

impl RdefVariable {
    /// `D3D_SVF_USED`: the compiler saw a reference to this variable.
    pub fn is_used_by_compiler(&self) -> bool {
        (self.flags & 0x2) != 0
    }

    /// Byte range covered by the variable.
    pub fn byte_range(&self) -> core::ops::Range<u32> {
        self.start_offset..self.start_offset.saturating_add(self.size)
    }
}

/// A packed variable type description.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RdefType {
    pub class: VariableClass,
    pub base: VariableType,
    pub rows: u16,
    pub columns: u16,
    /// Array length; 0 means "not an array".
    pub elements: u16,
    pub members: Vec<RdefStructMember>,
    /// Type name (SM5 layouts only).
    pub name: Option<String>,
}

impl RdefType {
    /// `true` for both matrix packings.
    pub fn is_matrix(&self) -> bool {
        matches!(
            self.class,
            VariableClass::MatrixRows | VariableClass::MatrixColumns
        )
    }

    /// `true` if the matrix stores one row per register.
    pub fn is_row_major(&self) -> bool {
        self.class == VariableClass::MatrixRows
    }

    /// Number of 16-byte registers one array element occupies.
    pub fn registers_per_element(&self) -> u32 {
        match self.class {
            VariableClass::MatrixRows => u32::from(self.rows.max(1)),
            VariableClass::MatrixColumns => u32::from(self.columns.max(1)),
            _ => 1,
        }
    }
}

/// A member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RdefStructMember {
    pub name: String,
    /// Byte offset relative to the start of the struct.
    pub offset: u32,
    pub ty: RdefType,
}

#[derive(Clone, Copy)]
struct RecordSizes {
    resource: usize,
    variable: usize,
    ty: usize,
}

/// Parses an `RDEF` chunk payload.
pub fn parse_rdef_chunk(bytes: &[u8]) -> Result<RdefChunk, DxbcError> {
    if bytes.len() < RDEF_HEADER_LEN {
        return Err(DxbcError::out_of_bounds(format!(
            "RDEF chunk is truncated: need {RDEF_HEADER_LEN} bytes for header, got {}",
            bytes.len()
        )));
    }

    let cb_count = read_u32_le(bytes, 0, "constant_buffer_count")?;
    let cb_offset = read_u32_le(bytes, 4, "constant_buffer_offset")?;
    let rb_count = read_u32_le(bytes, 8, "resource_count")?;
    let rb_offset = read_u32_le(bytes, 12, "resource_offset")?;
    let target = RdefTarget::from_u32(read_u32_le(bytes, 16, "target")?);
    let flags = read_u32_le(bytes, 20, "flags")?;
    let creator_offset = read_u32_le(bytes, 24, "creator_offset")? as usize;

    let mut sizes = RecordSizes {
        resource: if target.major > 5 || (target.major == 5 && target.minor >= 1) {
            RESOURCE_BINDING_LEN_SM51
        } else {
            RESOURCE_BINDING_LEN
        },
        variable: if target.major >= 5 {
            VARIABLE_LEN_SM5
        } else {
            VARIABLE_LEN
        },
        ty: if target.major >= 5 {
            TYPE_LEN_SM5
        } else {
            TYPE_LEN
        },
    };

    let mut interface_slot_count = None;
    if target.major >= 5 && bytes.len() >= RD11_HEADER_LEN {
        let tag = read_bytes(bytes, 28, 4, "RD11 tag")?;
        if tag == FOURCC_RD11.0 {
            let variable_len = read_u32_le(bytes, 40, "variable_desc_size")? as usize;
            if variable_len != VARIABLE_LEN && variable_len != VARIABLE_LEN_SM5 {
                return Err(DxbcError::invalid_chunk(format!(
                    "unsupported variable record size {variable_len}"
                )));
            }
            sizes.variable = variable_len;
            interface_slot_count = Some(read_u32_le(bytes, 52, "interface_slot_count")?);
        }
    }

    let creator = if creator_offset == 0 {
        None
    } else {
        Some(read_cstring(bytes, creator_offset, "creator")?.to_owned())
    };

    let rb_table = table_range(bytes, rb_offset, rb_count, sizes.resource, "resource binding")?;
    let mut bound_resources = reserve_vec(rb_count as usize, "resource binding")?;
    for i in 0..rb_count as usize {
        let base = rb_table.start + i * sizes.resource;
        bound_resources.push(parse_resource_binding(bytes, base, sizes)
            .map_err(|e| e.within(format_args!("resource binding {i}")))?);
    }

    let cb_table = table_range(bytes, cb_offset, cb_count, CONSTANT_BUFFER_LEN, "constant buffer")?;
    let mut constant_buffers = reserve_vec(cb_count as usize, "constant buffer")?;
    for i in 0..cb_count as usize {
        let base = cb_table.start + i * CONSTANT_BUFFER_LEN;
        let mut cb = parse_constant_buffer(bytes, base, sizes)
            .map_err(|e| e.within(format_args!("constant buffer {i}")))?;
        cb.bind_point = bound_resources
            .iter()
            .find(|r| {
                matches!(
                    r.input_type,
                    ShaderInputType::ConstantBuffer | ShaderInputType::TextureBuffer
                ) && r.name == cb.name
            })
            .map(|r| r.bind_point);
        constant_buffers.push(cb);
    }

    Ok(RdefChunk {
        target,
        flags,
        creator,
        interface_slot_count,
        constant_buffers,
        bound_resources,
    })
}

/// Parses an `RDEF` chunk, reporting the tag it was stored under on failure.
pub fn parse_rdef_chunk_with_fourcc(fourcc: FourCC, bytes: &[u8]) -> Result<RdefChunk, DxbcError> {
    parse_rdef_chunk(bytes).map_err(|e| e.within(format_args!("{fourcc} chunk")))
}

fn parse_resource_binding(
    bytes: &[u8],
    base: usize,
    sizes: RecordSizes,
) -> Result<RdefResourceBinding, DxbcError> {
    let name_offset = read_u32_le(bytes, base, "name_offset")? as usize;
    let space = if sizes.resource == RESOURCE_BINDING_LEN_SM51 {
        read_u32_le(bytes, base + 32, "space")?
    } else {
        0
    };
    Ok(RdefResourceBinding {
        name: read_cstring(bytes, name_offset, "resource name")?.to_owned(),
        input_type: ShaderInputType::from_u32(read_u32_le(bytes, base + 4, "input_type")?),
        return_type: ResourceReturnType::from_u32(read_u32_le(bytes, base + 8, "return_type")?),
        dimension: SrvDimension::from_u32(read_u32_le(bytes, base + 12, "dimension")?),
        sample_count: read_u32_le(bytes, base + 16, "sample_count")?,
        bind_point: read_u32_le(bytes, base + 20, "bind_point")?,
        bind_count: read_u32_le(bytes, base + 24, "bind_count")?,
        flags: read_u32_le(bytes, base + 28, "flags")?,
        space,
    })
}

fn parse_constant_buffer(
    bytes: &[u8],
    base: usize,
    sizes: RecordSizes,
) -> Result<RdefConstantBuffer, DxbcError> {
    let name_offset = read_u32_le(bytes, base, "name_offset")? as usize;
    let name = read_cstring(bytes, name_offset, "constant buffer name")?.to_owned();
    let var_count = read_u32_le(bytes, base + 4, "variable_count")?;
    let var_offset = read_u32_le(bytes, base + 8, "variable_offset")?;
    let size = read_u32_le(bytes, base + 12, "size")?;
    let flags = read_u32_le(bytes, base + 16, "flags")?;
    let kind = CbufferKind::from_u32(read_u32_le(bytes, base + 20, "kind")?);

    let var_table = table_range(bytes, var_offset, var_count, sizes.variable, "variable")?;
    let mut variables = reserve_vec(var_count as usize, "variable")?;
    for i in 0..var_count as usize {
        let var_base = var_table.start + i * sizes.variable;
        let var = parse_variable(bytes, var_base, sizes)
            .map_err(|e| e.within(format_args!("{name} variable {i}")))?;
        if matches!(kind, CbufferKind::Cbuffer | CbufferKind::Tbuffer)
            && var.byte_range().end > size
        {
            return Err(DxbcError::invalid_chunk(format!(
                "{name} variable {} covers bytes {:?} outside buffer size {size}",
                var.name,
                var.byte_range()
            )));
        }
        variables.push(var);
    }

    if kind == CbufferKind::Cbuffer {
        variables.sort_by_key(|v: &RdefVariable| v.start_offset);
    }

    Ok(RdefConstantBuffer {
        name,
        kind,
        flags,
        size,
        bind_point: None,
        variables,
    })
}

fn parse_variable(
    bytes: &[u8],
    base: usize,
    sizes: RecordSizes,
) -> Result<RdefVariable, DxbcError> {
    let name_offset = read_u32_le(bytes, base, "name_offset")? as usize;
    let start_offset = read_u32_le(bytes, base + 4, "start_offset")?;
    let size = read_u32_le(bytes, base + 8, "size")?;
    let flags = read_u32_le(bytes, base + 12, "flags")?;
    let type_offset = read_u32_le(bytes, base + 16, "type_offset")? as usize;
    let default_offset = read_u32_le(bytes, base + 20, "default_value_offset")? as usize;

    let default_value = if default_offset == 0 {
        None
    } else {
        Some(read_bytes(bytes, default_offset, size as usize, "default value")?.to_vec())
    };

    let (texture_slots, sampler_slots) = if sizes.variable == VARIABLE_LEN_SM5 {
        (
            Some((
                read_u32_le(bytes, base + 24, "start_texture")?,
                read_u32_le(bytes, base + 28, "texture_size")?,
            )),
            Some((
                read_u32_le(bytes, base + 32, "start_sampler")?,
                read_u32_le(bytes, base + 36, "sampler_size")?,
            )),
        )
    } else {
        (None, None)
    };

    Ok(RdefVariable {
        name: read_cstring(bytes, name_offset, "variable name")?.to_owned(),
        start_offset,
        size,
        flags,
        ty: parse_type(bytes, type_offset, sizes, 0)?,
        default_value,
        texture_slots,
        sampler_slots,
    })
}

fn parse_type(
    bytes: &[u8],
    offset: usize,
    sizes: RecordSizes,
    depth: usize,
) -> Result<RdefType, DxbcError> {
    if depth >= MAX_TYPE_DEPTH {
        return Err(DxbcError::invalid_chunk(format!(
            "type nesting exceeds {MAX_TYPE_DEPTH} levels"
        )));
    }
    read_bytes(bytes, offset, TYPE_LEN, "type description")?;

    let class = VariableClass::from_u16(read_u16_le(bytes, offset, "type class")?);
    let base = VariableType::from_u16(read_u16_le(bytes, offset + 2, "type base")?);
    let rows = read_u16_le(bytes, offset + 4, "type rows")?;
    let columns = read_u16_le(bytes, offset + 6, "type columns")?;
    let elements = read_u16_le(bytes, offset + 8, "type elements")?;
    let member_count = read_u16_le(bytes, offset + 10, "type member count")?;
    let member_offset = read_u32_le(bytes, offset + 12, "type member offset")?;

    let name = if sizes.ty == TYPE_LEN_SM5 && offset + TYPE_LEN_SM5 <= bytes.len() {
        match read_u32_le(bytes, offset + 32, "type name offset")? as usize {
            0 => None,
            name_offset => Some(read_cstring(bytes, name_offset, "type name")?.to_owned()),
        }
    } else {
        None
    };

    let mut members = Vec::new();
    if member_count > 0 {
        let table = table_range(
            bytes,
            member_offset,
            u32::from(member_count),
            MEMBER_LEN,
            "struct member",
        )?;
        members = reserve_vec(usize::from(member_count), "struct member")?;
        for i in 0..usize::from(member_count) {
            let m = table.start + i * MEMBER_LEN;
            let name_offset = read_u32_le(bytes, m, "member name offset")? as usize;
            let type_offset = read_u32_le(bytes, m + 4, "member type offset")? as usize;
            members.push(RdefStructMember {
                name: read_cstring(bytes, name_offset, "member name")?.to_owned(),
                offset: read_u32_le(bytes, m + 8, "member offset")?,
                ty: parse_type(bytes, type_offset, sizes, depth + 1)?,
            });
        }
    }

    Ok(RdefType {
        class,
        base,
        rows,
        columns,
        elements,
        members,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_word_decodes_major_minor_and_program() {
        let t = RdefTarget::from_u32(0xfffe_0500);
        assert_eq!(t.major, 5);
        assert_eq!(t.minor, 0);
        assert_eq!(t.program_type, RdefProgramType::Vertex);
        assert_eq!(
            RdefTarget::from_u32(0x4353_0500).program_type,
            RdefProgramType::Compute
        );
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = parse_rdef_chunk(&[0u8; 12]).unwrap_err();
        assert!(matches!(err, DxbcError::TruncatedData { .. }), "{err}");
        assert!(err.context().contains("truncated"), "{err}");
    }

    #[test]
    fn self_referential_struct_hits_depth_limit() {
        // A struct type whose only member points back at the type itself.
        let mut bytes = vec![0u8; 28];
        let type_offset = bytes.len() as u32;
        for v in [5u16, 0, 1, 1, 0, 1] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let member_offset = type_offset + 16;
        bytes.extend_from_slice(&member_offset.to_le_bytes());
        let name_offset = member_offset + 12;
        bytes.extend_from_slice(&name_offset.to_le_bytes());
        bytes.extend_from_slice(&type_offset.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"m\0\0\0");

        let sizes = RecordSizes {
            resource: RESOURCE_BINDING_LEN,
            variable: VARIABLE_LEN,
            ty: TYPE_LEN,
        };
        let err = parse_type(&bytes, type_offset as usize, sizes, 0).unwrap_err();
        assert!(err.context().contains("nesting"), "{err}");
    }

    #[test]
    fn resource_lookup_honours_bind_count() {
        let rdef = RdefChunk {
            target: RdefTarget::from_u32(0xffff_0400),
            flags: 0,
            creator: None,
            interface_slot_count: None,
            constant_buffers: Vec::new(),
            bound_resources: vec![RdefResourceBinding {
                name: "textures".into(),
                input_type: ShaderInputType::Texture,
                return_type: ResourceReturnType::Float,
                dimension: SrvDimension::Texture2D,
                sample_count: 0,
                bind_point: 2,
                bind_count: 3,
                flags: 0,
                space: 0,
            }],
        };
        assert!(rdef.resource_at(RegisterClass::ShaderResource, 4).is_some());
        assert!(rdef.resource_at(RegisterClass::ShaderResource, 5).is_none());
        assert!(rdef.resource_at(RegisterClass::Sampler, 2).is_none());
    }
}
