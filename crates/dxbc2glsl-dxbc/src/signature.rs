//! Parsers for DXBC signature chunks (`ISGN`, `OSGN`, `OSG5`, `PCSG` and the
//! `*SG1` variants).
//!
//! Signature chunks map shader inputs and outputs to semantics and registers.
//! The record layout is selected from the chunk tag; fields a layout lacks are
//! reported as zero.

use crate::fourcc::{FourCC, FOURCC_ISG1, FOURCC_OSG1, FOURCC_OSG5, FOURCC_PSG1};
use crate::reader::{read_cstring, read_u32_le, read_u8, reserve_vec, table_range};
use crate::DxbcError;

const SIGNATURE_HEADER_LEN: usize = 8;

/// On-disk record layout of a signature chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureLayout {
    /// 24-byte records (`ISGN`, `OSGN`, `PCSG`).
    Legacy,
    /// 28-byte records with a leading stream index (`OSG5`).
    Stream,
    /// 32-byte records with stream and minimum precision (`ISG1`, `OSG1`, `PSG1`).
    Extended,
}

impl SignatureLayout {
    /// Picks the record layout for a signature chunk tag.
    pub fn for_fourcc(fourcc: FourCC) -> Self {
        match fourcc {
            FOURCC_OSG5 => SignatureLayout::Stream,
            FOURCC_ISG1 | FOURCC_OSG1 | FOURCC_PSG1 => SignatureLayout::Extended,
            _ => SignatureLayout::Legacy,
        }
    }

    /// Size of one record in bytes.
    pub fn entry_len(self) -> usize {
        match self {
            SignatureLayout::Legacy => 24,
            SignatureLayout::Stream => 28,
            SignatureLayout::Extended => 32,
        }
    }

    // Byte offset of the shared 24-byte field block inside a record.
    fn fields_offset(self) -> usize {
        match self {
            SignatureLayout::Legacy => 0,
            SignatureLayout::Stream | SignatureLayout::Extended => 4,
        }
    }
}

/// System value a signature element is bound to (`D3D_NAME`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SystemValue {
    Undefined,
    Position,
    ClipDistance,
    CullDistance,
    RenderTargetArrayIndex,
    ViewportArrayIndex,
    VertexId,
    PrimitiveId,
    InstanceId,
    IsFrontFace,
    SampleIndex,
    FinalQuadEdgeTessFactor,
    FinalQuadInsideTessFactor,
    FinalTriEdgeTessFactor,
    FinalTriInsideTessFactor,
    FinalLineDetailTessFactor,
    FinalLineDensityTessFactor,
    Target,
    Depth,
    Coverage,
    DepthGreaterEqual,
    DepthLessEqual,
    Other(u32),
}

impl SystemValue {
    /// Decodes a raw `D3D_NAME` value.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => SystemValue::Undefined,
            1 => SystemValue::Position,
            2 => SystemValue::ClipDistance,
            3 => SystemValue::CullDistance,
            4 => SystemValue::RenderTargetArrayIndex,
            5 => SystemValue::ViewportArrayIndex,
            6 => SystemValue::VertexId,
            7 => SystemValue::PrimitiveId,
            8 => SystemValue::InstanceId,
            9 => SystemValue::IsFrontFace,
            10 => SystemValue::SampleIndex,
            11 => SystemValue::FinalQuadEdgeTessFactor,
            12 => SystemValue::FinalQuadInsideTessFactor,
            13 => SystemValue::FinalTriEdgeTessFactor,
            14 => SystemValue::FinalTriInsideTessFactor,
            15 => SystemValue::FinalLineDetailTessFactor,
            16 => SystemValue::FinalLineDensityTessFactor,
            64 => SystemValue::Target,
            65 => SystemValue::Depth,
            66 => SystemValue::Coverage,
            67 => SystemValue::DepthGreaterEqual,
            68 => SystemValue::DepthLessEqual,
            other => SystemValue::Other(other),
        }
    }

    /// Returns the raw `D3D_NAME` value.
    pub fn to_u32(self) -> u32 {
        match self {
            SystemValue::Undefined => 0,
            SystemValue::Position => 1,
            SystemValue::ClipDistance => 2,
            SystemValue::CullDistance => 3,
            SystemValue::RenderTargetArrayIndex => 4,
            SystemValue::ViewportArrayIndex => 5,
            SystemValue::VertexId => 6,
            SystemValue::PrimitiveId => 7,
            SystemValue::InstanceId => 8,
            SystemValue::IsFrontFace => 9,
            SystemValue::SampleIndex => 10,
            SystemValue::FinalQuadEdgeTessFactor => 11,
            SystemValue::FinalQuadInsideTessFactor => 12,
            SystemValue::FinalTriEdgeTessFactor => 13,
            SystemValue::FinalTriInsideTessFactor => 14,
            SystemValue::FinalLineDetailTessFactor => 15,
            SystemValue::FinalLineDensityTessFactor => 16,
            SystemValue::Target => 64,
            SystemValue::Depth => 65,
            SystemValue::Coverage => 66,
            SystemValue::DepthGreaterEqual => 67,
            SystemValue::DepthLessEqual => 68,
            SystemValue::Other(v) => v,
        }
    }

    /// `true` for the tessellation factor system values.
    pub fn is_tess_factor(self) -> bool {
        matches!(
            self,
            SystemValue::FinalQuadEdgeTessFactor
                | SystemValue::FinalQuadInsideTessFactor
                | SystemValue::FinalTriEdgeTessFactor
                | SystemValue::FinalTriInsideTessFactor
                | SystemValue::FinalLineDetailTessFactor
                | SystemValue::FinalLineDensityTessFactor
        )
    }
}

/// Register component type (`D3D_REGISTER_COMPONENT_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ComponentType {
    Unknown,
    Uint32,
    Sint32,
    Float32,
    Other(u32),
}

impl ComponentType {
    /// Decodes a raw `D3D_REGISTER_COMPONENT_TYPE` value.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ComponentType::Unknown,
            1 => ComponentType::Uint32,
            2 => ComponentType::Sint32,
            3 => ComponentType::Float32,
            other => ComponentType::Other(other),
        }
    }

    /// Returns the raw value.
    pub fn to_u32(self) -> u32 {
        match self {
            ComponentType::Unknown => 0,
            ComponentType::Uint32 => 1,
            ComponentType::Sint32 => 2,
            ComponentType::Float32 => 3,
            ComponentType::Other(v) => v,
        }
    }
}

/// A parsed DXBC signature chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SignatureChunk {
    /// Parsed signature entries, in on-disk order.
    pub entries: Vec<SignatureEntry>,
}

impl SignatureChunk {
    /// Entries assigned to `register`, in on-disk order.
    pub fn entries_for_register(&self, register: u32) -> impl Iterator<Item = &SignatureEntry> {
        self.entries.iter().filter(move |e| e.register == register)
    }

    /// Finds an entry by semantic name (case-insensitive) and index.
    pub fn find_semantic(&self, name: &str, index: u32) -> Option<&SignatureEntry> {
        self.entries
            .iter()
            .find(|e| e.semantic_index == index && e.semantic_name.eq_ignore_ascii_case(name))
    }
}

/// A single entry in a DXBC signature chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SignatureEntry {
    /// The semantic name (e.g. `"POSITION"` or `"TEXCOORD"`).
    pub semantic_name: String,
    /// The semantic index (e.g. `0` for `TEXCOORD0`).
    pub semantic_index: u32,
    /// System value this element is bound to.
    pub system_value: SystemValue,
    /// Register component type.
    pub component_type: ComponentType,
    /// Register index assigned by the compiler (`u32::MAX` for elements
    /// without a register, such as `SV_Depth`).
    pub register: u32,
    /// Component presence mask (bit 0 = `.x`).
    pub mask: u8,
    /// Components actually read (inputs) or never written (outputs).
    pub read_write_mask: u8,
    /// Geometry shader output stream; 0 when the layout lacks it.
    pub stream: u32,
    /// Minimum precision hint; 0 when the layout lacks it.
    pub min_precision: u32,
}

impl SignatureEntry {
    /// `true` if the element lives in a numbered register.
    pub fn has_register(&self) -> bool {
        self.register != u32::MAX
    }

    /// Index of the lowest component present in [`Self::mask`].
    pub fn first_component(&self) -> u32 {
        (self.mask & 0xf).trailing_zeros().min(3)
    }

    /// Number of components present in [`Self::mask`].
    pub fn component_count(&self) -> u32 {
        (self.mask & 0xf).count_ones()
    }
}

/// Parses a signature chunk payload using the legacy 24-byte record layout.
pub fn parse_signature_chunk(bytes: &[u8]) -> Result<SignatureChunk, DxbcError> {
    parse_signature_chunk_with_layout(SignatureLayout::Legacy, bytes)
}

/// Parses a signature chunk payload, selecting the record layout from `fourcc`.
pub fn parse_signature_chunk_with_fourcc(
    fourcc: FourCC,
    bytes: &[u8],
) -> Result<SignatureChunk, DxbcError> {
    parse_signature_chunk_with_layout(SignatureLayout::for_fourcc(fourcc), bytes)
}

/// Parses a signature chunk payload with an explicit record layout.
pub fn parse_signature_chunk_with_layout(
    layout: SignatureLayout,
    bytes: &[u8],
) -> Result<SignatureChunk, DxbcError> {
    if bytes.len() < SIGNATURE_HEADER_LEN {
        return Err(DxbcError::out_of_bounds(format!(
            "signature chunk is truncated: need {SIGNATURE_HEADER_LEN} bytes for header, got {}",
            bytes.len()
        )));
    }

    let param_count = read_u32_le(bytes, 0, "param_count")?;
    let param_offset = read_u32_le(bytes, 4, "param_offset")?;

    if param_count == 0 {
        return Ok(SignatureChunk::default());
    }
    if (param_offset as usize) < SIGNATURE_HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "param_offset {param_offset} points into signature header (need >= {SIGNATURE_HEADER_LEN})"
        )));
    }

    let entry_len = layout.entry_len();
    let table = table_range(bytes, param_offset, param_count, entry_len, "signature entry")?;
    let mut entries = reserve_vec(param_count as usize, "signature entry")?;

    for entry_index in 0..param_count as usize {
        let record = table.start + entry_index * entry_len;
        let fields = record + layout.fields_offset();
        let field = |delta: usize, what: &'static str| {
            read_u32_le(bytes, fields + delta, what).map_err(|e| entry_error(entry_index, e))
        };

        let semantic_name_offset = field(0, "semantic_name_offset")? as usize;
        if semantic_name_offset < SIGNATURE_HEADER_LEN || table.contains(&semantic_name_offset) {
            return Err(DxbcError::malformed_chunk(format!(
                "entry {entry_index} semantic_name_offset {semantic_name_offset} points into the signature header or table"
            )));
        }
        let semantic_index = field(4, "semantic_index")?;
        let system_value = SystemValue::from_u32(field(8, "system_value")?);
        let component_type = ComponentType::from_u32(field(12, "component_type")?);
        let register = field(16, "register")?;
        let mask = read_u8(bytes, fields + 20, "mask").map_err(|e| entry_error(entry_index, e))?;
        let read_write_mask = read_u8(bytes, fields + 21, "read_write_mask")
            .map_err(|e| entry_error(entry_index, e))?;

        let (stream, min_precision) = match layout {
            SignatureLayout::Legacy => (0, 0),
            SignatureLayout::Stream => (field_at(bytes, record, entry_index, "stream")?, 0),
            SignatureLayout::Extended => (
                field_at(bytes, record, entry_index, "stream")?,
                field_at(bytes, record + 28, entry_index, "min_precision")?,
            ),
        };

        let semantic_name = read_cstring(bytes, semantic_name_offset, "semantic_name")
            .map_err(|e| entry_error(entry_index, e))?
            .to_owned();

        entries.push(SignatureEntry {
            semantic_name,
            semantic_index,
            system_value,
            component_type,
            register,
            mask,
            read_write_mask,
            stream,
            min_precision,
        });
    }

    Ok(SignatureChunk { entries })
}

fn field_at(
    bytes: &[u8],
    offset: usize,
    entry_index: usize,
    what: &'static str,
) -> Result<u32, DxbcError> {
    read_u32_le(bytes, offset, what).map_err(|e| entry_error(entry_index, e))
}

fn entry_error(entry_index: usize, err: DxbcError) -> DxbcError {
    err.within(format_args!("entry {entry_index}"))
}
