//! D3D11 hardware limits on register files and declaration counts.
//!
//! Indices and counts come straight from the token stream and later size
//! GLSL arrays or drive loops in the emitter, so the decoder rejects anything
//! a conforming driver would never accept.

use super::opcode::OperandType;

/// `v#`/`o#` registers, and control points per patch.
pub const MAX_IO_REGISTERS: u32 = 32;
/// `r#` registers, and elements of one `x#` array.
pub const MAX_TEMP_REGISTERS: u32 = 4096;
/// `cb#` slots (14 API slots plus the immediate constant buffer).
pub const MAX_CBUFFER_SLOTS: u32 = 15;
/// 16-byte registers in one constant buffer.
pub const MAX_CBUFFER_REGISTERS: u32 = 4096;
pub const MAX_SRV_SLOTS: u32 = 128;
pub const MAX_SAMPLER_SLOTS: u32 = 16;
pub const MAX_UAV_SLOTS: u32 = 64;
/// Geometry shader output streams.
pub const MAX_STREAMS: u32 = 4;
pub const MAX_GS_INSTANCES: u32 = 32;
pub const MAX_GS_OUTPUT_VERTICES: u32 = 1024;
/// Instances of one hull shader fork or join phase.
pub const MAX_PHASE_INSTANCES: u32 = 32;
pub const MAX_THREADS_PER_GROUP: u32 = 1024;
pub const MAX_THREAD_GROUP_Z: u32 = 64;
/// Thread-group shared memory per shader, in bytes.
pub const MAX_SHARED_MEMORY_BYTES: u32 = 32 * 1024;

/// Exclusive bound of each leading index of an operand of type `ty`.
///
/// Indices past the listed ones (SM5.1 range operands) are not checked.
pub fn index_bounds(ty: OperandType) -> &'static [u32] {
    match ty {
        OperandType::Temp => &[MAX_TEMP_REGISTERS],
        OperandType::IndexableTemp => &[MAX_TEMP_REGISTERS, MAX_TEMP_REGISTERS],
        OperandType::Input
        | OperandType::InputControlPoint
        | OperandType::OutputControlPoint => &[MAX_IO_REGISTERS, MAX_IO_REGISTERS],
        OperandType::Output | OperandType::InputPatchConstant => &[MAX_IO_REGISTERS],
        // `dcl_constantbuffer` stores the size in the second index, so the
        // register bound is inclusive.
        OperandType::ConstantBuffer => &[MAX_CBUFFER_SLOTS, MAX_CBUFFER_REGISTERS + 1],
        OperandType::ImmediateConstantBuffer => &[MAX_CBUFFER_REGISTERS],
        OperandType::Resource => &[MAX_SRV_SLOTS],
        OperandType::Sampler => &[MAX_SAMPLER_SLOTS],
        OperandType::UnorderedAccessView => &[MAX_UAV_SLOTS],
        OperandType::Stream => &[MAX_STREAMS],
        _ => &[],
    }
}

/// Register count of the file addressed by the last index of `ty`, used to
/// bound `dcl_indexRange`.
pub fn register_count(ty: OperandType) -> Option<u32> {
    index_bounds(ty).last().copied()
}
