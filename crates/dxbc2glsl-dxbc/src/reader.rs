//! Bounds-checked little-endian field readers shared by the chunk parsers.
//!
//! Reads past the end of a chunk are [`DxbcError::TruncatedData`]; string
//! references that leave the chunk or never terminate are
//! [`DxbcError::MalformedContainer`].

use core::ops::Range;

use crate::DxbcError;

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize, what: &str) -> Result<u32, DxbcError> {
    let slice = read_bytes(bytes, offset, 4, what)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

pub(crate) fn read_u16_le(bytes: &[u8], offset: usize, what: &str) -> Result<u16, DxbcError> {
    let slice = read_bytes(bytes, offset, 2, what)?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

pub(crate) fn read_u8(bytes: &[u8], offset: usize, what: &str) -> Result<u8, DxbcError> {
    bytes.get(offset).copied().ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "need 1 byte for {what} at {offset}, but chunk length is {}",
            bytes.len()
        ))
    })
}

pub(crate) fn read_bytes<'a>(
    bytes: &'a [u8],
    offset: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], DxbcError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| DxbcError::out_of_bounds(format!("{what} offset overflows")))?;
    bytes.get(offset..end).ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "need {len} bytes for {what} at {offset}..{end}, but chunk length is {}",
            bytes.len()
        ))
    })
}

/// Reads a NUL-terminated UTF-8 string starting at `offset`.
pub(crate) fn read_cstring<'a>(
    bytes: &'a [u8],
    offset: usize,
    what: &str,
) -> Result<&'a str, DxbcError> {
    let tail = bytes.get(offset..).ok_or_else(|| {
        DxbcError::malformed_chunk(format!(
            "{what} offset {offset} is outside chunk length {}",
            bytes.len()
        ))
    })?;
    let nul = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        DxbcError::malformed_chunk(format!(
            "{what} at offset {offset} is missing a null terminator"
        ))
    })?;

    core::str::from_utf8(&tail[..nul]).map_err(|_| {
        DxbcError::invalid_chunk(format!("{what} at offset {offset} is not valid UTF-8"))
    })
}

/// Validates that a table of `count` records of `stride` bytes starting at
/// `offset` lies entirely inside `bytes`, and returns its byte range.
///
/// Callers size their allocations from `count` only after this check, so an
/// attacker-controlled count can never exceed what the chunk can hold.
pub(crate) fn table_range(
    bytes: &[u8],
    offset: u32,
    count: u32,
    stride: usize,
    what: &str,
) -> Result<Range<usize>, DxbcError> {
    let start = offset as usize;
    let len = (count as usize)
        .checked_mul(stride)
        .ok_or_else(|| DxbcError::out_of_bounds(format!("{what} count {count} overflows")))?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| DxbcError::out_of_bounds(format!("{what} table end overflows")))?;
    if end > bytes.len() {
        return Err(DxbcError::out_of_bounds(format!(
            "{what} table at {start}..{end} is outside chunk length {}",
            bytes.len()
        )));
    }
    Ok(start..end)
}

/// Allocates a vector for `count` records, failing instead of aborting.
pub(crate) fn reserve_vec<T>(count: usize, what: &str) -> Result<Vec<T>, DxbcError> {
    let mut out = Vec::new();
    out.try_reserve_exact(count).map_err(|_| {
        DxbcError::invalid_chunk(format!("{what} count {count} is too large to allocate"))
    })?;
    Ok(out)
}
