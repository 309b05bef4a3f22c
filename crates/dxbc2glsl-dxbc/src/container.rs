use core::fmt;

use tracing::{debug, trace};

use crate::error::DxbcError;
use crate::fourcc::{
    FourCC, FOURCC_DXBC, FOURCC_ISG1, FOURCC_ISGN, FOURCC_OSG1, FOURCC_OSG5, FOURCC_OSGN,
    FOURCC_PCSG, FOURCC_PSG1, FOURCC_RD11, FOURCC_RDEF, FOURCC_SHDR, FOURCC_SHEX,
};
use crate::rdef::{parse_rdef_chunk_with_fourcc, RdefChunk};
use crate::signature::{parse_signature_chunk_with_fourcc, SignatureChunk};

const DXBC_HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4; // magic + checksum + version + total_size + chunk_count
// Real containers carry a handful of chunks; the cap keeps hostile offset
// tables from turning validation into a multi-megabyte walk.
const MAX_DXBC_CHUNK_COUNT: u32 = 4096;

/// The fixed header of a `DXBC` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxbcHeader {
    /// Must be [`FOURCC_DXBC`].
    pub magic: FourCC,
    /// The checksum stored in the container header. Opaque to the parser.
    pub checksum: [u8; 16],
    /// Container format version (normally 1).
    pub version: u32,
    /// Declared total size, in bytes, of this `DXBC` container.
    pub total_size: u32,
    /// Number of chunk offsets following the header.
    pub chunk_count: u32,
}

/// A single chunk within a `DXBC` container.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// The chunk identifier (e.g. `SHDR`, `SHEX`, `RDEF`).
    pub fourcc: FourCC,
    /// Byte offset of the payload (not the chunk header) inside the container.
    pub offset: u32,
    /// Raw chunk payload bytes.
    pub data: &'a [u8],
}

impl fmt::Debug for DxbcChunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DxbcChunk")
            .field("fourcc", &self.fourcc)
            .field("offset", &self.offset)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Which signature a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    /// Stage inputs.
    Input,
    /// Stage outputs.
    Output,
    /// Hull/domain patch constants.
    PatchConstant,
}

impl SignatureKind {
    /// Chunk tags holding this signature, in lookup order.
    ///
    /// Newer compilers emit the wider record layouts; the first tag present
    /// in the container wins even if an older spelling is also present.
    pub fn fourccs(self) -> &'static [FourCC] {
        match self {
            SignatureKind::Input => &[FOURCC_ISG1, FOURCC_ISGN],
            SignatureKind::Output => &[FOURCC_OSG1, FOURCC_OSG5, FOURCC_OSGN],
            SignatureKind::PatchConstant => &[FOURCC_PSG1, FOURCC_PCSG],
        }
    }
}

/// A parsed `DXBC` container.
///
/// Parsing is strict about bounds: every offset and size is validated to ensure
/// it stays within the container's declared `total_size`.
#[derive(Debug, Clone)]
pub struct DxbcFile<'a> {
    bytes: &'a [u8],
    header: DxbcHeader,
    chunk_offsets: &'a [u8],
}

impl<'a> DxbcFile<'a> {
    /// Parses a `DXBC` container from `bytes`.
    ///
    /// The input is treated as **untrusted**: this function validates all
    /// offsets/sizes and never panics on malformed data.
    pub fn parse(bytes: &'a [u8]) -> Result<DxbcFile<'a>, DxbcError> {
        let magic_len = bytes.len().min(4);
        if bytes[..magic_len] != FOURCC_DXBC.0[..magic_len] || magic_len < 4 {
            return Err(DxbcError::malformed_header(format!(
                "missing {FOURCC_DXBC} magic (buffer length {})",
                bytes.len()
            )));
        }
        if bytes.len() < DXBC_HEADER_LEN {
            return Err(DxbcError::out_of_bounds(format!(
                "need at least {DXBC_HEADER_LEN} bytes for the header, got {}",
                bytes.len()
            )));
        }

        let magic = read_fourcc(bytes, 0).map_err(|e| {
            DxbcError::malformed_header(format!("failed to read magic: {}", e.context()))
        })?;
        let checksum = read_array_16(bytes, 4).map_err(|e| {
            DxbcError::malformed_header(format!("failed to read checksum: {}", e.context()))
        })?;
        let version = read_u32_le(bytes, 20).map_err(|e| {
            DxbcError::malformed_header(format!("failed to read version: {}", e.context()))
        })?;
        let total_size = read_u32_le(bytes, 24).map_err(|e| {
            DxbcError::malformed_header(format!("failed to read total_size: {}", e.context()))
        })?;
        let chunk_count = read_u32_le(bytes, 28).map_err(|e| {
            DxbcError::malformed_header(format!("failed to read chunk_count: {}", e.context()))
        })?;
        if chunk_count > MAX_DXBC_CHUNK_COUNT {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk_count {chunk_count} exceeds maximum {MAX_DXBC_CHUNK_COUNT}"
            )));
        }

        if total_size < DXBC_HEADER_LEN as u32 {
            return Err(DxbcError::malformed_header(format!(
                "total_size {total_size} is smaller than header size {DXBC_HEADER_LEN}"
            )));
        }

        let total_size_usize = total_size as usize;
        if total_size_usize > bytes.len() {
            return Err(DxbcError::out_of_bounds(format!(
                "total_size {total_size} exceeds buffer length {}",
                bytes.len()
            )));
        }

        let bytes = &bytes[..total_size_usize];

        let offset_table_len = (chunk_count as usize).checked_mul(4).ok_or_else(|| {
            DxbcError::malformed_offsets("chunk_count overflows offset table size")
        })?;
        let offset_table_end = DXBC_HEADER_LEN
            .checked_add(offset_table_len)
            .ok_or_else(|| {
                DxbcError::malformed_offsets("header size overflows when adding chunk offset table")
            })?;
        if offset_table_end > bytes.len() {
            return Err(DxbcError::out_of_bounds(format!(
                "chunk offset table ends at {offset_table_end}, but total_size is {}",
                bytes.len()
            )));
        }

        let chunk_offsets = &bytes[DXBC_HEADER_LEN..offset_table_end];
        for i in 0..chunk_count as usize {
            let offset_pos_in_file = DXBC_HEADER_LEN + i * 4;
            let chunk_offset = read_u32_le(bytes, offset_pos_in_file).map_err(|e| {
                DxbcError::malformed_offsets(format!(
                    "failed to read chunk offset {i} at file offset {offset_pos_in_file}: {}",
                    e.context()
                ))
            })? as usize;

            if chunk_offset < offset_table_end {
                if chunk_offset < DXBC_HEADER_LEN {
                    return Err(DxbcError::malformed_offsets(format!(
                        "chunk {i} offset {chunk_offset} points into DXBC header (need >= {DXBC_HEADER_LEN})"
                    )));
                }
                return Err(DxbcError::malformed_offsets(format!(
                    "chunk {i} offset {chunk_offset} points into chunk offset table ({DXBC_HEADER_LEN}..{offset_table_end})"
                )));
            }

            let chunk_header_end = chunk_offset.checked_add(8).ok_or_else(|| {
                DxbcError::malformed_offsets(format!(
                    "chunk {i} offset {chunk_offset} overflows when reading header"
                ))
            })?;
            if chunk_header_end > bytes.len() {
                return Err(DxbcError::out_of_bounds(format!(
                    "chunk {i} header at {chunk_offset}..{chunk_header_end} is outside total_size {}",
                    bytes.len()
                )));
            }

            let fourcc = read_fourcc(bytes, chunk_offset).map_err(|e| {
                DxbcError::malformed_offsets(format!(
                    "failed to read chunk {i} fourcc at {chunk_offset}: {}",
                    e.context()
                ))
            })?;
            let chunk_size = read_u32_le(bytes, chunk_offset + 4).map_err(|e| {
                DxbcError::malformed_offsets(format!(
                    "failed to read chunk {i} size at {}: {}",
                    chunk_offset + 4,
                    e.context()
                ))
            })? as usize;

            let data_start = chunk_offset + 8;
            let data_end = data_start.checked_add(chunk_size).ok_or_else(|| {
                DxbcError::malformed_offsets(format!(
                    "chunk {i} size {chunk_size} overflows when computing data range"
                ))
            })?;
            if data_end > bytes.len() {
                return Err(DxbcError::out_of_bounds(format!(
                    "chunk {i} ({fourcc}) data at {data_start}..{data_end} is outside total_size {}",
                    bytes.len()
                )));
            }
            trace!(index = i, %fourcc, offset = data_start, len = chunk_size, "dxbc chunk");
        }

        let header = DxbcHeader {
            magic,
            checksum,
            version,
            total_size,
            chunk_count,
        };

        Ok(DxbcFile {
            bytes,
            header,
            chunk_offsets,
        })
    }

    /// Returns the parsed `DXBC` header.
    pub fn header(&self) -> &DxbcHeader {
        &self.header
    }

    /// Returns the raw bytes covered by the container's declared `total_size`.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterates over all chunks in file order.
    pub fn chunks(&self) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        DxbcChunksIter {
            bytes: self.bytes,
            chunk_offsets: self.chunk_offsets,
            index: 0,
        }
    }

    /// Returns the first chunk matching `fourcc`, if any.
    pub fn get_chunk(&self, fourcc: FourCC) -> Option<DxbcChunk<'a>> {
        self.chunks().find(|chunk| chunk.fourcc == fourcc)
    }

    /// Iterates over all chunks matching `fourcc`, in file order.
    pub fn get_chunks(&self, fourcc: FourCC) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        self.chunks().filter(move |chunk| chunk.fourcc == fourcc)
    }

    /// Returns the first chunk whose tag appears in `tags`, trying the tags in
    /// order (not in file order).
    pub fn get_first_of(&self, tags: &[FourCC]) -> Option<DxbcChunk<'a>> {
        tags.iter().find_map(|tag| self.get_chunk(*tag))
    }

    /// Returns and parses the signature of the requested `kind`, if present.
    ///
    /// Candidate tags are tried in [`SignatureKind::fourccs`] order and the
    /// first one present is parsed. A present but malformed chunk is reported
    /// as an error rather than silently falling back to an older spelling.
    pub fn get_signature(&self, kind: SignatureKind) -> Option<Result<SignatureChunk, DxbcError>> {
        let chunk = self.get_first_of(kind.fourccs())?;
        debug!(?kind, fourcc = %chunk.fourcc, "selected signature chunk");
        Some(
            parse_signature_chunk_with_fourcc(chunk.fourcc, chunk.data)
                .map_err(|e| e.within(format_args!("{} signature chunk", chunk.fourcc))),
        )
    }

    /// Returns and parses the resource definition chunk (`RDEF`, falling back
    /// to `RD11`), if present.
    pub fn get_rdef(&self) -> Option<Result<RdefChunk, DxbcError>> {
        let chunk = self.get_first_of(&[FOURCC_RDEF, FOURCC_RD11])?;
        debug!(fourcc = %chunk.fourcc, "selected resource definition chunk");
        Some(parse_rdef_chunk_with_fourcc(chunk.fourcc, chunk.data))
    }

    /// Returns the shader bytecode chunk, preferring `SHEX` over `SHDR`.
    pub fn find_shader_chunk(&self) -> Option<DxbcChunk<'a>> {
        self.get_first_of(&[FOURCC_SHEX, FOURCC_SHDR])
    }

    /// Returns a human-readable summary of the container and its chunks.
    pub fn debug_summary(&self) -> String {
        let mut out = String::new();
        use core::fmt::Write as _;

        let _ = write!(
            &mut out,
            "{} version={} total_size={} chunk_count={}",
            self.header.magic, self.header.version, self.header.total_size, self.header.chunk_count
        );

        for (idx, chunk) in self.chunks().enumerate() {
            let _ = write!(
                &mut out,
                "\n  [{idx:02}] {} @{} {} bytes",
                chunk.fourcc,
                chunk.offset,
                chunk.data.len()
            );
        }

        out
    }

    /// Computes the checksum (MD5) used by DXBC containers.
    ///
    /// Parsing does **not** fail if the checksum does not match; callers may
    /// opt in to validation by comparing the computed value to
    /// [`DxbcHeader::checksum`].
    #[cfg(feature = "md5")]
    pub fn compute_md5_checksum(&self) -> [u8; 16] {
        let mut ctx = md5::Context::new();
        ctx.consume(&self.bytes[..4]);
        ctx.consume([0u8; 16]);
        ctx.consume(&self.bytes[20..]);
        ctx.compute().0
    }

    /// Returns `true` if the computed checksum matches the header checksum.
    #[cfg(feature = "md5")]
    pub fn checksum_matches(&self) -> bool {
        self.compute_md5_checksum() == self.header.checksum
    }
}

struct DxbcChunksIter<'a> {
    bytes: &'a [u8],
    chunk_offsets: &'a [u8],
    index: usize,
}

impl<'a> Iterator for DxbcChunksIter<'a> {
    type Item = DxbcChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.index.checked_mul(4)?;
        let end = start.checked_add(4)?;
        let offset_bytes = self.chunk_offsets.get(start..end)?;
        let chunk_offset = u32::from_le_bytes(offset_bytes.try_into().ok()?) as usize;

        let header_end = chunk_offset.checked_add(8)?;
        let header = self.bytes.get(chunk_offset..header_end)?;
        let fourcc = FourCC([header[0], header[1], header[2], header[3]]);
        let chunk_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let data_end = header_end.checked_add(chunk_size)?;
        let data = self.bytes.get(header_end..data_end)?;

        self.index = self.index.saturating_add(1);
        Some(DxbcChunk {
            fourcc,
            offset: u32::try_from(header_end).ok()?,
            data,
        })
    }
}

fn read_array_16(bytes: &[u8], offset: usize) -> Result<[u8; 16], DxbcError> {
    let end = offset.checked_add(16).ok_or_else(|| {
        DxbcError::malformed_header("offset overflows when reading 16-byte array")
    })?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        DxbcError::malformed_header(format!(
            "need 16 bytes at {offset}..{end}, but buffer length is {}",
            bytes.len()
        ))
    })?;
    let mut out = [0u8; 16];
    out.copy_from_slice(slice);
    Ok(out)
}

fn read_fourcc(bytes: &[u8], offset: usize) -> Result<FourCC, DxbcError> {
    let end = offset
        .checked_add(4)
        .ok_or_else(|| DxbcError::malformed_header("offset overflows when reading fourcc"))?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        DxbcError::malformed_header(format!(
            "need 4 bytes at {offset}..{end}, but buffer length is {}",
            bytes.len()
        ))
    })?;
    Ok(FourCC([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DxbcError> {
    let end = offset
        .checked_add(4)
        .ok_or_else(|| DxbcError::malformed_header("offset overflows when reading u32"))?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        DxbcError::malformed_header(format!(
            "need 4 bytes at {offset}..{end}, but buffer length is {}",
            bytes.len()
        ))
    })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}
