use core::fmt;

/// A four-character code identifying a `DXBC` chunk (`SHDR`, `RDEF`, ...).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

/// Container magic.
pub const FOURCC_DXBC: FourCC = FourCC(*b"DXBC");
/// SM4 shader bytecode.
pub const FOURCC_SHDR: FourCC = FourCC(*b"SHDR");
/// SM5 shader bytecode.
pub const FOURCC_SHEX: FourCC = FourCC(*b"SHEX");
/// Resource definitions.
pub const FOURCC_RDEF: FourCC = FourCC(*b"RDEF");
/// Alternate spelling of the resource definition chunk.
pub const FOURCC_RD11: FourCC = FourCC(*b"RD11");
/// Input signature, 24-byte records.
pub const FOURCC_ISGN: FourCC = FourCC(*b"ISGN");
/// Input signature, 32-byte records.
pub const FOURCC_ISG1: FourCC = FourCC(*b"ISG1");
/// Output signature, 24-byte records.
pub const FOURCC_OSGN: FourCC = FourCC(*b"OSGN");
/// Output signature with a leading stream index, 28-byte records.
pub const FOURCC_OSG5: FourCC = FourCC(*b"OSG5");
/// Output signature, 32-byte records.
pub const FOURCC_OSG1: FourCC = FourCC(*b"OSG1");
/// Patch-constant signature, 24-byte records.
pub const FOURCC_PCSG: FourCC = FourCC(*b"PCSG");
/// Patch-constant signature, 32-byte records.
pub const FOURCC_PSG1: FourCC = FourCC(*b"PSG1");

impl FourCC {
    /// Builds a tag from its ASCII spelling, e.g. `FourCC::new(b"SHEX")`.
    pub const fn new(tag: &[u8; 4]) -> Self {
        Self(*tag)
    }

    /// Returns the tag as text, if it is ASCII.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.is_ascii() {
            core::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') => f.write_str(s),
            _ => write!(f, "0x{:08x}", u32::from_le_bytes(self.0)),
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC(\"{self}\")")
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_ascii_tags_verbatim() {
        assert_eq!(FOURCC_SHEX.to_string(), "SHEX");
        assert_eq!(format!("{:?}", FOURCC_OSG5), "FourCC(\"OSG5\")");
    }

    #[test]
    fn displays_binary_tags_as_hex() {
        assert_eq!(FourCC([0, 1, 2, 0xff]).to_string(), "0xff020100");
    }
}
