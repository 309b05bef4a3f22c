pub mod decode;
pub mod limits;
pub mod opcode;

use core::fmt;

use dxbc2glsl_dxbc::DxbcFile;

pub use decode::{InstructionIter, Sm4DecodeError, Sm4DecodeErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
    Unknown(u16),
}

impl ShaderStage {
    /// Two-letter profile prefix (`vs`, `ps`, ...).
    pub fn short_name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
            ShaderStage::Geometry => "gs",
            ShaderStage::Hull => "hs",
            ShaderStage::Domain => "ds",
            ShaderStage::Compute => "cs",
            ShaderStage::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Pixel => f.write_str("pixel"),
            ShaderStage::Geometry => f.write_str("geometry"),
            ShaderStage::Hull => f.write_str("hull"),
            ShaderStage::Domain => f.write_str("domain"),
            ShaderStage::Compute => f.write_str("compute"),
            ShaderStage::Unknown(ty) => write!(f, "unknown({ty})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShaderModel {
    pub major: u8,
    pub minor: u8,
}

/// A validated `SHDR`/`SHEX` token stream.
#[derive(Debug, Clone)]
pub struct Sm4Program {
    pub stage: ShaderStage,
    pub model: ShaderModel,
    /// Token stream truncated to the declared length (version + length included).
    pub tokens: Vec<u32>,
}

impl Sm4Program {
    /// Finds the shader chunk (`SHEX` preferred) and parses it.
    ///
    /// Returns `Ok(None)` when the container has no shader chunk.
    pub fn from_dxbc(dxbc: &DxbcFile<'_>) -> Result<Option<Self>, Sm4DecodeError> {
        match dxbc.find_shader_chunk() {
            Some(chunk) => Self::parse(chunk.data).map(Some),
            None => Ok(None),
        }
    }

    /// Parses a shader chunk payload.
    ///
    /// Only the version and length tokens are validated here; instructions are
    /// decoded lazily by [`Sm4Program::instructions`].
    pub fn parse(bytes: &[u8]) -> Result<Self, Sm4DecodeError> {
        if bytes.len() % 4 != 0 {
            return Err(Sm4DecodeError {
                at_dword: bytes.len() / 4,
                kind: Sm4DecodeErrorKind::MisalignedLength { len: bytes.len() },
            });
        }
        let available = bytes.len() / 4;
        if available < 2 {
            return Err(Sm4DecodeError {
                at_dword: available,
                kind: Sm4DecodeErrorKind::UnexpectedEof {
                    wanted: 2,
                    remaining: available,
                },
            });
        }

        let word = |i: usize| {
            u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        let version = word(0);
        let declared = word(1) as usize;
        if declared < 2 || declared > available {
            return Err(Sm4DecodeError {
                at_dword: 1,
                kind: Sm4DecodeErrorKind::InvalidDeclaredLength {
                    declared,
                    available,
                },
            });
        }

        let tokens = (0..declared).map(word).collect();
        let (stage, model) = decode_version_token(version);
        Ok(Self {
            stage,
            model,
            tokens,
        })
    }

    /// Lazily decodes the declarations and instructions after the header.
    pub fn instructions(&self) -> InstructionIter<'_> {
        InstructionIter::new(&self.tokens)
    }
}

pub fn decode_version_token(version: u32) -> (ShaderStage, ShaderModel) {
    // - bits 0..=3: minor version
    // - bits 4..=7: major version
    // - bits 16..=31: program type
    let minor = (version & 0xF) as u8;
    let major = ((version >> 4) & 0xF) as u8;
    let ty = (version >> 16) as u16;

    let stage = match ty {
        0 => ShaderStage::Pixel,
        1 => ShaderStage::Vertex,
        2 => ShaderStage::Geometry,
        3 => ShaderStage::Hull,
        4 => ShaderStage::Domain,
        5 => ShaderStage::Compute,
        other => ShaderStage::Unknown(other),
    };

    (stage, ShaderModel { major, minor })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(tokens: &[u32]) -> Vec<u8> {
        tokens.iter().flat_map(|t| t.to_le_bytes()).collect()
    }

    #[test]
    fn version_token_decodes_stage_and_model() {
        assert_eq!(
            decode_version_token(0x0001_0040),
            (ShaderStage::Vertex, ShaderModel { major: 4, minor: 0 })
        );
        assert_eq!(
            decode_version_token(0x0005_0050).0,
            ShaderStage::Compute
        );
        assert_eq!(decode_version_token(0x0009_0050).0, ShaderStage::Unknown(9));
    }

    #[test]
    fn trailing_tokens_past_declared_length_are_ignored() {
        let program = Sm4Program::parse(&bytes(&[0x50, 2, 0xdead_beef])).unwrap();
        assert_eq!(program.tokens, vec![0x50, 2]);
        assert_eq!(program.stage, ShaderStage::Pixel);
        assert_eq!(program.instructions().count(), 0);
    }

    #[test]
    fn header_errors() {
        let err = Sm4Program::parse(&[0u8; 6]).unwrap_err();
        assert!(matches!(err.kind, Sm4DecodeErrorKind::MisalignedLength { len: 6 }));

        let err = Sm4Program::parse(&bytes(&[0x50])).unwrap_err();
        assert!(matches!(err.kind, Sm4DecodeErrorKind::UnexpectedEof { .. }));

        let err = Sm4Program::parse(&bytes(&[0x50, 5, 0])).unwrap_err();
        assert_eq!(
            err.kind,
            Sm4DecodeErrorKind::InvalidDeclaredLength {
                declared: 5,
                available: 3
            }
        );
    }
}
