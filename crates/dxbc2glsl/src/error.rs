use thiserror::Error;

use dxbc2glsl_dxbc::DxbcError;

use crate::glsl::GlslVersion;
use crate::sm4::opcode::Opcode;
use crate::sm4::{ShaderStage, Sm4DecodeError};

/// The GLSL emitter could not express the shader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderTranslateError {
    #[error("instruction #{index} ({}) cannot be translated to GLSL", opcode.name())]
    UnsupportedInstruction { index: usize, opcode: Opcode },
    #[error("GLSL {0} lacks the integer and bit-cast support SM4 shaders need")]
    UnsupportedGlslVersion(GlslVersion),
    #[error("{0} shaders cannot be emitted")]
    UnsupportedStage(ShaderStage),
    #[error("shader references undeclared {kind} slot {slot}")]
    MissingResource { kind: &'static str, slot: u32 },
    #[error("instruction #{index} ({}) needs {feature}, which the target GLSL version lacks", opcode.name())]
    MissingFeature {
        index: usize,
        opcode: Opcode,
        feature: &'static str,
    },
    #[error("{kind} register {index} is out of range (limit {max})")]
    RegisterOutOfRange {
        kind: &'static str,
        index: u32,
        /// Exclusive bound.
        max: u32,
    },
    #[error("{stage} shader lacks a {what} declaration")]
    MissingDeclaration {
        stage: ShaderStage,
        what: &'static str,
    },
}

/// Any failure while turning a DXBC blob into GLSL.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Dxbc(#[from] DxbcError),
    #[error("DXBC container has no SHDR/SHEX shader chunk")]
    MissingShaderChunk,
    #[error(transparent)]
    Decode(#[from] Sm4DecodeError),
    #[error("unbalanced control flow at instruction #{index}: {reason}")]
    UnbalancedControlFlow { index: usize, reason: &'static str },
    #[error(transparent)]
    Translate(#[from] ShaderTranslateError),
}
