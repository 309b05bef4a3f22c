//! SM4/SM5 shader bytecode decoding and GLSL cross-compilation.
//!
//! The pipeline is strictly layered:
//!
//! 1. [`dxbc2glsl_dxbc`] reads the container, signatures and `RDEF`;
//! 2. [`sm4`] decodes the `SHDR`/`SHEX` token stream into [`sm4_ir`] items;
//! 3. [`model::ShaderModule`] resolves control flow and usage;
//! 4. [`glsl`] emits source for a chosen [`GlslVersion`].
//!
//! [`ShaderConverter`] wraps the whole pipeline behind reflection queries,
//! and [`disasm`] prints the decoded stream for diagnostics.

#![forbid(unsafe_code)]

pub mod converter;
pub mod disasm;
mod error;
pub mod glsl;
pub mod model;
pub mod sm4;
pub mod sm4_ir;

pub use dxbc2glsl_dxbc as dxbc;
pub use dxbc2glsl_dxbc::{DxbcError, DxbcFile};

pub use crate::converter::{convert, Reflection, ShaderConverter};
pub use crate::disasm::disassemble;
pub use crate::error::{ConvertError, ShaderTranslateError};
pub use crate::glsl::{emit_glsl, GlslConfig, GlslRules, GlslVersion, ParseConfigError};
pub use crate::model::ShaderModule;
pub use crate::sm4::{ShaderModel, ShaderStage, Sm4DecodeError, Sm4DecodeErrorKind, Sm4Program};
