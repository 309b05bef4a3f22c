//! GLSL code generation from a [`ShaderModule`].
//!
//! The emitter walks the model in four states (`Prologue → Declarations →
//! Body → Done`) and never re-decodes tokens. D3D registers are modelled as
//! `vec4` values holding raw 32-bit patterns; integer instructions bit-cast
//! their operands in and out, so every register move stays bit-exact.

mod config;
mod emit;
mod version;
mod writer;

pub use config::{GlslConfig, ParseConfigError};
pub use version::{GlslRules, GlslVersion};

use crate::error::ShaderTranslateError;
use crate::model::ShaderModule;

/// Translates `module` into GLSL source for `config.version`.
pub fn emit_glsl(
    module: &ShaderModule,
    config: &GlslConfig,
) -> Result<String, ShaderTranslateError> {
    emit::Emitter::new(module, config)?.run()
}
