use core::str::FromStr;

use thiserror::Error;

use super::version::{GlslRules, GlslVersion};
use crate::sm4_ir::{TessOutputPrimitive, TessPartitioning};

/// Caller-selected options for GLSL emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlslConfig {
    pub version: GlslVersion,
    /// A geometry shader follows this vertex/domain shader.
    pub has_gs: bool,
    /// A pixel shader follows; geometry outputs are dropped otherwise.
    pub has_ps: bool,
    /// Tessellator partitioning for domain shaders (declared by the hull shader
    /// in D3D, but by the evaluation stage in GLSL).
    pub ds_partitioning: TessPartitioning,
    /// Tessellator output primitive/winding for domain shaders.
    pub ds_output_primitive: TessOutputPrimitive,
    /// Feature set to target instead of the one implied by `version`, for
    /// drivers that expose extensions beyond (or bugs below) their version.
    pub rules: Option<GlslRules>,
}

impl Default for GlslConfig {
    fn default() -> Self {
        Self {
            version: GlslVersion::V430,
            has_gs: false,
            has_ps: true,
            ds_partitioning: TessPartitioning::Undefined,
            ds_output_primitive: TessOutputPrimitive::Undefined,
            rules: None,
        }
    }
}

impl GlslConfig {
    pub fn new(version: GlslVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Features the emitter may use: the override, else those of `version`.
    pub fn rules(&self) -> GlslRules {
        self.rules.unwrap_or_else(|| self.version.rules())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {what} `{value}`")]
pub struct ParseConfigError {
    pub what: &'static str,
    pub value: String,
}

impl ParseConfigError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_owned(),
        }
    }
}

impl FromStr for GlslVersion {
    type Err = ParseConfigError;

    /// Accepts `430`, `430 core`, `310 es` and `310es`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (digits, es) = match lower.strip_suffix("es") {
            Some(rest) => (rest.trim(), true),
            None => (lower.strip_suffix("core").unwrap_or(&lower).trim(), false),
        };
        let number: u32 = digits
            .parse()
            .map_err(|_| ParseConfigError::new("GLSL version", s))?;
        GlslVersion::ALL
            .into_iter()
            .find(|v| v.number() == number && v.is_es() == es)
            .ok_or_else(|| ParseConfigError::new("GLSL version", s))
    }
}

impl FromStr for TessPartitioning {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" => Ok(TessPartitioning::Integer),
            "pow2" => Ok(TessPartitioning::Pow2),
            "fractional_odd" => Ok(TessPartitioning::FractionalOdd),
            "fractional_even" => Ok(TessPartitioning::FractionalEven),
            "undefined" => Ok(TessPartitioning::Undefined),
            _ => Err(ParseConfigError::new("tessellator partitioning", s)),
        }
    }
}

impl FromStr for TessOutputPrimitive {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(TessOutputPrimitive::Point),
            "line" => Ok(TessOutputPrimitive::Line),
            "cw" | "triangle_cw" => Ok(TessOutputPrimitive::TriangleCw),
            "ccw" | "triangle_ccw" => Ok(TessOutputPrimitive::TriangleCcw),
            "undefined" => Ok(TessOutputPrimitive::Undefined),
            _ => Err(ParseConfigError::new("tessellator output primitive", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versions() {
        assert_eq!("430".parse(), Ok(GlslVersion::V430));
        assert_eq!("330 core".parse(), Ok(GlslVersion::V330));
        assert_eq!("310 es".parse(), Ok(GlslVersion::Es310));
        assert_eq!("300es".parse(), Ok(GlslVersion::Es300));
        assert!("310".parse::<GlslVersion>().is_err());
        assert!("es".parse::<GlslVersion>().is_err());
        let err = "999".parse::<GlslVersion>().unwrap_err();
        assert_eq!(err.to_string(), "unrecognized GLSL version `999`");
    }

    #[test]
    fn parses_tessellator_options() {
        assert_eq!("fractional_odd".parse(), Ok(TessPartitioning::FractionalOdd));
        assert_eq!("cw".parse(), Ok(TessOutputPrimitive::TriangleCw));
        assert_eq!("triangle_ccw".parse(), Ok(TessOutputPrimitive::TriangleCcw));
        assert!("spiral".parse::<TessPartitioning>().is_err());
    }

    #[test]
    fn default_targets_430_with_pixel_stage() {
        let config = GlslConfig::default();
        assert_eq!(config.version, GlslVersion::V430);
        assert!(config.has_ps);
        assert!(!config.has_gs);
        assert_eq!(config.rules(), GlslVersion::V430.rules());
    }

    #[test]
    fn rules_override_replaces_version_features() {
        let config = GlslConfig {
            rules: Some(GlslVersion::V330.rules() | GlslRules::BINDING_QUALIFIERS),
            ..GlslConfig::new(GlslVersion::V330)
        };
        assert!(config.rules().contains(GlslRules::BINDING_QUALIFIERS));
        assert!(!GlslVersion::V330.rules().contains(GlslRules::BINDING_QUALIFIERS));
    }
}
