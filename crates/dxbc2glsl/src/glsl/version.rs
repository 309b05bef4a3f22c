use core::fmt;

use bitflags::bitflags;

/// Target GLSL dialect and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum GlslVersion {
    V110,
    V120,
    V130,
    V140,
    V150,
    V330,
    V400,
    V410,
    V420,
    V430,
    V440,
    V450,
    V460,
    Es100,
    Es300,
    Es310,
    Es320,
}

impl GlslVersion {
    pub const ALL: [GlslVersion; 17] = [
        GlslVersion::V110,
        GlslVersion::V120,
        GlslVersion::V130,
        GlslVersion::V140,
        GlslVersion::V150,
        GlslVersion::V330,
        GlslVersion::V400,
        GlslVersion::V410,
        GlslVersion::V420,
        GlslVersion::V430,
        GlslVersion::V440,
        GlslVersion::V450,
        GlslVersion::V460,
        GlslVersion::Es100,
        GlslVersion::Es300,
        GlslVersion::Es310,
        GlslVersion::Es320,
    ];

    /// Numeric `#version` value.
    pub fn number(self) -> u32 {
        match self {
            GlslVersion::V110 => 110,
            GlslVersion::V120 => 120,
            GlslVersion::V130 => 130,
            GlslVersion::V140 => 140,
            GlslVersion::V150 => 150,
            GlslVersion::V330 => 330,
            GlslVersion::V400 => 400,
            GlslVersion::V410 => 410,
            GlslVersion::V420 => 420,
            GlslVersion::V430 => 430,
            GlslVersion::V440 => 440,
            GlslVersion::V450 => 450,
            GlslVersion::V460 => 460,
            GlslVersion::Es100 => 100,
            GlslVersion::Es300 => 300,
            GlslVersion::Es310 => 310,
            GlslVersion::Es320 => 320,
        }
    }

    pub fn is_es(self) -> bool {
        matches!(
            self,
            GlslVersion::Es100 | GlslVersion::Es300 | GlslVersion::Es310 | GlslVersion::Es320
        )
    }

    /// Text after `#version`.
    pub fn token(self) -> String {
        if self.is_es() {
            format!("{} es", self.number())
        } else {
            self.number().to_string()
        }
    }

    /// Capabilities of this version.
    pub fn rules(self) -> GlslRules {
        let mut rules = GlslRules::empty();
        let n = self.number();
        if self.is_es() {
            rules |= GlslRules::PRECISION_QUALIFIERS;
            if n >= 300 {
                rules |= GlslRules::UINT_TYPES
                    | GlslRules::BIT_ENCODING
                    | GlslRules::UNIFORM_BLOCKS
                    | GlslRules::EXPLICIT_LOCATIONS
                    | GlslRules::PACK_HALF;
            }
            if n >= 310 {
                rules |= GlslRules::BINDING_QUALIFIERS
                    | GlslRules::BIT_OPS
                    | GlslRules::COMPUTE
                    | GlslRules::STORAGE
                    | GlslRules::MULTISAMPLE_FETCH
                    | GlslRules::EARLY_FRAGMENT_TESTS;
            }
            if n >= 320 {
                rules |= GlslRules::CORE_GEOMETRY
                    | GlslRules::GS_INSTANCING
                    | GlslRules::TESSELLATION
                    | GlslRules::INTERPOLATE_AT
                    | GlslRules::SAMPLE_SHADING
                    | GlslRules::CUBE_ARRAYS;
            }
            return rules;
        }

        if n >= 130 {
            rules |= GlslRules::UINT_TYPES | GlslRules::BIT_ENCODING;
            if n < 330 {
                rules |= GlslRules::BIT_ENCODING_EXTENSION;
            }
        }
        if n >= 140 {
            rules |= GlslRules::UNIFORM_BLOCKS;
        }
        if n >= 150 {
            rules |= GlslRules::CORE_GEOMETRY | GlslRules::MULTISAMPLE_FETCH;
        }
        if n >= 330 {
            rules |= GlslRules::EXPLICIT_LOCATIONS;
        }
        if n >= 400 {
            rules |= GlslRules::MULTI_STREAM
                | GlslRules::BIT_OPS
                | GlslRules::GS_INSTANCING
                | GlslRules::TESSELLATION
                | GlslRules::INTERPOLATE_AT
                | GlslRules::SAMPLE_SHADING
                | GlslRules::CUBE_ARRAYS
                | GlslRules::DOUBLES
                | GlslRules::TEXTURE_QUERY_LOD;
        }
        if n >= 420 {
            rules |= GlslRules::BINDING_QUALIFIERS
                | GlslRules::PACK_HALF
                | GlslRules::EARLY_FRAGMENT_TESTS
                | GlslRules::CONSERVATIVE_DEPTH;
        }
        if n >= 430 {
            rules |= GlslRules::COMPUTE | GlslRules::STORAGE | GlslRules::TEXTURE_QUERY_LEVELS;
        }
        if n >= 450 {
            rules |= GlslRules::DERIVATIVE_CONTROL | GlslRules::TEXTURE_SAMPLES;
        }
        rules
    }
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

bitflags! {
    /// Language features available in a [`GlslVersion`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GlslRules: u32 {
        /// `uniform Name { ... };`
        const UNIFORM_BLOCKS = 1 << 0;
        /// `layout(location = N)` on stage inputs/outputs.
        const EXPLICIT_LOCATIONS = 1 << 1;
        /// `floatBitsToInt` and friends.
        const BIT_ENCODING = 1 << 2;
        /// Bit encoding needs `GL_ARB_shader_bit_encoding`.
        const BIT_ENCODING_EXTENSION = 1 << 3;
        const UINT_TYPES = 1 << 4;
        /// `layout(...) in;` geometry shaders without extensions.
        const CORE_GEOMETRY = 1 << 5;
        /// `EmitStreamVertex` and `layout(stream = N)`.
        const MULTI_STREAM = 1 << 6;
        /// `precision highp float;`
        const PRECISION_QUALIFIERS = 1 << 7;
        /// `layout(binding = N)`.
        const BINDING_QUALIFIERS = 1 << 8;
        /// `bitCount`, `findMSB`, `bitfieldExtract`, `*MulExtended`, `textureGather`.
        const BIT_OPS = 1 << 9;
        /// `packHalf2x16`/`unpackHalf2x16`.
        const PACK_HALF = 1 << 10;
        const TEXTURE_QUERY_LEVELS = 1 << 11;
        const TEXTURE_QUERY_LOD = 1 << 12;
        /// `dFdxFine`/`dFdxCoarse`.
        const DERIVATIVE_CONTROL = 1 << 13;
        const COMPUTE = 1 << 14;
        const TESSELLATION = 1 << 15;
        /// Shader storage buffers, images and atomics.
        const STORAGE = 1 << 16;
        /// `interpolateAtCentroid`/`interpolateAtSample`/`interpolateAtOffset`.
        const INTERPOLATE_AT = 1 << 17;
        const DOUBLES = 1 << 18;
        /// `layout(invocations = N)`.
        const GS_INSTANCING = 1 << 19;
        /// `gl_SampleID`, `gl_SampleMaskIn` and `sample` qualifiers.
        const SAMPLE_SHADING = 1 << 20;
        const CUBE_ARRAYS = 1 << 21;
        /// `texelFetch` on multisampled textures.
        const MULTISAMPLE_FETCH = 1 << 22;
        /// `layout(early_fragment_tests) in;`
        const EARLY_FRAGMENT_TESTS = 1 << 23;
        /// `layout(depth_greater)`/`layout(depth_less)` on `gl_FragDepth`.
        const CONSERVATIVE_DEPTH = 1 << 24;
        /// `textureSamples`/`imageSamples`.
        const TEXTURE_SAMPLES = 1 << 25;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        assert_eq!(GlslVersion::V430.token(), "430");
        assert_eq!(GlslVersion::Es310.token(), "310 es");
        assert_eq!(GlslVersion::Es100.to_string(), "100 es");
    }

    #[test]
    fn rules_grow_with_version() {
        assert!(!GlslVersion::V120.rules().contains(GlslRules::BIT_ENCODING));
        let v130 = GlslVersion::V130.rules();
        assert!(v130.contains(GlslRules::BIT_ENCODING | GlslRules::BIT_ENCODING_EXTENSION));
        assert!(!v130.contains(GlslRules::UNIFORM_BLOCKS));
        let v330 = GlslVersion::V330.rules();
        assert!(v330.contains(GlslRules::BIT_ENCODING | GlslRules::EXPLICIT_LOCATIONS));
        assert!(!v330.contains(GlslRules::BIT_ENCODING_EXTENSION));
        assert!(GlslVersion::V430.rules().contains(GlslRules::COMPUTE | GlslRules::STORAGE));
        assert!(GlslVersion::Es300.rules().contains(GlslRules::PRECISION_QUALIFIERS));
        assert!(!GlslVersion::Es300.rules().contains(GlslRules::BINDING_QUALIFIERS));
        assert!(!GlslVersion::Es320.rules().contains(GlslRules::MULTI_STREAM));
    }
}
