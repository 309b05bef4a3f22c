use super::{Emitter, Result};
use crate::error::ShaderTranslateError;
use crate::glsl::config::GlslConfig;
use crate::glsl::version::GlslRules;
use crate::model::ShaderModule;
use crate::sm4::ShaderStage;
use crate::sm4_ir::{GlobalFlags, Primitive, PrimitiveTopology, TessDomain, TessOutputPrimitive, TessPartitioning};

fn input_primitive(p: Primitive) -> Option<&'static str> {
    match p {
        Primitive::Point => Some("points"),
        Primitive::Line => Some("lines"),
        Primitive::Triangle => Some("triangles"),
        Primitive::LineAdj => Some("lines_adjacency"),
        Primitive::TriangleAdj => Some("triangles_adjacency"),
        _ => None,
    }
}

fn output_topology(t: PrimitiveTopology) -> Option<&'static str> {
    match t {
        PrimitiveTopology::PointList => Some("points"),
        PrimitiveTopology::LineList | PrimitiveTopology::LineStrip => Some("line_strip"),
        PrimitiveTopology::TriangleList | PrimitiveTopology::TriangleStrip => Some("triangle_strip"),
        _ => None,
    }
}

/// `layout(...)` lines fixing the stage's primitive and dispatch shape.
///
/// Domain-shader options set in `config` take precedence over the module's
/// own declarations, since D3D declares them in the hull shader.
pub(super) fn stage_layout(module: &ShaderModule, config: &GlslConfig, rules: GlslRules) -> Result<Vec<String>> {
    let missing = |what| ShaderTranslateError::MissingDeclaration { stage: module.stage, what };
    let mut lines = Vec::new();
    match module.stage {
        ShaderStage::Geometry => {
            let input = module
                .gs
                .input_primitive
                .and_then(input_primitive)
                .ok_or_else(|| missing("input primitive"))?;
            if module.gs.instance_count > 1 {
                lines.push(format!("layout({input}, invocations = {}) in;", module.gs.instance_count));
            } else {
                lines.push(format!("layout({input}) in;"));
            }
            let topology = module
                .gs
                .output_topologies
                .iter()
                .copied()
                .find(|t| *t != PrimitiveTopology::Undefined)
                .and_then(output_topology)
                .ok_or_else(|| missing("output topology"))?;
            let max_vertices = match module.gs.max_output_vertices {
                0 => return Err(missing("max output vertex count")),
                n => n,
            };
            lines.push(format!("layout({topology}, max_vertices = {max_vertices}) out;"));
        }
        ShaderStage::Hull => match module.tess.output_control_points {
            0 => return Err(missing("output control point count")),
            count => lines.push(format!("layout(vertices = {count}) out;")),
        },
        ShaderStage::Domain => {
            let domain = match module.tess.domain {
                Some(TessDomain::Isoline) => "isolines",
                Some(TessDomain::Triangle) => "triangles",
                Some(TessDomain::Quad) => "quads",
                _ => return Err(missing("tessellator domain")),
            };
            let partitioning = match config.ds_partitioning {
                TessPartitioning::Undefined => module.tess.partitioning.unwrap_or(TessPartitioning::Undefined),
                p => p,
            };
            let spacing = match partitioning {
                // GLSL has no power-of-two spacing; equal spacing rounds the
                // same factors up to integers.
                TessPartitioning::Integer | TessPartitioning::Pow2 => "equal_spacing",
                TessPartitioning::FractionalOdd => "fractional_odd_spacing",
                TessPartitioning::FractionalEven => "fractional_even_spacing",
                TessPartitioning::Undefined => return Err(missing("tessellator partitioning")),
            };
            let mut parts = vec![domain, spacing];
            let primitive = match config.ds_output_primitive {
                TessOutputPrimitive::Undefined => module.tess.output_primitive.unwrap_or(TessOutputPrimitive::Undefined),
                p => p,
            };
            // D3D winding is defined with a flipped Y axis.
            match primitive {
                TessOutputPrimitive::TriangleCw => parts.push("ccw"),
                TessOutputPrimitive::TriangleCcw => parts.push("cw"),
                TessOutputPrimitive::Point => parts.push("point_mode"),
                TessOutputPrimitive::Line => {}
                TessOutputPrimitive::Undefined if domain == "isolines" => {}
                TessOutputPrimitive::Undefined => return Err(missing("tessellator output primitive")),
            }
            lines.push(format!("layout({}) in;", parts.join(", ")));
        }
        ShaderStage::Compute => {
            let [x, y, z] = module.compute.thread_group;
            if x == 0 || y == 0 || z == 0 {
                return Err(missing("thread group size"));
            }
            lines.push(format!("layout(local_size_x = {x}, local_size_y = {y}, local_size_z = {z}) in;"));
        }
        ShaderStage::Pixel => {
            if module.global_flags.contains(GlobalFlags::FORCE_EARLY_DEPTH_STENCIL)
                && rules.contains(GlslRules::EARLY_FRAGMENT_TESTS)
            {
                lines.push("layout(early_fragment_tests) in;".to_owned());
            }
        }
        _ => {}
    }
    Ok(lines)
}

/// Control points per input primitive for stages with arrayed inputs.
pub(super) fn input_vertices(module: &ShaderModule) -> Result<u32> {
    module.input_vertex_count().ok_or(ShaderTranslateError::MissingDeclaration {
        stage: module.stage,
        what: match module.stage {
            ShaderStage::Geometry => "input primitive",
            _ => "input control point count",
        },
    })
}

impl Emitter<'_> {
    /// `#version`, extensions, precision and stage layout qualifiers.
    pub(super) fn emit_prologue(&mut self) {
        self.w.line(&format!("#version {}", self.config.version.token()));
        if self.rules.contains(GlslRules::BIT_ENCODING_EXTENSION) {
            self.w.line("#extension GL_ARB_shader_bit_encoding : enable");
        }
        if self.rules.contains(GlslRules::PRECISION_QUALIFIERS) {
            self.w.line("precision highp float;");
            self.w.line("precision highp int;");
        }
        for line in core::mem::take(&mut self.layout) {
            self.w.line(&line);
        }
        self.w.line("");
    }
}
