//! Stage inputs and outputs.
//!
//! Shader bodies read and write the `v`/`o` register arrays. Signature
//! elements become GLSL interface variables (or built-ins), filled from the
//! register arrays at the start of `main` and copied back out at each exit.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use dxbc2glsl_dxbc::{ComponentType, SignatureChunk, SignatureEntry, SystemValue};

use super::decls::{ident, Names};
use super::expr::{apply_modifier, combine, mask_suffix, Comp, NumType};
use super::{Emitter, Result, Scope};
use crate::error::ShaderTranslateError;
use crate::glsl::config::GlslConfig;
use crate::glsl::version::GlslRules;
use crate::model::ShaderModule;
use crate::sm4::limits::MAX_IO_REGISTERS;
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4::ShaderStage;
use crate::sm4_ir::{Declaration, Instruction, InterpolationMode, Operand, WriteMask};

/// How register components map onto a GLSL variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IoShape {
    /// One GLSL component per mask bit, in order.
    Packed,
    /// Component `c` is component `c` of a `vec4`.
    Vector,
    /// A single scalar.
    Scalar,
    /// Mask bits index a built-in array starting at the given element.
    Elements(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct IoVar {
    pub(super) reg: u32,
    pub(super) mask: WriteMask,
    pub(super) name: String,
    /// Block member read after per-vertex indexing (`gl_in[i].gl_Position`).
    pub(super) field: Option<&'static str>,
    pub(super) shape: IoShape,
    pub(super) native: NumType,
    /// Indexed per vertex / control point.
    pub(super) arrayed: bool,
    pub(super) stream: u32,
    /// Declaration line; `None` for built-ins.
    pub(super) decl: Option<String>,
}

impl IoVar {
    fn access(&self, vertex: Option<&str>) -> String {
        let mut out = self.name.clone();
        if let (true, Some(v)) = (self.arrayed, vertex) {
            out = format!("{out}[{v}]");
        }
        if let Some(field) = self.field {
            out = format!("{out}.{field}");
        }
        out
    }

    fn rank(&self, c: u8) -> u8 {
        (self.mask.0 & ((1u8 << c) - 1)).count_ones() as u8
    }

    fn component_with(&self, access: String, c: u8) -> Option<Comp> {
        if !self.mask.has(c) {
            return None;
        }
        Some(match self.shape {
            IoShape::Packed => Comp::vector(access, self.mask.count(), self.rank(c), self.native),
            IoShape::Vector => Comp::vector(access, 4, c, self.native),
            IoShape::Scalar => Comp::scalar(access, self.native),
            IoShape::Elements(base) => {
                Comp::scalar(format!("{access}[{}]", base.saturating_add(u32::from(self.rank(c)))), self.native)
            }
        })
    }

    pub(super) fn component(&self, c: u8, vertex: Option<&str>) -> Option<Comp> {
        self.component_with(self.access(vertex), c)
    }
}

/// Which side of the stage interface a variable sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Input,
    Output,
    PatchOutput,
    PatchInput,
}

#[derive(Debug, Clone, Default)]
pub(super) struct IoPlan {
    pub(super) inputs: Vec<IoVar>,
    pub(super) outputs: Vec<IoVar>,
    pub(super) patch: Vec<IoVar>,
    /// Inputs are `v{reg}[vertex]` arrays.
    pub(super) arrayed_inputs: bool,
    pub(super) input_registers: BTreeSet<u32>,
    pub(super) output_registers: BTreeSet<u32>,
    interpolation: BTreeMap<u32, InterpolationMode>,
    conservative_depth: Option<&'static str>,
}

fn native_type(ty: ComponentType) -> NumType {
    match ty {
        ComponentType::Uint32 => NumType::Uint,
        ComponentType::Sint32 => NumType::Int,
        _ => NumType::Float,
    }
}

fn last_register(op: &Operand) -> Option<u32> {
    op.indices.last().map(|i| i.imm())
}

struct Namer<'a> {
    stage: ShaderStage,
    config: &'a GlslConfig,
    rules: GlslRules,
    multi_stream: bool,
}

impl Namer<'_> {
    fn semantic(entry: &SignatureEntry) -> String {
        format!("{}{}", entry.semantic_name, entry.semantic_index)
    }

    /// Interface variable for `entry`; declared names are claimed in `names`.
    fn var(&self, entry: &SignatureEntry, side: Side, names: &mut Names) -> Option<IoVar> {
        let mask = WriteMask(entry.mask & 0xf);
        let mut var = IoVar {
            reg: entry.register,
            mask,
            name: String::new(),
            field: None,
            shape: IoShape::Packed,
            native: native_type(entry.component_type),
            arrayed: false,
            stream: entry.stream,
            decl: None,
        };
        let builtin = |var: &mut IoVar, name: &str, shape: IoShape, native: NumType| {
            var.name = name.to_owned();
            var.shape = shape;
            var.native = native;
        };
        let (int, uint, float) = (NumType::Int, NumType::Uint, NumType::Float);
        let stage = self.stage;
        let per_vertex_input = side == Side::Input
            && matches!(stage, ShaderStage::Geometry | ShaderStage::Hull | ShaderStage::Domain);
        let clip = entry.semantic_index.saturating_mul(4);

        match (side, entry.system_value) {
            (Side::PatchOutput | Side::PatchInput, sv) if sv.is_tess_factor() => {
                let (array, base) = match sv {
                    SystemValue::FinalQuadEdgeTessFactor | SystemValue::FinalTriEdgeTessFactor => {
                        ("gl_TessLevelOuter", entry.semantic_index)
                    }
                    SystemValue::FinalQuadInsideTessFactor => ("gl_TessLevelInner", entry.semantic_index),
                    SystemValue::FinalTriInsideTessFactor => ("gl_TessLevelInner", 0),
                    SystemValue::FinalLineDetailTessFactor => ("gl_TessLevelOuter", 1),
                    _ => ("gl_TessLevelOuter", 0),
                };
                builtin(&mut var, array, IoShape::Elements(base), float);
                return Some(var);
            }
            (Side::PatchOutput | Side::PatchInput, _) => {
                let dir = if side == Side::PatchOutput { "out" } else { "in" };
                var.name = names.claim(ident(&format!("p_{}", Self::semantic(entry))));
                var.decl = Some(format!("patch {dir} {} {};", var.native.vec(usize::from(mask.count())), var.name));
                return Some(var);
            }
            (Side::Input, SystemValue::Position) if per_vertex_input => {
                var.name = "gl_in".to_owned();
                var.field = Some("gl_Position");
                var.shape = IoShape::Vector;
                var.native = float;
                var.arrayed = true;
                return Some(var);
            }
            (Side::Input, SystemValue::ClipDistance | SystemValue::CullDistance) if per_vertex_input => {
                var.name = "gl_in".to_owned();
                var.field = Some(if entry.system_value == SystemValue::ClipDistance {
                    "gl_ClipDistance"
                } else {
                    "gl_CullDistance"
                });
                var.shape = IoShape::Elements(clip);
                var.native = float;
                var.arrayed = true;
                return Some(var);
            }
            (Side::Input, sv) if stage == ShaderStage::Vertex => {
                match sv {
                    SystemValue::VertexId => builtin(&mut var, "gl_VertexID", IoShape::Scalar, int),
                    SystemValue::InstanceId => builtin(&mut var, "gl_InstanceID", IoShape::Scalar, int),
                    _ => {
                        var.name = names.claim(ident(&Self::semantic(entry)));
                        let location = if self.rules.contains(GlslRules::EXPLICIT_LOCATIONS) {
                            format!("layout(location = {}) ", entry.register)
                        } else {
                            String::new()
                        };
                        var.decl = Some(format!(
                            "{location}in {} {};",
                            var.native.vec(usize::from(mask.count())),
                            var.name
                        ));
                    }
                }
                return Some(var);
            }
            (Side::Input, sv) if stage == ShaderStage::Pixel => {
                match sv {
                    SystemValue::Position => builtin(&mut var, "gl_FragCoord", IoShape::Vector, float),
                    SystemValue::IsFrontFace => builtin(
                        &mut var,
                        "(gl_FrontFacing ? 0xffffffffu : 0u)",
                        IoShape::Scalar,
                        uint,
                    ),
                    SystemValue::PrimitiveId => builtin(&mut var, "gl_PrimitiveID", IoShape::Scalar, int),
                    SystemValue::SampleIndex => builtin(&mut var, "gl_SampleID", IoShape::Scalar, int),
                    SystemValue::RenderTargetArrayIndex => builtin(&mut var, "gl_Layer", IoShape::Scalar, int),
                    SystemValue::ViewportArrayIndex => {
                        builtin(&mut var, "gl_ViewportIndex", IoShape::Scalar, int)
                    }
                    SystemValue::ClipDistance => builtin(&mut var, "gl_ClipDistance", IoShape::Elements(clip), float),
                    SystemValue::CullDistance => builtin(&mut var, "gl_CullDistance", IoShape::Elements(clip), float),
                    _ => var.name = names.claim(ident(&format!("v_{}", Self::semantic(entry)))),
                }
                return Some(var);
            }
            (Side::Input, _) => {
                let (prefix, suffix) = match stage {
                    ShaderStage::Geometry => ("v_", "In"),
                    ShaderStage::Hull => ("v_", ""),
                    _ => ("tc_", ""),
                };
                var.name = names.claim(ident(&format!("{prefix}{}{suffix}", Self::semantic(entry))));
                var.arrayed = true;
                var.decl = Some(format!(
                    "in {} {}[];",
                    var.native.vec(usize::from(mask.count())),
                    var.name
                ));
                return Some(var);
            }
            (_, _) => {}
        }

        // Outputs.
        match stage {
            ShaderStage::Pixel => {
                if entry.system_value != SystemValue::Target || !entry.has_register() {
                    return None;
                }
                var.name = names.claim(format!("v_SV_Target{}", entry.semantic_index));
                let location = if self.rules.contains(GlslRules::EXPLICIT_LOCATIONS) {
                    format!("layout(location = {}) ", entry.semantic_index)
                } else {
                    String::new()
                };
                var.decl = Some(format!(
                    "{location}out {} {};",
                    var.native.vec(usize::from(mask.count())),
                    var.name
                ));
                Some(var)
            }
            ShaderStage::Hull => {
                if entry.system_value == SystemValue::Position {
                    var.name = "gl_out".to_owned();
                    var.field = Some("gl_Position");
                    var.shape = IoShape::Vector;
                    var.native = float;
                } else {
                    var.name = names.claim(ident(&format!("tc_{}", Self::semantic(entry))));
                    var.decl = Some(format!(
                        "out {} {}[];",
                        var.native.vec(usize::from(mask.count())),
                        var.name
                    ));
                }
                var.arrayed = true;
                Some(var)
            }
            _ => {
                match entry.system_value {
                    SystemValue::Position => builtin(&mut var, "gl_Position", IoShape::Vector, float),
                    SystemValue::ClipDistance => builtin(&mut var, "gl_ClipDistance", IoShape::Elements(clip), float),
                    SystemValue::CullDistance => builtin(&mut var, "gl_CullDistance", IoShape::Elements(clip), float),
                    SystemValue::RenderTargetArrayIndex => builtin(&mut var, "gl_Layer", IoShape::Scalar, int),
                    SystemValue::ViewportArrayIndex => {
                        builtin(&mut var, "gl_ViewportIndex", IoShape::Scalar, int)
                    }
                    SystemValue::PrimitiveId if stage == ShaderStage::Geometry => {
                        builtin(&mut var, "gl_PrimitiveID", IoShape::Scalar, int)
                    }
                    _ => {
                        if stage == ShaderStage::Geometry && !self.config.has_ps {
                            return None;
                        }
                        let feeds_gs = matches!(stage, ShaderStage::Vertex | ShaderStage::Domain)
                            && self.config.has_gs;
                        let suffix = if feeds_gs { "In" } else { "" };
                        var.name = names.claim(ident(&format!("v_{}{suffix}", Self::semantic(entry))));
                        let stream = if stage == ShaderStage::Geometry && self.multi_stream {
                            format!("layout(stream = {}) ", entry.stream)
                        } else {
                            String::new()
                        };
                        // Integer varyings cannot be interpolated.
                        let flat = if var.native != float && !feeds_gs { "flat " } else { "" };
                        var.decl = Some(format!(
                            "{stream}{flat}out {} {};",
                            var.native.vec(usize::from(mask.count())),
                            var.name
                        ));
                    }
                }
                Some(var)
            }
        }
    }

    /// Qualifiers for a user-defined pixel-shader input.
    fn pixel_input_qualifiers(&self, mode: Option<InterpolationMode>, native: NumType) -> &'static str {
        if native != NumType::Float {
            return "flat ";
        }
        let es = self.config.version.is_es();
        let sample = self.rules.contains(GlslRules::SAMPLE_SHADING);
        match mode.unwrap_or(InterpolationMode::Linear) {
            InterpolationMode::Constant => "flat ",
            InterpolationMode::LinearCentroid => "centroid ",
            InterpolationMode::LinearNoPerspective if !es => "noperspective ",
            InterpolationMode::LinearNoPerspectiveCentroid if !es => "noperspective centroid ",
            InterpolationMode::LinearNoPerspectiveCentroid => "centroid ",
            InterpolationMode::LinearSample | InterpolationMode::LinearNoPerspectiveSample if !sample => "",
            InterpolationMode::LinearNoPerspectiveSample if !es => "noperspective sample ",
            InterpolationMode::LinearSample | InterpolationMode::LinearNoPerspectiveSample => "sample ",
            _ => "",
        }
    }
}

impl IoPlan {
    pub(super) fn build(
        module: &ShaderModule,
        config: &GlslConfig,
        rules: GlslRules,
        names: &mut Names,
    ) -> core::result::Result<Self, ShaderTranslateError> {
        let stage = module.stage;
        let mut plan = IoPlan {
            arrayed_inputs: matches!(stage, ShaderStage::Geometry | ShaderStage::Hull | ShaderStage::Domain),
            ..Self::default()
        };

        for decl in &module.declarations {
            match decl {
                Declaration::Input { operand, interpolation, .. } => {
                    if let Some(reg) = last_register(operand) {
                        if matches!(operand.ty, OperandType::Input | OperandType::InputControlPoint) {
                            plan.input_registers.insert(reg);
                        }
                        if let Some(mode) = interpolation {
                            plan.interpolation.insert(reg, *mode);
                        }
                    }
                }
                Declaration::Output { operand, .. } => match operand.ty {
                    OperandType::Output => plan.output_registers.extend(last_register(operand)),
                    OperandType::OutputDepthGreaterEqual => plan.conservative_depth = Some("depth_greater"),
                    OperandType::OutputDepthLessEqual => plan.conservative_depth = Some("depth_less"),
                    _ => {}
                },
                Declaration::IndexRange { operand, count } => {
                    if let Some(first) = last_register(operand) {
                        let regs = first..first.saturating_add((*count).max(1));
                        match operand.ty {
                            OperandType::Input | OperandType::InputControlPoint => plan.input_registers.extend(regs),
                            OperandType::Output => plan.output_registers.extend(regs),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        let namer = Namer {
            stage,
            config,
            rules,
            multi_stream: rules.contains(GlslRules::MULTI_STREAM) && module.gs.streams.len() > 1,
        };
        let mut collect = |chunk: &SignatureChunk, side: Side| -> Vec<IoVar> {
            chunk
                .entries
                .iter()
                .filter(|e| e.has_register() && e.mask & 0xf != 0)
                .filter_map(|e| namer.var(e, side, names))
                .collect()
        };

        plan.inputs = collect(&module.signatures.input, Side::Input);
        plan.outputs = collect(&module.signatures.output, Side::Output);
        plan.patch = match stage {
            ShaderStage::Hull => collect(&module.signatures.patch_constant, Side::PatchOutput),
            ShaderStage::Domain => collect(&module.signatures.patch_constant, Side::PatchInput),
            _ => Vec::new(),
        };

        for var in &mut plan.inputs {
            if stage == ShaderStage::Pixel && var.decl.is_none() && var.name.starts_with("v_") {
                let mode = plan.interpolation.get(&var.reg).copied();
                let qualifiers = namer.pixel_input_qualifiers(mode, var.native);
                var.decl = Some(format!(
                    "{qualifiers}in {} {};",
                    var.native.vec(usize::from(var.mask.count())),
                    var.name
                ));
            }
            if var.name == "gl_SampleID" && !rules.contains(GlslRules::SAMPLE_SHADING) {
                return Err(ShaderTranslateError::MissingFeature {
                    index: 0,
                    opcode: Opcode::DclInputPsSgv,
                    feature: "per-sample shading",
                });
            }
            plan.input_registers.insert(var.reg);
        }
        plan.output_registers.extend(plan.outputs.iter().map(|v| v.reg));
        if stage == ShaderStage::Hull {
            plan.output_registers.extend(plan.patch.iter().map(|v| v.reg));
        }
        // Signatures are not seen by the decoder; their registers size `v`/`o`.
        let out_of_range = |kind, regs: &BTreeSet<u32>| {
            regs.range(MAX_IO_REGISTERS..).next().map(|&index| {
                ShaderTranslateError::RegisterOutOfRange { kind, index, max: MAX_IO_REGISTERS }
            })
        };
        if let Some(err) = out_of_range("input", &plan.input_registers)
            .or_else(|| out_of_range("output", &plan.output_registers))
        {
            return Err(err);
        }
        if let Some(var) = plan.patch.iter().find(|v| v.reg >= MAX_IO_REGISTERS) {
            return Err(ShaderTranslateError::RegisterOutOfRange {
                kind: "patch constant",
                index: var.reg,
                max: MAX_IO_REGISTERS,
            });
        }
        if !rules.contains(GlslRules::CONSERVATIVE_DEPTH) {
            plan.conservative_depth = None;
        }

        debug!(
            inputs = plan.inputs.len(),
            outputs = plan.outputs.len(),
            patch = plan.patch.len(),
            "planned stage interface"
        );
        Ok(plan)
    }

    /// Component `c` of control-point output register `reg`.
    pub(super) fn output_component(&self, reg: u32, c: u8, vertex: Option<&str>) -> Option<Comp> {
        self.outputs
            .iter()
            .find(|v| v.reg == reg && v.mask.has(c))
            .and_then(|v| v.component(c, vertex))
    }

    /// Component `c` of patch-constant register `reg` (domain shaders).
    pub(super) fn patch_component(&self, reg: u32, c: u8) -> Option<Comp> {
        self.patch
            .iter()
            .find(|v| v.reg == reg && v.mask.has(c))
            .and_then(|v| v.component(c, None))
    }
}

impl Emitter<'_> {
    pub(super) fn emit_io_declarations(&mut self) {
        let lines: Vec<String> = self
            .io
            .inputs
            .iter()
            .chain(&self.io.outputs)
            .chain(&self.io.patch)
            .filter_map(|v| v.decl.clone())
            .collect();
        for line in &lines {
            self.w.line(line);
        }
        if let Some(layout) = self.io.conservative_depth {
            self.w.line(&format!("layout({layout}) out float gl_FragDepth;"));
        }
    }

    /// Fills the `v` registers from the stage inputs.
    pub(super) fn emit_load_inputs(&mut self) {
        let inputs = self.io.inputs.clone();
        if inputs.is_empty() {
            return;
        }
        if self.io.arrayed_inputs {
            let count = self.input_vertices;
            self.w.open(&format!("for (int i = 0; i < {count}; ++i)"));
            for var in &inputs {
                let comps: Vec<Comp> = var
                    .mask
                    .components()
                    .filter_map(|c| var.component(c, Some("i")))
                    .collect();
                let lhs = format!("v{}[i]{}", var.reg, mask_suffix(var.mask, 4));
                self.w.line(&format!("{lhs} = {};", combine(&comps, NumType::Float)));
            }
            self.w.close("");
            return;
        }
        for var in &inputs {
            let comps: Vec<Comp> = var.mask.components().filter_map(|c| var.component(c, None)).collect();
            let lhs = format!("v[{}]{}", var.reg, mask_suffix(var.mask, 4));
            self.w.line(&format!("{lhs} = {};", combine(&comps, NumType::Float)));
        }
    }

    /// Copies the `o` registers to the stage outputs for the current scope.
    pub(super) fn emit_store_outputs(&mut self, stream: Option<u32>) {
        let (vars, vertex) = match self.scope {
            Scope::ControlPoint => (&self.io.outputs, Some("gl_InvocationID")),
            Scope::PatchConstant => (&self.io.patch, None),
            Scope::Main if self.module.stage == ShaderStage::Hull => (&self.io.patch, None),
            Scope::Main => (&self.io.outputs, None),
            Scope::Subroutine => return,
        };
        let mut lines = Vec::new();
        for var in vars.iter().filter(|v| stream.is_none_or(|s| v.stream == s)) {
            let reg = |c: u8| Comp::vector(format!("o[{}]", var.reg), 4, c, NumType::Float);
            let access = var.access(vertex);
            match var.shape {
                IoShape::Elements(base) => {
                    for c in var.mask.components() {
                        let element = base.saturating_add(u32::from(var.rank(c)));
                        lines.push(format!("{access}[{element}] = {};", combine(&[reg(c)], var.native)));
                    }
                }
                IoShape::Scalar => {
                    if let Some(c) = var.mask.components().next() {
                        lines.push(format!("{access} = {};", combine(&[reg(c)], var.native)));
                    }
                }
                IoShape::Vector => {
                    let comps: Vec<Comp> = var.mask.components().map(reg).collect();
                    let suffix = mask_suffix(var.mask, 4);
                    lines.push(format!("{access}{suffix} = {};", combine(&comps, var.native)));
                }
                IoShape::Packed => {
                    let comps: Vec<Comp> = var.mask.components().map(reg).collect();
                    lines.push(format!("{access} = {};", combine(&comps, var.native)));
                }
            }
        }
        for line in &lines {
            self.w.line(line);
        }
    }

    /// `eval_centroid`, `eval_sample_index` and `eval_snapped`.
    pub(super) fn eval(&mut self, inst: &Instruction) -> Result<()> {
        self.require(GlslRules::INTERPOLATE_AT, "interpolateAt* functions")?;
        let src = self.src(inst, 0)?;
        if src.ty != OperandType::Input || src.has_relative_index() {
            return Err(self.unsupported());
        }
        let wrap = match inst.opcode {
            Opcode::EvalCentroid => "interpolateAtCentroid({})".to_owned(),
            Opcode::EvalSampleIndex => {
                let sample = self.read_lane(self.src(inst, 1)?, 0, NumType::Int)?;
                format!("interpolateAtSample({{}}, {sample})")
            }
            _ => {
                let offset = self.read_n(self.src(inst, 1)?, 2, NumType::Int)?;
                format!("interpolateAtOffset({{}}, vec2({offset}) / 16.0)")
            }
        };
        let reg = src.reg();
        let dst = self.dst(inst, 0)?;
        let swizzle = src.swizzle();
        let mut comps = Vec::new();
        for lane in dst.mask().components() {
            let c = swizzle.lane(lane);
            let var = self
                .io
                .inputs
                .iter()
                .find(|v| v.reg == reg && v.mask.has(c) && v.decl.is_some())
                .ok_or_else(|| self.unsupported())?;
            let access = wrap.replace("{}", &var.name);
            comps.push(var.component_with(access, c).ok_or_else(|| self.unsupported())?);
        }
        let value = apply_modifier(combine(&comps, NumType::Float), src.modifier, NumType::Float);
        self.assign(inst, value, NumType::Float)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, index: u32, sv: SystemValue, register: u32, mask: u8) -> SignatureEntry {
        SignatureEntry {
            semantic_name: name.to_owned(),
            semantic_index: index,
            system_value: sv,
            component_type: ComponentType::Float32,
            register,
            mask,
            read_write_mask: mask,
            stream: 0,
            min_precision: 0,
        }
    }

    fn namer(stage: ShaderStage, config: &GlslConfig) -> Namer<'_> {
        Namer {
            stage,
            config,
            rules: config.rules(),
            multi_stream: false,
        }
    }

    #[test]
    fn packed_varyings_use_mask_rank() {
        let config = GlslConfig::default();
        let var = namer(ShaderStage::Vertex, &config)
            .var(&entry("TEXCOORD", 1, SystemValue::Undefined, 2, 0b1100), Side::Output, &mut Names::default())
            .unwrap();
        assert_eq!(var.name, "v_TEXCOORD1");
        assert_eq!(var.decl.as_deref(), Some("out vec2 v_TEXCOORD1;"));
        assert_eq!(var.component(3, None), Some(Comp::vector("v_TEXCOORD1", 2, 1, NumType::Float)));
        assert_eq!(var.component(0, None), None);
    }

    #[test]
    fn vertex_outputs_feeding_a_geometry_shader_are_renamed() {
        let config = GlslConfig { has_gs: true, ..GlslConfig::default() };
        let var = namer(ShaderStage::Vertex, &config)
            .var(&entry("COLOR", 0, SystemValue::Undefined, 1, 0xf), Side::Output, &mut Names::default())
            .unwrap();
        assert_eq!(var.name, "v_COLOR0In");
        let gs = namer(ShaderStage::Geometry, &config)
            .var(&entry("COLOR", 0, SystemValue::Undefined, 1, 0xf), Side::Input, &mut Names::default())
            .unwrap();
        assert_eq!(gs.decl.as_deref(), Some("in vec4 v_COLOR0In[];"));
        assert_eq!(gs.component(2, Some("1")), Some(Comp::vector("v_COLOR0In[1]", 4, 2, NumType::Float)));
    }

    #[test]
    fn system_values_map_to_builtins() {
        let config = GlslConfig::default();
        let ps = namer(ShaderStage::Pixel, &config);
        let pos = ps.var(&entry("SV_Position", 0, SystemValue::Position, 0, 0xf), Side::Input, &mut Names::default()).unwrap();
        assert_eq!(pos.name, "gl_FragCoord");
        assert_eq!(pos.decl, None);

        let gs = namer(ShaderStage::Geometry, &config);
        let pos = gs.var(&entry("SV_Position", 0, SystemValue::Position, 0, 0xf), Side::Input, &mut Names::default()).unwrap();
        assert_eq!(pos.access(Some("i")), "gl_in[i].gl_Position");

        let hs = namer(ShaderStage::Hull, &config);
        let outer = hs
            .var(&entry("SV_TessFactor", 2, SystemValue::FinalQuadEdgeTessFactor, 2, 0b0001), Side::PatchOutput, &mut Names::default())
            .unwrap();
        assert_eq!(outer.component(0, None), Some(Comp::scalar("gl_TessLevelOuter[2]", NumType::Float)));
        let density = hs
            .var(&entry("SV_TessFactor", 1, SystemValue::FinalLineDensityTessFactor, 1, 0b0001), Side::PatchOutput, &mut Names::default())
            .unwrap();
        assert_eq!(density.component(0, None), Some(Comp::scalar("gl_TessLevelOuter[0]", NumType::Float)));
    }

    #[test]
    fn pixel_interpolation_qualifiers() {
        let config = GlslConfig::default();
        let ps = namer(ShaderStage::Pixel, &config);
        assert_eq!(ps.pixel_input_qualifiers(Some(InterpolationMode::Constant), NumType::Float), "flat ");
        assert_eq!(ps.pixel_input_qualifiers(Some(InterpolationMode::LinearCentroid), NumType::Float), "centroid ");
        assert_eq!(
            ps.pixel_input_qualifiers(Some(InterpolationMode::LinearNoPerspective), NumType::Float),
            "noperspective "
        );
        assert_eq!(ps.pixel_input_qualifiers(Some(InterpolationMode::Linear), NumType::Uint), "flat ");

        let es = GlslConfig::new(crate::glsl::GlslVersion::Es300);
        let ps = namer(ShaderStage::Pixel, &es);
        assert_eq!(ps.pixel_input_qualifiers(Some(InterpolationMode::LinearNoPerspective), NumType::Float), "");
        assert_eq!(ps.pixel_input_qualifiers(Some(InterpolationMode::LinearSample), NumType::Float), "");
    }
}
