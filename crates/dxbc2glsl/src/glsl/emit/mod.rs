//! The GLSL emitter proper.
//!
//! [`Emitter`] owns the output buffer and walks the module once. Resource and
//! interface planning happen up front in [`Emitter::new`], so every error a
//! target version can cause surfaces before any text is produced.

mod decls;
mod doubles;
mod expr;
mod inst;
mod io;
mod memory;
mod prologue;
mod sample;

use tracing::{debug, trace};

use self::decls::ResourcePlan;
use self::expr::{paren, NumType};
use self::io::IoPlan;
use super::config::GlslConfig;
use super::version::GlslRules;
use super::writer::GlslWriter;
use crate::error::ShaderTranslateError;
use crate::model::{BlockId, Node, PhaseKind, ShaderModule};
use crate::sm4::opcode::Opcode;
use crate::sm4::ShaderStage;
use crate::sm4_ir::Instruction;

type Result<T> = core::result::Result<T, ShaderTranslateError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitState {
    Prologue,
    Declarations,
    Body,
    Done,
}

/// What the function being emitted copies out on `ret`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Main,
    Subroutine,
    /// Hull-shader control-point phase: per-invocation outputs.
    ControlPoint,
    /// Hull-shader fork/join phase; `main` copies the patch values.
    PatchConstant,
}

pub(crate) struct Emitter<'a> {
    module: &'a ShaderModule,
    config: &'a GlslConfig,
    rules: GlslRules,
    w: GlslWriter,
    state: EmitState,
    resources: ResourcePlan,
    io: IoPlan,
    /// Stage `layout(...)` lines for the prologue.
    layout: Vec<String>,
    /// Vertices per input primitive; 1 for stages without arrayed inputs.
    input_vertices: u32,
    /// Instruction being translated, for error reporting.
    current: usize,
    scope: Scope,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(module: &'a ShaderModule, config: &'a GlslConfig) -> Result<Self> {
        // Versions without integer types stay rejected whatever the override
        // claims; their `#version` line cannot carry the translation.
        let required = GlslRules::UINT_TYPES | GlslRules::BIT_ENCODING;
        let rules = config.rules();
        if !config.version.rules().contains(required) || !rules.contains(required) {
            return Err(ShaderTranslateError::UnsupportedGlslVersion(config.version));
        }
        let stage_rule = match module.stage {
            ShaderStage::Vertex | ShaderStage::Pixel => GlslRules::empty(),
            ShaderStage::Geometry => GlslRules::CORE_GEOMETRY,
            ShaderStage::Hull | ShaderStage::Domain => GlslRules::TESSELLATION,
            ShaderStage::Compute => GlslRules::COMPUTE,
            ShaderStage::Unknown(_) => return Err(ShaderTranslateError::UnsupportedStage(module.stage)),
        };
        if !rules.contains(stage_rule) {
            return Err(ShaderTranslateError::UnsupportedStage(module.stage));
        }
        if module.stage == ShaderStage::Geometry
            && module.gs.instance_count > 1
            && !rules.contains(GlslRules::GS_INSTANCING)
        {
            return Err(ShaderTranslateError::MissingFeature {
                index: 0,
                opcode: Opcode::DclGsInstanceCount,
                feature: "geometry shader instancing",
            });
        }

        let layout = prologue::stage_layout(module, config, rules)?;
        let mut resources = ResourcePlan::build(module, rules)?;
        let io = IoPlan::build(module, config, rules, &mut resources.names)?;
        let input_vertices = if io.arrayed_inputs { prologue::input_vertices(module)? } else { 1 };
        Ok(Self {
            module,
            config,
            rules,
            w: GlslWriter::new(),
            state: EmitState::Prologue,
            resources,
            io,
            layout,
            input_vertices,
            current: 0,
            scope: Scope::Main,
        })
    }

    pub(crate) fn run(mut self) -> Result<String> {
        loop {
            trace!(state = ?self.state, "emitter state");
            self.state = match self.state {
                EmitState::Prologue => {
                    self.emit_prologue();
                    EmitState::Declarations
                }
                EmitState::Declarations => {
                    self.emit_declarations()?;
                    self.w.line("");
                    EmitState::Body
                }
                EmitState::Body => {
                    self.emit_body()?;
                    EmitState::Done
                }
                EmitState::Done => break,
            };
        }
        debug!(
            stage = %self.module.stage,
            version = %self.config.version,
            "emitted GLSL"
        );
        Ok(self.w.finish())
    }

    /// Error for the instruction being translated.
    fn unsupported(&self) -> ShaderTranslateError {
        ShaderTranslateError::UnsupportedInstruction {
            index: self.current,
            opcode: self.opcode(),
        }
    }

    fn missing(&self, feature: &'static str) -> ShaderTranslateError {
        ShaderTranslateError::MissingFeature {
            index: self.current,
            opcode: self.opcode(),
            feature,
        }
    }

    fn require(&self, rule: GlslRules, feature: &'static str) -> Result<()> {
        if self.rules.contains(rule) {
            Ok(())
        } else {
            Err(self.missing(feature))
        }
    }

    fn opcode(&self) -> Opcode {
        self.module
            .instructions
            .get(self.current)
            .map_or(Opcode::Nop, |i| i.opcode)
    }

    fn emit_body(&mut self) -> Result<()> {
        let module = self.module;
        let subroutines = &module.flow.subroutines;
        for sub in subroutines {
            self.w.line(&format!("void sub_{}();", sub.label));
        }
        if !subroutines.is_empty() {
            self.w.line("");
        }
        for sub in subroutines {
            self.scope = Scope::Subroutine;
            self.current = sub.inst;
            self.w.open(&format!("void sub_{}()", sub.label));
            self.emit_root(sub.root)?;
            self.w.close("");
            self.w.line("");
        }

        self.scope = Scope::Main;
        if module.stage == ShaderStage::Hull {
            return self.emit_hull_main();
        }
        let root = module
            .flow
            .phases
            .iter()
            .find(|p| p.kind == PhaseKind::Main)
            .map(|p| p.root);
        self.w.open("void main()");
        self.emit_load_inputs();
        if let Some(root) = root {
            self.emit_root(root)?;
        }
        self.w.close("");
        Ok(())
    }

    /// Hull shaders run the control-point phase per invocation, then the
    /// fork/join phases once per patch.
    fn emit_hull_main(&mut self) -> Result<()> {
        let module = self.module;
        let mut has_control_point = false;
        let mut patch_calls = Vec::new();
        let (mut forks, mut joins) = (0, 0);

        for phase in &module.flow.phases {
            match phase.kind {
                PhaseKind::HsDecls => continue,
                PhaseKind::Main | PhaseKind::HsControlPoint => {
                    self.scope = Scope::ControlPoint;
                    self.current = phase.marker.unwrap_or(0);
                    self.w.open("void control_point_phase()");
                    self.emit_root(phase.root)?;
                    self.w.close("");
                    has_control_point = true;
                }
                PhaseKind::HsFork | PhaseKind::HsJoin => {
                    let name = if phase.kind == PhaseKind::HsFork {
                        forks += 1;
                        format!("fork_phase{}", forks - 1)
                    } else {
                        joins += 1;
                        format!("join_phase{}", joins - 1)
                    };
                    self.scope = Scope::PatchConstant;
                    self.current = phase.marker.unwrap_or(0);
                    self.w.open(&format!("void {name}(int phase_instance)"));
                    self.emit_root(phase.root)?;
                    self.w.close("");
                    patch_calls.push((name, phase.instance_count.max(1)));
                }
            }
            self.w.line("");
        }

        self.scope = Scope::Main;
        self.w.open("void main()");
        self.emit_load_inputs();
        if has_control_point {
            self.w.line("control_point_phase();");
        } else {
            // No control-point phase: pass the input control points through.
            let regs: Vec<u32> = self.io.outputs.iter().map(|v| v.reg).collect();
            for reg in regs {
                if self.io.input_registers.contains(&reg) {
                    self.w.line(&format!("o[{reg}] = v{reg}[gl_InvocationID];"));
                }
            }
            self.scope = Scope::ControlPoint;
            self.emit_store_outputs(None);
            self.scope = Scope::Main;
        }
        if !patch_calls.is_empty() {
            self.w.line("barrier();");
            self.w.open("if (gl_InvocationID == 0)");
            for (name, count) in &patch_calls {
                for i in 0..*count {
                    self.w.line(&format!("{name}({i});"));
                }
            }
            self.emit_store_outputs(None);
            self.w.close("");
        }
        self.w.close("");
        Ok(())
    }

    /// Emits a function body, dropping a final `ret` in favour of the epilogue.
    fn emit_root(&mut self, root: BlockId) -> Result<()> {
        let module = self.module;
        let nodes = &module.flow.block(root).nodes;
        let trailing_ret = matches!(
            nodes.last(),
            Some(Node::Inst(i)) if module.instructions[*i].opcode == Opcode::Ret
        );
        let body = if trailing_ret { &nodes[..nodes.len() - 1] } else { &nodes[..] };
        for node in body {
            self.emit_node(node)?;
        }
        self.emit_epilogue();
        Ok(())
    }

    fn emit_epilogue(&mut self) {
        match self.scope {
            Scope::Subroutine | Scope::PatchConstant => {}
            Scope::Main if matches!(self.module.stage, ShaderStage::Geometry | ShaderStage::Compute) => {}
            Scope::Main | Scope::ControlPoint => self.emit_store_outputs(None),
        }
    }

    /// `return;` from the current function, copying outputs first.
    fn emit_return(&mut self) {
        self.emit_epilogue();
        self.w.line("return;");
    }

    fn emit_block(&mut self, id: BlockId) -> Result<()> {
        let module = self.module;
        for node in &module.flow.block(id).nodes {
            self.emit_node(node)?;
        }
        Ok(())
    }

    fn emit_node(&mut self, node: &Node) -> Result<()> {
        let module = self.module;
        match node {
            Node::Inst(i) => {
                self.current = *i;
                self.emit_instruction(&module.instructions[*i])?;
            }
            Node::If {
                inst,
                then_block,
                else_block,
                ..
            } => {
                self.current = *inst;
                let cond = self.condition(&module.instructions[*inst])?;
                self.w.open(&format!("if ({cond})"));
                self.emit_block(*then_block)?;
                if let Some(else_block) = else_block {
                    self.w.dedent();
                    self.w.line("} else {");
                    self.w.indent();
                    self.emit_block(*else_block)?;
                }
                self.w.close("");
            }
            Node::Loop { inst, body, .. } => {
                self.current = *inst;
                self.w.open("while (true)");
                self.emit_block(*body)?;
                self.w.close("");
            }
            Node::Switch { inst, cases, .. } => {
                self.current = *inst;
                let switch = &module.instructions[*inst];
                let selector = self.read_lane(self.src(switch, 0)?, 0, NumType::Int)?;
                self.w.open(&format!("switch ({selector})"));
                for (k, case) in cases.iter().enumerate() {
                    for &label in &case.labels {
                        self.current = label;
                        let label_inst = &module.instructions[label];
                        if label_inst.opcode == Opcode::Default {
                            self.w.line("default:");
                        } else {
                            let value = self.read_lane(self.src(label_inst, 0)?, 0, NumType::Int)?;
                            self.w.line(&format!("case {value}:"));
                        }
                    }
                    self.w.indent();
                    self.emit_block(case.body)?;
                    let last = k + 1 == cases.len();
                    if last && module.flow.block(case.body).nodes.is_empty() {
                        self.w.line("break;");
                    }
                    self.w.dedent();
                }
                self.w.close("");
            }
        }
        Ok(())
    }

    /// Boolean expression for the `_z`/`_nz` test of `inst`.
    fn condition(&self, inst: &Instruction) -> Result<String> {
        let value = paren(self.read_lane(self.src(inst, 0)?, 0, NumType::Uint)?);
        let op = if inst.test_nonzero { "!=" } else { "==" };
        Ok(format!("{value} {op} 0u"))
    }
}

#[cfg(test)]
mod tests;
