//! Semantic model of a decoded shader.
//!
//! [`ShaderModule`] ties the decoded token stream to the container's
//! signatures and reflection data, resolves structured control flow into a
//! block arena, and records which registers and resources the code actually
//! touches. The GLSL emitter, the disassembler and the query façade all read
//! from this model; none of them re-decode tokens.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use dxbc2glsl_dxbc::{DxbcFile, RdefChunk, SignatureChunk, SignatureKind};

use crate::error::ConvertError;
use crate::sm4::limits::MAX_STREAMS;
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4::{ShaderModel, ShaderStage, Sm4Program};
use crate::sm4_ir::{
    DecodedItem, Declaration, GlobalFlags, Instruction, Operand, Primitive, PrimitiveTopology,
    TessDomain, TessOutputPrimitive, TessPartitioning,
};

/// Index into [`ControlFlow::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// A straight-line run of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub nodes: Vec<Node>,
}

/// One element of a block. Instruction positions index
/// [`ShaderModule::instructions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Inst(usize),
    If {
        inst: usize,
        then_block: BlockId,
        else_inst: Option<usize>,
        else_block: Option<BlockId>,
        end_inst: usize,
    },
    Loop {
        inst: usize,
        body: BlockId,
        end_inst: usize,
    },
    Switch {
        inst: usize,
        cases: Vec<SwitchCase>,
        end_inst: usize,
    },
}

/// Consecutive `case`/`default` labels sharing one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    pub labels: Vec<usize>,
    pub body: BlockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// The whole program of a non-hull stage.
    Main,
    HsDecls,
    HsControlPoint,
    HsFork,
    HsJoin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub kind: PhaseKind,
    /// Index of the `hs_*` marker instruction.
    pub marker: Option<usize>,
    pub root: BlockId,
    /// Fork/join phase instance count (1 otherwise).
    pub instance_count: u32,
}

/// A `label l#` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subroutine {
    pub label: u32,
    /// Index of the `label` instruction.
    pub inst: usize,
    pub root: BlockId,
}

/// Structured control flow of a whole program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlow {
    pub blocks: Vec<Block>,
    pub phases: Vec<Phase>,
    pub subroutines: Vec<Subroutine>,
}

impl ControlFlow {
    /// Builds the block tree for a flat instruction list.
    pub fn build(instructions: &[Instruction]) -> Result<Self, ConvertError> {
        let mut builder = FlowBuilder::new();
        for (index, inst) in instructions.iter().enumerate() {
            builder.push(index, inst)?;
        }
        builder.finish()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn phase(&self, kind: PhaseKind) -> impl Iterator<Item = &Phase> {
        self.phases.iter().filter(move |p| p.kind == kind)
    }

    /// Instruction indices in program order.
    pub fn flatten(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for phase in &self.phases {
            out.extend(phase.marker);
            self.flatten_block(phase.root, &mut out);
        }
        for sub in &self.subroutines {
            out.push(sub.inst);
            self.flatten_block(sub.root, &mut out);
        }
        out
    }

    fn flatten_block(&self, id: BlockId, out: &mut Vec<usize>) {
        for node in &self.block(id).nodes {
            match node {
                Node::Inst(i) => out.push(*i),
                Node::If {
                    inst,
                    then_block,
                    else_inst,
                    else_block,
                    end_inst,
                } => {
                    out.push(*inst);
                    self.flatten_block(*then_block, out);
                    out.extend(*else_inst);
                    if let Some(else_block) = else_block {
                        self.flatten_block(*else_block, out);
                    }
                    out.push(*end_inst);
                }
                Node::Loop {
                    inst,
                    body,
                    end_inst,
                } => {
                    out.push(*inst);
                    self.flatten_block(*body, out);
                    out.push(*end_inst);
                }
                Node::Switch {
                    inst,
                    cases,
                    end_inst,
                } => {
                    out.push(*inst);
                    for case in cases {
                        out.extend(&case.labels);
                        self.flatten_block(case.body, out);
                    }
                    out.push(*end_inst);
                }
            }
        }
    }
}

enum Open {
    If {
        inst: usize,
        then_block: BlockId,
        else_inst: Option<usize>,
        else_block: Option<BlockId>,
    },
    Loop {
        inst: usize,
        body: BlockId,
    },
    Switch {
        inst: usize,
        cases: Vec<SwitchCase>,
    },
}

impl Open {
    fn inst(&self) -> usize {
        match self {
            Open::If { inst, .. } | Open::Loop { inst, .. } | Open::Switch { inst, .. } => *inst,
        }
    }

    fn unterminated(&self) -> &'static str {
        match self {
            Open::If { .. } => "`if` is never closed by `endif`",
            Open::Loop { .. } => "`loop` is never closed by `endloop`",
            Open::Switch { .. } => "`switch` is never closed by `endswitch`",
        }
    }
}

/// Linear-pass builder with an explicit stack of open constructs.
struct FlowBuilder {
    flow: ControlFlow,
    stack: Vec<Open>,
    root: BlockId,
}

impl FlowBuilder {
    fn new() -> Self {
        let mut flow = ControlFlow::default();
        flow.blocks.push(Block::default());
        flow.phases.push(Phase {
            kind: PhaseKind::Main,
            marker: None,
            root: BlockId(0),
            instance_count: 1,
        });
        Self {
            flow,
            stack: Vec::new(),
            root: BlockId(0),
        }
    }

    fn new_block(&mut self) -> BlockId {
        self.flow.blocks.push(Block::default());
        BlockId((self.flow.blocks.len() - 1) as u32)
    }

    fn current(&self, index: usize) -> Result<BlockId, ConvertError> {
        match self.stack.last() {
            None => Ok(self.root),
            Some(Open::If {
                then_block,
                else_block,
                ..
            }) => Ok(else_block.unwrap_or(*then_block)),
            Some(Open::Loop { body, .. }) => Ok(*body),
            Some(Open::Switch { cases, .. }) => match cases.last() {
                Some(case) => Ok(case.body),
                None => Err(unbalanced(index, "instruction before the first `case` of a `switch`")),
            },
        }
    }

    fn append(&mut self, index: usize, node: Node) -> Result<(), ConvertError> {
        let id = self.current(index)?;
        self.flow.blocks[id.0 as usize].nodes.push(node);
        Ok(())
    }

    fn start_root(&mut self, index: usize, what: &'static str) -> Result<BlockId, ConvertError> {
        if !self.stack.is_empty() {
            return Err(unbalanced(index, what));
        }
        let root = self.new_block();
        self.root = root;
        Ok(root)
    }

    fn set_instance_count(&mut self, count: u32) {
        if let Some(phase) = self.flow.phases.last_mut() {
            phase.instance_count = count;
        }
    }

    fn push(&mut self, index: usize, inst: &Instruction) -> Result<(), ConvertError> {
        match inst.opcode {
            Opcode::If => {
                let then_block = self.new_block();
                self.stack.push(Open::If {
                    inst: index,
                    then_block,
                    else_inst: None,
                    else_block: None,
                });
            }
            Opcode::Else => {
                let block = self.new_block();
                match self.stack.last_mut() {
                    Some(Open::If {
                        else_inst,
                        else_block,
                        ..
                    }) => {
                        if else_inst.is_some() {
                            return Err(unbalanced(index, "second `else` for one `if`"));
                        }
                        *else_inst = Some(index);
                        *else_block = Some(block);
                    }
                    _ => return Err(unbalanced(index, "`else` without a matching `if`")),
                }
            }
            Opcode::EndIf => match self.stack.pop() {
                Some(Open::If {
                    inst,
                    then_block,
                    else_inst,
                    else_block,
                }) => self.append(
                    index,
                    Node::If {
                        inst,
                        then_block,
                        else_inst,
                        else_block,
                        end_inst: index,
                    },
                )?,
                _ => return Err(unbalanced(index, "`endif` without a matching `if`")),
            },
            Opcode::Loop => {
                let body = self.new_block();
                self.stack.push(Open::Loop { inst: index, body });
            }
            Opcode::EndLoop => match self.stack.pop() {
                Some(Open::Loop { inst, body }) => self.append(
                    index,
                    Node::Loop {
                        inst,
                        body,
                        end_inst: index,
                    },
                )?,
                _ => return Err(unbalanced(index, "`endloop` without a matching `loop`")),
            },
            Opcode::Switch => self.stack.push(Open::Switch {
                inst: index,
                cases: Vec::new(),
            }),
            Opcode::Case | Opcode::Default => {
                let shares_body = match self.stack.last() {
                    Some(Open::Switch { cases, .. }) => cases
                        .last()
                        .is_some_and(|c| self.flow.blocks[c.body.0 as usize].nodes.is_empty()),
                    _ => return Err(unbalanced(index, "`case` outside of a `switch`")),
                };
                let new_body = (!shares_body).then(|| self.new_block());
                if let Some(Open::Switch { cases, .. }) = self.stack.last_mut() {
                    match (new_body, cases.last_mut()) {
                        (Some(body), _) => cases.push(SwitchCase {
                            labels: vec![index],
                            body,
                        }),
                        (None, Some(last)) => last.labels.push(index),
                        (None, None) => {}
                    }
                }
            }
            Opcode::EndSwitch => match self.stack.pop() {
                Some(Open::Switch { inst, cases }) => self.append(
                    index,
                    Node::Switch {
                        inst,
                        cases,
                        end_inst: index,
                    },
                )?,
                _ => return Err(unbalanced(index, "`endswitch` without a matching `switch`")),
            },
            Opcode::HsDecls
            | Opcode::HsControlPointPhase
            | Opcode::HsForkPhase
            | Opcode::HsJoinPhase => {
                let root = self.start_root(index, "hull shader phase starts inside an open block")?;
                let kind = match inst.opcode {
                    Opcode::HsDecls => PhaseKind::HsDecls,
                    Opcode::HsControlPointPhase => PhaseKind::HsControlPoint,
                    Opcode::HsForkPhase => PhaseKind::HsFork,
                    _ => PhaseKind::HsJoin,
                };
                self.flow.phases.push(Phase {
                    kind,
                    marker: Some(index),
                    root,
                    instance_count: 1,
                });
            }
            Opcode::Label => {
                let root = self.start_root(index, "`label` inside an open block")?;
                let label = inst.operands.first().map(Operand::reg).unwrap_or(0);
                self.flow.subroutines.push(Subroutine {
                    label,
                    inst: index,
                    root,
                });
            }
            _ => self.append(index, Node::Inst(index))?,
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ControlFlow, ConvertError> {
        if let Some(open) = self.stack.pop() {
            return Err(unbalanced(open.inst(), open.unterminated()));
        }
        // Hull shaders start with `hs_decls`; drop the implicit main phase
        // when nothing landed in it.
        if self.flow.phases.len() > 1 && self.flow.blocks[0].nodes.is_empty() {
            self.flow.phases.remove(0);
        }
        Ok(self.flow)
    }
}

fn unbalanced(index: usize, reason: &'static str) -> ConvertError {
    ConvertError::UnbalancedControlFlow { index, reason }
}

/// Input, output and patch-constant signatures (empty when absent).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signatures {
    pub input: SignatureChunk,
    pub output: SignatureChunk,
    pub patch_constant: SignatureChunk,
}

/// Order of items in the original token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEntry {
    Decl(usize),
    Inst(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CbufferUsage {
    /// Registers read with an immediate index.
    pub registers: BTreeSet<u32>,
    /// Lowest base register of any relatively indexed read.
    pub dynamic_from: Option<u32>,
}

impl CbufferUsage {
    /// `true` if any read touches registers `first..=last`.
    pub fn overlaps(&self, first: u32, last: u32) -> bool {
        self.dynamic_from.is_some_and(|d| last >= d)
            || self.registers.range(first..=last).next().is_some()
    }

    pub fn max_register(&self) -> Option<u32> {
        self.registers.iter().next_back().copied()
    }
}

/// A `(texture, sampler)` combination used by a sampling instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SamplerPair {
    pub texture: u32,
    pub sampler: u32,
    /// Sampled with a comparison (`*_c`) instruction.
    pub shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexableTempInfo {
    pub size: u32,
    pub components: u32,
}

/// What the instruction stream actually reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub cbuffers: BTreeMap<u32, CbufferUsage>,
    pub textures: BTreeSet<u32>,
    pub samplers: BTreeSet<u32>,
    pub uavs: BTreeSet<u32>,
    pub sampler_pairs: BTreeSet<SamplerPair>,
    /// Textures read without a sampler (`ld`, `resinfo`, ...).
    pub fetched_textures: BTreeSet<u32>,
    /// Highest written component + 1 per temp (4 when only read).
    pub temp_widths: BTreeMap<u32, u8>,
    pub indexable_temps: BTreeMap<u32, IndexableTempInfo>,
    /// Per reflected constant buffer, per variable: referenced by the code.
    pub used_variables: Vec<Vec<bool>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GsInfo {
    pub input_primitive: Option<Primitive>,
    /// Output topology per stream.
    pub output_topologies: Vec<PrimitiveTopology>,
    pub max_output_vertices: u32,
    pub instance_count: u32,
    pub streams: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TessInfo {
    pub input_control_points: u32,
    pub output_control_points: u32,
    pub domain: Option<TessDomain>,
    pub partitioning: Option<TessPartitioning>,
    pub output_primitive: Option<TessOutputPrimitive>,
    pub max_tess_factor: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SharedMemoryKind {
    Raw { byte_count: u32 },
    Structured { stride: u32, count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SharedMemory {
    pub slot: u32,
    pub kind: SharedMemoryKind,
}

impl SharedMemory {
    /// Size in 32-bit words.
    pub fn dwords(&self) -> u32 {
        match self.kind {
            SharedMemoryKind::Raw { byte_count } => byte_count.div_ceil(4),
            SharedMemoryKind::Structured { stride, count } => {
                stride.saturating_mul(count).div_ceil(4)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ComputeInfo {
    pub thread_group: [u32; 3],
    pub shared_memory: Vec<SharedMemory>,
}

/// Everything known about one shader.
#[derive(Debug, Clone)]
pub struct ShaderModule {
    pub stage: ShaderStage,
    pub model: ShaderModel,
    pub signatures: Signatures,
    pub reflection: Option<RdefChunk>,
    pub declarations: Vec<Declaration>,
    pub instructions: Vec<Instruction>,
    pub listing: Vec<ListingEntry>,
    pub flow: ControlFlow,
    pub usage: Usage,
    pub global_flags: GlobalFlags,
    pub gs: GsInfo,
    pub tess: TessInfo,
    pub compute: ComputeInfo,
}

impl ShaderModule {
    /// Decodes the shader chunk, signatures and reflection of `dxbc`.
    pub fn build(dxbc: &DxbcFile<'_>) -> Result<Self, ConvertError> {
        let program = Sm4Program::from_dxbc(dxbc)?.ok_or(ConvertError::MissingShaderChunk)?;
        let items = program.instructions().collect::<Result<Vec<_>, _>>()?;

        let signature = |kind| -> Result<SignatureChunk, ConvertError> {
            Ok(dxbc.get_signature(kind).transpose()?.unwrap_or_default())
        };
        let signatures = Signatures {
            input: signature(SignatureKind::Input)?,
            output: signature(SignatureKind::Output)?,
            patch_constant: signature(SignatureKind::PatchConstant)?,
        };
        let reflection = dxbc.get_rdef().transpose()?;

        Self::from_parts(program.stage, program.model, items, signatures, reflection)
    }

    /// Builds the model from already decoded parts.
    ///
    /// Counts and indices are expected to lie within [`crate::sm4::limits`],
    /// which the decoder enforces.
    pub fn from_parts(
        stage: ShaderStage,
        model: ShaderModel,
        items: Vec<DecodedItem>,
        signatures: Signatures,
        reflection: Option<RdefChunk>,
    ) -> Result<Self, ConvertError> {
        let mut declarations = Vec::new();
        let mut instructions = Vec::new();
        let mut listing = Vec::with_capacity(items.len());
        let mut flow = FlowBuilder::new();

        for item in items {
            match item {
                DecodedItem::Declaration(decl) => {
                    match decl {
                        Declaration::HsForkPhaseInstanceCount(n)
                        | Declaration::HsJoinPhaseInstanceCount(n) => flow.set_instance_count(n),
                        _ => {}
                    }
                    listing.push(ListingEntry::Decl(declarations.len()));
                    declarations.push(decl);
                }
                DecodedItem::Instruction(inst) => {
                    let index = instructions.len();
                    flow.push(index, &inst)?;
                    listing.push(ListingEntry::Inst(index));
                    instructions.push(inst);
                }
            }
        }
        let flow = flow.finish()?;

        let mut module = Self {
            stage,
            model,
            signatures,
            reflection,
            declarations,
            instructions,
            listing,
            flow,
            usage: Usage::default(),
            global_flags: GlobalFlags::empty(),
            gs: GsInfo::default(),
            tess: TessInfo::default(),
            compute: ComputeInfo::default(),
        };
        module.collect_declarations();
        module.collect_usage();
        debug!(
            stage = %module.stage,
            declarations = module.declarations.len(),
            instructions = module.instructions.len(),
            blocks = module.flow.blocks.len(),
            "built shader module"
        );
        Ok(module)
    }

    fn collect_declarations(&mut self) {
        let mut stream = 0usize;
        self.gs.instance_count = 1;
        for decl in &self.declarations {
            match *decl {
                Declaration::GlobalFlags(flags) => self.global_flags |= flags,
                Declaration::GsInputPrimitive(p) => self.gs.input_primitive = Some(p),
                Declaration::Stream(s) => {
                    stream = s as usize;
                    self.gs.streams.push(s);
                }
                Declaration::GsOutputTopology(_) if stream >= MAX_STREAMS as usize => {
                    trace!(stream, "ignoring topology of an out-of-range stream");
                }
                Declaration::GsOutputTopology(t) => {
                    if self.gs.output_topologies.len() <= stream {
                        self.gs
                            .output_topologies
                            .resize(stream + 1, PrimitiveTopology::Undefined);
                    }
                    self.gs.output_topologies[stream] = t;
                }
                Declaration::GsMaxOutputVertexCount(n) => self.gs.max_output_vertices = n,
                Declaration::GsInstanceCount(n) => self.gs.instance_count = n,
                Declaration::InputControlPointCount(n) => self.tess.input_control_points = n,
                Declaration::OutputControlPointCount(n) => self.tess.output_control_points = n,
                Declaration::TessDomain(d) => self.tess.domain = Some(d),
                Declaration::TessPartitioning(p) => self.tess.partitioning = Some(p),
                Declaration::TessOutputPrimitive(p) => self.tess.output_primitive = Some(p),
                Declaration::HsMaxTessFactor(f) => self.tess.max_tess_factor = Some(f),
                Declaration::ThreadGroup(size) => self.compute.thread_group = size,
                Declaration::TgsmRaw { slot, byte_count } => {
                    self.compute.shared_memory.push(SharedMemory {
                        slot,
                        kind: SharedMemoryKind::Raw { byte_count },
                    })
                }
                Declaration::TgsmStructured {
                    slot,
                    stride,
                    count,
                } => self.compute.shared_memory.push(SharedMemory {
                    slot,
                    kind: SharedMemoryKind::Structured { stride, count },
                }),
                Declaration::IndexableTemp {
                    reg,
                    size,
                    components,
                } => {
                    self.usage
                        .indexable_temps
                        .insert(reg, IndexableTempInfo { size, components });
                }
                Declaration::ConstantBuffer {
                    slot,
                    dynamic_indexed: true,
                    ..
                } => {
                    self.usage.cbuffers.entry(slot).or_default().dynamic_from = Some(0);
                }
                _ => {}
            }
        }
    }

    fn collect_usage(&mut self) {
        let mut usage = core::mem::take(&mut self.usage);
        for inst in &self.instructions {
            let dst_count = inst.opcode.dst_count();
            for (i, op) in inst.operands.iter().enumerate() {
                let is_dst = i < dst_count;
                if is_dst && op.ty == OperandType::Temp {
                    let width = op.mask().highest().map_or(0, |c| c + 1);
                    let entry = usage.temp_widths.entry(op.reg()).or_insert(0);
                    *entry = (*entry).max(width);
                }
                record_operand(&mut usage, op, is_dst);
            }
            record_resources(&mut usage, inst);
        }
        // Temps that are only ever read keep a full vec4.
        for width in usage.temp_widths.values_mut() {
            if *width == 0 {
                *width = 4;
            }
        }

        if let Some(rdef) = &self.reflection {
            usage.used_variables = rdef
                .constant_buffers
                .iter()
                .map(|cb| {
                    let reads = cb.bind_point.and_then(|slot| usage.cbuffers.get(&slot));
                    cb.variables
                        .iter()
                        .map(|var| {
                            let range = var.byte_range();
                            let first = range.start / 16;
                            let last = range.end.saturating_sub(1).max(range.start) / 16;
                            let used = reads.is_some_and(|r| r.overlaps(first, last));
                            if !used {
                                trace!(cbuffer = %cb.name, variable = %var.name, "eliding unused cbuffer variable");
                            }
                            used
                        })
                        .collect()
                })
                .collect();
        }
        self.usage = usage;
    }

    /// Declaration of texture `t{slot}`.
    pub fn resource_decl(&self, slot: u32) -> Option<&Declaration> {
        self.declarations.iter().find(|d| match d {
            Declaration::Resource { slot: s, .. }
            | Declaration::ResourceRaw { slot: s }
            | Declaration::ResourceStructured { slot: s, .. } => *s == slot,
            _ => false,
        })
    }

    /// Declaration of UAV `u{slot}`.
    pub fn uav_decl(&self, slot: u32) -> Option<&Declaration> {
        self.declarations.iter().find(|d| match d {
            Declaration::UavTyped { slot: s, .. }
            | Declaration::UavRaw { slot: s, .. }
            | Declaration::UavStructured { slot: s, .. } => *s == slot,
            _ => false,
        })
    }

    /// Declared size of `cb{slot}` in 16-byte registers.
    pub fn cbuffer_decl_size(&self, slot: u32) -> Option<u32> {
        self.declarations.iter().find_map(|d| match *d {
            Declaration::ConstantBuffer {
                slot: s, size_vec4, ..
            } if s == slot => Some(size_vec4),
            _ => None,
        })
    }

    /// The immediate constant buffer, if any.
    pub fn immediate_constant_buffer(&self) -> Option<&[[u32; 4]]> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::ImmediateConstantBuffer(data) => Some(data.as_slice()),
            _ => None,
        })
    }

    /// Number of control points per input primitive (GS/HS/DS), `None` when
    /// a per-vertex stage lacks the declaration that fixes it.
    pub fn input_vertex_count(&self) -> Option<u32> {
        match self.stage {
            ShaderStage::Geometry => self.gs.input_primitive.and_then(Primitive::vertex_count),
            ShaderStage::Hull | ShaderStage::Domain => {
                Some(self.tess.input_control_points).filter(|&n| n > 0)
            }
            _ => Some(1),
        }
    }
}

fn record_operand(usage: &mut Usage, op: &Operand, is_dst: bool) {
    for index in &op.indices {
        if let Some(rel) = index.relative() {
            record_operand(usage, rel, false);
        }
    }
    match op.ty {
        OperandType::ConstantBuffer => {
            let slot = op.reg();
            let entry = usage.cbuffers.entry(slot).or_default();
            match op.indices.get(1) {
                Some(index) if index.relative().is_some() => {
                    let base = index.imm();
                    entry.dynamic_from = Some(entry.dynamic_from.map_or(base, |d| d.min(base)));
                }
                Some(index) => {
                    entry.registers.insert(index.imm());
                }
                None => {}
            }
        }
        OperandType::Resource => {
            usage.textures.insert(op.reg());
        }
        OperandType::Sampler => {
            usage.samplers.insert(op.reg());
        }
        OperandType::UnorderedAccessView => {
            usage.uavs.insert(op.reg());
        }
        OperandType::Temp if !is_dst => {
            usage.temp_widths.entry(op.reg()).or_insert(0);
        }
        _ => {}
    }
}

fn record_resources(usage: &mut Usage, inst: &Instruction) {
    let texture = inst
        .operands
        .iter()
        .find(|op| op.ty == OperandType::Resource)
        .map(Operand::reg);
    let sampler = inst
        .operands
        .iter()
        .find(|op| op.ty == OperandType::Sampler)
        .map(Operand::reg);

    match (inst.opcode, texture, sampler) {
        (op, Some(texture), Some(sampler)) if op.is_sample() => {
            usage.sampler_pairs.insert(SamplerPair {
                texture,
                sampler,
                shadow: op.is_comparison_sample(),
            });
        }
        (
            Opcode::Ld | Opcode::LdMs | Opcode::Resinfo | Opcode::SampleInfo | Opcode::Bufinfo,
            Some(texture),
            _,
        ) => {
            usage.fetched_textures.insert(texture);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm4_ir::{ComponentSelection, OperandIndex, WriteMask};

    fn inst(opcode: Opcode) -> Instruction {
        Instruction::new(opcode, 0)
    }

    fn temp_dst(reg: u32, mask: u8) -> Operand {
        let mut op = Operand::new(OperandType::Temp);
        op.num_components = 4;
        op.selection = ComponentSelection::Mask(WriteMask(mask));
        op.indices = vec![OperandIndex::Imm32(reg)];
        op
    }

    fn cb_src(slot: u32, reg: OperandIndex) -> Operand {
        let mut op = Operand::new(OperandType::ConstantBuffer);
        op.num_components = 4;
        op.selection = ComponentSelection::Swizzle(crate::sm4_ir::Swizzle::XYZW);
        op.indices = vec![OperandIndex::Imm32(slot), reg];
        op
    }

    #[test]
    fn if_else_nesting_builds_tree() {
        let insts: Vec<_> = [
            Opcode::If,
            Opcode::Mov,
            Opcode::Else,
            Opcode::Loop,
            Opcode::Break,
            Opcode::EndLoop,
            Opcode::EndIf,
            Opcode::Ret,
        ]
        .into_iter()
        .map(inst)
        .collect();
        let flow = ControlFlow::build(&insts).unwrap();
        assert_eq!(flow.phases.len(), 1);
        let root = flow.block(flow.phases[0].root);
        assert_eq!(root.nodes.len(), 2);
        match &root.nodes[0] {
            Node::If {
                inst: 0,
                else_inst: Some(2),
                else_block: Some(else_block),
                end_inst: 6,
                ..
            } => {
                assert!(matches!(
                    flow.block(*else_block).nodes[..],
                    [Node::Loop { inst: 3, end_inst: 5, .. }]
                ));
            }
            other => panic!("unexpected node {other:?}"),
        }
        assert_eq!(flow.flatten(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn consecutive_case_labels_share_a_body() {
        let insts: Vec<_> = [
            Opcode::Switch,
            Opcode::Case,
            Opcode::Case,
            Opcode::Mov,
            Opcode::Break,
            Opcode::Default,
            Opcode::Break,
            Opcode::EndSwitch,
        ]
        .into_iter()
        .map(inst)
        .collect();
        let flow = ControlFlow::build(&insts).unwrap();
        match &flow.block(flow.phases[0].root).nodes[0] {
            Node::Switch { cases, .. } => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].labels, vec![1, 2]);
                assert_eq!(cases[1].labels, vec![5]);
            }
            other => panic!("unexpected node {other:?}"),
        }
        assert_eq!(flow.flatten(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn unbalanced_constructs_are_rejected() {
        let cases: [(&[Opcode], usize); 5] = [
            (&[Opcode::EndIf], 0),
            (&[Opcode::If, Opcode::EndLoop], 1),
            (&[Opcode::Else], 0),
            (&[Opcode::Loop, Opcode::Mov], 0),
            (&[Opcode::Switch, Opcode::Mov, Opcode::EndSwitch], 1),
        ];
        for (ops, at) in cases {
            let insts: Vec<_> = ops.iter().copied().map(inst).collect();
            match ControlFlow::build(&insts) {
                Err(ConvertError::UnbalancedControlFlow { index, .. }) => {
                    assert_eq!(index, at, "{ops:?}")
                }
                other => panic!("{ops:?}: expected unbalanced error, got {other:?}"),
            }
        }
    }

    #[test]
    fn hull_phases_and_subroutines_split_roots() {
        let mut label = inst(Opcode::Label);
        let mut label_op = Operand::new(OperandType::Label);
        label_op.indices = vec![OperandIndex::Imm32(3)];
        label.operands.push(label_op);
        let insts = vec![
            inst(Opcode::HsDecls),
            inst(Opcode::HsForkPhase),
            inst(Opcode::Mov),
            inst(Opcode::Ret),
            inst(Opcode::HsJoinPhase),
            inst(Opcode::Ret),
            label,
            inst(Opcode::Ret),
        ];
        let flow = ControlFlow::build(&insts).unwrap();
        let kinds: Vec<_> = flow.phases.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PhaseKind::HsDecls, PhaseKind::HsFork, PhaseKind::HsJoin]);
        assert_eq!(flow.subroutines.len(), 1);
        assert_eq!(flow.subroutines[0].label, 3);
        assert_eq!(flow.flatten(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn usage_tracks_temps_and_cbuffer_registers() {
        let mut mov = inst(Opcode::Mov);
        mov.operands = vec![temp_dst(2, 0b0011), cb_src(0, OperandIndex::Imm32(3))];
        let mut add = inst(Opcode::Add);
        let mut rel = temp_dst(5, 0);
        rel.num_components = 4;
        rel.selection = ComponentSelection::Select1(0);
        add.operands = vec![
            temp_dst(2, 0b0100),
            cb_src(1, OperandIndex::Imm32PlusRelative(4, Box::new(rel))),
            temp_dst(2, 0b1111),
        ];
        let items = vec![DecodedItem::Instruction(mov), DecodedItem::Instruction(add)];
        let module = ShaderModule::from_parts(
            ShaderStage::Pixel,
            ShaderModel { major: 5, minor: 0 },
            items,
            Signatures::default(),
            None,
        )
        .unwrap();

        assert_eq!(module.usage.temp_widths.get(&2), Some(&3));
        // r5 is only used as a relative index.
        assert_eq!(module.usage.temp_widths.get(&5), Some(&4));
        let cb0 = &module.usage.cbuffers[&0];
        assert!(cb0.overlaps(3, 3));
        assert!(!cb0.overlaps(0, 2));
        let cb1 = &module.usage.cbuffers[&1];
        assert_eq!(cb1.dynamic_from, Some(4));
        assert!(cb1.overlaps(7, 9));
        assert!(!cb1.overlaps(0, 3));
    }

    #[test]
    fn declarations_fill_stage_metadata() {
        let items = vec![
            DecodedItem::Declaration(Declaration::GsInputPrimitive(Primitive::Triangle)),
            DecodedItem::Declaration(Declaration::Stream(0)),
            DecodedItem::Declaration(Declaration::GsOutputTopology(
                PrimitiveTopology::TriangleStrip,
            )),
            DecodedItem::Declaration(Declaration::Stream(1)),
            DecodedItem::Declaration(Declaration::GsOutputTopology(PrimitiveTopology::PointList)),
            DecodedItem::Declaration(Declaration::GsMaxOutputVertexCount(6)),
            DecodedItem::Declaration(Declaration::GsInstanceCount(2)),
        ];
        let module = ShaderModule::from_parts(
            ShaderStage::Geometry,
            ShaderModel { major: 5, minor: 0 },
            items,
            Signatures::default(),
            None,
        )
        .unwrap();
        assert_eq!(module.gs.input_primitive, Some(Primitive::Triangle));
        assert_eq!(
            module.gs.output_topologies,
            vec![PrimitiveTopology::TriangleStrip, PrimitiveTopology::PointList]
        );
        assert_eq!(module.gs.streams, vec![0, 1]);
        assert_eq!(module.gs.max_output_vertices, 6);
        assert_eq!(module.gs.instance_count, 2);
        assert_eq!(module.input_vertex_count(), Some(3));
        assert_eq!(module.listing.len(), 7);
    }
}
