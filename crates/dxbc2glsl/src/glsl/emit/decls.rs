//! Resource planning and the declaration section.
//!
//! Constant buffers become std140 uniform blocks whose members reproduce the
//! D3D packing; when reflection is missing or the layout cannot be expressed
//! the buffer falls back to a raw `vec4` array indexed by register.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use dxbc2glsl_dxbc::{RdefChunk, RdefConstantBuffer, RdefVariable, RegisterClass, VariableClass, VariableType};

use super::expr::{literal, Comp, NumType};
use super::{Emitter, Result};
use crate::error::ShaderTranslateError;
use crate::glsl::version::{GlslRules, GlslVersion};
use crate::model::{SamplerPair, ShaderModule, SharedMemoryKind};
use crate::sm4::limits::MAX_CBUFFER_REGISTERS;
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4::ShaderStage;
use crate::sm4_ir::{Declaration, Operand, ResourceDimension, ReturnType};

const KEYWORDS: &[&str] = &[
    "active", "asm", "atomic_uint", "attribute", "bool", "break", "buffer", "case", "cast",
    "centroid", "class", "coherent", "column_major", "common", "const", "continue", "default",
    "discard", "do", "double", "else", "enum", "extern", "external", "false", "filter", "fixed",
    "flat", "float", "for", "fvec2", "fvec3", "fvec4", "goto", "half", "highp", "hvec2", "hvec3",
    "hvec4", "if", "in", "inline", "inout", "input", "int", "interface", "invariant", "layout",
    "long", "lowp", "main", "mediump", "namespace", "noinline", "noperspective", "out", "output",
    "packed", "partition", "patch", "precise", "precision", "public", "readonly", "resource",
    "restrict", "return", "row_major", "sample", "shared", "short", "sizeof", "smooth", "static",
    "struct", "subroutine", "superp", "switch", "template", "this", "true", "typedef", "uint",
    "uniform", "union", "unsigned", "using", "varying", "void", "volatile", "while", "writeonly",
];

/// Names the emitter itself declares.
const INTERNAL: &[&str] = &["v", "o", "icb", "phase_instance"];

/// `true` for GLSL type names such as `vec3`, `dmat4x2` or `usampler2D`.
fn is_type_name(name: &str) -> bool {
    let rest = name
        .strip_prefix(['i', 'u', 'b', 'd'])
        .filter(|r| r.starts_with("vec") || r.starts_with("mat") || r.starts_with("sampler") || r.starts_with("image"))
        .unwrap_or(name);
    rest.starts_with("sampler")
        || rest.starts_with("image")
        || ["vec", "mat"].iter().any(|p| {
            rest.strip_prefix(p)
                .is_some_and(|tail| !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit() || c == 'x'))
        })
}

/// `r0`, `x3`, `g1`, `v12`: register-file names used by the emitter.
fn is_register_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('r' | 'x' | 'g' | 'v'))
        && name.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}

/// A valid GLSL identifier for a D3D name that cannot clash with built-ins,
/// keywords or the emitter's own variables.
pub(super) fn ident(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    // GLSL reserves names containing `__` and the `gl_` prefix.
    while out.contains("__") {
        out = out.replace("__", "_");
    }
    if out.starts_with("gl_") {
        out.insert(0, '_');
    }
    let reserved = KEYWORDS.contains(&out.as_str())
        || INTERNAL.contains(&out.as_str())
        || is_type_name(&out)
        || is_register_name(&out)
        || out.starts_with("_pad")
        || out.starts_with("_t")
        || out.starts_with("sub_");
    if reserved {
        out.push('_');
    }
    out
}

/// Identifiers already taken at global scope.
#[derive(Debug, Clone, Default)]
pub(super) struct Names(BTreeSet<String>);

impl Names {
    /// `name`, or `name_N` for the first free `N` when two D3D names
    /// sanitise to the same identifier.
    pub(super) fn claim(&mut self, name: String) -> String {
        let name = if self.0.contains(&name) {
            let sep = if name.ends_with('_') { "" } else { "_" };
            (1u32..)
                .map(|n| format!("{name}{sep}{n}"))
                .find(|candidate| !self.0.contains(candidate))
                .unwrap_or(name)
        } else {
            name
        };
        self.0.insert(name.clone());
        name
    }
}

/// Reflection name of a binding, or `{prefix}{slot}`.
fn binding_name(rdef: Option<&RdefChunk>, class: RegisterClass, slot: u32, prefix: &str) -> String {
    match rdef.and_then(|r| r.resource_at(class, slot)) {
        Some(binding) if binding.bind_count > 1 => {
            format!("{}_{}", ident(&binding.name), slot - binding.bind_point)
        }
        Some(binding) => ident(&binding.name),
        None => format!("{prefix}{slot}"),
    }
}

fn return_num_type(ret: ReturnType) -> NumType {
    match ret {
        ReturnType::Sint => NumType::Int,
        ReturnType::Uint => NumType::Uint,
        _ => NumType::Float,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ResourceKind {
    Typed { dim: ResourceDimension, ret: NumType },
    Raw,
    Structured { stride: u32 },
}

#[derive(Debug, Clone)]
pub(super) struct TexturePlan {
    pub(super) name: String,
    pub(super) kind: ResourceKind,
}

#[derive(Debug, Clone)]
pub(super) struct UavPlan {
    pub(super) name: String,
    pub(super) kind: ResourceKind,
    pub(super) coherent: bool,
    /// Loaded or used atomically: single-channel format, read/write.
    pub(super) single_channel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberShape {
    /// Scalar or vector.
    Vector { width: u8 },
    /// One element per register.
    Array { width: u8, count: u32 },
    /// `rows`×`cols` matrix (HLSL orientation), optionally an array.
    Matrix {
        rows: u8,
        cols: u8,
        row_major: bool,
        count: u32,
    },
}

#[derive(Debug, Clone)]
pub(super) struct CbMember {
    name: String,
    /// Byte offset in the buffer.
    offset: u32,
    shape: MemberShape,
    native: NumType,
}

impl CbMember {
    fn size(&self) -> u32 {
        match self.shape {
            MemberShape::Vector { width } => u32::from(width) * 4,
            MemberShape::Array { width, count } => (count.max(1) - 1) * 16 + u32::from(width) * 4,
            MemberShape::Matrix { rows, cols, row_major, count } => {
                let (regs, width) = if row_major { (rows, cols) } else { (cols, rows) };
                let per = u32::from(regs) * 16;
                (count.max(1) - 1) * per + (u32::from(regs) - 1) * 16 + u32::from(width) * 4
            }
        }
    }

    /// Component at byte `byte` of the buffer, `None` when outside this member.
    fn component(&self, byte: u32) -> Option<Comp> {
        let off = byte.checked_sub(self.offset).filter(|&off| off < self.size())?;
        let lit0 = Some(Comp::Lit(0));
        match self.shape {
            MemberShape::Vector { width } => {
                Some(Comp::vector(self.name.clone(), width, (off / 4) as u8, self.native))
            }
            MemberShape::Array { width, .. } => {
                let (element, sel) = (off / 16, (off % 16) / 4);
                if sel >= u32::from(width) {
                    return lit0;
                }
                Some(Comp::vector(format!("{}[{element}]", self.name), width, sel as u8, self.native))
            }
            MemberShape::Matrix { rows, cols, row_major, count } => {
                let regs = if row_major { rows } else { cols };
                let per = u32::from(regs) * 16;
                let base = if count > 0 {
                    format!("{}[{}]", self.name, off / per)
                } else {
                    self.name.clone()
                };
                let rem = off % per;
                let (register, within) = ((rem / 16) as u8, ((rem % 16) / 4) as u8);
                if row_major {
                    // Register = row, component = column; GLSL indexes columns.
                    if within >= cols {
                        return lit0;
                    }
                    Some(Comp::vector(format!("{base}[{within}]"), rows, register, self.native))
                } else {
                    if within >= rows {
                        return lit0;
                    }
                    Some(Comp::vector(format!("{base}[{register}]"), rows, within, self.native))
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(super) enum CbufferLayout {
    /// `vec4 {array}[registers]`, indexed by register.
    Raw { array: String, registers: u32 },
    Members { lines: Vec<String>, members: Vec<CbMember> },
}

#[derive(Debug, Clone)]
pub(super) struct CbufferPlan {
    pub(super) slot: u32,
    pub(super) name: String,
    pub(super) layout: CbufferLayout,
}

impl CbufferPlan {
    fn build(module: &ShaderModule, slot: u32, rules: GlslRules, names: &mut Names) -> Result<Self> {
        let rdef = module.reflection.as_ref();
        let reflected = rdef.and_then(|r| {
            r.constant_buffers
                .iter()
                .enumerate()
                .find(|(_, cb)| cb.bind_point == Some(slot) && cb.kind == dxbc2glsl_dxbc::CbufferKind::Cbuffer)
        });
        let name = names.claim(match reflected {
            Some((_, cb)) => ident(&cb.name),
            None => format!("cb{slot}"),
        });
        let usage = module.usage.cbuffers.get(&slot);

        let from_decl = module.cbuffer_decl_size(slot);
        let from_rdef = reflected.map(|(_, cb)| cb.size.div_ceil(16).min(MAX_CBUFFER_REGISTERS));
        let capacity = from_decl.or(from_rdef).unwrap_or(MAX_CBUFFER_REGISTERS);
        let highest = usage.and_then(|u| u.max_register().max(u.dynamic_from));
        if let Some(index) = highest.filter(|&r| r >= capacity) {
            return Err(ShaderTranslateError::RegisterOutOfRange {
                kind: "constant buffer",
                index,
                max: capacity,
            });
        }

        let members = match reflected {
            Some((index, cb))
                if rules.contains(GlslRules::UNIFORM_BLOCKS)
                    && usage.is_none_or(|u| u.dynamic_from.is_none()) =>
            {
                let used = module.usage.used_variables.get(index);
                // Names are only committed once the whole layout works out.
                let mut scratch = names.clone();
                std140_members(slot, cb, &mut scratch, |v| used.and_then(|u| u.get(v)).copied().unwrap_or(true))
                    .map(|members| (members, scratch))
            }
            _ => None,
        };
        let layout = match members {
            Some(((lines, members), scratch)) if !members.is_empty() => {
                *names = scratch;
                CbufferLayout::Members { lines, members }
            }
            _ => {
                // Bounded by `capacity`, so the `+ 1` cannot wrap.
                let from_usage = highest.map_or(0, |r| r + 1);
                debug!(slot, "constant buffer uses a raw register array");
                CbufferLayout::Raw {
                    array: names.claim(format!("{name}_data")),
                    registers: from_decl.unwrap_or(0).max(from_rdef.unwrap_or(0)).max(from_usage).max(1),
                }
            }
        };
        Ok(Self { slot, name, layout })
    }

    /// Component `c` of register `reg` of a member layout; `None` for raw
    /// arrays or registers outside the addressable buffer.
    pub(super) fn member_component(&self, reg: u32, c: u8) -> Option<Comp> {
        let CbufferLayout::Members { members, .. } = &self.layout else {
            return None;
        };
        let byte = reg.checked_mul(16)?.checked_add(u32::from(c) * 4)?;
        Some(members.iter().find_map(|m| m.component(byte)).unwrap_or(Comp::Lit(0)))
    }
}

/// Member declarations for the used variables of `cb`, or `None` when std140
/// cannot reproduce the D3D offsets.
fn std140_members(
    slot: u32,
    cb: &RdefConstantBuffer,
    names: &mut Names,
    used: impl Fn(usize) -> bool,
) -> Option<(Vec<String>, Vec<CbMember>)> {
    let mut lines = Vec::new();
    let mut members = Vec::new();
    let mut cursor = 0u32;
    let mut pads = 0u32;
    for (index, var) in cb.variables.iter().enumerate() {
        if !used(index) {
            continue;
        }
        let (member, decl, align, size) = member_for(var, names)?;
        if member.offset < cursor || member.offset % align != 0 {
            trace!(cbuffer = %cb.name, variable = %var.name, "offset not expressible in std140");
            return None;
        }
        while cursor < member.offset {
            let gap = member.offset - cursor;
            if cursor % 16 == 0 && gap >= 16 {
                let k = gap / 16;
                let array = if k > 1 { format!("[{k}]") } else { String::new() };
                lines.push(format!("vec4 _pad{slot}_{pads}{array};"));
                cursor += k * 16;
            } else {
                lines.push(format!("float _pad{slot}_{pads};"));
                cursor += 4;
            }
            pads += 1;
        }
        lines.push(decl);
        cursor = member.offset.checked_add(size)?;
        members.push(member);
    }
    Some((lines, members))
}

/// `(member, declaration, std140 alignment, std140 size)`.
fn member_for(var: &RdefVariable, names: &mut Names) -> Option<(CbMember, String, u32, u32)> {
    let ty = &var.ty;
    let native = match ty.base {
        VariableType::Float => NumType::Float,
        VariableType::Int => NumType::Int,
        VariableType::Uint | VariableType::Bool => NumType::Uint,
        _ => return None,
    };
    let name = names.claim(ident(&var.name));
    let count = u32::from(ty.elements);
    let array = if count > 0 { format!("[{count}]") } else { String::new() };
    let rows = u8::try_from(ty.rows).ok().filter(|r| (1..=4).contains(r))?;
    let cols = u8::try_from(ty.columns).ok().filter(|c| (1..=4).contains(c))?;

    let (shape, decl, align, size) = match ty.class {
        VariableClass::Scalar | VariableClass::Vector => {
            let width = if ty.class == VariableClass::Scalar { 1 } else { cols };
            let decl = format!("{} {name}{array};", native.vec(usize::from(width)));
            if count > 0 {
                (MemberShape::Array { width, count }, decl, 16, count * 16)
            } else {
                let align = match width {
                    1 => 4,
                    2 => 8,
                    _ => 16,
                };
                (MemberShape::Vector { width }, decl, align, u32::from(width) * 4)
            }
        }
        VariableClass::MatrixRows | VariableClass::MatrixColumns => {
            if native != NumType::Float || rows == 1 || cols == 1 {
                return None;
            }
            let row_major = ty.class == VariableClass::MatrixRows;
            let glsl_ty = if rows == cols { format!("mat{cols}") } else { format!("mat{cols}x{rows}") };
            let order = if row_major { "row_major" } else { "column_major" };
            let regs = u32::from(if row_major { rows } else { cols });
            let decl = format!("layout({order}) {glsl_ty} {name}{array};");
            (
                MemberShape::Matrix { rows, cols, row_major, count },
                decl,
                16,
                regs * 16 * count.max(1),
            )
        }
        _ => return None,
    };
    Some((CbMember { name, offset: var.start_offset, shape, native }, decl, align, size))
}

/// `sampler*` type for a texture dimension.
pub(super) fn sampler_type(dim: ResourceDimension, ret: NumType, shadow: bool) -> Option<String> {
    let suffix = match dim {
        ResourceDimension::Texture1D => "1D",
        ResourceDimension::Texture1DArray => "1DArray",
        ResourceDimension::Texture2D => "2D",
        ResourceDimension::Texture2DArray => "2DArray",
        ResourceDimension::Texture2DMs => "2DMS",
        ResourceDimension::Texture2DMsArray => "2DMSArray",
        ResourceDimension::Texture3D => "3D",
        ResourceDimension::TextureCube => "Cube",
        ResourceDimension::TextureCubeArray => "CubeArray",
        ResourceDimension::Buffer => "Buffer",
        _ => return None,
    };
    if shadow {
        let shadowable = matches!(
            dim,
            ResourceDimension::Texture1D
                | ResourceDimension::Texture1DArray
                | ResourceDimension::Texture2D
                | ResourceDimension::Texture2DArray
                | ResourceDimension::TextureCube
                | ResourceDimension::TextureCubeArray
        );
        return shadowable.then(|| format!("sampler{suffix}Shadow"));
    }
    Some(format!("{}sampler{suffix}", ret.prefix()))
}

fn image_type(dim: ResourceDimension, ret: NumType) -> Option<String> {
    let suffix = match dim {
        ResourceDimension::Buffer => "Buffer",
        ResourceDimension::Texture1D => "1D",
        ResourceDimension::Texture1DArray => "1DArray",
        ResourceDimension::Texture2D => "2D",
        ResourceDimension::Texture2DArray => "2DArray",
        ResourceDimension::Texture3D => "3D",
        _ => return None,
    };
    Some(format!("{}image{suffix}", ret.prefix()))
}

/// Everything the body refers to besides registers and stage IO.
#[derive(Debug, Clone, Default)]
pub(super) struct ResourcePlan {
    pub(super) cbuffers: BTreeMap<u32, CbufferPlan>,
    pub(super) textures: BTreeMap<u32, TexturePlan>,
    /// Combined sampler per used `(texture, sampler)` pair.
    pub(super) pairs: BTreeMap<SamplerPair, String>,
    /// Sampler usable with `texelFetch`/`textureSize` per fetched texture.
    pub(super) fetch: BTreeMap<u32, String>,
    pub(super) uavs: BTreeMap<u32, UavPlan>,
    /// Global identifiers handed out so far; stage IO continues from here.
    pub(super) names: Names,
}

impl ResourcePlan {
    pub(super) fn build(module: &ShaderModule, rules: GlslRules) -> core::result::Result<Self, ShaderTranslateError> {
        let rdef = module.reflection.as_ref();
        let usage = &module.usage;
        let mut plan = Self::default();

        for &slot in usage.cbuffers.keys() {
            let cbuffer = CbufferPlan::build(module, slot, rules, &mut plan.names)?;
            plan.cbuffers.insert(slot, cbuffer);
        }

        let textures: BTreeSet<u32> = usage
            .textures
            .iter()
            .chain(usage.sampler_pairs.iter().map(|p| &p.texture))
            .copied()
            .collect();
        for slot in textures {
            let kind = match module.resource_decl(slot) {
                Some(Declaration::Resource { dimension, return_type, .. }) => ResourceKind::Typed {
                    dim: *dimension,
                    ret: return_num_type(return_type[0]),
                },
                Some(Declaration::ResourceRaw { .. }) => ResourceKind::Raw,
                Some(Declaration::ResourceStructured { stride, .. }) => ResourceKind::Structured { stride: *stride },
                _ => return Err(ShaderTranslateError::MissingResource { kind: "texture", slot }),
            };
            let name = plan.names.claim(binding_name(rdef, RegisterClass::ShaderResource, slot, "t"));
            plan.textures.insert(slot, TexturePlan { name, kind });
        }

        for pair in &usage.sampler_pairs {
            let texture = plan.textures[&pair.texture].name.clone();
            let sampler = binding_name(rdef, RegisterClass::Sampler, pair.sampler, "s");
            let twin = SamplerPair { shadow: !pair.shadow, ..*pair };
            let suffix = if pair.shadow && usage.sampler_pairs.contains(&twin) { "_cmp" } else { "" };
            let name = plan.names.claim(format!("{texture}_{sampler}{suffix}"));
            plan.pairs.insert(*pair, name);
        }

        for &slot in &usage.fetched_textures {
            let Some(texture) = plan.textures.get(&slot) else { continue };
            if !matches!(texture.kind, ResourceKind::Typed { .. }) {
                continue;
            }
            let shared = plan
                .pairs
                .iter()
                .find(|(p, _)| p.texture == slot && !p.shadow)
                .map(|(_, name)| name.clone());
            plan.fetch.insert(slot, shared.unwrap_or_else(|| texture.name.clone()));
        }

        // Typed UAVs that are read back need a single-channel format.
        let mut single_channel = BTreeSet::new();
        for inst in &module.instructions {
            let reads = matches!(inst.opcode, Opcode::LdUavTyped) || is_atomic(inst.opcode);
            if reads {
                for op in inst.operands.iter().filter(|op| op.ty == OperandType::UnorderedAccessView) {
                    single_channel.insert(op.reg());
                }
            }
        }
        for &slot in &usage.uavs {
            let (kind, coherent) = match module.uav_decl(slot) {
                Some(Declaration::UavTyped { dimension, return_type, globally_coherent, .. }) => (
                    ResourceKind::Typed { dim: *dimension, ret: return_num_type(return_type[0]) },
                    *globally_coherent,
                ),
                Some(Declaration::UavRaw { globally_coherent, .. }) => (ResourceKind::Raw, *globally_coherent),
                Some(Declaration::UavStructured { stride, globally_coherent, .. }) => {
                    (ResourceKind::Structured { stride: *stride }, *globally_coherent)
                }
                _ => return Err(ShaderTranslateError::MissingResource { kind: "UAV", slot }),
            };
            let name = plan.names.claim(binding_name(rdef, RegisterClass::Uav, slot, "u"));
            plan.uavs.insert(
                slot,
                UavPlan { name, kind, coherent, single_channel: single_channel.contains(&slot) },
            );
        }

        debug!(
            cbuffers = plan.cbuffers.len(),
            textures = plan.textures.len(),
            samplers = plan.pairs.len(),
            uavs = plan.uavs.len(),
            "planned shader resources"
        );
        Ok(plan)
    }
}

pub(super) fn is_atomic(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::AtomicAnd
            | Opcode::AtomicOr
            | Opcode::AtomicXor
            | Opcode::AtomicCmpStore
            | Opcode::AtomicIadd
            | Opcode::AtomicImax
            | Opcode::AtomicImin
            | Opcode::AtomicUmax
            | Opcode::AtomicUmin
            | Opcode::ImmAtomicIadd
            | Opcode::ImmAtomicAnd
            | Opcode::ImmAtomicOr
            | Opcode::ImmAtomicXor
            | Opcode::ImmAtomicExch
            | Opcode::ImmAtomicCmpExch
            | Opcode::ImmAtomicImax
            | Opcode::ImmAtomicImin
            | Opcode::ImmAtomicUmax
            | Opcode::ImmAtomicUmin
    )
}

impl Emitter<'_> {
    pub(super) fn cbuffer_component(&self, op: &Operand, c: u8) -> Result<Comp> {
        let slot = op.reg();
        let plan = self
            .resources
            .cbuffers
            .get(&slot)
            .ok_or(ShaderTranslateError::MissingResource { kind: "constant buffer", slot })?;
        let index = op.indices.get(1).ok_or_else(|| self.unsupported())?;
        match &plan.layout {
            CbufferLayout::Raw { array, .. } => {
                Ok(Comp::vector(format!("{array}[{}]", self.index_expr(index)?), 4, c, NumType::Float))
            }
            CbufferLayout::Members { .. } => {
                if index.relative().is_some() {
                    return Err(self.unsupported());
                }
                let reg = index.imm();
                plan.member_component(reg, c).ok_or(ShaderTranslateError::RegisterOutOfRange {
                    kind: "constant buffer",
                    index: reg,
                    max: MAX_CBUFFER_REGISTERS,
                })
            }
        }
    }

    fn binding(&self, slot: u32) -> Option<String> {
        self.rules
            .contains(GlslRules::BINDING_QUALIFIERS)
            .then(|| format!("binding = {slot}"))
    }

    fn precision(&self) -> &'static str {
        if self.rules.contains(GlslRules::PRECISION_QUALIFIERS) {
            "highp "
        } else {
            ""
        }
    }

    /// `true` if the target can declare samplers of this dimension.
    pub(super) fn dimension_support(&self, dim: ResourceDimension) -> core::result::Result<(), &'static str> {
        let es = self.config.version.is_es();
        match dim {
            ResourceDimension::Texture1D | ResourceDimension::Texture1DArray if es => Err("1D textures"),
            ResourceDimension::TextureCubeArray if !self.rules.contains(GlslRules::CUBE_ARRAYS) => {
                Err("cube map arrays")
            }
            ResourceDimension::Texture2DMs | ResourceDimension::Texture2DMsArray
                if !self.rules.contains(GlslRules::MULTISAMPLE_FETCH) =>
            {
                Err("multisampled textures")
            }
            ResourceDimension::Texture2DMsArray if es && self.config.version < GlslVersion::Es320 => {
                Err("multisampled texture arrays")
            }
            ResourceDimension::Buffer if es && self.config.version < GlslVersion::Es320 => Err("texture buffers"),
            _ => Ok(()),
        }
    }

    fn sampler_decl(&mut self, slot: u32, name: &str, dim: ResourceDimension, ret: NumType, shadow: bool) {
        if self.dimension_support(dim).is_err() {
            return;
        }
        let Some(ty) = sampler_type(dim, ret, shadow) else { return };
        let layout = self.binding(slot).map(|b| format!("layout({b}) ")).unwrap_or_default();
        let precision = self.precision();
        self.w.line(&format!("{layout}uniform {precision}{ty} {name};"));
    }

    fn storage_decl(&mut self, binding: u32, name: &str, qualifiers: &str) {
        if !self.rules.contains(GlslRules::STORAGE) {
            return;
        }
        let layout = match self.binding(binding) {
            Some(b) => format!("layout(std430, {b})"),
            None => "layout(std430)".to_owned(),
        };
        self.w.line(&format!("{layout} {qualifiers}buffer {name}_buf {{ uint {name}[]; }};"));
    }

    pub(super) fn emit_declarations(&mut self) -> Result<()> {
        let module = self.module;
        self.emit_cbuffers();

        if let Some(icb) = module.immediate_constant_buffer() {
            let n = icb.len();
            let values: Vec<String> = icb
                .iter()
                .map(|v| {
                    let c: Vec<String> = v.iter().map(|&b| literal(b, NumType::Uint)).collect();
                    format!("uvec4({})", c.join(", "))
                })
                .collect();
            self.w.line(&format!("const uvec4 icb[{n}] = uvec4[{n}]({});", values.join(", ")));
        }

        let pairs: Vec<(SamplerPair, String)> =
            self.resources.pairs.iter().map(|(p, n)| (*p, n.clone())).collect();
        for (pair, name) in pairs {
            if let Some(ResourceKind::Typed { dim, ret }) =
                self.resources.textures.get(&pair.texture).map(|t| t.kind)
            {
                self.sampler_decl(pair.texture, &name, dim, ret, pair.shadow);
            }
        }
        let fetch: Vec<(u32, String)> = self.resources.fetch.iter().map(|(s, n)| (*s, n.clone())).collect();
        for (slot, name) in fetch {
            let reuses_pair = self.resources.pairs.values().any(|n| *n == name);
            if let (false, Some(ResourceKind::Typed { dim, ret })) =
                (reuses_pair, self.resources.textures.get(&slot).map(|t| t.kind))
            {
                self.sampler_decl(slot, &name, dim, ret, false);
            }
        }

        let buffers: Vec<(u32, String)> = self
            .resources
            .textures
            .iter()
            .filter(|(_, t)| !matches!(t.kind, ResourceKind::Typed { .. }))
            .map(|(s, t)| (*s, t.name.clone()))
            .collect();
        for (slot, name) in buffers {
            // SRVs and UAVs share one storage-buffer binding space.
            self.storage_decl(64 + slot, &name, "readonly ");
        }

        let uavs: Vec<(u32, UavPlan)> = self.resources.uavs.iter().map(|(s, u)| (*s, u.clone())).collect();
        for (slot, uav) in uavs {
            let coherent = if uav.coherent { "coherent " } else { "" };
            match uav.kind {
                ResourceKind::Raw | ResourceKind::Structured { .. } => {
                    self.storage_decl(slot, &uav.name, coherent);
                }
                ResourceKind::Typed { dim, ret } => {
                    let Some(ty) = image_type(dim, ret) else { continue };
                    if !self.rules.contains(GlslRules::STORAGE) {
                        continue;
                    }
                    let channels = if uav.single_channel { "r32" } else { "rgba32" };
                    let format = match ret {
                        NumType::Float => format!("{channels}f"),
                        NumType::Int => format!("{channels}i"),
                        NumType::Uint => format!("{channels}ui"),
                    };
                    let layout = match self.binding(slot) {
                        Some(b) => format!("layout({b}, {format})"),
                        None => format!("layout({format})"),
                    };
                    let access = if uav.single_channel { "" } else { "writeonly " };
                    let precision = self.precision();
                    self.w.line(&format!("{layout} {coherent}{access}uniform {precision}{ty} {};", uav.name));
                }
            }
        }

        if module.stage == ShaderStage::Compute {
            for shared in &module.compute.shared_memory {
                self.w.line(&format!("shared uint g{}[{}];", shared.slot, shared.dwords().max(1)));
            }
        }

        self.emit_io_declarations();
        self.emit_register_files();
        Ok(())
    }

    fn emit_cbuffers(&mut self) {
        let plans: Vec<CbufferPlan> = self.resources.cbuffers.values().cloned().collect();
        let blocks = self.rules.contains(GlslRules::UNIFORM_BLOCKS);
        for plan in plans {
            let layout = match self.binding(plan.slot) {
                Some(b) => format!("layout(std140, {b})"),
                None => "layout(std140)".to_owned(),
            };
            match plan.layout {
                CbufferLayout::Raw { array, registers } if blocks => {
                    self.w.open(&format!("{layout} uniform {}", plan.name));
                    self.w.line(&format!("vec4 {array}[{registers}];"));
                    self.w.close(";");
                }
                CbufferLayout::Raw { array, registers } => {
                    self.w.line(&format!("uniform vec4 {array}[{registers}];"));
                }
                CbufferLayout::Members { lines, .. } => {
                    self.w.open(&format!("{layout} uniform {}", plan.name));
                    for line in &lines {
                        self.w.line(line);
                    }
                    self.w.close(";");
                }
            }
        }
    }

    fn emit_register_files(&mut self) {
        let module = self.module;
        let usage = &module.usage;
        if self.io.arrayed_inputs {
            let count = self.input_vertices;
            for reg in &self.io.input_registers {
                self.w.line(&format!("vec4 v{reg}[{count}];"));
            }
        } else if let Some(max) = self.io.input_registers.iter().next_back() {
            self.w.line(&format!("vec4 v[{}];", max + 1));
        }
        if let Some(max) = self.io.output_registers.iter().next_back() {
            self.w.line(&format!("vec4 o[{}];", max + 1));
        }
        for (reg, &width) in &usage.temp_widths {
            let ty = NumType::Float.vec(usize::from(width));
            let zero = if width > 1 { format!("{ty}(0.0)") } else { "0.0".to_owned() };
            self.w.line(&format!("{ty} r{reg} = {zero};"));
        }
        for (reg, info) in &usage.indexable_temps {
            let ty = NumType::Float.vec(info.components.clamp(1, 4) as usize);
            self.w.line(&format!("{ty} x{reg}[{}];", info.size.max(1)));
        }
    }
}

/// Dword stride of a structured buffer.
pub(super) fn word_stride(stride: u32) -> u32 {
    stride / 4
}

/// Shared-memory layout of `g{slot}`.
pub(super) fn shared_stride(module: &ShaderModule, slot: u32) -> Option<Option<u32>> {
    module
        .compute
        .shared_memory
        .iter()
        .find(|s| s.slot == slot)
        .map(|s| match s.kind {
            SharedMemoryKind::Raw { .. } => None,
            SharedMemoryKind::Structured { stride, .. } => Some(stride),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxbc2glsl_dxbc::{CbufferKind, RdefType};

    #[test]
    fn identifiers_are_sanitised() {
        assert_eq!(ident("$Globals"), "_Globals");
        assert_eq!(ident("worldViewProj"), "worldViewProj");
        assert_eq!(ident("sample"), "sample_");
        assert_eq!(ident("r0"), "r0_");
        assert_eq!(ident("vec4"), "vec4_");
        assert_eq!(ident("gl_Foo"), "_gl_Foo");
        assert_eq!(ident("gl_"), "_gl_");
        assert_eq!(ident("a__b"), "a_b");
        assert_eq!(ident("0x"), "_0x");
        assert_eq!(ident("vector"), "vector");
        assert_eq!(ident("matrix"), "matrix");
    }

    #[test]
    fn colliding_identifiers_get_numeric_suffixes() {
        let mut names = Names::default();
        assert_eq!(names.claim(ident("a.b")), "a_b");
        assert_eq!(names.claim(ident("a_b")), "a_b_1");
        assert_eq!(names.claim(ident("a b")), "a_b_2");
        assert_eq!(names.claim(ident("sample")), "sample_");
        assert_eq!(names.claim(ident("sample")), "sample_1");
    }

    fn var(name: &str, offset: u32, class: VariableClass, rows: u16, columns: u16) -> RdefVariable {
        RdefVariable {
            name: name.to_owned(),
            start_offset: offset,
            size: u32::from(rows.max(1)) * 16,
            flags: 2,
            ty: RdefType {
                class,
                base: VariableType::Float,
                rows,
                columns,
                elements: 0,
                members: Vec::new(),
                name: None,
            },
            default_value: None,
            texture_slots: None,
            sampler_slots: None,
        }
    }

    fn cbuffer(variables: Vec<RdefVariable>) -> RdefConstantBuffer {
        RdefConstantBuffer {
            name: "cb".to_owned(),
            kind: CbufferKind::Cbuffer,
            flags: 0,
            size: 256,
            bind_point: Some(0),
            variables,
        }
    }

    #[test]
    fn elided_variables_leave_padding() {
        let cb = cbuffer(vec![
            var("a", 0, VariableClass::Vector, 1, 4),
            var("b", 32, VariableClass::Vector, 1, 4),
            var("c", 52, VariableClass::Scalar, 1, 1),
        ]);
        let (lines, members) = std140_members(0, &cb, &mut Names::default(), |i| i != 0).unwrap();
        assert_eq!(
            lines,
            vec!["vec4 _pad0_0[2];", "vec4 b;", "float _pad0_1;", "float c;"]
        );
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].component(52), Some(Comp::scalar("c", NumType::Float)));
    }

    #[test]
    fn members_with_colliding_names_are_renamed() {
        let cb = cbuffer(vec![
            var("light.color", 0, VariableClass::Vector, 1, 4),
            var("light_color", 16, VariableClass::Vector, 1, 4),
        ]);
        let mut names = Names::default();
        names.claim("light_color".to_owned());
        let (lines, members) = std140_members(0, &cb, &mut names, |_| true).unwrap();
        assert_eq!(lines, vec!["vec4 light_color_1;", "vec4 light_color_2;"]);
        assert_eq!(members[1].component(16), Some(Comp::vector("light_color_2", 4, 0, NumType::Float)));
    }

    #[test]
    fn misaligned_vectors_fall_back() {
        let cb = cbuffer(vec![
            var("a", 0, VariableClass::Scalar, 1, 1),
            var("b", 4, VariableClass::Vector, 1, 3),
        ]);
        assert!(std140_members(0, &cb, &mut Names::default(), |_| true).is_none());
    }

    #[test]
    fn matrix_components_follow_packing() {
        let cb = cbuffer(vec![var("m", 0, VariableClass::MatrixColumns, 4, 4)]);
        let (lines, members) = std140_members(0, &cb, &mut Names::default(), |_| true).unwrap();
        assert_eq!(lines, vec!["layout(column_major) mat4 m;"]);
        assert_eq!(members[0].component(16 + 8), Some(Comp::vector("m[1]", 4, 2, NumType::Float)));

        let cb = cbuffer(vec![var("m", 0, VariableClass::MatrixRows, 4, 4)]);
        let (_, members) = std140_members(0, &cb, &mut Names::default(), |_| true).unwrap();
        // Row 1, column 2.
        assert_eq!(members[0].component(16 + 8), Some(Comp::vector("m[2]", 4, 1, NumType::Float)));
    }

    #[test]
    fn sampler_type_names() {
        assert_eq!(sampler_type(ResourceDimension::Texture2D, NumType::Float, false).as_deref(), Some("sampler2D"));
        assert_eq!(sampler_type(ResourceDimension::Texture2DArray, NumType::Uint, false).as_deref(), Some("usampler2DArray"));
        assert_eq!(sampler_type(ResourceDimension::TextureCube, NumType::Float, true).as_deref(), Some("samplerCubeShadow"));
        assert_eq!(sampler_type(ResourceDimension::Texture3D, NumType::Float, true), None);
    }
}
