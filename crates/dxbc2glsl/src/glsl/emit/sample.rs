//! Texture sampling, fetches and resource queries.

use super::decls::ResourceKind;
use super::expr::{splat, swizzle_suffix, NumType};
use super::{Emitter, Result};
use crate::error::ShaderTranslateError;
use crate::glsl::version::GlslRules;
use crate::model::SamplerPair;
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4_ir::{Instruction, Operand, ResinfoReturnType, ResourceDimension};

/// Components of a sampling gradient.
fn gradient_count(dim: ResourceDimension) -> u8 {
    match dim {
        ResourceDimension::Texture1D | ResourceDimension::Texture1DArray => 1,
        ResourceDimension::Texture2D | ResourceDimension::Texture2DArray => 2,
        _ => 3,
    }
}

/// Immediate `aoffimmi` offset as a GLSL constant, if the instruction has one.
fn immediate_offset(inst: &Instruction, dim: ResourceDimension) -> Option<String> {
    let n = usize::from(dim.offset_count());
    if n == 0 || !inst.has_offsets() {
        return None;
    }
    let parts: Vec<String> = inst.sample_offsets[..n].iter().map(|o| o.to_string()).collect();
    Some(if n == 1 {
        parts.join("")
    } else {
        format!("ivec{n}({})", parts.join(", "))
    })
}

#[derive(Debug, Clone)]
struct Texture {
    slot: u32,
    dim: ResourceDimension,
    ret: NumType,
}

impl Emitter<'_> {
    fn typed_texture(&self, op: &Operand) -> Result<Texture> {
        if op.ty != OperandType::Resource || op.has_relative_index() {
            return Err(self.unsupported());
        }
        let slot = op.reg();
        let plan = self
            .resources
            .textures
            .get(&slot)
            .ok_or(ShaderTranslateError::MissingResource { kind: "texture", slot })?;
        let ResourceKind::Typed { dim, ret } = plan.kind else {
            return Err(self.unsupported());
        };
        self.dimension_support(dim).map_err(|feature| self.missing(feature))?;
        Ok(Texture { slot, dim, ret })
    }

    fn sampler_name(&self, texture: u32, sampler: &Operand, shadow: bool) -> Result<String> {
        let pair = SamplerPair { texture, sampler: sampler.reg(), shadow };
        self.resources
            .pairs
            .get(&pair)
            .cloned()
            .ok_or(ShaderTranslateError::MissingResource { kind: "sampler", slot: pair.sampler })
    }

    fn fetch_name(&self, texture: u32) -> Result<String> {
        self.resources
            .fetch
            .get(&texture)
            .cloned()
            .ok_or(ShaderTranslateError::MissingResource { kind: "texture", slot: texture })
    }

    /// Stores a 4-component texture result, swizzled by the resource operand.
    fn store_texel(&mut self, inst: &Instruction, value: String, resource: &Operand, ty: NumType) -> Result<()> {
        let mask = self.dst(inst, 0)?.mask();
        let swizzle = resource.swizzle();
        let suffix = swizzle_suffix(mask.components().map(|l| swizzle.lane(l)));
        self.assign(inst, format!("{value}{suffix}"), ty)
    }

    /// `sample`, `sample_b`, `sample_l`, `sample_d`, `sample_c` and `sample_c_lz`.
    pub(super) fn sample(&mut self, inst: &Instruction) -> Result<()> {
        let float = NumType::Float;
        let tex_op = self.src(inst, 1)?;
        let texture = self.typed_texture(tex_op)?;
        let dim = texture.dim;
        let shadow = inst.opcode.is_comparison_sample();
        let sampler = self.sampler_name(texture.slot, self.src(inst, 2)?, shadow)?;
        let coord = self.read_n(self.src(inst, 0)?, dim.coord_count(), float)?;
        let offset = immediate_offset(inst, dim);

        if shadow {
            let reference = self.read_lane(self.src(inst, 3)?, 0, float)?;
            let (coord, trailing) = match dim {
                ResourceDimension::Texture1D => (format!("vec3({coord}, 0.0, {reference})"), None),
                ResourceDimension::Texture1DArray | ResourceDimension::Texture2D => {
                    (format!("vec3({coord}, {reference})"), None)
                }
                ResourceDimension::Texture2DArray | ResourceDimension::TextureCube => {
                    (format!("vec4({coord}, {reference})"), None)
                }
                ResourceDimension::TextureCubeArray => (coord, Some(reference)),
                _ => return Err(self.unsupported()),
            };
            let call = match (inst.opcode, trailing) {
                (Opcode::SampleC, Some(reference)) => format!("texture({sampler}, {coord}, {reference})"),
                (Opcode::SampleC, None) => match &offset {
                    Some(off) => format!("textureOffset({sampler}, {coord}, {off})"),
                    None => format!("texture({sampler}, {coord})"),
                },
                (_, Some(_)) => return Err(self.missing("level-zero comparison sampling of cube map arrays")),
                (_, None) => {
                    let lod_capable = matches!(
                        dim,
                        ResourceDimension::Texture1D | ResourceDimension::Texture1DArray | ResourceDimension::Texture2D
                    );
                    match (lod_capable, &offset) {
                        (true, Some(off)) => format!("textureLodOffset({sampler}, {coord}, 0.0, {off})"),
                        (true, None) => format!("textureLod({sampler}, {coord}, 0.0)"),
                        (false, off) => {
                            let zero = splat("0.0".to_owned(), float, usize::from(gradient_count(dim)));
                            match off {
                                Some(off) => format!("textureGradOffset({sampler}, {coord}, {zero}, {zero}, {off})"),
                                None => format!("textureGrad({sampler}, {coord}, {zero}, {zero})"),
                            }
                        }
                    }
                }
            };
            let n = usize::from(self.dst(inst, 0)?.mask().count());
            return self.assign(inst, splat(call, float, n), float);
        }

        let (func, before, after) = match inst.opcode {
            Opcode::Sample => ("texture", Vec::new(), Vec::new()),
            Opcode::SampleB => {
                let bias = self.read_lane(self.src(inst, 3)?, 0, float)?;
                ("texture", Vec::new(), vec![bias])
            }
            Opcode::SampleL => {
                let lod = self.read_lane(self.src(inst, 3)?, 0, float)?;
                ("textureLod", vec![lod], Vec::new())
            }
            Opcode::SampleD => {
                let g = gradient_count(dim);
                let ddx = self.read_n(self.src(inst, 3)?, g, float)?;
                let ddy = self.read_n(self.src(inst, 4)?, g, float)?;
                ("textureGrad", vec![ddx, ddy], Vec::new())
            }
            _ => return Err(self.unsupported()),
        };
        let mut args = vec![sampler, coord];
        args.extend(before);
        let func = match offset {
            Some(off) => {
                args.push(off);
                format!("{func}Offset")
            }
            None => func.to_owned(),
        };
        args.extend(after);
        let call = format!("{func}({})", args.join(", "));
        self.store_texel(inst, call, tex_op, texture.ret)
    }

    /// `gather4`, `gather4_c`, `gather4_po` and `gather4_po_c`.
    pub(super) fn gather(&mut self, inst: &Instruction) -> Result<()> {
        self.require(GlslRules::BIT_OPS, "textureGather")?;
        let programmable = matches!(inst.opcode, Opcode::Gather4Po | Opcode::Gather4PoC);
        let base = usize::from(programmable);
        let tex_op = self.src(inst, 1 + base)?;
        let sampler_op = self.src(inst, 2 + base)?;
        let texture = self.typed_texture(tex_op)?;
        let shadow = inst.opcode.is_comparison_sample();
        let sampler = self.sampler_name(texture.slot, sampler_op, shadow)?;
        let coord = self.read_n(self.src(inst, 0)?, texture.dim.coord_count(), NumType::Float)?;
        let offset = if programmable {
            let n = texture.dim.offset_count().max(1);
            Some(self.read_n(self.src(inst, 1)?, n, NumType::Int)?)
        } else {
            immediate_offset(inst, texture.dim)
        };

        let mut args = vec![sampler, coord];
        let last = if shadow {
            Some(self.read_lane(self.src(inst, 3 + base)?, 0, NumType::Float)?)
        } else {
            match sampler_op.swizzle().lane(0) {
                0 => None,
                c => Some(c.to_string()),
            }
        };
        let func = match offset {
            Some(off) => {
                args.push(off);
                "textureGatherOffset"
            }
            None => "textureGather",
        };
        args.extend(last);
        let ty = if shadow { NumType::Float } else { texture.ret };
        self.store_texel(inst, format!("{func}({})", args.join(", ")), tex_op, ty)
    }

    pub(super) fn lod(&mut self, inst: &Instruction) -> Result<()> {
        self.require(GlslRules::TEXTURE_QUERY_LOD, "textureQueryLod")?;
        let tex_op = self.src(inst, 1)?;
        let texture = self.typed_texture(tex_op)?;
        let sampler = self.sampler_name(texture.slot, self.src(inst, 2)?, false)?;
        let n = texture.dim.coord_count() - u8::from(texture.dim.is_array());
        let coord = self.read_n(self.src(inst, 0)?, n, NumType::Float)?;
        let value = format!("vec4(textureQueryLod({sampler}, {coord}), 0.0, 0.0)");
        self.store_texel(inst, value, tex_op, NumType::Float)
    }

    /// `ld` and `ld_ms`: texel fetches with integer coordinates.
    pub(super) fn ld(&mut self, inst: &Instruction) -> Result<()> {
        let tex_op = self.src(inst, 1)?;
        let texture = self.typed_texture(tex_op)?;
        let dim = texture.dim;
        let sampler = self.fetch_name(texture.slot)?;
        let coord_op = self.src(inst, 0)?;
        let coord = self.read_n(coord_op, dim.coord_count(), NumType::Int)?;
        let call = if dim == ResourceDimension::Buffer {
            format!("texelFetch({sampler}, {coord})")
        } else if dim.is_multisampled() {
            let sample = self.read_lane(self.src(inst, 2)?, 0, NumType::Int)?;
            format!("texelFetch({sampler}, {coord}, {sample})")
        } else {
            let lod = self.read_lane(coord_op, 3, NumType::Int)?;
            match immediate_offset(inst, dim) {
                Some(off) => format!("texelFetchOffset({sampler}, {coord}, {lod}, {off})"),
                None => format!("texelFetch({sampler}, {coord}, {lod})"),
            }
        };
        self.store_texel(inst, call, tex_op, texture.ret)
    }

    /// `resinfo`: `(width, height, depth or elements, mip levels)`.
    pub(super) fn resinfo(&mut self, inst: &Instruction) -> Result<()> {
        let tex_op = self.src(inst, 1)?;
        let mask = self.dst(inst, 0)?.mask();
        let reads_levels = mask.components().any(|l| tex_op.swizzle().lane(l) == 3);

        let (size, k, levels) = match tex_op.ty {
            OperandType::UnorderedAccessView => {
                self.require(GlslRules::STORAGE, "image queries")?;
                let uav = self
                    .resources
                    .uavs
                    .get(&tex_op.reg())
                    .ok_or(ShaderTranslateError::MissingResource { kind: "UAV", slot: tex_op.reg() })?;
                let ResourceKind::Typed { dim, .. } = uav.kind else {
                    return Err(self.unsupported());
                };
                (format!("imageSize({})", uav.name), dim.size_count(), None)
            }
            _ => {
                let texture = self.typed_texture(tex_op)?;
                let dim = texture.dim;
                let sampler = self.fetch_name(texture.slot)?;
                if dim == ResourceDimension::Buffer || dim.is_multisampled() {
                    (format!("textureSize({sampler})"), dim.size_count(), None)
                } else {
                    let lod = self.read_lane(self.src(inst, 0)?, 0, NumType::Int)?;
                    let levels = match (self.rules.contains(GlslRules::TEXTURE_QUERY_LEVELS), reads_levels) {
                        (true, _) => Some(format!("textureQueryLevels({sampler})")),
                        (false, true) => return Err(self.missing("textureQueryLevels")),
                        (false, false) => None,
                    };
                    (format!("textureSize({sampler}, {lod})"), dim.size_count(), levels)
                }
            }
        };

        let return_type = inst.resinfo_return_type();
        let ty = match return_type {
            ResinfoReturnType::Uint => NumType::Uint,
            _ => NumType::Float,
        };
        let k = usize::from(k.clamp(1, 3));
        let size = match return_type {
            ResinfoReturnType::RcpFloat => format!("{} / {}({size})", splat("1.0".to_owned(), ty, k), ty.vec(k)),
            _ => format!("{}({size})", ty.vec(k)),
        };
        let mut parts = vec![size];
        parts.extend((k..3).map(|_| ty.zero().to_owned()));
        parts.push(match levels {
            Some(levels) => format!("{}({levels})", ty.scalar()),
            None if matches!(ty, NumType::Uint) => "1u".to_owned(),
            None => "1.0".to_owned(),
        });
        let value = format!("{}({})", ty.vec(4), parts.join(", "));
        self.store_texel(inst, value, tex_op, ty)
    }

    /// `sampleinfo`: sample count of a texture or of the render target.
    pub(super) fn sampleinfo(&mut self, inst: &Instruction) -> Result<()> {
        let src = self.src(inst, 0)?;
        let count = if src.ty == OperandType::Rasterizer {
            self.require(GlslRules::SAMPLE_SHADING, "gl_NumSamples")?;
            "gl_NumSamples".to_owned()
        } else {
            self.require(GlslRules::TEXTURE_SAMPLES, "textureSamples")?;
            let texture = self.typed_texture(src)?;
            format!("textureSamples({})", self.fetch_name(texture.slot)?)
        };
        let ty = if inst.sampleinfo_uint() { NumType::Uint } else { NumType::Float };
        let zero = ty.zero();
        let value = format!("{}({}({count}), {zero}, {zero}, {zero})", ty.vec(4), ty.scalar());
        self.store_texel(inst, value, src, ty)
    }

    /// `bufinfo`: element count (bytes for raw buffers).
    pub(super) fn bufinfo(&mut self, inst: &Instruction) -> Result<()> {
        let src = self.src(inst, 0)?;
        let slot = src.reg();
        let (name, kind, image) = match src.ty {
            OperandType::Resource => {
                let plan = self
                    .resources
                    .textures
                    .get(&slot)
                    .ok_or(ShaderTranslateError::MissingResource { kind: "texture", slot })?;
                (plan.name.clone(), plan.kind, false)
            }
            OperandType::UnorderedAccessView => {
                let plan = self
                    .resources
                    .uavs
                    .get(&slot)
                    .ok_or(ShaderTranslateError::MissingResource { kind: "UAV", slot })?;
                (plan.name.clone(), plan.kind, true)
            }
            _ => return Err(self.unsupported()),
        };
        let count = match kind {
            ResourceKind::Typed { dim: ResourceDimension::Buffer, .. } if image => {
                self.require(GlslRules::STORAGE, "image queries")?;
                format!("uint(imageSize({name}))")
            }
            ResourceKind::Typed { dim: ResourceDimension::Buffer, .. } => {
                format!("uint(textureSize({}))", self.fetch_name(slot)?)
            }
            ResourceKind::Typed { .. } => return Err(self.unsupported()),
            ResourceKind::Raw => {
                self.require(GlslRules::STORAGE, "storage buffers")?;
                format!("uint({name}.length()) * 4u")
            }
            ResourceKind::Structured { stride } => {
                self.require(GlslRules::STORAGE, "storage buffers")?;
                format!("uint({name}.length()) * 4u / {}u", stride.max(1))
            }
        };
        let n = usize::from(self.dst(inst, 0)?.mask().count());
        self.assign(inst, splat(count, NumType::Uint, n), NumType::Uint)
    }
}
