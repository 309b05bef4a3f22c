//! Query façade over one converted shader.
//!
//! [`ShaderConverter`] owns the model and the generated GLSL of the last blob
//! it was fed. Index-based accessors return `None` (or `0`/`false`) for out
//! of range indices and before anything has been converted.

use tracing::{debug, warn};

use dxbc2glsl_dxbc::{
    DxbcFile, RdefChunk, RdefConstantBuffer, RdefResourceBinding, RegisterClass, ShaderInputType,
    SignatureChunk, SignatureEntry, SrvDimension,
};

use crate::error::ConvertError;
use crate::glsl::{emit_glsl, GlslConfig};
use crate::model::{ComputeInfo, GsInfo, ShaderModule, TessInfo};
use crate::sm4::{ShaderModel, ShaderStage};
use crate::sm4_ir::{Primitive, PrimitiveTopology, TessDomain, TessOutputPrimitive, TessPartitioning};

#[derive(Debug, Clone)]
struct Converted {
    module: ShaderModule,
    glsl: String,
}

/// Converts DXBC blobs and answers reflection queries about the last one.
#[derive(Debug, Clone, Default)]
pub struct ShaderConverter {
    state: Option<Converted>,
}

/// Borrowed reflection summary, serializable for tooling.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Reflection<'a> {
    pub stage: ShaderStage,
    pub model: ShaderModel,
    pub inputs: &'a SignatureChunk,
    pub outputs: &'a SignatureChunk,
    pub patch_constants: &'a SignatureChunk,
    pub resources: Option<&'a RdefChunk>,
    /// Per constant buffer, per variable: read by the shader code.
    pub used_variables: &'a [Vec<bool>],
    pub gs: &'a GsInfo,
    pub tess: &'a TessInfo,
    pub compute: &'a ComputeInfo,
}

/// Parses `bytes` and translates the shader to GLSL in one call.
pub fn convert(bytes: &[u8], config: &GlslConfig) -> Result<String, ConvertError> {
    let dxbc = DxbcFile::parse(bytes)?;
    let module = ShaderModule::build(&dxbc)?;
    Ok(emit_glsl(&module, config)?)
}

impl ShaderConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts `bytes`, replacing whatever was converted before.
    ///
    /// On failure the converter is left empty.
    pub fn feed(&mut self, bytes: &[u8], config: &GlslConfig) -> Result<(), ConvertError> {
        self.state = None;
        let result = DxbcFile::parse(bytes)
            .map_err(ConvertError::from)
            .and_then(|dxbc| ShaderModule::build(&dxbc))
            .and_then(|module| {
                let glsl = emit_glsl(&module, config)?;
                Ok(Converted { module, glsl })
            });
        match result {
            Ok(converted) => {
                debug!(
                    stage = %converted.module.stage,
                    bytes = bytes.len(),
                    glsl_bytes = converted.glsl.len(),
                    "converted shader"
                );
                self.state = Some(converted);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "shader conversion failed");
                Err(err)
            }
        }
    }

    /// Generated GLSL; empty before a successful [`ShaderConverter::feed`].
    pub fn glsl(&self) -> &str {
        self.state.as_ref().map_or("", |s| s.glsl.as_str())
    }

    pub fn module(&self) -> Option<&ShaderModule> {
        self.state.as_ref().map(|s| &s.module)
    }

    pub fn stage(&self) -> Option<ShaderStage> {
        self.module().map(|m| m.stage)
    }

    pub fn reflection(&self) -> Option<Reflection<'_>> {
        let m = self.module()?;
        Some(Reflection {
            stage: m.stage,
            model: m.model,
            inputs: &m.signatures.input,
            outputs: &m.signatures.output,
            patch_constants: &m.signatures.patch_constant,
            resources: m.reflection.as_ref(),
            used_variables: &m.usage.used_variables,
            gs: &m.gs,
            tess: &m.tess,
            compute: &m.compute,
        })
    }

    pub fn inputs(&self) -> &[SignatureEntry] {
        self.module()
            .map_or(&[][..], |m| m.signatures.input.entries.as_slice())
    }

    pub fn outputs(&self) -> &[SignatureEntry] {
        self.module()
            .map_or(&[][..], |m| m.signatures.output.entries.as_slice())
    }

    pub fn patch_constants(&self) -> &[SignatureEntry] {
        self.module()
            .map_or(&[][..], |m| m.signatures.patch_constant.entries.as_slice())
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs().len()
    }

    /// `(semantic name, semantic index)` of input `i`.
    pub fn input_semantic(&self, i: usize) -> Option<(&str, u32)> {
        self.inputs()
            .get(i)
            .map(|e| (e.semantic_name.as_str(), e.semantic_index))
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs().len()
    }

    pub fn output_semantic(&self, i: usize) -> Option<(&str, u32)> {
        self.outputs()
            .get(i)
            .map(|e| (e.semantic_name.as_str(), e.semantic_index))
    }

    fn rdef(&self) -> Option<&RdefChunk> {
        self.module().and_then(|m| m.reflection.as_ref())
    }

    fn cbuffer(&self, i: usize) -> Option<&RdefConstantBuffer> {
        self.rdef().and_then(|r| r.constant_buffers.get(i))
    }

    pub fn num_cbuffers(&self) -> usize {
        self.rdef().map_or(0, |r| r.constant_buffers.len())
    }

    pub fn cbuffer_name(&self, i: usize) -> Option<&str> {
        self.cbuffer(i).map(|cb| cb.name.as_str())
    }

    pub fn cbuffer_bind_point(&self, i: usize) -> Option<u32> {
        self.cbuffer(i).and_then(|cb| cb.bind_point)
    }

    pub fn num_variables(&self, cb: usize) -> usize {
        self.cbuffer(cb).map_or(0, |cb| cb.variables.len())
    }

    pub fn variable_name(&self, cb: usize, v: usize) -> Option<&str> {
        self.cbuffer(cb)
            .and_then(|cb| cb.variables.get(v))
            .map(|var| var.name.as_str())
    }

    /// Whether any instruction reads the registers of variable `v`.
    pub fn variable_used(&self, cb: usize, v: usize) -> bool {
        self.module()
            .and_then(|m| m.usage.used_variables.get(cb))
            .and_then(|vars| vars.get(v))
            .copied()
            .unwrap_or(false)
    }

    /// Bound textures, samplers and UAVs; constant buffers are reported by
    /// the `cbuffer_*` accessors instead.
    fn resources(&self) -> impl Iterator<Item = &RdefResourceBinding> {
        self.rdef()
            .into_iter()
            .flat_map(|r| &r.bound_resources)
            .filter(|b| b.input_type.register_class() != RegisterClass::ConstantBuffer)
    }

    fn resource(&self, i: usize) -> Option<&RdefResourceBinding> {
        self.resources().nth(i)
    }

    pub fn num_resources(&self) -> usize {
        self.resources().count()
    }

    pub fn resource_name(&self, i: usize) -> Option<&str> {
        self.resource(i).map(|r| r.name.as_str())
    }

    pub fn resource_bind_point(&self, i: usize) -> Option<u32> {
        self.resource(i).map(|r| r.bind_point)
    }

    pub fn resource_kind(&self, i: usize) -> Option<ShaderInputType> {
        self.resource(i).map(|r| r.input_type)
    }

    /// View dimension of resource `i`; [`SrvDimension::Unknown`] for samplers.
    pub fn resource_dimension(&self, i: usize) -> Option<SrvDimension> {
        self.resource(i).map(|r| r.dimension)
    }

    /// Whether the code names any register the binding covers.
    pub fn resource_used(&self, i: usize) -> bool {
        let (Some(module), Some(r)) = (self.module(), self.resource(i)) else {
            return false;
        };
        let usage = &module.usage;
        let mut slots = r.bind_point..r.bind_point.saturating_add(r.bind_count.max(1));
        match r.input_type.register_class() {
            RegisterClass::ConstantBuffer => slots.any(|s| usage.cbuffers.contains_key(&s)),
            RegisterClass::ShaderResource => slots.any(|s| usage.textures.contains(&s)),
            RegisterClass::Sampler => slots.any(|s| usage.samplers.contains(&s)),
            RegisterClass::Uav => slots.any(|s| usage.uavs.contains(&s)),
        }
    }

    pub fn gs_input_primitive(&self) -> Option<Primitive> {
        self.module().and_then(|m| m.gs.input_primitive)
    }

    /// Output topology per declared stream.
    pub fn gs_output_topologies(&self) -> &[PrimitiveTopology] {
        self.module()
            .map_or(&[][..], |m| m.gs.output_topologies.as_slice())
    }

    pub fn gs_max_output_vertices(&self) -> u32 {
        self.module().map_or(0, |m| m.gs.max_output_vertices)
    }

    pub fn gs_instance_count(&self) -> u32 {
        self.module().map_or(0, |m| m.gs.instance_count)
    }

    pub fn hs_input_control_points(&self) -> u32 {
        self.module().map_or(0, |m| m.tess.input_control_points)
    }

    pub fn hs_output_control_points(&self) -> u32 {
        self.module().map_or(0, |m| m.tess.output_control_points)
    }

    pub fn tess_domain(&self) -> Option<TessDomain> {
        self.module().and_then(|m| m.tess.domain)
    }

    pub fn tess_partitioning(&self) -> Option<TessPartitioning> {
        self.module().and_then(|m| m.tess.partitioning)
    }

    pub fn tess_output_primitive(&self) -> Option<TessOutputPrimitive> {
        self.module().and_then(|m| m.tess.output_primitive)
    }

    pub fn max_tess_factor(&self) -> Option<f32> {
        self.module().and_then(|m| m.tess.max_tess_factor)
    }

    pub fn thread_group_size(&self) -> Option<[u32; 3]> {
        self.module()
            .filter(|m| m.stage == ShaderStage::Compute)
            .map(|m| m.compute.thread_group)
    }
}
