use dxbc2glsl_dxbc::test_utils::{CbufferDesc, RdefBuilder, ResourceDesc, VariableDesc};
use dxbc2glsl_dxbc::{
    parse_rdef_chunk, CbufferKind, DxbcError, RdefProgramType, RegisterClass,
    ShaderInputType, SrvDimension, VariableClass, VariableType,
};
use pretty_assertions::assert_eq;

#[test]
fn sm4_chunk_with_cbuffer_and_texture() {
    let chunk = RdefBuilder::new(4, 0, 0xffff)
        .resource(ResourceDesc::sampler("samp", 0))
        .resource(ResourceDesc::texture2d("diffuse", 3))
        .cbuffer(
            CbufferDesc::new("PerFrame", 80)
                .variable(VariableDesc::float4x4("worldViewProj", 0))
                .variable(VariableDesc::float_n("tint", 64, 4)),
            1,
        )
        .build();

    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.target.major, 4);
    assert_eq!(rdef.target.program_type, RdefProgramType::Pixel);
    assert_eq!(rdef.creator.as_deref(), Some("dxbc2glsl test"));
    assert_eq!(rdef.interface_slot_count, None);

    assert_eq!(rdef.bound_resources.len(), 3);
    let tex = rdef.resource_at(RegisterClass::ShaderResource, 3).unwrap();
    assert_eq!(tex.name, "diffuse");
    assert_eq!(tex.dimension, SrvDimension::Texture2D);
    assert_eq!(
        rdef.resource_at(RegisterClass::Sampler, 0).unwrap().input_type,
        ShaderInputType::Sampler
    );

    let cb = rdef.constant_buffer_at(1).expect("cbuffer bound at b1");
    assert_eq!(cb.name, "PerFrame");
    assert_eq!(cb.kind, CbufferKind::Cbuffer);
    assert_eq!(cb.size, 80);
    assert_eq!(cb.variables.len(), 2);
    let m = &cb.variables[0];
    assert_eq!(m.name, "worldViewProj");
    assert_eq!(m.ty.class, VariableClass::MatrixColumns);
    assert_eq!(m.ty.base, VariableType::Float);
    assert_eq!((m.ty.rows, m.ty.columns), (4, 4));
    assert!(!m.ty.is_row_major());
    assert_eq!(m.texture_slots, None);
}

#[test]
fn sm5_chunk_uses_wide_variable_records() {
    let chunk = RdefBuilder::new(5, 0, 0xfffe)
        .cbuffer(
            CbufferDesc::new("Globals", 32)
                .variable(VariableDesc::int("count", 16))
                .variable(VariableDesc::float_n("scale", 0, 3)),
            0,
        )
        .build();

    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.target.major, 5);
    assert_eq!(rdef.interface_slot_count, Some(0));
    let cb = &rdef.constant_buffers[0];
    // Sorted by start offset regardless of on-disk order.
    let names: Vec<_> = cb.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["scale", "count"]);
    assert_eq!(cb.variables[1].ty.base, VariableType::Int);
    assert_eq!(cb.variables[0].texture_slots, Some((u32::MAX, 0)));
    assert_eq!(cb.bind_point, Some(0));
}

#[test]
fn unbound_cbuffer_has_no_bind_point() {
    let chunk = RdefBuilder::new(4, 0, 0xfffe)
        .unbound_cbuffer(CbufferDesc::new("Orphan", 16).variable(VariableDesc::float("x", 0)))
        .build();
    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.constant_buffers[0].bind_point, None);
    assert!(rdef.constant_buffer_at(0).is_none());
}

#[test]
fn variable_outside_buffer_is_rejected() {
    let chunk = RdefBuilder::new(4, 0, 0xfffe)
        .cbuffer(
            CbufferDesc::new("Small", 16).variable(VariableDesc::float4x4("m", 0)),
            0,
        )
        .build();
    let err = parse_rdef_chunk(&chunk).unwrap_err();
    assert!(matches!(err, DxbcError::InvalidChunk { .. }), "{err}");
    assert!(err.context().contains("outside buffer size"), "{err}");
}

#[test]
fn default_values_are_captured() {
    let mut var = VariableDesc::float("gain", 0);
    var.default_value = Some(1.5f32.to_le_bytes().to_vec());
    let chunk = RdefBuilder::new(4, 0, 0xfffe)
        .cbuffer(CbufferDesc::new("cb", 16).variable(var), 0)
        .build();
    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(
        rdef.constant_buffers[0].variables[0].default_value.as_deref(),
        Some(&1.5f32.to_le_bytes()[..])
    );
}

#[test]
fn array_and_matrix_shapes() {
    let chunk = RdefBuilder::new(4, 0, 0xfffe)
        .cbuffer(
            CbufferDesc::new("Bones", 16 * 4 * 8 + 16)
                .variable(VariableDesc::float4x4("bones", 0).array(8))
                .variable(VariableDesc::new("rowMajor", 512, 2, 3, 3, 4)),
            2,
        )
        .build();
    let rdef = parse_rdef_chunk(&chunk);
    // 3x4 row-major needs 3 registers; it does not fit in the last 16 bytes.
    assert!(rdef.is_err());

    let chunk = RdefBuilder::new(4, 0, 0xfffe)
        .cbuffer(
            CbufferDesc::new("Bones", 16 * 4 * 8 + 48)
                .variable(VariableDesc::float4x4("bones", 0).array(8))
                .variable(VariableDesc::new("rowMajor", 512, 2, 3, 3, 4)),
            2,
        )
        .build();
    let rdef = parse_rdef_chunk(&chunk).unwrap();
    let vars = &rdef.constant_buffers[0].variables;
    assert_eq!(vars[0].ty.elements, 8);
    assert_eq!(vars[0].size, 512);
    assert!(vars[1].ty.is_row_major());
    assert_eq!(vars[1].ty.registers_per_element(), 3);
}
