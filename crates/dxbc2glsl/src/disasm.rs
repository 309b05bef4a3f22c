//! DXBC assembly listing of a decoded shader.
//!
//! The output follows the `fxc /dumpbin` syntax closely enough to diff
//! against it by eye (`mul o0.xyzw, v0.xyzw, cb0[0].xyzw`); it is meant for
//! diagnostics, not for reassembly.

use core::fmt::Write as _;

use crate::model::{ListingEntry, ShaderModule};
use crate::sm4::opcode::{Opcode, OperandType};
use crate::sm4_ir::{
    ComponentSelection, Declaration, GlobalFlags, Immediate, Instruction, Operand, OperandIndex,
    OperandModifier, Primitive, ResinfoReturnType, ReturnType, SamplerMode, COMPONENT_CHARS,
};

/// Full listing: profile line, then one line per declaration/instruction.
pub fn disassemble(module: &ShaderModule) -> String {
    let mut out = format!(
        "{}_{}_{}\n",
        module.stage.short_name(),
        module.model.major,
        module.model.minor
    );
    let mut depth = 0usize;
    for entry in &module.listing {
        let (line, indent) = match *entry {
            ListingEntry::Decl(i) => (format_declaration(&module.declarations[i]), 0),
            ListingEntry::Inst(i) => {
                let inst = &module.instructions[i];
                match inst.opcode {
                    Opcode::Else | Opcode::EndIf | Opcode::EndLoop | Opcode::EndSwitch => {
                        depth = depth.saturating_sub(1)
                    }
                    Opcode::Label => depth = 0,
                    _ => {}
                }
                let indent = depth;
                if matches!(inst.opcode, Opcode::If | Opcode::Else | Opcode::Loop | Opcode::Switch) {
                    depth += 1;
                }
                (format_instruction(inst), indent)
            }
        };
        for _ in 0..indent {
            out.push_str("  ");
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn immediate32(bits: u32) -> String {
    let f = f32::from_bits(bits);
    if bits != 0 && f.is_normal() && (1e-6..=1e12).contains(&f.abs()) {
        format!("{f:.6}")
    } else if bits < 0x10000 {
        bits.to_string()
    } else {
        format!("0x{bits:08x}")
    }
}

fn format_index(index: &OperandIndex) -> String {
    match index {
        OperandIndex::Imm32(v) => v.to_string(),
        OperandIndex::Imm64(v) => v.to_string(),
        OperandIndex::Relative(rel) => format_operand(rel),
        OperandIndex::Imm32PlusRelative(_, rel) | OperandIndex::Imm64PlusRelative(_, rel) => {
            format!("{} + {}", format_operand(rel), index.imm())
        }
    }
}

/// One operand in assembly syntax, modifiers included.
pub fn format_operand(op: &Operand) -> String {
    let s = match (op.ty, op.imm) {
        (OperandType::Immediate32, Some(Immediate::Bits32(values))) => {
            let n = usize::from(op.num_components.max(1));
            let parts: Vec<String> = values[..n.min(4)].iter().map(|&v| immediate32(v)).collect();
            format!("l({})", parts.join(", "))
        }
        (OperandType::Immediate64, Some(Immediate::Bits64(values))) => {
            let n = usize::from(op.num_components.max(1)).min(4);
            let parts: Vec<String> = values[..n].iter().map(|&v| f64::from_bits(v).to_string()).collect();
            format!("d({})", parts.join(", "))
        }
        _ => {
            let mut s = op.ty.prefix().to_owned();
            for (k, index) in op.indices.iter().enumerate() {
                if k == 0 && index.relative().is_none() {
                    let _ = write!(s, "{}", index.imm());
                } else {
                    let _ = write!(s, "[{}]", format_index(index));
                }
            }
            if op.num_components == 4 {
                match op.selection {
                    ComponentSelection::Mask(mask) if !mask.is_empty() => s.push_str(&mask.suffix()),
                    ComponentSelection::Mask(_) => {}
                    ComponentSelection::Swizzle(swizzle) => {
                        s.push('.');
                        s.extend(swizzle.0.iter().map(|&c| COMPONENT_CHARS[usize::from(c & 3)]));
                    }
                    ComponentSelection::Select1(c) => {
                        s.push('.');
                        s.push(COMPONENT_CHARS[usize::from(c & 3)]);
                    }
                }
            }
            s
        }
    };
    match op.modifier {
        OperandModifier::None => s,
        OperandModifier::Neg => format!("-{s}"),
        OperandModifier::Abs => format!("|{s}|"),
        OperandModifier::AbsNeg => format!("-|{s}|"),
    }
}

/// Mnemonic with its suffixes, then the operands.
pub fn format_instruction(inst: &Instruction) -> String {
    let mut name = inst.opcode.name().to_owned();
    if inst.opcode.has_test() {
        name.push_str(if inst.test_nonzero { "_nz" } else { "_z" });
    }
    match inst.opcode {
        Opcode::Resinfo => match inst.resinfo_return_type() {
            ResinfoReturnType::RcpFloat => name.push_str("_rcpFloat"),
            ResinfoReturnType::Uint => name.push_str("_uint"),
            ResinfoReturnType::Float => {}
        },
        Opcode::SampleInfo if inst.sampleinfo_uint() => name.push_str("_uint"),
        _ => {}
    }
    if inst.has_offsets() {
        let [u, v, w] = inst.sample_offsets;
        let _ = write!(name, "_aoffimmi({u},{v},{w})");
    }
    if inst.saturate {
        name.push_str("_sat");
    }
    if inst.operands.is_empty() {
        return name;
    }
    let operands: Vec<String> = inst.operands.iter().map(format_operand).collect();
    format!("{name} {}", operands.join(", "))
}

fn return_types(types: &[ReturnType; 4]) -> String {
    let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
    format!("({})", names.join(","))
}

fn system_value_name(value: u32) -> String {
    match value {
        1 => "position".to_owned(),
        2 => "clip_distance".to_owned(),
        3 => "cull_distance".to_owned(),
        4 => "rendertarget_array_index".to_owned(),
        5 => "viewport_array_index".to_owned(),
        6 => "vertex_id".to_owned(),
        7 => "primitive_id".to_owned(),
        8 => "instance_id".to_owned(),
        9 => "is_front_face".to_owned(),
        10 => "sampleIndex".to_owned(),
        11 => "finalQuadUeq0EdgeTessFactor".to_owned(),
        12 => "finalQuadUInsideTessFactor".to_owned(),
        13 => "finalTriUeq0EdgeTessFactor".to_owned(),
        14 => "finalTriInsideTessFactor".to_owned(),
        15 => "finalLineDetailTessFactor".to_owned(),
        16 => "finalLineDensityTessFactor".to_owned(),
        other => format!("sv{other}"),
    }
}

fn global_flag_names(flags: GlobalFlags) -> String {
    let names: Vec<&str> = flags
        .iter_names()
        .map(|(name, _)| match name {
            "REFACTORING_ALLOWED" => "refactoringAllowed",
            "ENABLE_DOUBLE_PRECISION" => "enableDoublePrecisionFloatOps",
            "FORCE_EARLY_DEPTH_STENCIL" => "forceEarlyDepthStencil",
            "ENABLE_RAW_AND_STRUCTURED_BUFFERS" => "enableRawAndStructuredBuffers",
            "SKIP_OPTIMIZATION" => "skipOptimization",
            "ENABLE_MINIMUM_PRECISION" => "enableMinimumPrecision",
            "ENABLE_11_1_DOUBLE_EXTENSIONS" => "enable11_1DoubleExtensions",
            _ => "enable11_1ShaderExtensions",
        })
        .collect();
    names.join(" | ")
}

fn glc(globally_coherent: bool) -> &'static str {
    if globally_coherent {
        "_glc"
    } else {
        ""
    }
}

/// One `dcl_*` line.
pub fn format_declaration(decl: &Declaration) -> String {
    match decl {
        Declaration::GlobalFlags(flags) => format!("dcl_globalFlags {}", global_flag_names(*flags)),
        Declaration::Resource {
            slot,
            dimension,
            sample_count,
            return_type,
        } => {
            let samples = if dimension.is_multisampled() {
                format!("({sample_count})")
            } else {
                String::new()
            };
            format!(
                "dcl_resource_{}{samples} {} t{slot}",
                dimension.name(),
                return_types(return_type)
            )
        }
        Declaration::ConstantBuffer {
            slot,
            size_vec4,
            dynamic_indexed,
        } => {
            let access = if *dynamic_indexed {
                "dynamicIndexed"
            } else {
                "immediateIndexed"
            };
            format!("dcl_constantbuffer cb{slot}[{size_vec4}], {access}")
        }
        Declaration::Sampler { slot, mode } => {
            let mode = match mode {
                SamplerMode::Default => "mode_default",
                SamplerMode::Comparison => "mode_comparison",
                SamplerMode::Mono => "mode_mono",
            };
            format!("dcl_sampler s{slot}, {mode}")
        }
        Declaration::IndexRange { operand, count } => {
            format!("dcl_indexrange {}, {count}", format_operand(operand))
        }
        Declaration::GsOutputTopology(t) => format!("dcl_outputtopology {}", t.name()),
        Declaration::GsInputPrimitive(Primitive::Patch(n)) => format!("dcl_inputprimitive patch{n}"),
        Declaration::GsInputPrimitive(p) => format!("dcl_inputprimitive {}", p.name()),
        Declaration::GsMaxOutputVertexCount(n) => format!("dcl_maxout {n}"),
        Declaration::GsInstanceCount(n) => format!("dcl_gsinstances {n}"),
        Declaration::Stream(n) => format!("dcl_stream m{n}"),
        Declaration::Input {
            operand,
            system_value,
            interpolation,
        } => {
            let mut s = String::from("dcl_input");
            if interpolation.is_some() {
                s.push_str("_ps");
            }
            if system_value.is_some() {
                s.push_str("_siv");
            }
            if let Some(mode) = interpolation {
                let _ = write!(s, " {}", mode.name());
            }
            let _ = write!(s, " {}", format_operand(operand));
            if let Some(sv) = system_value {
                let _ = write!(s, ", {}", system_value_name(*sv));
            }
            s
        }
        Declaration::Output {
            operand,
            system_value,
        } => match system_value {
            Some(sv) => format!(
                "dcl_output_siv {}, {}",
                format_operand(operand),
                system_value_name(*sv)
            ),
            None => format!("dcl_output {}", format_operand(operand)),
        },
        Declaration::Temps(n) => format!("dcl_temps {n}"),
        Declaration::IndexableTemp {
            reg,
            size,
            components,
        } => format!("dcl_indexableTemp x{reg}[{size}], {components}"),
        Declaration::InputControlPointCount(n) => format!("dcl_input_control_point_count {n}"),
        Declaration::OutputControlPointCount(n) => format!("dcl_output_control_point_count {n}"),
        Declaration::TessDomain(d) => format!("dcl_tessellator_domain {}", d.name()),
        Declaration::TessPartitioning(p) => format!("dcl_tessellator_partitioning {}", p.name()),
        Declaration::TessOutputPrimitive(p) => {
            format!("dcl_tessellator_output_primitive {}", p.name())
        }
        Declaration::HsMaxTessFactor(f) => format!("dcl_hs_max_tessfactor l({f:.6})"),
        Declaration::HsForkPhaseInstanceCount(n) => format!("dcl_hs_fork_phase_instance_count {n}"),
        Declaration::HsJoinPhaseInstanceCount(n) => format!("dcl_hs_join_phase_instance_count {n}"),
        Declaration::ThreadGroup([x, y, z]) => format!("dcl_thread_group {x}, {y}, {z}"),
        Declaration::UavTyped {
            slot,
            dimension,
            return_type,
            globally_coherent,
        } => format!(
            "dcl_uav_typed_{}{} {} u{slot}",
            dimension.name(),
            glc(*globally_coherent),
            return_types(return_type)
        ),
        Declaration::UavRaw {
            slot,
            globally_coherent,
        } => format!("dcl_uav_raw{} u{slot}", glc(*globally_coherent)),
        Declaration::UavStructured {
            slot,
            stride,
            globally_coherent,
        } => format!("dcl_uav_structured{} u{slot}, {stride}", glc(*globally_coherent)),
        Declaration::TgsmRaw { slot, byte_count } => format!("dcl_tgsm_raw g{slot}, {byte_count}"),
        Declaration::TgsmStructured {
            slot,
            stride,
            count,
        } => format!("dcl_tgsm_structured g{slot}, {stride}, {count}"),
        Declaration::ResourceRaw { slot } => format!("dcl_resource_raw t{slot}"),
        Declaration::ResourceStructured { slot, stride } => {
            format!("dcl_resource_structured t{slot}, {stride}")
        }
        Declaration::FunctionBody(n) => format!("dcl_function_body fb{n}"),
        Declaration::FunctionTable { index, bodies } => {
            let bodies: Vec<String> = bodies.iter().map(|b| format!("fb{b}")).collect();
            format!("dcl_function_table ft{index} = {{{}}}", bodies.join(", "))
        }
        Declaration::Interface {
            index,
            table_count,
            array_len,
        } => format!("dcl_interface fp{index}[{array_len}][{table_count}]"),
        Declaration::ImmediateConstantBuffer(data) => {
            let rows: Vec<String> = data
                .iter()
                .map(|row| {
                    let parts: Vec<String> = row.iter().map(|&v| immediate32(v)).collect();
                    format!("{{ {} }}", parts.join(", "))
                })
                .collect();
            format!("dcl_immediateConstantBuffer {{ {} }}", rows.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm4_ir::{Swizzle, WriteMask};

    fn reg(ty: OperandType, index: u32, selection: ComponentSelection) -> Operand {
        let mut op = Operand::new(ty);
        op.num_components = 4;
        op.selection = selection;
        op.indices = vec![OperandIndex::Imm32(index)];
        op
    }

    #[test]
    fn formats_instruction_operands() {
        let mut inst = Instruction::new(Opcode::Mul, 0);
        inst.operands = vec![
            reg(OperandType::Output, 0, ComponentSelection::Mask(WriteMask::XYZW)),
            reg(OperandType::Input, 0, ComponentSelection::Swizzle(Swizzle::XYZW)),
            {
                let mut cb = reg(OperandType::ConstantBuffer, 0, ComponentSelection::Swizzle(Swizzle::XYZW));
                cb.indices.push(OperandIndex::Imm32(0));
                cb
            },
        ];
        assert_eq!(format_instruction(&inst), "mul o0.xyzw, v0.xyzw, cb0[0].xyzw");
    }

    #[test]
    fn formats_modifiers_and_relative_indices() {
        let mut op = reg(OperandType::ConstantBuffer, 2, ComponentSelection::Select1(1));
        let rel = reg(OperandType::Temp, 1, ComponentSelection::Select1(0));
        op.indices.push(OperandIndex::Imm32PlusRelative(3, Box::new(rel)));
        op.modifier = OperandModifier::AbsNeg;
        assert_eq!(format_operand(&op), "-|cb2[r1.x + 3].y|");
    }

    #[test]
    fn formats_immediates() {
        let mut op = Operand::new(OperandType::Immediate32);
        op.num_components = 4;
        op.imm = Some(Immediate::Bits32([0x3f80_0000, 0, 7, 0xffff_ffff]));
        assert_eq!(format_operand(&op), "l(1.000000, 0, 7, 0xffffffff)");
    }

    #[test]
    fn formats_declarations() {
        assert_eq!(
            format_declaration(&Declaration::ConstantBuffer {
                slot: 0,
                size_vec4: 4,
                dynamic_indexed: false
            }),
            "dcl_constantbuffer cb0[4], immediateIndexed"
        );
        assert_eq!(
            format_declaration(&Declaration::Output {
                operand: reg(OperandType::Output, 0, ComponentSelection::Mask(WriteMask::XYZW)),
                system_value: Some(1),
            }),
            "dcl_output_siv o0.xyzw, position"
        );
        assert_eq!(
            format_declaration(&Declaration::ThreadGroup([8, 8, 1])),
            "dcl_thread_group 8, 8, 1"
        );
    }
}
