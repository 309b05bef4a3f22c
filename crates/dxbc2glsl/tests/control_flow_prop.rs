#![cfg(not(target_arch = "wasm32"))]

use dxbc2glsl::model::ControlFlow;
use dxbc2glsl::sm4::opcode::Opcode;
use dxbc2glsl::sm4_ir::Instruction;
use dxbc2glsl::ConvertError;
use proptest::prelude::*;

/// Balanced opcode sequences nested up to eight levels deep.
fn block() -> impl Strategy<Value = Vec<Opcode>> {
    let leaf = prop_oneof![
        Just(vec![Opcode::Mov]),
        Just(vec![Opcode::Add, Opcode::Mul]),
        Just(Vec::new()),
    ];
    leaf.prop_recursive(8, 256, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(|parts| parts.concat()),
            (inner.clone(), prop::option::of(inner.clone())).prop_map(|(then, otherwise)| {
                let mut out = vec![Opcode::If];
                out.extend(then);
                if let Some(otherwise) = otherwise {
                    out.push(Opcode::Else);
                    out.extend(otherwise);
                }
                out.push(Opcode::EndIf);
                out
            }),
            inner.clone().prop_map(|body| {
                let mut out = vec![Opcode::Loop];
                out.extend(body);
                out.extend([Opcode::Break, Opcode::EndLoop]);
                out
            }),
            (prop::collection::vec(inner, 1..4), any::<bool>()).prop_map(|(cases, default)| {
                let mut out = vec![Opcode::Switch];
                for (i, body) in cases.into_iter().enumerate() {
                    out.push(if default && i == 0 { Opcode::Default } else { Opcode::Case });
                    out.extend(body);
                    out.push(Opcode::Break);
                }
                out.push(Opcode::EndSwitch);
                out
            }),
        ]
    })
}

fn instructions(opcodes: &[Opcode]) -> Vec<Instruction> {
    opcodes
        .iter()
        .enumerate()
        .map(|(i, &op)| Instruction::new(op, i))
        .collect()
}

proptest! {
    #[test]
    fn balanced_streams_flatten_to_program_order(mut opcodes in block()) {
        opcodes.push(Opcode::Ret);
        let flow = ControlFlow::build(&instructions(&opcodes)).unwrap();
        prop_assert_eq!(flow.flatten(), (0..opcodes.len()).collect::<Vec<_>>());
    }

    #[test]
    fn trailing_endif_is_rejected(mut opcodes in block()) {
        opcodes.push(Opcode::EndIf);
        let index = opcodes.len() - 1;
        match ControlFlow::build(&instructions(&opcodes)) {
            Err(ConvertError::UnbalancedControlFlow { index: at, .. }) => prop_assert_eq!(at, index),
            other => prop_assert!(false, "expected an unbalanced endif, got {:?}", other.map(|_| ())),
        }
    }
}

#[test]
fn unterminated_if_names_the_opening_instruction() {
    let stream = instructions(&[Opcode::Mov, Opcode::If, Opcode::Mov]);
    let err = ControlFlow::build(&stream).map(|_| ()).unwrap_err();
    assert!(
        matches!(err, ConvertError::UnbalancedControlFlow { index: 1, .. }),
        "{err:?}"
    );
}

#[test]
fn case_outside_switch_is_rejected() {
    let stream = instructions(&[Opcode::Loop, Opcode::Case, Opcode::EndLoop]);
    let err = ControlFlow::build(&stream).map(|_| ()).unwrap_err();
    assert!(
        matches!(err, ConvertError::UnbalancedControlFlow { index: 1, .. }),
        "{err:?}"
    );
}
