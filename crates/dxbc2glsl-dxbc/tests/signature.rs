use dxbc2glsl_dxbc::test_utils::build_signature_chunk;
use dxbc2glsl_dxbc::{
    parse_signature_chunk, parse_signature_chunk_with_fourcc, ComponentType, DxbcError,
    SignatureEntry, SignatureLayout, SystemValue, FOURCC_ISG1, FOURCC_OSG5,
};
use pretty_assertions::assert_eq;

fn sample_entries(n: u32) -> Vec<SignatureEntry> {
    (0..n)
        .map(|i| SignatureEntry {
            semantic_name: if i % 2 == 0 { "TEXCOORD" } else { "COLOR" }.to_owned(),
            semantic_index: i / 2,
            system_value: SystemValue::Undefined,
            component_type: if i % 3 == 0 {
                ComponentType::Uint32
            } else {
                ComponentType::Float32
            },
            // Deliberately non-monotonic register assignment.
            register: (n - i) * 2,
            mask: (1 << (i % 4)) | 1,
            read_write_mask: 1,
            stream: 0,
            min_precision: 0,
        })
        .collect()
}

#[test]
fn entries_keep_on_disk_order() {
    for n in [1u32, 2, 5, 16] {
        let entries = sample_entries(n);
        let bytes = build_signature_chunk(SignatureLayout::Legacy, &entries);
        let parsed = parse_signature_chunk(&bytes).unwrap();
        assert_eq!(parsed.entries.len(), n as usize);
        assert_eq!(parsed.entries, entries);
    }
}

#[test]
fn osg5_records_carry_stream() {
    let mut entries = sample_entries(3);
    entries[1].stream = 3;
    let bytes = build_signature_chunk(SignatureLayout::Stream, &entries);
    let parsed = parse_signature_chunk_with_fourcc(FOURCC_OSG5, &bytes).unwrap();
    assert_eq!(parsed.entries, entries);
}

#[test]
fn isg1_records_carry_stream_and_min_precision() {
    let mut entries = sample_entries(2);
    entries[0].min_precision = 5;
    entries[1].stream = 1;
    let bytes = build_signature_chunk(SignatureLayout::Extended, &entries);
    let parsed = parse_signature_chunk_with_fourcc(FOURCC_ISG1, &bytes).unwrap();
    assert_eq!(parsed.entries, entries);
}

#[test]
fn system_values_are_typed() {
    let mut entries = sample_entries(2);
    entries[0].semantic_name = "SV_Position".into();
    entries[0].system_value = SystemValue::Position;
    entries[1].semantic_name = "SV_Target".into();
    entries[1].system_value = SystemValue::Target;
    let bytes = build_signature_chunk(SignatureLayout::Legacy, &entries);
    let parsed = parse_signature_chunk(&bytes).unwrap();
    assert_eq!(parsed.entries[0].system_value, SystemValue::Position);
    assert_eq!(parsed.entries[1].system_value.to_u32(), 64);
    assert!(parsed.find_semantic("sv_target", 0).is_some());
}

#[test]
fn table_larger_than_chunk_is_rejected() {
    let entries = sample_entries(2);
    let mut bytes = build_signature_chunk(SignatureLayout::Legacy, &entries);
    bytes[0..4].copy_from_slice(&1000u32.to_le_bytes());
    let err = parse_signature_chunk(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::TruncatedData { .. }), "{err}");
}

#[test]
fn unterminated_semantic_name_is_malformed() {
    let entries = sample_entries(1);
    let mut bytes = build_signature_chunk(SignatureLayout::Legacy, &entries);
    // The name is the last thing in the chunk; drop its terminator.
    assert_eq!(bytes.pop(), Some(0));
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    let err = parse_signature_chunk(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::MalformedContainer { .. }), "{err}");
    assert!(err.context().starts_with("entry 0:"), "{err}");
}

#[test]
fn semantic_name_outside_chunk_is_malformed() {
    let entries = sample_entries(1);
    let mut bytes = build_signature_chunk(SignatureLayout::Legacy, &entries);
    // First entry's name offset sits right after the 8-byte header.
    bytes[8..12].copy_from_slice(&4096u32.to_le_bytes());
    let err = parse_signature_chunk(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::MalformedContainer { .. }), "{err}");
}

#[test]
fn short_header_is_truncated_data() {
    let err = parse_signature_chunk(&[1, 0, 0]).unwrap_err();
    assert!(matches!(err, DxbcError::TruncatedData { .. }), "{err}");
}

#[test]
fn wrong_layout_for_tag_is_detected() {
    // A 24-byte record chunk parsed as 32-byte records runs off the table.
    let entries = sample_entries(4);
    let bytes = build_signature_chunk(SignatureLayout::Legacy, &entries);
    assert!(parse_signature_chunk_with_fourcc(FOURCC_ISG1, &bytes).is_err());
}
