use super::protobuf::*;

#[test]
fn test_truncated_varint() {
    let data = vec![0x80, 0x80];
    assert!(read_varint(&data, 0).is_err(), "Should return error for truncated varint");
}

#[test]
fn test_truncated_64bit() {
    let data = vec![0x09, 0x01, 0x02]; // Tag 1, Wire 1 (64-bit), but only 2 bytes
    assert!(skip_field(&data, 1, 1).is_err());
}

#[test]
fn test_truncated_length_delimited() {
    let data = vec![0x12, 0x05, 0x01, 0x02]; // Tag 2, Wire 2, Length 5, but only 2 bytes
    assert!(skip_field(&data, 1, 2).is_err());
}

#[test]
fn test_length_overflow() {
    let mut data = vec![0x12];
    data.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
    assert!(skip_field(&data, 1, 2).is_err());
    assert!(find_field(&data, 2).is_err());
}

#[test]
fn test_invalid_wire_type() {
    let data = vec![0x0B]; // Tag 1, Wire 3 (group start, unsupported)
    assert!(skip_field(&data, 1, 3).is_err());
}

#[test]
fn test_replace_oauth_field_keeps_other_fields() {
    // field 1 = varint 150, field 6 = stale token bytes, field 7 = "x"
    let mut state = vec![0x08, 0x96, 0x01];
    state.extend(create_oauth_field("stale", "old-refresh", 1));
    state.extend([0x3A, 0x01, b'x']);

    let updated = replace_oauth_field(&state, "fresh", "new-refresh", 1_700_000_000).unwrap();

    assert_eq!(&updated[..3], &[0x08, 0x96, 0x01]);
    assert_eq!(find_field(&updated, 7).unwrap(), Some(b"x".to_vec()));

    let info = find_field(&updated, OAUTH_FIELD).unwrap().unwrap();
    assert_eq!(find_field(&info, 1).unwrap(), Some(b"fresh".to_vec()));
    assert_eq!(find_field(&info, 2).unwrap(), Some(b"Bearer".to_vec()));
    assert_eq!(find_field(&info, 3).unwrap(), Some(b"new-refresh".to_vec()));

    let timestamp = find_field(&info, 4).unwrap().unwrap();
    let (tag, body) = read_varint(&timestamp, 0).unwrap();
    assert_eq!(tag, 1 << 3);
    assert_eq!(read_varint(&timestamp, body).unwrap().0, 1_700_000_000);
}

#[test]
fn test_replace_on_empty_state_appends_field() {
    let updated = replace_oauth_field(&[], "a", "r", 5).unwrap();
    assert_eq!(updated, create_oauth_field("a", "r", 5));
}
