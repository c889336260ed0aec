use super::*;

#[test]
fn safe_name_passes_through() {
    assert_eq!(encode_logical_name("Orders"), "Orders");
    assert_eq!(encode_logical_name("my_app.models.Order"), "my_app.models.Order");
}

#[test]
fn unsafe_characters_get_encoded() {
    let encoded = encode_logical_name("orders/2024");
    assert!(encoded.starts_with("b64_"));
    assert_eq!(decode_logical_name(&encoded).unwrap(), "orders/2024");
}

#[test]
fn reserved_device_names_get_encoded() {
    for reserved in ["CON", "NUL", "COM1", "LPT9"] {
        let encoded = encode_logical_name(reserved);
        assert!(encoded.starts_with("b64_"), "{reserved} should be encoded");
        assert_eq!(decode_logical_name(&encoded).unwrap(), reserved);
    }
}

#[test]
fn trailing_dot_gets_encoded() {
    let encoded = encode_logical_name("weird.");
    assert!(encoded.starts_with("b64_"));
    assert_eq!(decode_logical_name(&encoded).unwrap(), "weird.");
}

#[test]
fn too_long_name_gets_encoded() {
    let long = "a".repeat(200);
    let encoded = encode_logical_name(&long);
    assert!(encoded.starts_with("b64_"));
    assert_eq!(decode_logical_name(&encoded).unwrap(), long);
}

#[test]
fn round_trip_is_exact_for_arbitrary_unicode() {
    let name = "café__index__☃";
    let encoded = encode_logical_name(name);
    assert_eq!(decode_logical_name(&encoded).unwrap(), name);
}

#[test]
fn index_table_name_is_derived_and_splittable() {
    let derived = index_table_name("Orders", "by_email");
    assert_eq!(derived, "__index__Orders__by_email");
    assert_eq!(split_index_table_name(&derived), Some(("Orders", "by_email")));
    assert_eq!(split_index_table_name("Orders"), None);
}
