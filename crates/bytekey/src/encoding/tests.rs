use super::*;

#[test]
fn i64_round_trip() {
    for v in [i64::MIN, i64::MIN + 1, -1, 0, 1, i64::MAX] {
        assert_eq!(decode_i64(encode_i64(v)), v);
    }
}

#[test]
fn i64_byte_order_matches_numeric_order() {
    let values = [i64::MIN, -1000, -1, 0, 1, 1000, i64::MAX];
    let mut encoded: Vec<[u8; 8]> = values.iter().map(|v| encode_i64(*v)).collect();
    let sorted_original = encoded.clone();
    encoded.sort();
    assert_eq!(encoded, sorted_original);
}

#[test]
fn f64_round_trip() {
    for v in [f64::MIN, -1.5, -0.0, 0.0, 1.5, f64::MAX] {
        assert_eq!(decode_f64(encode_f64(v)), v);
    }
}

#[test]
fn f64_byte_order_matches_numeric_order() {
    let values = [-100.0, -1.5, -0.001, 0.0, 0.001, 1.5, 100.0];
    let mut encoded: Vec<[u8; 8]> = values.iter().map(|v| encode_f64(*v)).collect();
    let sorted_original = encoded.clone();
    encoded.sort();
    assert_eq!(encoded, sorted_original);
}

#[test]
fn decimal_ordering_matches_scaled_numeric_order() {
    // From spec §8 scenario 4.
    let values = [-1.239, -1.231, -1.200, 1.230, 1.239, 12.000];
    let mut encoded: Vec<[u8; 8]> = values.iter().map(|v| encode_decimal(*v, 2)).collect();
    let sorted = {
        let mut e = encoded.clone();
        e.sort();
        e
    };
    assert_eq!(encoded, sorted);
}

#[test]
fn decimal_truncates_toward_zero() {
    let a = encode_decimal(-1.239, 2);
    let b = encode_decimal(-1.23, 2);
    assert_eq!(a, b, "truncation, not rounding: -1.239 at scale 2 is -1.23");
}

#[test]
fn prefix_upper_bound_increments_last_non_ff_byte() {
    assert_eq!(prefix_upper_bound(b"abc"), Some(b"abd".to_vec()));
}

#[test]
fn prefix_upper_bound_strips_trailing_ff() {
    assert_eq!(
        prefix_upper_bound(&[0x61, 0xFF, 0xFF]),
        Some(vec![0x62])
    );
}

#[test]
fn prefix_upper_bound_all_ff_is_unbounded() {
    assert_eq!(prefix_upper_bound(&[0xFF, 0xFF]), None);
}

#[test]
fn prefix_upper_bound_empty_is_unbounded() {
    assert_eq!(prefix_upper_bound(&[]), None);
}

#[test]
fn encode_value_null_has_no_prefix() {
    assert_eq!(encode_value(&Value::Null, None), None);
}

#[test]
fn encode_value_string_is_its_own_utf8_bytes() {
    assert_eq!(
        encode_value(&Value::Str("abc".to_string()), None),
        Some(b"abc".to_vec())
    );
}
