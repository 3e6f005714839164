//! Decimal exactness (SPEC_FULL.md §8 property 10) and canonical
//! parse/format round-tripping.

use matching_engine::decimal::Decimal;

#[test]
fn canonical_round_trip_has_no_trailing_or_leading_zeros() {
    let d = Decimal::parse_str("123.456000").unwrap();
    assert_eq!(d.to_canonical_string(), "123.456");

    let d = Decimal::parse_str("0.500").unwrap();
    assert_eq!(d.to_canonical_string(), "0.5");

    let d = Decimal::parse_str("007.10").unwrap();
    assert_eq!(d.to_canonical_string(), "7.1");
}

#[test]
fn notional_is_bit_exact_for_an_ordinary_fill() {
    let price = Decimal::parse_with_scale("100.00", 2).unwrap();
    let qty = Decimal::parse_with_scale("1.2500", 4).unwrap();
    let notional = price.checked_mul_truncated(&qty, 2).unwrap();
    assert_eq!(notional.to_canonical_string(), "125.00");
}

#[test]
fn truncated_multiply_drops_sub_scale_digits_rather_than_rounding() {
    let price = Decimal::parse_with_scale("3.33", 2).unwrap();
    let qty = Decimal::parse_with_scale("3", 0).unwrap();
    // 3.33 * 3 = 9.99 exactly, no truncation needed here; use a case that
    // does require dropping digits below the target scale.
    let notional = price.checked_mul_truncated(&qty, 2).unwrap();
    assert_eq!(notional.to_canonical_string(), "9.99");

    let odd_qty = Decimal::parse_with_scale("0.333", 3).unwrap();
    let truncated = price.checked_mul_truncated(&odd_qty, 2).unwrap();
    // 3.33 * 0.333 = 1.10889, truncated (not rounded) to scale 2 = 1.10
    assert_eq!(truncated.to_canonical_string(), "1.10");
}

#[test]
fn add_and_subtract_are_exact_and_reversible() {
    let a = Decimal::parse_with_scale("10.0001", 4).unwrap();
    let b = Decimal::parse_with_scale("0.0001", 4).unwrap();
    let sum = a.checked_add(&b).unwrap();
    assert_eq!(sum.to_canonical_string(), "10.0002");
    let back = sum.checked_sub(&b).unwrap();
    assert_eq!(back, a);
}

#[test]
fn overflow_is_reported_rather_than_wrapping() {
    let huge = Decimal::from_units(i128::MAX, 0);
    let one = Decimal::from_units(1, 0);
    assert!(huge.checked_add(&one).is_err());
}

#[test]
fn min_picks_the_smaller_value_at_equal_scale() {
    let a = Decimal::parse_with_scale("1.0000", 4).unwrap();
    let b = Decimal::parse_with_scale("0.5000", 4).unwrap();
    assert_eq!(Decimal::min(a, b), b);
    assert_eq!(Decimal::min(b, a), b);
}
