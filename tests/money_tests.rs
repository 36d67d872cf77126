// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use parkclip::money::{break_into_denominations, Money, PesoFormat};

#[test]
fn add_then_subtract_is_identity() {
    let cases = [("0.00", "0.00"), ("19.99", "0.01"), ("123456.78", "0.33"), ("0.10", "99.90")];
    for (a, b) in cases {
        let a = Money::parse(a).unwrap();
        let b = Money::parse(b).unwrap();
        assert_eq!(a.add(b).subtract(b), a);
    }
}

#[test]
fn repeated_cents_do_not_drift() {
    let dime = Money::parse("0.10").unwrap();
    let mut total = Money::ZERO;
    for _ in 0..10_000 {
        total = total.add(dime);
    }
    assert_eq!(total, Money::parse("1000.00").unwrap());
}

#[test]
fn integer_scaling_is_exact() {
    let rate = Money::parse("8.50").unwrap();
    assert_eq!(rate.times(6), Money::parse("51.00").unwrap());
    assert_eq!(Money::parse("800.00").unwrap().times(3), Money::parse("2400.00").unwrap());
}

#[test]
fn comparisons_are_exact() {
    let a = Money::parse("10.00").unwrap();
    let b = Money::parse("10").unwrap();
    assert_eq!(a, b);
    assert!(Money::parse("9.999").unwrap() < a);
    assert!(Money::parse("10.001").unwrap() > a);
}

#[test]
fn peso_formatting_rounds_half_up_only_at_display() {
    let fmt = PesoFormat::default();
    let m = Money::parse("2.345").unwrap();
    assert_eq!(m.format_pesos(&fmt), "$2.35");
    // The value itself is untouched by formatting.
    assert_eq!(m.add(Money::parse("0.005").unwrap()), Money::parse("2.35").unwrap());
    assert_eq!(
        Money::parse("1234567.8").unwrap().format_pesos(&fmt),
        "$1,234,567.80"
    );
}

#[test]
fn stored_form_round_trips() {
    for s in ["0.00", "25.00", "76.00", "2400.00", "1000.00"] {
        let m = Money::parse(s).unwrap();
        assert_eq!(Money::parse(&m.to_stored()).unwrap(), m);
        assert_eq!(m.to_stored(), s);
    }
}

#[test]
fn denominations_sum_back_to_change() {
    let change = Money::parse("163.50").unwrap();
    let split = break_into_denominations(change);
    let sum = split
        .iter()
        .fold(Money::ZERO, |acc, (d, n)| acc.add(d.times(*n)));
    assert_eq!(sum, change);
    assert!(break_into_denominations(Money::ZERO).is_empty());
}
