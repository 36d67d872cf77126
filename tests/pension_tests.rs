// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, NaiveDateTime};
use parkclip::commands::{pension, pricing, registers};
use parkclip::db;
use parkclip::models::PricingConfig;
use parkclip::money::Money;
use rusqlite::Connection;

fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn money(s: &str) -> Money {
    Money::parse(s).unwrap()
}

fn setup() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    pricing::insert_and_activate(
        &mut conn,
        &PricingConfig {
            id: 0,
            name: "standard".into(),
            minimum_hours: 1,
            minimum_rate: money("25.00"),
            increment_minutes: 20,
            increment_rates: vec![money("8.50")],
            daily_special_hours: None,
            daily_special_rate: None,
            monthly_rate: money("800.00"),
            lost_ticket_fee: money("150.00"),
        },
    )
    .unwrap();
    registers::open_register(&mut conn, "op1", money("1000.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    conn
}

#[test]
fn new_customer_is_inactive_until_first_payment() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-1", "Ana Flores", None, 3, date("2025-06-02"))
        .unwrap();
    assert!(!c.is_active);
    assert_eq!(c.monthly_rate, money("800.00"));
    assert_eq!(c.end_date, date("2025-09-02"));
}

#[test]
fn initial_payment_charges_the_whole_registered_term() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-1", "Ana Flores", None, 3, date("2025-06-02"))
        .unwrap();
    // 3 months at 800.00: the full pending balance, not one month.
    let err =
        pension::process_payment(&mut conn, c.id, money("800.00"), "op1", dt("2025-06-02 10:00:00"))
            .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_PAYMENT");

    let receipt =
        pension::process_payment(&mut conn, c.id, money("2400.00"), "op1", dt("2025-06-02 10:00:00"))
            .unwrap();
    assert_eq!(receipt.amount_due, money("2400.00"));
    assert_eq!(receipt.covers_months, 3);
    assert!(receipt.activated);
    assert_eq!(receipt.new_end, date("2025-09-02"));

    let c = pension::find_customer(&conn, c.id).unwrap();
    assert!(c.is_active);
    assert_eq!(c.end_date, date("2025-09-02"));
}

#[test]
fn active_in_term_payment_extends_one_month() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-2", "Luis Vega", None, 3, date("2025-06-02"))
        .unwrap();
    pension::process_payment(&mut conn, c.id, money("2400.00"), "op1", dt("2025-06-02 10:00:00"))
        .unwrap();
    let receipt =
        pension::process_payment(&mut conn, c.id, money("800.00"), "op1", dt("2025-07-15 10:00:00"))
            .unwrap();
    assert_eq!(receipt.amount_due, money("800.00"));
    assert_eq!(receipt.new_end, date("2025-10-02"));
    let c = pension::find_customer(&conn, c.id).unwrap();
    assert_eq!(c.start_date, date("2025-06-02"));
}

#[test]
fn expired_customer_restarts_term_at_payment_day() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-3", "Rosa Marin", None, 1, date("2025-01-10"))
        .unwrap();
    pension::process_payment(&mut conn, c.id, money("800.00"), "op1", dt("2025-01-10 10:00:00"))
        .unwrap();
    // Comes back months after expiry.
    let receipt =
        pension::process_payment(&mut conn, c.id, money("800.00"), "op1", dt("2025-06-02 10:00:00"))
            .unwrap();
    assert_eq!(receipt.amount_due, money("800.00"));
    assert_eq!(receipt.new_end, date("2025-07-02"));
    let c = pension::find_customer(&conn, c.id).unwrap();
    assert_eq!(c.start_date, date("2025-06-02"));
}

#[test]
fn renewal_extends_from_the_later_of_now_and_end() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-4", "Elena Cruz", None, 3, date("2025-06-02"))
        .unwrap();
    pension::process_payment(&mut conn, c.id, money("2400.00"), "op1", dt("2025-06-02 10:00:00"))
        .unwrap();

    // Still in term: extend from the current end date.
    let receipt = pension::renew_customer(
        &mut conn,
        c.id,
        2,
        money("1600.00"),
        "op1",
        dt("2025-07-01 10:00:00"),
    )
    .unwrap();
    assert_eq!(receipt.amount_due, money("1600.00"));
    assert_eq!(receipt.new_end, date("2025-11-02"));

    // Long-expired: extend from today instead.
    let receipt = pension::renew_customer(
        &mut conn,
        c.id,
        1,
        money("800.00"),
        "op1",
        dt("2026-03-15 10:00:00"),
    )
    .unwrap();
    assert_eq!(receipt.new_end, date("2026-04-15"));
}

#[test]
fn renewal_requires_an_activated_customer() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-5", "Hugo Rios", None, 3, date("2025-06-02"))
        .unwrap();
    let err = pension::renew_customer(
        &mut conn,
        c.id,
        2,
        money("1600.00"),
        "op1",
        dt("2025-06-03 10:00:00"),
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
}

#[test]
fn duplicate_active_plate_is_rejected() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-6", "Ana Flores", None, 2, date("2025-06-02"))
        .unwrap();
    pension::process_payment(&mut conn, c.id, money("1600.00"), "op1", dt("2025-06-02 10:00:00"))
        .unwrap();
    let err =
        pension::create_customer(&mut conn, "PEN-6", "Impostor", None, 2, date("2025-06-03"))
            .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
}

#[test]
fn pension_payments_hit_the_register_like_any_other_money_event() {
    let mut conn = setup();
    let c = pension::create_customer(&mut conn, "PEN-7", "Nora Paz", None, 2, date("2025-06-02"))
        .unwrap();
    pension::process_payment(&mut conn, c.id, money("1600.00"), "op1", dt("2025-06-02 10:00:00"))
        .unwrap();
    let balance: String = conn
        .query_row(
            "SELECT current_balance FROM cash_registers WHERE operator='op1'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(balance, "2600.00");
    let kind: String = conn
        .query_row("SELECT kind FROM ledger", [], |r| r.get(0))
        .unwrap();
    assert_eq!(kind, "PENSION_PAYMENT");
}
