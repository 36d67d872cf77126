// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDateTime;
use parkclip::commands::tickets::{ChargeBasis, TicketRef};
use parkclip::commands::{doctor, pricing, registers, tickets};
use parkclip::db;
use parkclip::models::{PricingConfig, RegisterStatus, TicketStatus};
use parkclip::money::Money;
use parkclip::utils::{set_register_policy, RegisterPolicy};
use rusqlite::Connection;

fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
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
    conn
}

fn pay_one(conn: &mut Connection, plate: &str, entry: &str, exit: &str) {
    let t = tickets::create_entry(conn, plate, dt(entry)).unwrap();
    tickets::process_payment(
        conn,
        &TicketRef::Id(t.id),
        money("1000.00"),
        "op1",
        ChargeBasis::Regular,
        dt(exit),
    )
    .unwrap();
}

#[test]
fn one_open_register_per_operator() {
    let mut conn = setup();
    registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    let err = registers::open_register(&mut conn, "op1", money("0.00"), dt("2025-06-02 08:05:00"))
        .unwrap_err();
    assert_eq!(err.code(), "REGISTER_ALREADY_OPEN");
    // A different operator is unaffected.
    registers::open_register(&mut conn, "op2", money("300.00"), dt("2025-06-02 08:10:00"))
        .unwrap();
}

#[test]
fn balance_tracks_every_accepted_payment() {
    let mut conn = setup();
    let reg = registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    pay_one(&mut conn, "AAA-1", "2025-06-02 09:00:00", "2025-06-02 09:30:00"); // 25.00
    pay_one(&mut conn, "BBB-2", "2025-06-02 09:00:00", "2025-06-02 12:00:00"); // 76.00

    let balance: String = conn
        .query_row(
            "SELECT current_balance FROM cash_registers WHERE id=?1",
            [reg.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(balance, "601.00");
    assert!(doctor::audit(&conn).unwrap().is_empty());
}

#[test]
fn clean_close_goes_to_closed() {
    let mut conn = setup();
    registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    pay_one(&mut conn, "AAA-1", "2025-06-02 09:00:00", "2025-06-02 09:30:00");
    let closed =
        registers::close_register(&mut conn, "op1", money("525.00"), dt("2025-06-02 20:00:00"))
            .unwrap();
    assert_eq!(closed.status, RegisterStatus::Closed);
    assert_eq!(closed.discrepancy, Some(Money::ZERO));
    assert_eq!(closed.expected_balance, Some(money("525.00")));
    assert!(closed.closed_at.is_some());
}

#[test]
fn short_drawer_goes_to_reconciling_with_positive_discrepancy() {
    let mut conn = setup();
    registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    pay_one(&mut conn, "AAA-1", "2025-06-02 09:00:00", "2025-06-02 09:30:00");
    let closed =
        registers::close_register(&mut conn, "op1", money("520.00"), dt("2025-06-02 20:00:00"))
            .unwrap();
    assert_eq!(closed.status, RegisterStatus::Reconciling);
    // 525.00 in the system, 520.00 counted: 5.00 missing.
    assert_eq!(closed.discrepancy, Some(money("5.00")));

    // A closed register accepts no further money events.
    let err = registers::close_register(&mut conn, "op1", money("0.00"), dt("2025-06-02 21:00:00"))
        .unwrap_err();
    assert_eq!(err.code(), "NO_OPEN_REGISTER");
}

#[test]
fn adjustment_moves_balance_and_is_logged() {
    let mut conn = setup();
    let reg = registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    let adjusted = registers::adjust_register(
        &mut conn,
        "op1",
        money("-20.00"),
        "supervisor",
        dt("2025-06-02 12:00:00"),
    )
    .unwrap();
    assert_eq!(adjusted.current_balance, money("480.00"));
    let kinds: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM cash_flows WHERE register_id=?1 AND kind='ADJUSTMENT'",
            [reg.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(kinds, 1);
    assert!(doctor::audit(&conn).unwrap().is_empty());
}

#[test]
fn reject_policy_fails_payment_with_no_open_register() {
    let mut conn = setup();
    let t = tickets::create_entry(&mut conn, "AAA-1", dt("2025-06-02 09:00:00")).unwrap();
    let err = tickets::process_payment(
        &mut conn,
        &TicketRef::Id(t.id),
        money("100.00"),
        "op1",
        ChargeBasis::Regular,
        dt("2025-06-02 09:30:00"),
    )
    .unwrap_err();
    assert_eq!(err.code(), "NO_OPEN_REGISTER");
    // The rejection left the ticket untouched.
    let t = tickets::find_ticket(&conn, &TicketRef::Id(t.id)).unwrap();
    assert_eq!(t.status, TicketStatus::Active);
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM ledger", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 0);
}

#[test]
fn queue_policy_accepts_and_flags_for_reconciliation() {
    let mut conn = setup();
    set_register_policy(&conn, RegisterPolicy::Queue).unwrap();
    let t = tickets::create_entry(&mut conn, "AAA-1", dt("2025-06-02 09:00:00")).unwrap();
    let receipt = tickets::process_payment(
        &mut conn,
        &TicketRef::Id(t.id),
        money("100.00"),
        "op1",
        ChargeBasis::Regular,
        dt("2025-06-02 09:30:00"),
    )
    .unwrap();
    assert!(!receipt.reconciled);
    assert_eq!(receipt.register_id, None);

    let (reconciled, register_id): (bool, Option<i64>) = conn
        .query_row(
            "SELECT l.reconciled, f.register_id FROM ledger l, cash_flows f WHERE f.kind='DEPOSIT'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert!(!reconciled);
    assert_eq!(register_id, None);

    // Doctor surfaces the queued entry.
    let issues = doctor::audit(&conn).unwrap();
    assert!(issues.iter().any(|row| row[0] == "unreconciled_entries"));
}

#[test]
fn suspend_blocks_payments_until_resume() {
    let mut conn = setup();
    registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    registers::suspend_register(&mut conn, "op1").unwrap();

    let t = tickets::create_entry(&mut conn, "AAA-1", dt("2025-06-02 09:00:00")).unwrap();
    let err = tickets::process_payment(
        &mut conn,
        &TicketRef::Id(t.id),
        money("100.00"),
        "op1",
        ChargeBasis::Regular,
        dt("2025-06-02 09:30:00"),
    )
    .unwrap_err();
    assert_eq!(err.code(), "NO_OPEN_REGISTER");

    let resumed = registers::resume_register(&mut conn, "op1").unwrap();
    assert_eq!(resumed.status, RegisterStatus::Open);
    tickets::process_payment(
        &mut conn,
        &TicketRef::Id(t.id),
        money("100.00"),
        "op1",
        ChargeBasis::Regular,
        dt("2025-06-02 09:35:00"),
    )
    .unwrap();
}

#[test]
fn doctor_detects_a_corrupted_balance() {
    let mut conn = setup();
    let reg = registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    pay_one(&mut conn, "AAA-1", "2025-06-02 09:00:00", "2025-06-02 09:30:00");
    assert!(doctor::audit(&conn).unwrap().is_empty());

    // Corrupt the stored balance behind the ledger's back.
    conn.execute(
        "UPDATE cash_registers SET current_balance='999.00' WHERE id=?1",
        [reg.id],
    )
    .unwrap();
    let issues = doctor::audit(&conn).unwrap();
    assert!(issues
        .iter()
        .any(|row| row[0] == "register_balance_mismatch"));
}
