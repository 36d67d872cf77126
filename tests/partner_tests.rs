// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDateTime, NaiveTime};
use parkclip::commands::tickets::{ChargeBasis, TicketRef};
use parkclip::commands::{partners, pricing, registers, tickets};
use parkclip::db;
use parkclip::models::{PartnerBusiness, PartnerRateMode, PricingConfig, TicketStatus};
use parkclip::money::Money;
use rusqlite::Connection;

fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
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
    registers::open_register(&mut conn, "op1", money("500.00"), dt("2025-06-02 08:00:00"))
        .unwrap();
    // Weekdays only (Mon-Fri), 09:00-21:00.
    partners::add_partner(
        &mut conn,
        &PartnerBusiness {
            id: 0,
            name: "cinema".into(),
            rate_mode: PartnerRateMode::Flat,
            rate: money("15.00"),
            days_mask: 0b0011111,
            window_start: time("09:00"),
            window_end: time("21:00"),
        },
    )
    .unwrap();
    conn
}

#[test]
fn quote_presents_both_amounts_and_the_savings_delta() {
    let mut conn = setup();
    // Monday 2025-06-02, well inside the window.
    let t = tickets::create_entry(&mut conn, "CIN-1", dt("2025-06-02 09:00:00")).unwrap();
    partners::stamp_ticket(&mut conn, &TicketRef::Id(t.id), "cinema", dt("2025-06-02 09:05:00"))
        .unwrap();

    let q = partners::quote(
        &conn,
        &TicketRef::Id(t.id),
        Some(dt("2025-06-02 12:00:00")),
        dt("2025-06-02 12:00:00"),
    )
    .unwrap();
    assert!(q.within_window);
    // Regular: 180 min = 25.00 + 6 x 8.50 = 76.00; partner flat 15.00.
    assert_eq!(q.regular.total, money("76.00"));
    assert_eq!(q.partner_total, Some(money("15.00")));
    assert_eq!(q.savings, Some(money("61.00")));
}

#[test]
fn quote_outside_window_reports_regular_only() {
    let mut conn = setup();
    let t = tickets::create_entry(&mut conn, "CIN-2", dt("2025-06-02 20:00:00")).unwrap();
    partners::stamp_ticket(&mut conn, &TicketRef::Id(t.id), "cinema", dt("2025-06-02 20:05:00"))
        .unwrap();
    // Exit at 22:30, past the 21:00 window end.
    let q = partners::quote(
        &conn,
        &TicketRef::Id(t.id),
        Some(dt("2025-06-02 22:30:00")),
        dt("2025-06-02 22:30:00"),
    )
    .unwrap();
    assert!(!q.within_window);
    assert_eq!(q.partner_total, None);
    assert_eq!(q.savings, None);
    assert_eq!(q.regular.total, money("76.00"));
}

#[test]
fn operator_charges_partner_rate_explicitly() {
    let mut conn = setup();
    let t = tickets::create_entry(&mut conn, "CIN-3", dt("2025-06-02 09:00:00")).unwrap();
    partners::stamp_ticket(&mut conn, &TicketRef::Id(t.id), "cinema", dt("2025-06-02 09:05:00"))
        .unwrap();
    let receipt = tickets::process_payment(
        &mut conn,
        &TicketRef::Id(t.id),
        money("20.00"),
        "op1",
        ChargeBasis::Partner,
        dt("2025-06-02 12:00:00"),
    )
    .unwrap();
    assert_eq!(receipt.total, money("15.00"));
    assert_eq!(receipt.change, money("5.00"));
}

#[test]
fn partner_charge_outside_window_is_rejected_not_substituted() {
    let mut conn = setup();
    let t = tickets::create_entry(&mut conn, "CIN-4", dt("2025-06-02 20:00:00")).unwrap();
    partners::stamp_ticket(&mut conn, &TicketRef::Id(t.id), "cinema", dt("2025-06-02 20:05:00"))
        .unwrap();
    let err = tickets::process_payment(
        &mut conn,
        &TicketRef::Id(t.id),
        money("100.00"),
        "op1",
        ChargeBasis::Partner,
        dt("2025-06-02 22:30:00"),
    )
    .unwrap_err();
    assert_eq!(err.code(), "PARTNER_OUTSIDE_VALIDITY");
    // Nothing was charged; the operator can still settle at the regular rate.
    let t = tickets::find_ticket(&conn, &TicketRef::Id(t.id)).unwrap();
    assert_eq!(t.status, TicketStatus::Active);
}

#[test]
fn partner_charge_without_stamp_is_rejected() {
    let mut conn = setup();
    let t = tickets::create_entry(&mut conn, "CIN-5", dt("2025-06-02 09:00:00")).unwrap();
    let err = tickets::process_payment(
        &mut conn,
        &TicketRef::Id(t.id),
        money("100.00"),
        "op1",
        ChargeBasis::Partner,
        dt("2025-06-02 12:00:00"),
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
}

#[test]
fn hourly_partner_bills_started_hours_with_a_floor() {
    let mut conn = setup();
    partners::add_partner(
        &mut conn,
        &PartnerBusiness {
            id: 0,
            name: "gym".into(),
            rate_mode: PartnerRateMode::Hourly,
            rate: money("10.00"),
            days_mask: 0b1111111,
            window_start: time("00:00"),
            window_end: time("23:59"),
        },
    )
    .unwrap();
    let gym = partners::find_partner(&conn, "gym").unwrap();
    assert_eq!(partners::partner_amount(&gym, 0), money("10.00"));
    assert_eq!(partners::partner_amount(&gym, 60), money("10.00"));
    assert_eq!(partners::partner_amount(&gym, 61), money("20.00"));
    assert_eq!(partners::partner_amount(&gym, 150), money("30.00"));
}

#[test]
fn a_ticket_is_stamped_at_most_once() {
    let mut conn = setup();
    let t = tickets::create_entry(&mut conn, "CIN-6", dt("2025-06-02 09:00:00")).unwrap();
    partners::stamp_ticket(&mut conn, &TicketRef::Id(t.id), "cinema", dt("2025-06-02 09:05:00"))
        .unwrap();
    let err = partners::stamp_ticket(
        &mut conn,
        &TicketRef::Id(t.id),
        "cinema",
        dt("2025-06-02 09:10:00"),
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
}
