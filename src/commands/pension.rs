// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::atomic;
use crate::errors::{LotError, LotResult};
use crate::models::{CashFlowKind, LedgerKind, PensionCustomer};
use crate::money::{self, Money, PesoFormat};
use crate::utils::{
    add_months, maybe_print_json, months_between, normalize_plate, parse_money, pretty_table,
};
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{pricing, registers};

const CUSTOMER_COLS: &str =
    "id, plate, holder, monthly_rate, start_date, end_date, is_active";

fn read_customer(row: &Row) -> LotResult<PensionCustomer> {
    let rate: String = row.get(3).map_err(LotError::from)?;
    Ok(PensionCustomer {
        id: row.get(0).map_err(LotError::from)?,
        plate: row.get(1).map_err(LotError::from)?,
        holder: row.get(2).map_err(LotError::from)?,
        monthly_rate: Money::parse(&rate)?,
        start_date: row.get(4).map_err(LotError::from)?,
        end_date: row.get(5).map_err(LotError::from)?,
        is_active: row.get(6).map_err(LotError::from)?,
    })
}

pub fn find_customer(conn: &Connection, id: i64) -> LotResult<PensionCustomer> {
    let sql = format!("SELECT {} FROM pension_customers WHERE id=?1", CUSTOMER_COLS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => read_customer(row),
        None => Err(LotError::CustomerNotFound(id)),
    }
}

/// Register a subscriber for `duration_months` starting at `start`. The
/// customer stays INACTIVE until the first payment commits; only that
/// payment, charging the whole registered term, activates it.
pub fn create_customer(
    conn: &mut Connection,
    plate: &str,
    holder: &str,
    monthly_rate: Option<Money>,
    duration_months: u32,
    start: NaiveDate,
) -> LotResult<PensionCustomer> {
    let plate = normalize_plate(plate)?;
    if duration_months == 0 {
        return Err(LotError::Validation("duration must be at least 1 month".into()));
    }
    let holder = holder.trim().to_string();
    if holder.is_empty() {
        return Err(LotError::Validation("holder name must not be empty".into()));
    }
    atomic::run(conn, |tx| {
        let rate = match monthly_rate {
            Some(r) => r,
            None => pricing::active_config(tx)?.monthly_rate,
        };
        let taken: i64 = tx.query_row(
            "SELECT COUNT(*) FROM pension_customers WHERE plate=?1 AND is_active=1",
            params![plate],
            |r| r.get(0),
        )?;
        if taken > 0 {
            return Err(LotError::Validation(format!(
                "plate '{}' already has an active pension",
                plate
            )));
        }
        let end = add_months(start, duration_months);
        tx.execute(
            "INSERT INTO pension_customers(plate, holder, monthly_rate, start_date, end_date, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![plate, holder, rate.to_stored(), start, end],
        )?;
        find_customer(tx, tx.last_insert_rowid())
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PensionReceipt {
    pub customer_id: i64,
    pub plate: String,
    pub amount_due: Money,
    pub received: Money,
    pub change: Money,
    pub denominations: Vec<(Money, u32)>,
    pub covers_months: u32,
    pub new_end: NaiveDate,
    pub activated: bool,
    pub register_id: Option<i64>,
    pub reconciled: bool,
}

/// Monthly payment. An inactive customer owes the full pending balance
/// (monthly rate times every month of the registered term), and the
/// payment activates it. An active customer owes one month: within the
/// term the end date extends by a month, after expiry the term restarts
/// at `now`.
pub fn process_payment(
    conn: &mut Connection,
    customer_id: i64,
    cash_received: Money,
    operator: &str,
    now: NaiveDateTime,
) -> LotResult<PensionReceipt> {
    let today = now.date();
    atomic::run(conn, |tx| {
        let customer = find_customer(tx, customer_id)?;
        let (due, covers, new_start, new_end, activates) = if !customer.is_active {
            let term = months_between(customer.start_date, customer.end_date);
            if term == 0 {
                return Err(LotError::Validation(format!(
                    "customer {} has an empty registered term",
                    customer.id
                )));
            }
            (
                customer.monthly_rate.times(term),
                term,
                customer.start_date,
                customer.end_date,
                true,
            )
        } else if customer.end_date >= today {
            (
                customer.monthly_rate,
                1,
                customer.start_date,
                add_months(customer.end_date, 1),
                false,
            )
        } else {
            (customer.monthly_rate, 1, today, add_months(today, 1), false)
        };

        if cash_received < due {
            return Err(LotError::InsufficientPayment {
                required: due,
                received: cash_received,
                shortfall: due.subtract(cash_received),
            });
        }

        tx.execute(
            "UPDATE pension_customers SET start_date=?1, end_date=?2, is_active=1 WHERE id=?3",
            params![new_start, new_end, customer.id],
        )?;
        let outcome = registers::record_money_event(
            tx,
            LedgerKind::PensionPayment,
            CashFlowKind::Deposit,
            due,
            None,
            Some(customer.id),
            operator,
            now,
        )?;
        let change = cash_received.subtract(due);
        Ok(PensionReceipt {
            customer_id: customer.id,
            plate: customer.plate.clone(),
            amount_due: due,
            received: cash_received,
            change,
            denominations: money::break_into_denominations(change),
            covers_months: covers,
            new_end,
            activated: activates,
            register_id: outcome.register_id,
            reconciled: outcome.reconciled,
        })
    })
}

/// Explicit multi-month extension, priced up front and extended from
/// whichever is later: today or the current end date. Only meaningful for
/// customers whose initial payment already activated them.
pub fn renew_customer(
    conn: &mut Connection,
    customer_id: i64,
    duration_months: u32,
    cash_received: Money,
    operator: &str,
    now: NaiveDateTime,
) -> LotResult<PensionReceipt> {
    if duration_months == 0 {
        return Err(LotError::Validation("renewal must be at least 1 month".into()));
    }
    let today = now.date();
    atomic::run(conn, |tx| {
        let customer = find_customer(tx, customer_id)?;
        if !customer.is_active {
            return Err(LotError::Validation(format!(
                "customer {} is not active; settle the initial payment first",
                customer.id
            )));
        }
        let due = customer.monthly_rate.times(duration_months);
        if cash_received < due {
            return Err(LotError::InsufficientPayment {
                required: due,
                received: cash_received,
                shortfall: due.subtract(cash_received),
            });
        }
        let base = customer.end_date.max(today);
        let new_end = add_months(base, duration_months);
        tx.execute(
            "UPDATE pension_customers SET end_date=?1 WHERE id=?2",
            params![new_end, customer.id],
        )?;
        let outcome = registers::record_money_event(
            tx,
            LedgerKind::PensionRenewal,
            CashFlowKind::Deposit,
            due,
            None,
            Some(customer.id),
            operator,
            now,
        )?;
        let change = cash_received.subtract(due);
        Ok(PensionReceipt {
            customer_id: customer.id,
            plate: customer.plate.clone(),
            amount_due: due,
            received: cash_received,
            change,
            denominations: money::break_into_denominations(change),
            covers_months: duration_months,
            new_end,
            activated: false,
            register_id: outcome.register_id,
            reconciled: outcome.reconciled,
        })
    })
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let now = Utc::now().naive_utc();
    match m.subcommand() {
        Some(("add", sub)) => {
            let plate = sub.get_one::<String>("plate").unwrap();
            let holder = sub.get_one::<String>("holder").unwrap();
            let rate = sub
                .get_one::<String>("rate")
                .map(|s| parse_money(s))
                .transpose()?;
            let months = *sub.get_one::<u32>("months").unwrap();
            let c = create_customer(conn, plate, holder, rate, months, now.date())?;
            println!(
                "Pension customer {} ({}) registered {} - {}; inactive until first payment",
                c.id, c.plate, c.start_date, c.end_date
            );
        }
        Some(("pay", sub)) => {
            let id = *sub.get_one::<i64>("customer").unwrap();
            let cash = parse_money(sub.get_one::<String>("cash").unwrap())?;
            let operator = sub.get_one::<String>("operator").unwrap();
            let r = process_payment(conn, id, cash, operator, now)?;
            print_receipt(&r);
        }
        Some(("renew", sub)) => {
            let id = *sub.get_one::<i64>("customer").unwrap();
            let months = *sub.get_one::<u32>("months").unwrap();
            let cash = parse_money(sub.get_one::<String>("cash").unwrap())?;
            let operator = sub.get_one::<String>("operator").unwrap();
            let r = renew_customer(conn, id, months, cash, operator, now)?;
            print_receipt(&r);
        }
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn print_receipt(r: &PensionReceipt) {
    let fmt = PesoFormat::default();
    println!(
        "Customer {} ({}): charged {} for {} month(s), change {}, covered through {}{}",
        r.customer_id,
        r.plate,
        r.amount_due.format_pesos(&fmt),
        r.covers_months,
        r.change.format_pesos(&fmt),
        r.new_end,
        if r.activated { " (now active)" } else { "" }
    );
    if !r.reconciled {
        println!("  NOTE: no open register; flow queued for reconciliation");
    }
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let sql = format!(
        "SELECT {} FROM pension_customers ORDER BY plate",
        CUSTOMER_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut cur = stmt.query([])?;
    let mut data = Vec::new();
    while let Some(row) = cur.next()? {
        data.push(read_customer(row)?);
    }
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|c| {
                vec![
                    c.id.to_string(),
                    c.plate.clone(),
                    c.holder.clone(),
                    c.monthly_rate.to_string(),
                    c.start_date.to_string(),
                    c.end_date.to_string(),
                    if c.is_active { "yes" } else { "no" }.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Plate", "Holder", "Monthly", "Start", "End", "Active"],
                rows
            )
        );
    }
    Ok(())
}
