// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::atomic;
use crate::errors::{LotError, LotResult};
use crate::fees::{self, FeeBreakdown};
use crate::models::{CashFlowKind, LedgerKind, Ticket, TicketStatus};
use crate::money::{self, Money, PesoFormat};
use crate::utils::{maybe_print_json, normalize_plate, parse_datetime, parse_money, pretty_table};
use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{partners, pricing, registers};

/// How a ticket is addressed from the outside: numeric id or barcode.
#[derive(Debug, Clone)]
pub enum TicketRef {
    Id(i64),
    Barcode(String),
}

impl TicketRef {
    pub fn parse(s: &str) -> TicketRef {
        let t = s.trim();
        match t.parse::<i64>() {
            Ok(id) => TicketRef::Id(id),
            Err(_) => TicketRef::Barcode(t.to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            TicketRef::Id(id) => id.to_string(),
            TicketRef::Barcode(b) => b.clone(),
        }
    }
}

const TICKET_COLS: &str =
    "id, plate, barcode, entry_time, exit_time, total_amount, status";

fn read_ticket(row: &Row) -> LotResult<Ticket> {
    let total: Option<String> = row.get(5).map_err(LotError::from)?;
    let status: String = row.get(6).map_err(LotError::from)?;
    Ok(Ticket {
        id: row.get(0).map_err(LotError::from)?,
        plate: row.get(1).map_err(LotError::from)?,
        barcode: row.get(2).map_err(LotError::from)?,
        entry_time: row.get(3).map_err(LotError::from)?,
        exit_time: row.get(4).map_err(LotError::from)?,
        total_amount: total.as_deref().map(Money::parse).transpose()?,
        status: TicketStatus::parse(&status)?,
    })
}

pub fn find_ticket(conn: &Connection, tref: &TicketRef) -> LotResult<Ticket> {
    let sql = match tref {
        TicketRef::Id(_) => format!("SELECT {} FROM tickets WHERE id=?1", TICKET_COLS),
        TicketRef::Barcode(_) => format!("SELECT {} FROM tickets WHERE barcode=?1", TICKET_COLS),
    };
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = match tref {
        TicketRef::Id(id) => stmt.query(params![id])?,
        TicketRef::Barcode(b) => stmt.query(params![b])?,
    };
    match rows.next()? {
        Some(row) => read_ticket(row),
        None => Err(LotError::TicketNotFound(tref.describe())),
    }
}

pub fn find_active_by_plate(conn: &Connection, plate: &str) -> LotResult<Option<Ticket>> {
    let sql = format!(
        "SELECT {} FROM tickets WHERE plate=?1 AND status='ACTIVE'",
        TICKET_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![plate])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_ticket(row)?)),
        None => Ok(None),
    }
}

/// Vehicle entry. The duplicate-plate guard runs inside the unit of work
/// and is backed by a partial unique index, so two simultaneous entries
/// for one plate commit exactly one ACTIVE row; the loser reruns, sees the
/// winner, and gets `VEHICLE_ALREADY_INSIDE`.
pub fn create_entry(conn: &mut Connection, plate: &str, now: NaiveDateTime) -> LotResult<Ticket> {
    let plate = normalize_plate(plate)?;
    atomic::run(conn, |tx| {
        if find_active_by_plate(tx, &plate)?.is_some() {
            return Err(LotError::VehicleAlreadyInside {
                plate: plate.clone(),
            });
        }
        let next: i64 = tx.query_row("SELECT IFNULL(MAX(id),0)+1 FROM tickets", [], |r| r.get(0))?;
        let barcode = format!("PK{:08}{}", next, now.format("%y%m%d%H%M%S"));
        tx.execute(
            "INSERT INTO tickets(plate, barcode, entry_time, status) VALUES (?1, ?2, ?3, 'ACTIVE')",
            params![plate, barcode, now],
        )?;
        let id = tx.last_insert_rowid();
        find_ticket(tx, &TicketRef::Id(id))
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeQuote {
    pub ticket_id: i64,
    pub plate: String,
    pub barcode: String,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub breakdown: FeeBreakdown,
}

/// Current amount owed for an active ticket. Pure read: repeated calls
/// with the same exit time return identical results and never touch the
/// row.
pub fn quote_fee(
    conn: &Connection,
    tref: &TicketRef,
    exit_time: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> LotResult<FeeQuote> {
    let ticket = find_ticket(conn, tref)?;
    if ticket.status.is_terminal() {
        return Err(LotError::TicketAlreadyProcessed {
            id: ticket.id,
            status: ticket.status.as_str().to_string(),
        });
    }
    let exit = exit_time.unwrap_or(now);
    let duration = duration_minutes(ticket.entry_time, exit)?;
    let cfg = pricing::active_config(conn)?;
    Ok(FeeQuote {
        ticket_id: ticket.id,
        plate: ticket.plate,
        barcode: ticket.barcode,
        entry_time: ticket.entry_time,
        exit_time: exit,
        breakdown: fees::calculate_fee(duration, &cfg),
    })
}

fn duration_minutes(entry: NaiveDateTime, exit: NaiveDateTime) -> LotResult<i64> {
    if exit < entry {
        return Err(LotError::Validation(format!(
            "exit time {} is before entry time {}",
            exit, entry
        )));
    }
    Ok((exit - entry).num_minutes())
}

/// Which rate an operator chose to settle a stamped ticket with. Never
/// decided automatically; a missing verification stamp is the operator's
/// call to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeBasis {
    Regular,
    Partner,
}

/// Finalized record handed to the printing collaborator after commit.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub ticket_id: i64,
    pub plate: String,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub total: Money,
    pub received: Money,
    pub change: Money,
    pub denominations: Vec<(Money, u32)>,
    pub register_id: Option<i64>,
    pub reconciled: bool,
}

/// Settle an active ticket: compute the fee for `now - entry`, verify the
/// cash covers it, snapshot the charged amount, and move the money through
/// the ledger and register in one atomic unit.
pub fn process_payment(
    conn: &mut Connection,
    tref: &TicketRef,
    cash_received: Money,
    operator: &str,
    charge: ChargeBasis,
    now: NaiveDateTime,
) -> LotResult<PaymentReceipt> {
    atomic::run(conn, |tx| {
        let ticket = find_ticket(tx, tref)?;
        if ticket.status.is_terminal() {
            return Err(LotError::TicketAlreadyProcessed {
                id: ticket.id,
                status: ticket.status.as_str().to_string(),
            });
        }
        let duration = duration_minutes(ticket.entry_time, now)?;
        let total = match charge {
            ChargeBasis::Regular => {
                let cfg = pricing::active_config(tx)?;
                fees::calculate_fee(duration, &cfg).total
            }
            ChargeBasis::Partner => partners::charged_amount(tx, ticket.id, duration, now)?,
        };
        settle_ticket(
            tx,
            &ticket,
            TicketStatus::Paid,
            LedgerKind::TicketPayment,
            total,
            cash_received,
            operator,
            now,
        )
    })
}

/// Lost-ticket settlement: flat fee, duration-independent. Requires an
/// ACTIVE ticket for the plate; nothing is ever fabricated for a plate
/// that is not inside.
pub fn process_lost_ticket(
    conn: &mut Connection,
    plate: &str,
    cash_received: Money,
    operator: &str,
    now: NaiveDateTime,
) -> LotResult<PaymentReceipt> {
    let plate = normalize_plate(plate)?;
    atomic::run(conn, |tx| {
        let ticket = find_active_by_plate(tx, &plate)?.ok_or_else(|| {
            LotError::NoActiveTicketFound {
                plate: plate.clone(),
            }
        })?;
        let cfg = pricing::active_config(tx)?;
        settle_ticket(
            tx,
            &ticket,
            TicketStatus::Lost,
            LedgerKind::LostTicketFee,
            cfg.lost_ticket_fee,
            cash_received,
            operator,
            now,
        )
    })
}

/// Shared terminal transition: insufficient cash rejects with the exact
/// shortfall and zero writes; success updates the row once and records the
/// matching ledger entry + cash flow.
fn settle_ticket(
    tx: &rusqlite::Transaction,
    ticket: &Ticket,
    to_status: TicketStatus,
    kind: LedgerKind,
    total: Money,
    cash_received: Money,
    operator: &str,
    now: NaiveDateTime,
) -> LotResult<PaymentReceipt> {
    if cash_received < total {
        return Err(LotError::InsufficientPayment {
            required: total,
            received: cash_received,
            shortfall: total.subtract(cash_received),
        });
    }
    let updated = tx.execute(
        "UPDATE tickets SET status=?1, exit_time=?2, total_amount=?3
         WHERE id=?4 AND status='ACTIVE'",
        params![to_status.as_str(), now, total.to_stored(), ticket.id],
    )?;
    if updated != 1 {
        return Err(LotError::TicketAlreadyProcessed {
            id: ticket.id,
            status: ticket.status.as_str().to_string(),
        });
    }
    let outcome = registers::record_money_event(
        tx,
        kind,
        CashFlowKind::Deposit,
        total,
        Some(ticket.id),
        None,
        operator,
        now,
    )?;
    let change = cash_received.subtract(total);
    Ok(PaymentReceipt {
        ticket_id: ticket.id,
        plate: ticket.plate.clone(),
        entry_time: ticket.entry_time,
        exit_time: now,
        total,
        received: cash_received,
        change,
        denominations: money::break_into_denominations(change),
        register_id: outcome.register_id,
        reconciled: outcome.reconciled,
    })
}

/// Admin: void an active ticket without charging.
pub fn cancel_ticket(conn: &mut Connection, tref: &TicketRef, now: NaiveDateTime) -> LotResult<Ticket> {
    atomic::run(conn, |tx| {
        let ticket = find_ticket(tx, tref)?;
        if ticket.status != TicketStatus::Active {
            return Err(LotError::TicketAlreadyProcessed {
                id: ticket.id,
                status: ticket.status.as_str().to_string(),
            });
        }
        tx.execute(
            "UPDATE tickets SET status='CANCELLED', exit_time=?1 WHERE id=?2 AND status='ACTIVE'",
            params![now, ticket.id],
        )?;
        find_ticket(tx, &TicketRef::Id(ticket.id))
    })
}

/// Admin: reverse a paid ticket. The snapshotted amount flows back out of
/// the operator's register as a withdrawal with a compensating ledger
/// entry.
pub fn refund_ticket(
    conn: &mut Connection,
    tref: &TicketRef,
    operator: &str,
    now: NaiveDateTime,
) -> LotResult<(Ticket, Money)> {
    atomic::run(conn, |tx| {
        let ticket = find_ticket(tx, tref)?;
        if ticket.status != TicketStatus::Paid {
            return Err(LotError::TicketAlreadyProcessed {
                id: ticket.id,
                status: ticket.status.as_str().to_string(),
            });
        }
        let amount = ticket.total_amount.ok_or_else(|| {
            LotError::Validation(format!("paid ticket {} has no charged amount", ticket.id))
        })?;
        tx.execute(
            "UPDATE tickets SET status='REFUNDED' WHERE id=?1 AND status='PAID'",
            params![ticket.id],
        )?;
        registers::record_money_event(
            tx,
            LedgerKind::Refund,
            CashFlowKind::Withdrawal,
            amount,
            Some(ticket.id),
            None,
            operator,
            now,
        )?;
        let refreshed = find_ticket(tx, &TicketRef::Id(ticket.id))?;
        Ok((refreshed, amount))
    })
}

// ---- CLI glue ----

pub fn handle_entry(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let plate = sub.get_one::<String>("plate").unwrap();
    let ticket = create_entry(conn, plate, Utc::now().naive_utc())?;
    println!(
        "Ticket {} for {} at {} (barcode {})",
        ticket.id, ticket.plate, ticket.entry_time, ticket.barcode
    );
    Ok(())
}

pub fn handle_fee(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let tref = TicketRef::parse(sub.get_one::<String>("ticket").unwrap());
    let exit = sub
        .get_one::<String>("exit")
        .map(|s| parse_datetime(s))
        .transpose()?;
    let quote = quote_fee(conn, &tref, exit, Utc::now().naive_utc())?;
    if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&quote)?);
        return Ok(());
    }
    let fmt = PesoFormat::default();
    println!(
        "Ticket {} ({}): {} min parked, owed {}",
        quote.ticket_id,
        quote.plate,
        quote.breakdown.duration_minutes,
        quote.breakdown.total.format_pesos(&fmt)
    );
    if !quote.breakdown.increments.is_empty() {
        println!(
            "  minimum {} + {} increment(s){}",
            quote.breakdown.minimum.format_pesos(&fmt),
            quote.breakdown.increments.len(),
            if quote.breakdown.capped {
                ", capped at daily special"
            } else {
                ""
            }
        );
    }
    Ok(())
}

pub fn handle_pay(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let tref = TicketRef::parse(sub.get_one::<String>("ticket").unwrap());
    let cash = parse_money(sub.get_one::<String>("cash").unwrap())?;
    let operator = sub.get_one::<String>("operator").unwrap();
    let charge = if sub.get_flag("partner") {
        ChargeBasis::Partner
    } else {
        ChargeBasis::Regular
    };
    let receipt = process_payment(conn, &tref, cash, operator, charge, Utc::now().naive_utc())?;
    print_receipt("PAID", &receipt);
    Ok(())
}

pub fn handle_lost(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let plate = sub.get_one::<String>("plate").unwrap();
    let cash = parse_money(sub.get_one::<String>("cash").unwrap())?;
    let operator = sub.get_one::<String>("operator").unwrap();
    let receipt = process_lost_ticket(conn, plate, cash, operator, Utc::now().naive_utc())?;
    print_receipt("LOST", &receipt);
    Ok(())
}

fn print_receipt(label: &str, receipt: &PaymentReceipt) {
    let fmt = PesoFormat::default();
    println!(
        "{} ticket {} ({}): charged {}, received {}, change {}",
        label,
        receipt.ticket_id,
        receipt.plate,
        receipt.total.format_pesos(&fmt),
        receipt.received.format_pesos(&fmt),
        receipt.change.format_pesos(&fmt)
    );
    for (denom, count) in &receipt.denominations {
        println!("  {} x {}", count, denom.format_pesos(&fmt));
    }
    if !receipt.reconciled {
        println!("  NOTE: no open register; flow queued for reconciliation");
    }
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", sub)) => {
            let tref = TicketRef::parse(sub.get_one::<String>("ticket").unwrap());
            let t = find_ticket(conn, &tref)?;
            println!("{}", serde_json::to_string_pretty(&t)?);
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("cancel", sub)) => {
            let tref = TicketRef::parse(sub.get_one::<String>("ticket").unwrap());
            let t = cancel_ticket(conn, &tref, Utc::now().naive_utc())?;
            println!("Ticket {} cancelled", t.id);
        }
        Some(("refund", sub)) => {
            let tref = TicketRef::parse(sub.get_one::<String>("ticket").unwrap());
            let operator = sub.get_one::<String>("operator").unwrap();
            let (t, amount) = refund_ticket(conn, &tref, operator, Utc::now().naive_utc())?;
            println!("Ticket {} refunded {}", t.id, amount);
        }
        _ => {}
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let mut sql = format!("SELECT {} FROM tickets WHERE 1=1", TICKET_COLS);
    let mut params_vec: Vec<String> = Vec::new();
    if let Some(status) = sub.get_one::<String>("status") {
        sql.push_str(" AND status=?");
        params_vec.push(status.to_uppercase());
    }
    if let Some(plate) = sub.get_one::<String>("plate") {
        sql.push_str(" AND plate=?");
        params_vec.push(normalize_plate(plate)?);
    }
    sql.push_str(" ORDER BY id DESC");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = if params_vec.is_empty() {
        stmt.query([])?
    } else {
        let params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|s| s as &dyn rusqlite::ToSql)
            .collect();
        stmt.query(rusqlite::params_from_iter(params))?
    };

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(read_ticket(r)?);
    }
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|t| {
                vec![
                    t.id.to_string(),
                    t.plate.clone(),
                    t.status.as_str().to_string(),
                    t.entry_time.to_string(),
                    t.exit_time.map(|e| e.to_string()).unwrap_or_default(),
                    t.total_amount.map(|m| m.to_string()).unwrap_or_default(),
                    t.barcode.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Plate", "Status", "Entry", "Exit", "Total", "Barcode"],
                rows
            )
        );
    }
    Ok(())
}
