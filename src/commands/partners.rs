// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::atomic;
use crate::errors::{LotError, LotResult};
use crate::fees::{self, FeeBreakdown};
use crate::models::{PartnerBusiness, PartnerRateMode, PartnerTicket, TicketStatus};
use crate::money::{Money, PesoFormat};
use crate::utils::{maybe_print_json, parse_datetime, parse_money, parse_time, pretty_table};
use anyhow::Result;
use chrono::{Datelike, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::pricing;
use super::tickets::{self, TicketRef};

const PARTNER_COLS: &str = "id, name, rate_mode, rate, days_mask, window_start, window_end";

fn read_partner(row: &Row) -> LotResult<PartnerBusiness> {
    let mode: String = row.get(2).map_err(LotError::from)?;
    let rate: String = row.get(3).map_err(LotError::from)?;
    Ok(PartnerBusiness {
        id: row.get(0).map_err(LotError::from)?,
        name: row.get(1).map_err(LotError::from)?,
        rate_mode: PartnerRateMode::parse(&mode)?,
        rate: Money::parse(&rate)?,
        days_mask: row.get::<_, u8>(4).map_err(LotError::from)?,
        window_start: row.get(5).map_err(LotError::from)?,
        window_end: row.get(6).map_err(LotError::from)?,
    })
}

pub fn find_partner(conn: &Connection, name: &str) -> LotResult<PartnerBusiness> {
    let sql = format!("SELECT {} FROM partner_businesses WHERE name=?1", PARTNER_COLS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![name])?;
    match rows.next()? {
        Some(row) => read_partner(row),
        None => Err(LotError::PartnerNotFound(name.to_string())),
    }
}

pub fn add_partner(conn: &mut Connection, partner: &PartnerBusiness) -> LotResult<PartnerBusiness> {
    if partner.days_mask == 0 {
        return Err(LotError::Validation(
            "validity window needs at least one weekday".into(),
        ));
    }
    if partner.rate.is_negative() {
        return Err(LotError::Validation("partner rate must be non-negative".into()));
    }
    atomic::run(conn, |tx| {
        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM partner_businesses WHERE name=?1",
            params![partner.name],
            |r| r.get(0),
        )?;
        if exists > 0 {
            return Err(LotError::Validation(format!(
                "partner '{}' already exists",
                partner.name
            )));
        }
        tx.execute(
            "INSERT INTO partner_businesses(name, rate_mode, rate, days_mask, window_start, window_end)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                partner.name,
                partner.rate_mode.as_str(),
                partner.rate.to_stored(),
                partner.days_mask,
                partner.window_start,
                partner.window_end
            ],
        )?;
        find_partner(tx, &partner.name)
    })
}

/// Bind a partner stamp to an active ticket. A ticket carries at most one
/// stamp and it never moves to another partner.
pub fn stamp_ticket(
    conn: &mut Connection,
    tref: &TicketRef,
    partner_name: &str,
    now: NaiveDateTime,
) -> LotResult<PartnerTicket> {
    atomic::run(conn, |tx| {
        let ticket = tickets::find_ticket(tx, tref)?;
        if ticket.status != TicketStatus::Active {
            return Err(LotError::TicketAlreadyProcessed {
                id: ticket.id,
                status: ticket.status.as_str().to_string(),
            });
        }
        let partner = find_partner(tx, partner_name)?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM partner_tickets WHERE ticket_id=?1",
            params![ticket.id],
            |r| r.get(0),
        )?;
        if existing > 0 {
            return Err(LotError::Validation(format!(
                "ticket {} is already stamped",
                ticket.id
            )));
        }
        tx.execute(
            "INSERT INTO partner_tickets(ticket_id, partner_id, stamped_at) VALUES (?1, ?2, ?3)",
            params![ticket.id, partner.id, now],
        )?;
        Ok(PartnerTicket {
            id: tx.last_insert_rowid(),
            ticket_id: ticket.id,
            partner_id: partner.id,
            stamped_at: now,
        })
    })
}

pub fn stamp_for_ticket(
    conn: &Connection,
    ticket_id: i64,
) -> LotResult<Option<PartnerBusiness>> {
    let partner_id: Option<i64> = conn
        .query_row(
            "SELECT partner_id FROM partner_tickets WHERE ticket_id=?1",
            params![ticket_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(pid) = partner_id else {
        return Ok(None);
    };
    let sql = format!("SELECT {} FROM partner_businesses WHERE id=?1", PARTNER_COLS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![pid])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_partner(row)?)),
        None => Ok(None),
    }
}

fn within_window(partner: &PartnerBusiness, at: NaiveDateTime) -> bool {
    let weekday = at.weekday().num_days_from_monday() as u8;
    if partner.days_mask & (1 << weekday) == 0 {
        return false;
    }
    let t = at.time();
    if partner.window_start <= partner.window_end {
        partner.window_start <= t && t <= partner.window_end
    } else {
        // Overnight window, e.g. 20:00-02:00.
        t >= partner.window_start || t <= partner.window_end
    }
}

/// Amount under the partner's alternate rate. Hourly bills whole started
/// hours with a one-hour floor.
pub fn partner_amount(partner: &PartnerBusiness, duration_minutes: i64) -> Money {
    match partner.rate_mode {
        PartnerRateMode::Flat => partner.rate,
        PartnerRateMode::Hourly => {
            let hours = ((duration_minutes.max(0) + 59) / 60).max(1) as u32;
            partner.rate.times(hours)
        }
    }
}

/// Amount to charge when the operator settles a stamped ticket at the
/// partner rate. Missing stamp or an out-of-window exit is a rejection;
/// the core never falls back to the regular rate on its own.
pub(crate) fn charged_amount(
    conn: &Connection,
    ticket_id: i64,
    duration_minutes: i64,
    at: NaiveDateTime,
) -> LotResult<Money> {
    let partner = stamp_for_ticket(conn, ticket_id)?.ok_or_else(|| {
        LotError::Validation(format!("ticket {} has no partner stamp", ticket_id))
    })?;
    if !within_window(&partner, at) {
        return Err(LotError::PartnerOutsideValidity {
            partner: partner.name,
        });
    }
    Ok(partner_amount(&partner, duration_minutes))
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerQuote {
    pub ticket_id: i64,
    pub partner: String,
    pub within_window: bool,
    pub partner_total: Option<Money>,
    pub regular: FeeBreakdown,
    /// regular minus partner; what the stamp saves if honored.
    pub savings: Option<Money>,
}

/// Dual quote for a stamped ticket: the partner amount (when the window
/// allows it) AND the full regular fee, plus the delta. Which one to
/// charge stays an operator decision.
pub fn quote(
    conn: &Connection,
    tref: &TicketRef,
    exit_time: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> LotResult<PartnerQuote> {
    let ticket = tickets::find_ticket(conn, tref)?;
    if ticket.status != TicketStatus::Active {
        return Err(LotError::TicketAlreadyProcessed {
            id: ticket.id,
            status: ticket.status.as_str().to_string(),
        });
    }
    let partner = stamp_for_ticket(conn, ticket.id)?.ok_or_else(|| {
        LotError::Validation(format!("ticket {} has no partner stamp", ticket.id))
    })?;
    let exit = exit_time.unwrap_or(now);
    if exit < ticket.entry_time {
        return Err(LotError::Validation(format!(
            "exit time {} is before entry time {}",
            exit, ticket.entry_time
        )));
    }
    let duration = (exit - ticket.entry_time).num_minutes();
    let cfg = pricing::active_config(conn)?;
    let regular = fees::calculate_fee(duration, &cfg);
    let inside = within_window(&partner, exit);
    let partner_total = inside.then(|| partner_amount(&partner, duration));
    let savings = partner_total.map(|p| regular.total.subtract(p));
    Ok(PartnerQuote {
        ticket_id: ticket.id,
        partner: partner.name,
        within_window: inside,
        partner_total,
        regular,
        savings,
    })
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let now = Utc::now().naive_utc();
    match m.subcommand() {
        Some(("add", sub)) => {
            let draft = PartnerBusiness {
                id: 0,
                name: sub.get_one::<String>("name").unwrap().clone(),
                rate_mode: PartnerRateMode::parse(sub.get_one::<String>("mode").unwrap())?,
                rate: parse_money(sub.get_one::<String>("rate").unwrap())?,
                days_mask: *sub.get_one::<u8>("days-mask").unwrap(),
                window_start: parse_time(sub.get_one::<String>("from").unwrap())?,
                window_end: parse_time(sub.get_one::<String>("to").unwrap())?,
            };
            let p = add_partner(conn, &draft)?;
            println!("Partner '{}' added ({} {})", p.name, p.rate_mode.as_str(), p.rate);
        }
        Some(("stamp", sub)) => {
            let tref = TicketRef::parse(sub.get_one::<String>("ticket").unwrap());
            let name = sub.get_one::<String>("name").unwrap();
            let s = stamp_ticket(conn, &tref, name, now)?;
            println!("Ticket {} stamped by partner {}", s.ticket_id, name);
        }
        Some(("quote", sub)) => {
            let tref = TicketRef::parse(sub.get_one::<String>("ticket").unwrap());
            let exit = sub
                .get_one::<String>("exit")
                .map(|s| parse_datetime(s))
                .transpose()?;
            let q = quote(conn, &tref, exit, now)?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&q)?);
            } else {
                let fmt = PesoFormat::default();
                println!(
                    "Ticket {} via '{}': regular {}",
                    q.ticket_id,
                    q.partner,
                    q.regular.total.format_pesos(&fmt)
                );
                match (q.partner_total, q.savings) {
                    (Some(p), Some(s)) => println!(
                        "  partner {} (saves {})",
                        p.format_pesos(&fmt),
                        s.format_pesos(&fmt)
                    ),
                    _ => println!("  partner rate outside validity window"),
                }
            }
        }
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let sql = format!("SELECT {} FROM partner_businesses ORDER BY name", PARTNER_COLS);
    let mut stmt = conn.prepare(&sql)?;
    let mut cur = stmt.query([])?;
    let mut data = Vec::new();
    while let Some(row) = cur.next()? {
        data.push(read_partner(row)?);
    }
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|p| {
                vec![
                    p.id.to_string(),
                    p.name.clone(),
                    p.rate_mode.as_str().to_string(),
                    p.rate.to_string(),
                    format!("{:07b}", p.days_mask),
                    format!("{} - {}", p.window_start, p.window_end),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Name", "Mode", "Rate", "Days", "Window"], rows)
        );
    }
    Ok(())
}
