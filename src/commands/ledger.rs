// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{LedgerEntry, LedgerKind};
use crate::money::Money;
use crate::utils::{maybe_print_json, parse_date, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(conn, sub),
        Some(("export", sub)) => export(conn, sub),
        _ => Ok(()),
    }
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<LedgerEntry>> {
    let mut sql = String::from(
        "SELECT id, kind, amount, ticket_id, customer_id, operator, recorded_at, reconciled
         FROM ledger WHERE 1=1",
    );
    let mut params_vec: Vec<String> = Vec::new();

    if let Some(kind) = sub.get_one::<String>("kind") {
        sql.push_str(" AND kind=?");
        params_vec.push(kind.to_uppercase());
    }
    if let Some(op) = sub.get_one::<String>("operator") {
        sql.push_str(" AND operator=?");
        params_vec.push(op.into());
    }
    if let Some(since) = sub.get_one::<String>("since") {
        let day = parse_date(since)?;
        sql.push_str(" AND recorded_at>=?");
        params_vec.push(day.to_string());
    }
    if sub.get_flag("unreconciled") {
        sql.push_str(" AND reconciled=0");
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
        let kind: String = r.get(1)?;
        let amount: String = r.get(2)?;
        data.push(LedgerEntry {
            id: r.get(0)?,
            kind: LedgerKind::parse(&kind)?,
            amount: Money::parse(&amount)?,
            ticket_id: r.get(3)?,
            customer_id: r.get(4)?,
            operator: r.get(5)?,
            recorded_at: r.get(6)?,
            reconciled: r.get(7)?,
        });
    }
    Ok(data)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.kind.as_str().to_string(),
                    r.amount.to_string(),
                    r.ticket_id.map(|v| v.to_string()).unwrap_or_default(),
                    r.customer_id.map(|v| v.to_string()).unwrap_or_default(),
                    r.operator.clone(),
                    r.recorded_at.to_string(),
                    if r.reconciled { "" } else { "queued" }.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Kind", "Amount", "Ticket", "Customer", "Operator", "At", ""],
                rows
            )
        );
    }
    Ok(())
}

fn export(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();
    let data = query_rows(conn, sub)?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "id",
                "kind",
                "amount",
                "ticket_id",
                "customer_id",
                "operator",
                "recorded_at",
                "reconciled",
            ])?;
            for r in &data {
                wtr.write_record([
                    r.id.to_string(),
                    r.kind.as_str().to_string(),
                    r.amount.to_stored(),
                    r.ticket_id.map(|v| v.to_string()).unwrap_or_default(),
                    r.customer_id.map(|v| v.to_string()).unwrap_or_default(),
                    r.operator.clone(),
                    r.recorded_at.to_string(),
                    r.reconciled.to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let items: Vec<_> = data
                .iter()
                .map(|r| {
                    json!({
                        "id": r.id, "kind": r.kind.as_str(), "amount": r.amount.to_stored(),
                        "ticket_id": r.ticket_id, "customer_id": r.customer_id,
                        "operator": r.operator, "recorded_at": r.recorded_at.to_string(),
                        "reconciled": r.reconciled
                    })
                })
                .collect();
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        _ => {
            eprintln!("Unknown format: {} (use csv|json)", fmt);
            return Ok(());
        }
    }
    println!("Exported {} ledger entries to {}", data.len(), out);
    Ok(())
}
