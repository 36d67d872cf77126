// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::atomic;
use crate::errors::{LotError, LotResult};
use crate::models::{CashFlow, CashFlowKind, CashRegister, LedgerKind, RegisterStatus};
use crate::money::Money;
use crate::utils::{
    get_register_policy, maybe_print_json, parse_money, pretty_table, set_register_policy,
    RegisterPolicy,
};
use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let now = Utc::now().naive_utc();
    match m.subcommand() {
        Some(("open", sub)) => {
            let operator = sub.get_one::<String>("operator").unwrap();
            let opening = parse_money(sub.get_one::<String>("opening").unwrap())?;
            let reg = open_register(conn, operator, opening, now)?;
            println!(
                "Register {} opened for {} with {}",
                reg.id, reg.operator, reg.opening_balance
            );
        }
        Some(("close", sub)) => {
            let operator = sub.get_one::<String>("operator").unwrap();
            let counted = parse_money(sub.get_one::<String>("counted").unwrap())?;
            let reg = close_register(conn, operator, counted, now)?;
            let disc = reg.discrepancy.unwrap_or(Money::ZERO);
            println!(
                "Register {} closed: expected {}, counted {}, discrepancy {} ({})",
                reg.id,
                reg.current_balance,
                counted,
                disc,
                reg.status.as_str()
            );
        }
        Some(("adjust", sub)) => {
            let operator = sub.get_one::<String>("operator").unwrap();
            let amount = Money::parse(sub.get_one::<String>("amount").unwrap())?;
            let by = sub.get_one::<String>("by").unwrap();
            let reg = adjust_register(conn, operator, amount, by, now)?;
            println!("Register {} adjusted by {}: balance {}", reg.id, amount, reg.current_balance);
        }
        Some(("suspend", sub)) => {
            let operator = sub.get_one::<String>("operator").unwrap();
            let reg = suspend_register(conn, operator)?;
            println!("Register {} suspended", reg.id);
        }
        Some(("resume", sub)) => {
            let operator = sub.get_one::<String>("operator").unwrap();
            let reg = resume_register(conn, operator)?;
            println!("Register {} re-opened", reg.id);
        }
        Some(("status", sub)) => status(conn, sub)?,
        Some(("flows", sub)) => flows(conn, sub)?,
        Some(("set-policy", sub)) => {
            let policy = RegisterPolicy::parse(sub.get_one::<String>("mode").unwrap())?;
            set_register_policy(conn, policy)?;
            println!("Missing-register policy set to '{}'", policy.as_str());
        }
        _ => {}
    }
    Ok(())
}

const REGISTER_COLS: &str = "id, operator, status, opening_balance, current_balance, \
                             expected_balance, discrepancy, opened_at, closed_at";

fn read_register(row: &Row) -> LotResult<CashRegister> {
    let status: String = row.get(2).map_err(LotError::from)?;
    let opening: String = row.get(3).map_err(LotError::from)?;
    let current: String = row.get(4).map_err(LotError::from)?;
    let expected: Option<String> = row.get(5).map_err(LotError::from)?;
    let discrepancy: Option<String> = row.get(6).map_err(LotError::from)?;
    Ok(CashRegister {
        id: row.get(0).map_err(LotError::from)?,
        operator: row.get(1).map_err(LotError::from)?,
        status: RegisterStatus::parse(&status)?,
        opening_balance: Money::parse(&opening)?,
        current_balance: Money::parse(&current)?,
        expected_balance: expected.as_deref().map(Money::parse).transpose()?,
        discrepancy: discrepancy.as_deref().map(Money::parse).transpose()?,
        opened_at: row.get(7).map_err(LotError::from)?,
        closed_at: row.get(8).map_err(LotError::from)?,
    })
}

fn load_register(conn: &Connection, id: i64) -> LotResult<CashRegister> {
    let sql = format!("SELECT {} FROM cash_registers WHERE id=?1", REGISTER_COLS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => read_register(row),
        None => Err(LotError::Validation(format!("register {} not found", id))),
    }
}

fn find_open_for(conn: &Connection, operator: &str) -> LotResult<Option<CashRegister>> {
    let sql = format!(
        "SELECT {} FROM cash_registers WHERE operator=?1 AND status='OPEN'",
        REGISTER_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![operator])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_register(row)?)),
        None => Ok(None),
    }
}

/// Open a shift register. One OPEN register per operator; the guard is
/// backed by a partial unique index so a concurrent double-open loses the
/// race and gets rejected on rerun.
pub fn open_register(
    conn: &mut Connection,
    operator: &str,
    opening: Money,
    now: NaiveDateTime,
) -> LotResult<CashRegister> {
    let operator = operator.trim().to_string();
    if operator.is_empty() {
        return Err(LotError::Validation("operator must not be empty".into()));
    }
    atomic::run(conn, |tx| {
        if find_open_for(tx, &operator)?.is_some() {
            return Err(LotError::RegisterAlreadyOpen {
                operator: operator.clone(),
            });
        }
        tx.execute(
            "INSERT INTO cash_registers(operator, status, opening_balance, current_balance, opened_at)
             VALUES (?1, 'OPEN', ?2, ?2, ?3)",
            params![operator, opening.to_stored(), now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO cash_flows(register_id, kind, amount, performed_by, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                CashFlowKind::OpeningBalance.as_str(),
                opening.to_stored(),
                operator,
                now
            ],
        )?;
        load_register(tx, id)
    })
}

/// Close the operator's register against a physical count. The count is
/// stored as `expected_balance`; discrepancy = current - counted, so a
/// positive value means cash is missing. Zero discrepancy closes clean,
/// anything else parks the register in RECONCILING. Read-only afterwards.
pub fn close_register(
    conn: &mut Connection,
    operator: &str,
    counted: Money,
    now: NaiveDateTime,
) -> LotResult<CashRegister> {
    atomic::run(conn, |tx| {
        let reg = find_open_for(tx, operator)?.ok_or_else(|| LotError::NoOpenRegister {
            operator: operator.to_string(),
        })?;
        let discrepancy = reg.current_balance.subtract(counted);
        let status = if discrepancy.is_zero() {
            RegisterStatus::Closed
        } else {
            RegisterStatus::Reconciling
        };
        tx.execute(
            "UPDATE cash_registers
             SET status=?1, expected_balance=?2, discrepancy=?3, closed_at=?4
             WHERE id=?5",
            params![
                status.as_str(),
                counted.to_stored(),
                discrepancy.to_stored(),
                now,
                reg.id
            ],
        )?;
        tx.execute(
            "INSERT INTO cash_flows(register_id, kind, amount, performed_by, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reg.id,
                CashFlowKind::ClosingBalance.as_str(),
                counted.to_stored(),
                operator,
                now
            ],
        )?;
        load_register(tx, reg.id)
    })
}

/// Supervisor correction: signed amount, recorded as an ADJUSTMENT flow.
pub fn adjust_register(
    conn: &mut Connection,
    operator: &str,
    amount: Money,
    performed_by: &str,
    now: NaiveDateTime,
) -> LotResult<CashRegister> {
    atomic::run(conn, |tx| {
        let reg = find_open_for(tx, operator)?.ok_or_else(|| LotError::NoOpenRegister {
            operator: operator.to_string(),
        })?;
        let new_balance = reg.current_balance.add(amount);
        tx.execute(
            "UPDATE cash_registers SET current_balance=?1 WHERE id=?2",
            params![new_balance.to_stored(), reg.id],
        )?;
        tx.execute(
            "INSERT INTO cash_flows(register_id, kind, amount, performed_by, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reg.id,
                CashFlowKind::Adjustment.as_str(),
                amount.to_stored(),
                performed_by,
                now
            ],
        )?;
        load_register(tx, reg.id)
    })
}

pub fn suspend_register(conn: &mut Connection, operator: &str) -> LotResult<CashRegister> {
    atomic::run(conn, |tx| {
        let reg = find_open_for(tx, operator)?.ok_or_else(|| LotError::NoOpenRegister {
            operator: operator.to_string(),
        })?;
        tx.execute(
            "UPDATE cash_registers SET status='SUSPENDED' WHERE id=?1",
            params![reg.id],
        )?;
        load_register(tx, reg.id)
    })
}

pub fn resume_register(conn: &mut Connection, operator: &str) -> LotResult<CashRegister> {
    atomic::run(conn, |tx| {
        if find_open_for(tx, operator)?.is_some() {
            return Err(LotError::RegisterAlreadyOpen {
                operator: operator.to_string(),
            });
        }
        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM cash_registers WHERE operator=?1 AND status='SUSPENDED'
                 ORDER BY opened_at DESC LIMIT 1",
                params![operator],
                |r| r.get(0),
            )
            .optional()?;
        let id = id.ok_or_else(|| LotError::Validation(format!(
            "no suspended register for operator '{}'",
            operator
        )))?;
        tx.execute(
            "UPDATE cash_registers SET status='OPEN' WHERE id=?1",
            params![id],
        )?;
        load_register(tx, id)
    })
}

/// Where an accepted money event landed.
#[derive(Debug, Clone, Copy)]
pub struct MoneyEventOutcome {
    pub register_id: Option<i64>,
    pub reconciled: bool,
    pub ledger_id: i64,
}

/// Record one accepted money event: exactly one ledger entry, exactly one
/// matching cash flow, and the register balance delta, all on the caller's
/// transaction. `Deposit` adds to the balance, `Withdrawal` subtracts.
/// With no open register the configured policy decides: reject before any
/// write, or queue the flow register-less and leave the ledger entry
/// unreconciled.
pub fn record_money_event(
    tx: &rusqlite::Transaction,
    kind: LedgerKind,
    flow: CashFlowKind,
    amount: Money,
    ticket_id: Option<i64>,
    customer_id: Option<i64>,
    operator: &str,
    now: NaiveDateTime,
) -> LotResult<MoneyEventOutcome> {
    debug_assert!(matches!(flow, CashFlowKind::Deposit | CashFlowKind::Withdrawal));
    let reg = find_open_for(tx, operator)?;
    let (register_id, reconciled) = match (&reg, get_register_policy(tx)?) {
        (Some(r), _) => (Some(r.id), true),
        (None, RegisterPolicy::Reject) => {
            return Err(LotError::NoOpenRegister {
                operator: operator.to_string(),
            });
        }
        (None, RegisterPolicy::Queue) => (None, false),
    };

    tx.execute(
        "INSERT INTO ledger(kind, amount, ticket_id, customer_id, operator, recorded_at, reconciled)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            kind.as_str(),
            amount.to_stored(),
            ticket_id,
            customer_id,
            operator,
            now,
            reconciled
        ],
    )?;
    let ledger_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO cash_flows(register_id, kind, amount, performed_by, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![register_id, flow.as_str(), amount.to_stored(), operator, now],
    )?;

    if let Some(r) = reg {
        let new_balance = match flow {
            CashFlowKind::Withdrawal => r.current_balance.subtract(amount),
            _ => r.current_balance.add(amount),
        };
        tx.execute(
            "UPDATE cash_registers SET current_balance=?1 WHERE id=?2",
            params![new_balance.to_stored(), r.id],
        )?;
    }

    Ok(MoneyEventOutcome {
        register_id,
        reconciled,
        ledger_id,
    })
}

fn status(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let sql = format!(
        "SELECT {} FROM cash_registers ORDER BY opened_at DESC LIMIT 50",
        REGISTER_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut cur = stmt.query([])?;
    let mut regs = Vec::new();
    while let Some(row) = cur.next()? {
        regs.push(read_register(row)?);
    }
    if !maybe_print_json(json_flag, jsonl_flag, &regs)? {
        let rows = regs
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.operator.clone(),
                    r.status.as_str().to_string(),
                    r.opening_balance.to_string(),
                    r.current_balance.to_string(),
                    r.discrepancy.map(|d| d.to_string()).unwrap_or_default(),
                    r.opened_at.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Operator", "Status", "Opening", "Balance", "Discrepancy", "Opened"],
                rows
            )
        );
    }
    Ok(())
}

fn flows(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let register: Option<i64> = sub.get_one::<i64>("register").copied();
    let mut sql = String::from(
        "SELECT id, register_id, kind, amount, performed_by, recorded_at FROM cash_flows WHERE 1=1",
    );
    if register.is_some() {
        sql.push_str(" AND register_id=?1");
    }
    sql.push_str(" ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let mut cur = match register {
        Some(id) => stmt.query(params![id])?,
        None => stmt.query([])?,
    };
    let mut data: Vec<CashFlow> = Vec::new();
    while let Some(r) = cur.next()? {
        let kind: String = r.get(2)?;
        let amount: String = r.get(3)?;
        data.push(CashFlow {
            id: r.get(0)?,
            register_id: r.get(1)?,
            kind: CashFlowKind::parse(&kind)?,
            amount: Money::parse(&amount)?,
            performed_by: r.get(4)?,
            recorded_at: r.get(5)?,
        });
    }
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|f| {
                vec![
                    f.id.to_string(),
                    f.register_id
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "queued".into()),
                    f.kind.as_str().to_string(),
                    f.amount.to_string(),
                    f.performed_by.clone(),
                    f.recorded_at.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Register", "Kind", "Amount", "By", "At"], rows)
        );
    }
    Ok(())
}
