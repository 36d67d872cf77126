// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::CashFlowKind;
use crate::money::Money;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection) -> Result<()> {
    let rows = audit(conn)?;
    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Re-derive every register balance and scan for broken invariants.
/// Returns one (issue, detail) row per finding.
pub fn audit(conn: &Connection) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();

    // 1) Register balance must equal opening + deposits - withdrawals
    //    (+ adjustments). Opening/closing marker flows are informational.
    let mut stmt = conn.prepare(
        "SELECT id, opening_balance, current_balance FROM cash_registers",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let opening = Money::parse(&r.get::<_, String>(1)?)?;
        let current = Money::parse(&r.get::<_, String>(2)?)?;
        let mut derived = opening;
        let mut fstmt = conn.prepare("SELECT kind, amount FROM cash_flows WHERE register_id=?1")?;
        let mut fcur = fstmt.query([id])?;
        while let Some(f) = fcur.next()? {
            let kind = CashFlowKind::parse(&f.get::<_, String>(0)?)?;
            let amount = Money::parse(&f.get::<_, String>(1)?)?;
            match kind {
                CashFlowKind::Deposit | CashFlowKind::Adjustment => derived = derived.add(amount),
                CashFlowKind::Withdrawal => derived = derived.subtract(amount),
                CashFlowKind::OpeningBalance | CashFlowKind::ClosingBalance => {}
            }
        }
        if derived != current {
            rows.push(vec![
                "register_balance_mismatch".into(),
                format!("register {}: derived {}, stored {}", id, derived, current),
            ]);
        }
    }

    // 2) The partial index should make this impossible; scan anyway.
    let mut stmt2 = conn.prepare(
        "SELECT plate, COUNT(*) FROM tickets WHERE status='ACTIVE' GROUP BY plate HAVING COUNT(*)>1",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let plate: String = r.get(0)?;
        let n: i64 = r.get(1)?;
        rows.push(vec![
            "duplicate_active_ticket".into(),
            format!("{} has {} active tickets", plate, n),
        ]);
    }

    // 3) Terminal money states must carry the snapshot.
    let mut stmt3 = conn.prepare(
        "SELECT id, status FROM tickets WHERE status IN ('PAID','LOST') AND total_amount IS NULL",
    )?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let id: i64 = r.get(0)?;
        let status: String = r.get(1)?;
        rows.push(vec![
            "missing_amount_snapshot".into(),
            format!("ticket {} is {} without total_amount", id, status),
        ]);
    }

    // 4) Every ledger entry is matched 1:1 by a money-moving cash flow.
    let ledger_n: i64 = conn.query_row("SELECT COUNT(*) FROM ledger", [], |r| r.get(0))?;
    let flow_n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cash_flows WHERE kind IN ('DEPOSIT','WITHDRAWAL')",
        [],
        |r| r.get(0),
    )?;
    if ledger_n != flow_n {
        rows.push(vec![
            "ledger_flow_mismatch".into(),
            format!("{} ledger entries vs {} money flows", ledger_n, flow_n),
        ]);
    }

    // 5) Queued payments awaiting reconciliation.
    let queued: i64 =
        conn.query_row("SELECT COUNT(*) FROM ledger WHERE reconciled=0", [], |r| r.get(0))?;
    if queued > 0 {
        rows.push(vec![
            "unreconciled_entries".into(),
            format!("{} ledger entries accepted without an open register", queued),
        ]);
    }

    // 6) Registers stuck in RECONCILING.
    let reconciling: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cash_registers WHERE status='RECONCILING'",
        [],
        |r| r.get(0),
    )?;
    if reconciling > 0 {
        rows.push(vec![
            "registers_reconciling".into(),
            format!("{} register(s) closed with a discrepancy", reconciling),
        ]);
    }

    Ok(rows)
}
