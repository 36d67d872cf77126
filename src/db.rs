// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Parkclip", "parkclip"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("parkclip.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    open_at(&path)
}

/// Open (or create) a database file and apply the schema. Used directly by
/// tests that point several connections at one temp file.
pub fn open_at(path: &Path) -> Result<Connection> {
    let mut conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    configure(&conn)?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    configure(&conn)?;
    init_schema(&mut conn)?;
    Ok(conn)
}

/// WAL so concurrent connections read while one writes; the busy timeout
/// keeps short write contention out of the retry loop.
fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(5_000))?;
    let _mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    Ok(())
}

fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    -- All monetary columns are 2-dp decimal strings; arithmetic happens in
    -- the Money type, never in SQL.
    CREATE TABLE IF NOT EXISTS pricing_configs(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        minimum_hours INTEGER NOT NULL,
        minimum_rate TEXT NOT NULL,
        increment_minutes INTEGER NOT NULL,
        increment_rates TEXT NOT NULL, -- JSON array of tier rates
        daily_special_hours INTEGER,
        daily_special_rate TEXT,
        monthly_rate TEXT NOT NULL,
        lost_ticket_fee TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_pricing_single_active
        ON pricing_configs(active) WHERE active=1;

    CREATE TABLE IF NOT EXISTS tickets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plate TEXT NOT NULL,
        barcode TEXT NOT NULL UNIQUE,
        entry_time TEXT NOT NULL,
        exit_time TEXT,
        total_amount TEXT,
        status TEXT NOT NULL DEFAULT 'ACTIVE'
            CHECK(status IN ('ACTIVE','PAID','LOST','CANCELLED','REFUNDED')),
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_one_active_per_plate
        ON tickets(plate) WHERE status='ACTIVE';
    CREATE INDEX IF NOT EXISTS idx_tickets_plate ON tickets(plate);

    CREATE TABLE IF NOT EXISTS cash_registers(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        operator TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'OPEN'
            CHECK(status IN ('OPEN','CLOSED','RECONCILING','SUSPENDED')),
        opening_balance TEXT NOT NULL,
        current_balance TEXT NOT NULL,
        expected_balance TEXT,
        discrepancy TEXT,
        opened_at TEXT NOT NULL,
        closed_at TEXT
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_registers_one_open_per_operator
        ON cash_registers(operator) WHERE status='OPEN';

    CREATE TABLE IF NOT EXISTS cash_flows(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        register_id INTEGER REFERENCES cash_registers(id),
        kind TEXT NOT NULL
            CHECK(kind IN ('DEPOSIT','WITHDRAWAL','ADJUSTMENT','OPENING_BALANCE','CLOSING_BALANCE')),
        amount TEXT NOT NULL,
        performed_by TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cash_flows_register ON cash_flows(register_id);

    CREATE TABLE IF NOT EXISTS ledger(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL
            CHECK(kind IN ('TICKET_PAYMENT','LOST_TICKET_FEE','PENSION_PAYMENT','PENSION_RENEWAL','REFUND')),
        amount TEXT NOT NULL,
        ticket_id INTEGER REFERENCES tickets(id),
        customer_id INTEGER REFERENCES pension_customers(id),
        operator TEXT NOT NULL,
        recorded_at TEXT NOT NULL,
        reconciled INTEGER NOT NULL DEFAULT 1
    );
    CREATE INDEX IF NOT EXISTS idx_ledger_recorded ON ledger(recorded_at);

    CREATE TABLE IF NOT EXISTS pension_customers(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plate TEXT NOT NULL,
        holder TEXT NOT NULL,
        monthly_rate TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_pension_one_active_per_plate
        ON pension_customers(plate) WHERE is_active=1;

    CREATE TABLE IF NOT EXISTS partner_businesses(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        rate_mode TEXT NOT NULL CHECK(rate_mode IN ('flat','hourly')),
        rate TEXT NOT NULL,
        days_mask INTEGER NOT NULL DEFAULT 127,
        window_start TEXT NOT NULL,
        window_end TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS partner_tickets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticket_id INTEGER NOT NULL UNIQUE REFERENCES tickets(id),
        partner_id INTEGER NOT NULL REFERENCES partner_businesses(id),
        stamped_at TEXT NOT NULL
    );
    "#,
    )?;
    Ok(())
}
