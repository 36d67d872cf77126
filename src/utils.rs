// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{LotError, LotResult};
use crate::money::Money;
use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let t = s.trim();
    NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M"))
        .with_context(|| format!("Invalid timestamp '{}', expected YYYY-MM-DD HH:MM[:SS]", s))
}

pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("Invalid time '{}', expected HH:MM", s))
}

/// Operator-entered cash amount: exact decimal, at most centavo precision,
/// never negative.
pub fn parse_money(s: &str) -> LotResult<Money> {
    let m = Money::parse(s)?;
    if m.is_negative() {
        return Err(LotError::Validation(format!(
            "amount '{}' must not be negative",
            s
        )));
    }
    if m.scale() > 2 {
        return Err(LotError::Validation(format!(
            "amount '{}' has sub-centavo precision",
            s
        )));
    }
    Ok(m)
}

static PLATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9-]{1,11}$").unwrap());

/// Uppercase, trim, and validate a plate number before it reaches any
/// query or insert.
pub fn normalize_plate(plate: &str) -> LotResult<String> {
    let p = plate.trim().to_uppercase();
    if !PLATE_RE.is_match(&p) {
        return Err(LotError::Validation(format!(
            "invalid plate number '{}'",
            plate
        )));
    }
    Ok(p)
}

/// Whole months elapsed between two dates (end-exclusive day rule).
pub fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end <= start {
        return 0;
    }
    let mut months =
        (end.year() - start.year()) * 12 + (end.month() as i32 - start.month() as i32);
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0) as u32
}

pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Behavior when a payment arrives and the operator has no open register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterPolicy {
    /// Fail the payment before any write.
    Reject,
    /// Accept it, record the flow without a register, flag for
    /// reconciliation.
    Queue,
}

impl RegisterPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterPolicy::Reject => "reject",
            RegisterPolicy::Queue => "queue",
        }
    }

    pub fn parse(s: &str) -> LotResult<RegisterPolicy> {
        match s {
            "reject" => Ok(RegisterPolicy::Reject),
            "queue" => Ok(RegisterPolicy::Queue),
            _ => Err(LotError::Validation(format!(
                "unknown register policy '{}' (use reject|queue)",
                s
            ))),
        }
    }
}

pub fn get_register_policy(conn: &Connection) -> LotResult<RegisterPolicy> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key='register_policy'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    match v {
        Some(s) => RegisterPolicy::parse(&s),
        None => Ok(RegisterPolicy::Reject),
    }
}

pub fn set_register_policy(conn: &Connection, policy: RegisterPolicy) -> LotResult<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('register_policy', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![policy.as_str()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plate_normalization() {
        assert_eq!(normalize_plate(" abc-123 ").unwrap(), "ABC-123");
        assert!(normalize_plate("").is_err());
        assert!(normalize_plate("a").is_err());
        assert!(normalize_plate("has space").is_err());
    }

    #[test]
    fn month_math() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(months_between(d("2025-01-15"), d("2025-04-15")), 3);
        assert_eq!(months_between(d("2025-01-15"), d("2025-04-14")), 2);
        assert_eq!(months_between(d("2025-04-15"), d("2025-01-15")), 0);
        assert_eq!(add_months(d("2025-01-31"), 1), d("2025-02-28"));
    }

    #[test]
    fn money_input_rules() {
        assert!(parse_money("12.345").is_err());
        assert!(parse_money("-1").is_err());
        assert_eq!(parse_money("12.30").unwrap(), Money::parse("12.3").unwrap());
    }
}
