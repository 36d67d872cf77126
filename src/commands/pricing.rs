// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::atomic;
use crate::errors::{LotError, LotResult};
use crate::models::PricingConfig;
use crate::money::Money;
use crate::utils::{parse_money, pretty_table};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub)?,
        Some(("activate", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            activate(conn, name)?;
            println!("Pricing config '{}' is now active", name);
        }
        Some(("show", _)) => show(conn)?,
        _ => {}
    }
    Ok(())
}

fn set(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rates: Vec<Money> = sub
        .get_many::<String>("increment-rate")
        .unwrap()
        .map(|s| parse_money(s))
        .collect::<LotResult<_>>()?;
    let draft = PricingConfig {
        id: 0,
        name: sub.get_one::<String>("name").unwrap().clone(),
        minimum_hours: *sub.get_one::<u32>("minimum-hours").unwrap(),
        minimum_rate: parse_money(sub.get_one::<String>("minimum-rate").unwrap())?,
        increment_minutes: *sub.get_one::<u32>("increment-minutes").unwrap(),
        increment_rates: rates,
        daily_special_hours: sub.get_one::<u32>("daily-special-hours").copied(),
        daily_special_rate: sub
            .get_one::<String>("daily-special-rate")
            .map(|s| parse_money(s))
            .transpose()?,
        monthly_rate: parse_money(sub.get_one::<String>("monthly-rate").unwrap())?,
        lost_ticket_fee: parse_money(sub.get_one::<String>("lost-ticket-fee").unwrap())?,
    };
    let id = insert_and_activate(conn, &draft)?;
    println!("Pricing config '{}' saved and activated (id {})", draft.name, id);
    Ok(())
}

/// Insert a new config and make it the single active one, atomically.
pub fn insert_and_activate(conn: &mut Connection, cfg: &PricingConfig) -> LotResult<i64> {
    cfg.validate()?;
    let rates_json = serde_json::to_string(&cfg.increment_rates)
        .map_err(|e| LotError::Validation(e.to_string()))?;
    atomic::run(conn, |tx| {
        tx.execute("UPDATE pricing_configs SET active=0 WHERE active=1", [])?;
        tx.execute(
            "INSERT INTO pricing_configs(name, minimum_hours, minimum_rate, increment_minutes,
                 increment_rates, daily_special_hours, daily_special_rate, monthly_rate,
                 lost_ticket_fee, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)
             ON CONFLICT(name) DO UPDATE SET
                 minimum_hours=excluded.minimum_hours,
                 minimum_rate=excluded.minimum_rate,
                 increment_minutes=excluded.increment_minutes,
                 increment_rates=excluded.increment_rates,
                 daily_special_hours=excluded.daily_special_hours,
                 daily_special_rate=excluded.daily_special_rate,
                 monthly_rate=excluded.monthly_rate,
                 lost_ticket_fee=excluded.lost_ticket_fee,
                 active=1",
            params![
                cfg.name,
                cfg.minimum_hours,
                cfg.minimum_rate.to_stored(),
                cfg.increment_minutes,
                rates_json,
                cfg.daily_special_hours,
                cfg.daily_special_rate.map(|m| m.to_stored()),
                cfg.monthly_rate.to_stored(),
                cfg.lost_ticket_fee.to_stored(),
            ],
        )?;
        let id: i64 = tx.query_row(
            "SELECT id FROM pricing_configs WHERE name=?1",
            params![cfg.name],
            |r| r.get(0),
        )?;
        Ok(id)
    })
}

pub fn activate(conn: &mut Connection, name: &str) -> LotResult<()> {
    atomic::run(conn, |tx| {
        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM pricing_configs WHERE name=?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        let id = id.ok_or_else(|| {
            LotError::Validation(format!("pricing config '{}' not found", name))
        })?;
        tx.execute("UPDATE pricing_configs SET active=0 WHERE active=1", [])?;
        tx.execute(
            "UPDATE pricing_configs SET active=1 WHERE id=?1",
            params![id],
        )?;
        Ok(())
    })
}

/// The single active pricing config. Fee paths call this inside their unit
/// of work; no config means no fee can be computed.
pub fn active_config(conn: &Connection) -> LotResult<PricingConfig> {
    let row = conn
        .query_row(
            "SELECT id, name, minimum_hours, minimum_rate, increment_minutes, increment_rates,
                    daily_special_hours, daily_special_rate, monthly_rate, lost_ticket_fee
             FROM pricing_configs WHERE active=1",
            [],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, u32>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, u32>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, Option<u32>>(6)?,
                    r.get::<_, Option<String>>(7)?,
                    r.get::<_, String>(8)?,
                    r.get::<_, String>(9)?,
                ))
            },
        )
        .optional()?;
    let Some((id, name, min_h, min_rate, inc_min, rates_json, sp_h, sp_rate, monthly, lost)) = row
    else {
        return Err(LotError::PricingNotConfigured);
    };
    let increment_rates: Vec<Money> = serde_json::from_str(&rates_json)
        .map_err(|e| LotError::Validation(format!("corrupt tier rates: {}", e)))?;
    Ok(PricingConfig {
        id,
        name,
        minimum_hours: min_h,
        minimum_rate: Money::parse(&min_rate)?,
        increment_minutes: inc_min,
        increment_rates,
        daily_special_hours: sp_h,
        daily_special_rate: sp_rate.as_deref().map(Money::parse).transpose()?,
        monthly_rate: Money::parse(&monthly)?,
        lost_ticket_fee: Money::parse(&lost)?,
    })
}

fn show(conn: &Connection) -> Result<()> {
    let cfg = active_config(conn)?;
    let tiers = cfg
        .increment_rates
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let special = match (cfg.daily_special_hours, cfg.daily_special_rate) {
        (Some(h), Some(r)) => format!("{} within {}h", r, h),
        _ => "-".into(),
    };
    let rows = vec![vec![
        cfg.name.clone(),
        format!("{}h @ {}", cfg.minimum_hours, cfg.minimum_rate),
        format!("{}min @ [{}]", cfg.increment_minutes, tiers),
        special,
        cfg.monthly_rate.to_string(),
        cfg.lost_ticket_fee.to_string(),
    ]];
    println!(
        "{}",
        pretty_table(
            &["Config", "Minimum", "Increments", "Daily special", "Monthly", "Lost ticket"],
            rows
        )
    );
    Ok(())
}
