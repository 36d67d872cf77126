// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use parkclip::{cli, commands, db};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = db::open_or_init()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("entry", sub)) => commands::tickets::handle_entry(&mut conn, sub)?,
        Some(("fee", sub)) => commands::tickets::handle_fee(&conn, sub)?,
        Some(("pay", sub)) => commands::tickets::handle_pay(&mut conn, sub)?,
        Some(("lost", sub)) => commands::tickets::handle_lost(&mut conn, sub)?,
        Some(("ticket", sub)) => commands::tickets::handle(&mut conn, sub)?,
        Some(("register", sub)) => commands::registers::handle(&mut conn, sub)?,
        Some(("pension", sub)) => commands::pension::handle(&mut conn, sub)?,
        Some(("partner", sub)) => commands::partners::handle(&mut conn, sub)?,
        Some(("pricing", sub)) => commands::pricing::handle(&mut conn, sub)?,
        Some(("ledger", sub)) => commands::ledger::handle(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
