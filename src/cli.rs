// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{crate_version, value_parser, Arg, ArgAction, Command};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print JSON lines"),
    )
}

fn operator_arg() -> Arg {
    Arg::new("operator")
        .long("operator")
        .required(true)
        .help("Operator id handling the cash")
}

fn cash_arg() -> Arg {
    Arg::new("cash")
        .long("cash")
        .required(true)
        .help("Cash received, e.g. 100.00")
}

fn ticket_arg() -> Arg {
    Arg::new("ticket")
        .long("ticket")
        .required(true)
        .help("Ticket id or barcode")
}

pub fn build_cli() -> Command {
    Command::new("parkclip")
        .version(crate_version!())
        .about("Parking-lot ticketing, cash-register ledger, and pension billing")
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("entry")
                .about("Vehicle entry: create an active ticket")
                .arg(Arg::new("plate").required(true).help("Plate number")),
        )
        .subcommand(
            Command::new("fee")
                .about("Quote the current fee for an active ticket (no mutation)")
                .arg(ticket_arg())
                .arg(Arg::new("exit").long("exit").help("Exit time YYYY-MM-DD HH:MM"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print JSON"),
                ),
        )
        .subcommand(
            Command::new("pay")
                .about("Settle an active ticket with cash")
                .arg(ticket_arg())
                .arg(cash_arg())
                .arg(operator_arg())
                .arg(
                    Arg::new("partner")
                        .long("partner")
                        .action(ArgAction::SetTrue)
                        .help("Charge the partner rate (requires a stamp)"),
                ),
        )
        .subcommand(
            Command::new("lost")
                .about("Charge the lost-ticket fee for a vehicle inside")
                .arg(Arg::new("plate").long("plate").required(true))
                .arg(cash_arg())
                .arg(operator_arg()),
        )
        .subcommand(
            Command::new("ticket")
                .about("Ticket administration")
                .subcommand(Command::new("show").arg(ticket_arg()))
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(Arg::new("status").long("status").help("Filter by status"))
                        .arg(Arg::new("plate").long("plate").help("Filter by plate"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                ))
                .subcommand(Command::new("cancel").about("Void an active ticket").arg(ticket_arg()))
                .subcommand(
                    Command::new("refund")
                        .about("Reverse a paid ticket")
                        .arg(ticket_arg())
                        .arg(operator_arg()),
                ),
        )
        .subcommand(
            Command::new("register")
                .about("Cash register shifts")
                .subcommand(
                    Command::new("open")
                        .arg(operator_arg())
                        .arg(Arg::new("opening").long("opening").required(true).help("Opening float")),
                )
                .subcommand(
                    Command::new("close")
                        .arg(operator_arg())
                        .arg(Arg::new("counted").long("counted").required(true).help("Physical cash count")),
                )
                .subcommand(
                    Command::new("adjust")
                        .arg(operator_arg())
                        .arg(Arg::new("amount").long("amount").required(true).help("Signed correction"))
                        .arg(Arg::new("by").long("by").required(true).help("Supervisor id")),
                )
                .subcommand(Command::new("suspend").arg(operator_arg()))
                .subcommand(Command::new("resume").arg(operator_arg()))
                .subcommand(json_flags(Command::new("status")))
                .subcommand(json_flags(
                    Command::new("flows").arg(
                        Arg::new("register")
                            .long("register")
                            .value_parser(value_parser!(i64)),
                    ),
                ))
                .subcommand(
                    Command::new("set-policy")
                        .about("Behavior for payments with no open register")
                        .arg(Arg::new("mode").long("mode").required(true).help("reject|queue")),
                ),
        )
        .subcommand(
            Command::new("pension")
                .about("Monthly subscribers")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("plate").long("plate").required(true))
                        .arg(Arg::new("holder").long("holder").required(true))
                        .arg(Arg::new("rate").long("rate").help("Override the configured monthly rate"))
                        .arg(
                            Arg::new("months")
                                .long("months")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        ),
                )
                .subcommand(
                    Command::new("pay")
                        .arg(
                            Arg::new("customer")
                                .long("customer")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(cash_arg())
                        .arg(operator_arg()),
                )
                .subcommand(
                    Command::new("renew")
                        .arg(
                            Arg::new("customer")
                                .long("customer")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(
                            Arg::new("months")
                                .long("months")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(cash_arg())
                        .arg(operator_arg()),
                )
                .subcommand(json_flags(Command::new("list"))),
        )
        .subcommand(
            Command::new("partner")
                .about("Partner businesses and discounted stamps")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("mode").long("mode").required(true).help("flat|hourly"))
                        .arg(Arg::new("rate").long("rate").required(true))
                        .arg(
                            Arg::new("days-mask")
                                .long("days-mask")
                                .value_parser(value_parser!(u8))
                                .default_value("127")
                                .help("Weekday bitmask, Monday=bit 0"),
                        )
                        .arg(Arg::new("from").long("from").required(true).help("Window start HH:MM"))
                        .arg(Arg::new("to").long("to").required(true).help("Window end HH:MM")),
                )
                .subcommand(
                    Command::new("stamp")
                        .arg(ticket_arg())
                        .arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(
                    Command::new("quote")
                        .arg(ticket_arg())
                        .arg(Arg::new("exit").long("exit").help("Exit time YYYY-MM-DD HH:MM"))
                        .arg(
                            Arg::new("json")
                                .long("json")
                                .action(ArgAction::SetTrue)
                                .help("Print JSON"),
                        ),
                )
                .subcommand(json_flags(Command::new("list"))),
        )
        .subcommand(
            Command::new("pricing")
                .about("Pricing configuration")
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(
                            Arg::new("minimum-hours")
                                .long("minimum-hours")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(Arg::new("minimum-rate").long("minimum-rate").required(true))
                        .arg(
                            Arg::new("increment-minutes")
                                .long("increment-minutes")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(
                            Arg::new("increment-rate")
                                .long("increment-rate")
                                .required(true)
                                .action(ArgAction::Append)
                                .help("Tier rate; repeat for tiered pricing"),
                        )
                        .arg(
                            Arg::new("daily-special-hours")
                                .long("daily-special-hours")
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(Arg::new("daily-special-rate").long("daily-special-rate"))
                        .arg(Arg::new("monthly-rate").long("monthly-rate").required(true))
                        .arg(Arg::new("lost-ticket-fee").long("lost-ticket-fee").required(true)),
                )
                .subcommand(
                    Command::new("activate").arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(Command::new("show")),
        )
        .subcommand(
            Command::new("ledger")
                .about("Append-only money-movement ledger")
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(Arg::new("kind").long("kind"))
                        .arg(Arg::new("operator").long("operator"))
                        .arg(Arg::new("since").long("since").help("YYYY-MM-DD"))
                        .arg(
                            Arg::new("unreconciled")
                                .long("unreconciled")
                                .action(ArgAction::SetTrue),
                        )
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                ))
                .subcommand(
                    Command::new("export")
                        .arg(Arg::new("format").long("format").default_value("csv"))
                        .arg(Arg::new("out").long("out").required(true))
                        .arg(Arg::new("kind").long("kind"))
                        .arg(Arg::new("operator").long("operator"))
                        .arg(Arg::new("since").long("since"))
                        .arg(
                            Arg::new("unreconciled")
                                .long("unreconciled")
                                .action(ArgAction::SetTrue),
                        )
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                ),
        )
        .subcommand(Command::new("doctor").about("Audit ledger and register invariants"))
}
