// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{LotError, LotResult};
use crate::money::Money;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    Paid,
    Lost,
    Cancelled,
    Refunded,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Paid => "PAID",
            TicketStatus::Lost => "LOST",
            TicketStatus::Cancelled => "CANCELLED",
            TicketStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> LotResult<TicketStatus> {
        match s {
            "ACTIVE" => Ok(TicketStatus::Active),
            "PAID" => Ok(TicketStatus::Paid),
            "LOST" => Ok(TicketStatus::Lost),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            "REFUNDED" => Ok(TicketStatus::Refunded),
            _ => Err(LotError::Validation(format!(
                "unknown ticket status '{}'",
                s
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TicketStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub plate: String,
    pub barcode: String,
    pub entry_time: NaiveDateTime,
    pub exit_time: Option<NaiveDateTime>,
    /// Charged amount, snapshotted once at the terminal transition.
    pub total_amount: Option<Money>,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub id: i64,
    pub name: String,
    pub minimum_hours: u32,
    pub minimum_rate: Money,
    pub increment_minutes: u32,
    /// Ordered tier rates; a single element is the flat-increment case.
    /// Periods beyond the last tier reuse the last tier's rate.
    pub increment_rates: Vec<Money>,
    pub daily_special_hours: Option<u32>,
    pub daily_special_rate: Option<Money>,
    pub monthly_rate: Money,
    pub lost_ticket_fee: Money,
}

impl PricingConfig {
    pub fn validate(&self) -> LotResult<()> {
        if self.minimum_hours == 0 {
            return Err(LotError::Validation("minimum_hours must be > 0".into()));
        }
        if self.increment_minutes == 0 {
            return Err(LotError::Validation("increment_minutes must be > 0".into()));
        }
        if self.increment_rates.is_empty() {
            return Err(LotError::Validation(
                "at least one increment rate is required".into(),
            ));
        }
        for m in [&self.minimum_rate, &self.monthly_rate, &self.lost_ticket_fee]
            .into_iter()
            .chain(self.increment_rates.iter())
        {
            if m.is_negative() {
                return Err(LotError::Validation("rates must be non-negative".into()));
            }
        }
        if self.daily_special_hours.is_some() != self.daily_special_rate.is_some() {
            return Err(LotError::Validation(
                "daily special needs both hours and rate".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegisterStatus {
    Open,
    Closed,
    Reconciling,
    Suspended,
}

impl RegisterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterStatus::Open => "OPEN",
            RegisterStatus::Closed => "CLOSED",
            RegisterStatus::Reconciling => "RECONCILING",
            RegisterStatus::Suspended => "SUSPENDED",
        }
    }

    pub fn parse(s: &str) -> LotResult<RegisterStatus> {
        match s {
            "OPEN" => Ok(RegisterStatus::Open),
            "CLOSED" => Ok(RegisterStatus::Closed),
            "RECONCILING" => Ok(RegisterStatus::Reconciling),
            "SUSPENDED" => Ok(RegisterStatus::Suspended),
            _ => Err(LotError::Validation(format!(
                "unknown register status '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashRegister {
    pub id: i64,
    pub operator: String,
    pub status: RegisterStatus,
    pub opening_balance: Money,
    pub current_balance: Money,
    /// Operator-supplied physical count, recorded at close.
    pub expected_balance: Option<Money>,
    /// current_balance - expected_balance at close; positive means cash
    /// is missing from the drawer.
    pub discrepancy: Option<Money>,
    pub opened_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashFlowKind {
    Deposit,
    Withdrawal,
    Adjustment,
    OpeningBalance,
    ClosingBalance,
}

impl CashFlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashFlowKind::Deposit => "DEPOSIT",
            CashFlowKind::Withdrawal => "WITHDRAWAL",
            CashFlowKind::Adjustment => "ADJUSTMENT",
            CashFlowKind::OpeningBalance => "OPENING_BALANCE",
            CashFlowKind::ClosingBalance => "CLOSING_BALANCE",
        }
    }

    pub fn parse(s: &str) -> LotResult<CashFlowKind> {
        match s {
            "DEPOSIT" => Ok(CashFlowKind::Deposit),
            "WITHDRAWAL" => Ok(CashFlowKind::Withdrawal),
            "ADJUSTMENT" => Ok(CashFlowKind::Adjustment),
            "OPENING_BALANCE" => Ok(CashFlowKind::OpeningBalance),
            "CLOSING_BALANCE" => Ok(CashFlowKind::ClosingBalance),
            _ => Err(LotError::Validation(format!(
                "unknown cash flow kind '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlow {
    pub id: i64,
    /// None when the payment was accepted under the `queue` policy with
    /// no open register.
    pub register_id: Option<i64>,
    pub kind: CashFlowKind,
    pub amount: Money,
    pub performed_by: String,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerKind {
    TicketPayment,
    LostTicketFee,
    PensionPayment,
    PensionRenewal,
    Refund,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::TicketPayment => "TICKET_PAYMENT",
            LedgerKind::LostTicketFee => "LOST_TICKET_FEE",
            LedgerKind::PensionPayment => "PENSION_PAYMENT",
            LedgerKind::PensionRenewal => "PENSION_RENEWAL",
            LedgerKind::Refund => "REFUND",
        }
    }

    pub fn parse(s: &str) -> LotResult<LedgerKind> {
        match s {
            "TICKET_PAYMENT" => Ok(LedgerKind::TicketPayment),
            "LOST_TICKET_FEE" => Ok(LedgerKind::LostTicketFee),
            "PENSION_PAYMENT" => Ok(LedgerKind::PensionPayment),
            "PENSION_RENEWAL" => Ok(LedgerKind::PensionRenewal),
            "REFUND" => Ok(LedgerKind::Refund),
            _ => Err(LotError::Validation(format!("unknown ledger kind '{}'", s))),
        }
    }
}

/// Append-only business transaction record. Never mutated after insert
/// except for the reconciliation flag on queued entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub kind: LedgerKind,
    pub amount: Money,
    pub ticket_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub operator: String,
    pub recorded_at: NaiveDateTime,
    pub reconciled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PensionCustomer {
    pub id: i64,
    pub plate: String,
    pub holder: String,
    pub monthly_rate: Money,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerRateMode {
    Flat,
    Hourly,
}

impl PartnerRateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerRateMode::Flat => "flat",
            PartnerRateMode::Hourly => "hourly",
        }
    }

    pub fn parse(s: &str) -> LotResult<PartnerRateMode> {
        match s {
            "flat" => Ok(PartnerRateMode::Flat),
            "hourly" => Ok(PartnerRateMode::Hourly),
            _ => Err(LotError::Validation(format!(
                "unknown partner rate mode '{}' (use flat|hourly)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerBusiness {
    pub id: i64,
    pub name: String,
    pub rate_mode: PartnerRateMode,
    pub rate: Money,
    /// Bit i set means weekday i (Monday=0) is inside the validity window.
    pub days_mask: u8,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerTicket {
    pub id: i64,
    pub ticket_id: i64,
    pub partner_id: i64,
    pub stamped_at: NaiveDateTime,
}
