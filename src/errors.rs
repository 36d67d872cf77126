// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::money::Money;
use thiserror::Error;

/// Error taxonomy for all lot operations. Business rejections carry a
/// stable code (see [`LotError::code`]) and guarantee zero state change;
/// `TransientConflict` means "unknown outcome, retry the whole request".
#[derive(Debug, Error)]
pub enum LotError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("vehicle '{plate}' already has an active ticket")]
    VehicleAlreadyInside { plate: String },

    #[error("ticket {id} was already processed (status {status})")]
    TicketAlreadyProcessed { id: i64, status: String },

    #[error("insufficient payment: required {required}, received {received}, short {shortfall}")]
    InsufficientPayment {
        required: Money,
        received: Money,
        shortfall: Money,
    },

    #[error("no active pricing configuration")]
    PricingNotConfigured,

    #[error("no active ticket found for plate '{plate}'")]
    NoActiveTicketFound { plate: String },

    #[error("no open cash register for operator '{operator}'")]
    NoOpenRegister { operator: String },

    #[error("operator '{operator}' already has an open cash register")]
    RegisterAlreadyOpen { operator: String },

    #[error("partner rate for '{partner}' is outside its validity window")]
    PartnerOutsideValidity { partner: String },

    #[error("ticket '{0}' not found")]
    TicketNotFound(String),

    #[error("pension customer {0} not found")]
    CustomerNotFound(i64),

    #[error("partner business '{0}' not found")]
    PartnerNotFound(String),

    #[error("storage contention not resolved after {attempts} attempts")]
    TransientConflict { attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl LotError {
    /// Stable machine-readable code, suitable for API payloads and audit
    /// lines.
    pub fn code(&self) -> &'static str {
        match self {
            LotError::Validation(_) => "VALIDATION",
            LotError::VehicleAlreadyInside { .. } => "VEHICLE_ALREADY_INSIDE",
            LotError::TicketAlreadyProcessed { .. } => "TICKET_ALREADY_PROCESSED",
            LotError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
            LotError::PricingNotConfigured => "PRICING_NOT_CONFIGURED",
            LotError::NoActiveTicketFound { .. } => "NO_ACTIVE_TICKET_FOUND",
            LotError::NoOpenRegister { .. } => "NO_OPEN_REGISTER",
            LotError::RegisterAlreadyOpen { .. } => "REGISTER_ALREADY_OPEN",
            LotError::PartnerOutsideValidity { .. } => "PARTNER_OUTSIDE_VALIDITY",
            LotError::TicketNotFound(_) => "TICKET_NOT_FOUND",
            LotError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            LotError::PartnerNotFound(_) => "PARTNER_NOT_FOUND",
            LotError::TransientConflict { .. } => "TRANSIENT_CONFLICT",
            LotError::Storage(_) => "STORAGE",
        }
    }
}

pub type LotResult<T> = Result<T, LotError>;
