// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::PricingConfig;
use crate::money::Money;
use serde::Serialize;

/// Itemized result of a fee computation. `increments` holds one rate per
/// billed period, in order.
#[derive(Debug, Clone, Serialize)]
pub struct FeeBreakdown {
    pub duration_minutes: i64,
    pub minimum: Money,
    pub increments: Vec<Money>,
    pub capped: bool,
    pub total: Money,
}

/// Pure fee computation: no I/O, no mutation, deterministic. Safe to call
/// repeatedly for live estimates while a ticket is still active.
pub fn calculate_fee(duration_minutes: i64, cfg: &PricingConfig) -> FeeBreakdown {
    let duration_minutes = duration_minutes.max(0);
    let minimum_minutes = i64::from(cfg.minimum_hours) * 60;

    if duration_minutes <= minimum_minutes {
        return FeeBreakdown {
            duration_minutes,
            minimum: cfg.minimum_rate,
            increments: Vec::new(),
            capped: false,
            total: cfg.minimum_rate,
        };
    }

    let excess = duration_minutes - minimum_minutes;
    let step = i64::from(cfg.increment_minutes);
    let periods = (excess + step - 1) / step;

    let last = cfg.increment_rates.len() - 1;
    let mut increments = Vec::with_capacity(periods as usize);
    let mut total = cfg.minimum_rate;
    for i in 0..periods {
        let rate = cfg.increment_rates[(i as usize).min(last)];
        total = total.add(rate);
        increments.push(rate);
    }

    let mut capped = false;
    if let (Some(hours), Some(rate)) = (cfg.daily_special_hours, cfg.daily_special_rate) {
        if duration_minutes <= i64::from(hours) * 60 && total > rate {
            total = rate;
            capped = true;
        }
    }

    FeeBreakdown {
        duration_minutes,
        minimum: cfg.minimum_rate,
        increments,
        capped,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(rates: &[&str]) -> PricingConfig {
        PricingConfig {
            id: 1,
            name: "test".into(),
            minimum_hours: 1,
            minimum_rate: Money::parse("25.00").unwrap(),
            increment_minutes: 20,
            increment_rates: rates.iter().map(|r| Money::parse(r).unwrap()).collect(),
            daily_special_hours: None,
            daily_special_rate: None,
            monthly_rate: Money::parse("800.00").unwrap(),
            lost_ticket_fee: Money::parse("150.00").unwrap(),
        }
    }

    #[test]
    fn within_minimum_charges_minimum_only() {
        let out = calculate_fee(59, &cfg(&["8.50"]));
        assert_eq!(out.total, Money::parse("25.00").unwrap());
        assert!(out.increments.is_empty());
    }

    #[test]
    fn exact_minimum_boundary() {
        let out = calculate_fee(60, &cfg(&["8.50"]));
        assert_eq!(out.total, Money::parse("25.00").unwrap());
        let out = calculate_fee(61, &cfg(&["8.50"]));
        assert_eq!(out.increments.len(), 1);
        assert_eq!(out.total, Money::parse("33.50").unwrap());
    }

    #[test]
    fn six_increments_sum_exactly() {
        // 60 min minimum + 6 periods of 20 min covers 180 min total.
        let out = calculate_fee(180, &cfg(&["8.50"]));
        assert_eq!(out.increments.len(), 6);
        assert_eq!(out.total, Money::parse("76.00").unwrap());
    }

    #[test]
    fn tiers_reuse_last_rate() {
        let out = calculate_fee(60 + 61, &cfg(&["10.00", "5.00"]));
        // 4 periods: 10 + 5 + 5 + 5
        assert_eq!(out.increments.len(), 4);
        assert_eq!(out.total, Money::parse("50.00").unwrap());
    }

    #[test]
    fn daily_special_caps_total() {
        let mut c = cfg(&["8.50"]);
        c.daily_special_hours = Some(12);
        c.daily_special_rate = Some(Money::parse("90.00").unwrap());
        let out = calculate_fee(600, &c);
        assert!(out.capped);
        assert_eq!(out.total, Money::parse("90.00").unwrap());

        // Beyond the special window the cap no longer applies.
        let out = calculate_fee(13 * 60, &c);
        assert!(!out.capped);
        assert!(out.total > Money::parse("90.00").unwrap());
    }

    #[test]
    fn deterministic_across_calls() {
        let c = cfg(&["8.50"]);
        let a = calculate_fee(200, &c);
        for _ in 0..5 {
            let b = calculate_fee(200, &c);
            assert_eq!(a.total, b.total);
            assert_eq!(a.increments, b.increments);
        }
    }
}
