use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{InvestorId, Money, Rate};

/// One investor's capital account in an offering.
///
/// `invested_capital` is fixed at funding; the four running balances only
/// ever increase. `ownership_pct` is the investor's share of the offering
/// (all positions in an offering sum to 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorPosition {
    pub investor_id: InvestorId,
    pub invested_capital: Money,
    #[serde(default)]
    pub returned_capital: Money,
    #[serde(default)]
    pub preferred_accrued: Money,
    #[serde(default)]
    pub preferred_paid: Money,
    #[serde(default)]
    pub profits_paid: Money,
    pub ownership_pct: Rate,
    pub preferred_rate_annual: Rate,
    /// Date preferred return starts accruing
    pub funded_at: NaiveDate,
    /// High-water mark for accrual idempotence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accrual_date: Option<NaiveDate>,
    /// Full wind-down recorded; accrual has stopped entirely
    #[serde(default)]
    pub wound_down: bool,
}

impl InvestorPosition {
    /// A freshly funded position with zeroed running balances.
    pub fn new(
        investor_id: impl Into<InvestorId>,
        invested_capital: Money,
        ownership_pct: Rate,
        preferred_rate_annual: Rate,
        funded_at: NaiveDate,
    ) -> Self {
        InvestorPosition {
            investor_id: investor_id.into(),
            invested_capital,
            returned_capital: Decimal::ZERO,
            preferred_accrued: Decimal::ZERO,
            preferred_paid: Decimal::ZERO,
            profits_paid: Decimal::ZERO,
            ownership_pct,
            preferred_rate_annual,
            funded_at,
            last_accrual_date: None,
            wound_down: false,
        }
    }

    /// Capital not yet returned to the investor.
    pub fn unreturned_capital(&self) -> Money {
        self.invested_capital - self.returned_capital
    }

    /// Preferred return owed but not yet paid out.
    pub fn preferred_unpaid(&self) -> Money {
        self.preferred_accrued - self.preferred_paid
    }

    /// Check the per-position balance invariants. Returns the first
    /// violation as a reason string for the ledger to wrap.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if self.invested_capital <= Decimal::ZERO {
            return Err(format!(
                "position {}: invested capital must be positive",
                self.investor_id
            ));
        }
        if self.returned_capital < Decimal::ZERO
            || self.preferred_accrued < Decimal::ZERO
            || self.preferred_paid < Decimal::ZERO
            || self.profits_paid < Decimal::ZERO
        {
            return Err(format!(
                "position {}: negative balance detected",
                self.investor_id
            ));
        }
        if self.returned_capital > self.invested_capital {
            return Err(format!(
                "position {}: returned capital {} exceeds invested capital {}",
                self.investor_id, self.returned_capital, self.invested_capital
            ));
        }
        if self.preferred_paid > self.preferred_accrued {
            return Err(format!(
                "position {}: preferred paid {} exceeds preferred accrued {}",
                self.investor_id, self.preferred_paid, self.preferred_accrued
            ));
        }
        if self.ownership_pct < Decimal::ZERO || self.ownership_pct > Decimal::ONE {
            return Err(format!(
                "position {}: ownership percentage {} outside [0, 1]",
                self.investor_id, self.ownership_pct
            ));
        }
        if self.preferred_rate_annual < Decimal::ZERO {
            return Err(format!(
                "position {}: negative preferred rate",
                self.investor_id
            ));
        }
        Ok(())
    }
}
