pub mod accrual;
pub mod position;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RecapError;
use crate::types::{InvestorId, OfferingId};
use crate::waterfall::allocator::{AllocationResult, Recipient};
use crate::waterfall::definition::TierKind;
use crate::RecapResult;

pub use accrual::{accrue_preferred, accrue_preferred_with, Compounding};
pub use position::InvestorPosition;

/// Tolerance when checking that ownership percentages sum to 1.
const OWNERSHIP_TOLERANCE: Decimal = dec!(0.000001);

/// Per-offering collection of investor capital accounts.
///
/// The ledger is the single source of truth the waterfall allocator reads
/// a snapshot of and the distribution engine commits deltas back into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalLedger {
    pub offering_id: OfferingId,
    pub positions: Vec<InvestorPosition>,
}

impl CapitalLedger {
    pub fn new(offering_id: impl Into<OfferingId>, positions: Vec<InvestorPosition>) -> Self {
        CapitalLedger {
            offering_id: offering_id.into(),
            positions,
        }
    }

    pub fn position(&self, investor_id: &str) -> Option<&InvestorPosition> {
        self.positions
            .iter()
            .find(|p| p.investor_id == investor_id)
    }

    pub fn total_invested(&self) -> Decimal {
        self.positions.iter().map(|p| p.invested_capital).sum()
    }

    pub fn total_returned(&self) -> Decimal {
        self.positions.iter().map(|p| p.returned_capital).sum()
    }

    /// Verify every data-integrity invariant.
    ///
    /// A violation is a `LedgerInconsistency`: a bug in the surrounding
    /// system, fatal for this offering. Never auto-corrected.
    pub fn validate(&self) -> RecapResult<()> {
        if self.positions.is_empty() {
            return self.inconsistent("offering has no investor positions");
        }

        let mut seen: Vec<&InvestorId> = Vec::with_capacity(self.positions.len());
        for p in &self.positions {
            if seen.contains(&&p.investor_id) {
                return self.inconsistent(&format!(
                    "duplicate position for investor {}",
                    p.investor_id
                ));
            }
            seen.push(&p.investor_id);

            if let Err(reason) = p.check_invariants() {
                return self.inconsistent(&reason);
            }
        }

        let ownership_sum: Decimal = self.positions.iter().map(|p| p.ownership_pct).sum();
        if (ownership_sum - Decimal::ONE).abs() > OWNERSHIP_TOLERANCE {
            return self.inconsistent(&format!(
                "ownership percentages sum to {ownership_sum}, expected 1"
            ));
        }

        Ok(())
    }

    /// Apply the deltas of an allocation result, all-or-nothing.
    ///
    /// The deltas are staged on a working copy and re-validated before the
    /// ledger is replaced; on any error `self` is left untouched.
    pub fn apply(&mut self, allocation: &AllocationResult) -> RecapResult<()> {
        let mut staged = self.clone();

        for line in &allocation.lines {
            let investor_id = match &line.recipient {
                Recipient::Investor(id) => id,
                Recipient::Sponsor => continue, // sponsor has no capital account here
            };

            let position = staged
                .positions
                .iter_mut()
                .find(|p| p.investor_id == *investor_id)
                .ok_or_else(|| RecapError::LedgerInconsistency {
                    offering_id: self.offering_id.clone(),
                    reason: format!("allocation references unknown investor {investor_id}"),
                })?;

            match line.kind {
                TierKind::ReturnOfCapital => position.returned_capital += line.amount,
                TierKind::PreferredReturn => position.preferred_paid += line.amount,
                TierKind::GpCatchUp | TierKind::ResidualSplit => {
                    position.profits_paid += line.amount
                }
            }
        }

        staged.validate()?;
        *self = staged;
        Ok(())
    }

    fn inconsistent(&self, reason: &str) -> RecapResult<()> {
        Err(RecapError::LedgerInconsistency {
            offering_id: self.offering_id.clone(),
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn funded() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn two_investor_ledger() -> CapitalLedger {
        CapitalLedger::new(
            "off-1",
            vec![
                InvestorPosition::new("inv-a", dec!(600_000), dec!(0.6), dec!(0.08), funded()),
                InvestorPosition::new("inv-b", dec!(400_000), dec!(0.4), dec!(0.08), funded()),
            ],
        )
    }

    #[test]
    fn test_valid_ledger() {
        assert!(two_investor_ledger().validate().is_ok());
    }

    #[test]
    fn test_ownership_must_sum_to_one() {
        let mut ledger = two_investor_ledger();
        ledger.positions[1].ownership_pct = dec!(0.3);
        match ledger.validate() {
            Err(RecapError::LedgerInconsistency { offering_id, .. }) => {
                assert_eq!(offering_id, "off-1");
            }
            other => panic!("Expected LedgerInconsistency, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_investor_rejected() {
        let mut ledger = two_investor_ledger();
        ledger.positions[1].investor_id = "inv-a".into();
        ledger.positions[1].ownership_pct = dec!(0.4);
        assert!(ledger.validate().is_err());
    }

    #[test]
    fn test_empty_ledger_rejected() {
        let ledger = CapitalLedger::new("off-1", vec![]);
        assert!(ledger.validate().is_err());
    }

    #[test]
    fn test_totals() {
        let ledger = two_investor_ledger();
        assert_eq!(ledger.total_invested(), dec!(1_000_000));
        assert_eq!(ledger.total_returned(), Decimal::ZERO);
    }

    #[test]
    fn test_position_lookup() {
        let ledger = two_investor_ledger();
        assert!(ledger.position("inv-a").is_some());
        assert!(ledger.position("inv-z").is_none());
    }
}
