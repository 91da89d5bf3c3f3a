use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RecapError;
use crate::types::{Money, OfferingId};
use crate::waterfall::allocator::AllocationResult;
use crate::RecapResult;

/// Lifecycle of a distribution event.
///
/// Draft and PendingApproval events can be discarded freely. Once Approved
/// the event is committed to execution; the only way back from a booked
/// distribution is a compensating reversal, outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionStatus {
    Draft,
    PendingApproval,
    Approved,
    Processing,
    Completed,
    Failed,
}

/// A sponsor-initiated cash distribution for one offering.
///
/// Immutable once Completed; a Failed event never mutated the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEvent {
    pub id: String,
    pub offering_id: OfferingId,
    /// Confirmed cash-in-hand date; preferred accrues through this date
    pub date: NaiveDate,
    pub total_amount: Money,
    pub status: DistributionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocations: Option<AllocationResult>,
}

impl DistributionEvent {
    /// Open a draft for a confirmed cash amount.
    pub fn draft(
        id: impl Into<String>,
        offering_id: impl Into<OfferingId>,
        date: NaiveDate,
        total_amount: Money,
    ) -> RecapResult<Self> {
        if total_amount <= Decimal::ZERO {
            return Err(RecapError::InvalidDistributionAmount {
                amount: total_amount,
            });
        }
        Ok(DistributionEvent {
            id: id.into(),
            offering_id: offering_id.into(),
            date,
            total_amount,
            status: DistributionStatus::Draft,
            allocations: None,
        })
    }

    /// Draft -> PendingApproval.
    pub fn submit(&mut self) -> RecapResult<()> {
        self.transition(DistributionStatus::Draft, DistributionStatus::PendingApproval)
    }

    /// PendingApproval -> Approved.
    pub fn approve(&mut self) -> RecapResult<()> {
        self.transition(
            DistributionStatus::PendingApproval,
            DistributionStatus::Approved,
        )
    }

    /// Discard an unexecuted event. Consumes the event; there are no side
    /// effects to undo at this stage. Approved or in-flight events cannot
    /// be discarded, only reversed with compensating entries.
    pub fn discard(self) -> RecapResult<()> {
        match self.status {
            DistributionStatus::Draft | DistributionStatus::PendingApproval => Ok(()),
            other => Err(RecapError::InvalidInput {
                field: "status".into(),
                reason: format!("a {other:?} distribution cannot be discarded"),
            }),
        }
    }

    fn transition(
        &mut self,
        expected: DistributionStatus,
        next: DistributionStatus,
    ) -> RecapResult<()> {
        if self.status != expected {
            return Err(RecapError::InvalidInput {
                field: "status".into(),
                reason: format!(
                    "expected {expected:?} for transition to {next:?}, found {:?}",
                    self.status
                ),
            });
        }
        self.status = next;
        Ok(())
    }
}
