use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::distribution::event::{DistributionEvent, DistributionStatus};
use crate::error::RecapError;
use crate::ledger::{accrue_preferred_with, CapitalLedger, Compounding};
use crate::types::{ComputationOutput, Money};
use crate::waterfall::allocator::{allocate, AllocationResult};
use crate::waterfall::definition::WaterfallDefinition;
use crate::RecapResult;

/// Serialised executor of distributions against per-offering ledgers.
///
/// The allocator itself is pure, but a distribution reads a ledger snapshot
/// and commits deltas, so executions on the same offering must not overlap.
/// Each offering's ledger sits behind its own mutex; an execution that finds
/// the lock held fails fast with `ConcurrentDistributionConflict` instead of
/// queueing, and the caller retries. Distinct offerings run in parallel.
pub struct DistributionEngine {
    ledgers: HashMap<String, Mutex<CapitalLedger>>,
    compounding: Compounding,
}

/// Exclusive access to one offering's ledger for the duration of a
/// multi-step flow. Dropping the guard releases the offering.
pub struct OfferingGuard<'a> {
    guard: MutexGuard<'a, CapitalLedger>,
}

impl Deref for OfferingGuard<'_> {
    type Target = CapitalLedger;

    fn deref(&self) -> &CapitalLedger {
        &self.guard
    }
}

impl DerefMut for OfferingGuard<'_> {
    fn deref_mut(&mut self) -> &mut CapitalLedger {
        &mut self.guard
    }
}

impl DistributionEngine {
    pub fn new() -> Self {
        Self::with_compounding(Compounding::Simple)
    }

    /// Engine using an explicit preferred-accrual convention for all
    /// offerings it manages.
    pub fn with_compounding(compounding: Compounding) -> Self {
        DistributionEngine {
            ledgers: HashMap::new(),
            compounding,
        }
    }

    /// Register (or replace) the ledger for an offering. The ledger is
    /// validated on the way in; an inconsistent ledger is refused.
    pub fn register_offering(&mut self, ledger: CapitalLedger) -> RecapResult<()> {
        ledger.validate()?;
        self.ledgers
            .insert(ledger.offering_id.clone(), Mutex::new(ledger));
        Ok(())
    }

    /// Take the per-offering lock, failing fast if a distribution is
    /// already in flight.
    pub fn acquire(&self, offering_id: &str) -> RecapResult<OfferingGuard<'_>> {
        let mutex = self
            .ledgers
            .get(offering_id)
            .ok_or_else(|| RecapError::InvalidInput {
                field: "offering_id".into(),
                reason: format!("unknown offering {offering_id}"),
            })?;

        match mutex.try_lock() {
            Ok(guard) => Ok(OfferingGuard { guard }),
            Err(TryLockError::WouldBlock) => Err(RecapError::ConcurrentDistributionConflict {
                offering_id: offering_id.to_string(),
            }),
            Err(TryLockError::Poisoned(_)) => Err(RecapError::LedgerInconsistency {
                offering_id: offering_id.to_string(),
                reason: "ledger lock poisoned by a panicked writer".into(),
            }),
        }
    }

    /// Current state of an offering's ledger (waits for any in-flight
    /// execution to finish).
    pub fn ledger_snapshot(&self, offering_id: &str) -> RecapResult<CapitalLedger> {
        let mutex = self
            .ledgers
            .get(offering_id)
            .ok_or_else(|| RecapError::InvalidInput {
                field: "offering_id".into(),
                reason: format!("unknown offering {offering_id}"),
            })?;
        mutex
            .lock()
            .map(|ledger| ledger.clone())
            .map_err(|_| RecapError::LedgerInconsistency {
                offering_id: offering_id.to_string(),
                reason: "ledger lock poisoned by a panicked writer".into(),
            })
    }

    /// Execute an approved distribution event: accrue preferred through the
    /// event date, allocate through the waterfall, and commit the ledger
    /// deltas, as one all-or-nothing sequence.
    ///
    /// On success the event is Completed and carries its allocations. On
    /// any failure the event is marked Failed and the ledger is untouched;
    /// a ledger partially updated by a distribution does not exist.
    pub fn execute(
        &self,
        event: &mut DistributionEvent,
        definition: &WaterfallDefinition,
        catch_up_target: Option<Money>,
    ) -> RecapResult<ComputationOutput<AllocationResult>> {
        if event.offering_id != definition.offering_id {
            return Err(RecapError::InvalidInput {
                field: "offering_id".into(),
                reason: format!(
                    "event belongs to {} but waterfall to {}",
                    event.offering_id, definition.offering_id
                ),
            });
        }
        if event.status != DistributionStatus::Approved {
            return Err(RecapError::InvalidInput {
                field: "status".into(),
                reason: format!("only an Approved event can execute, found {:?}", event.status),
            });
        }

        let mut guard = self.acquire(&event.offering_id)?;
        event.status = DistributionStatus::Processing;

        match self.run(&mut guard, event, definition, catch_up_target) {
            Ok(output) => {
                event.status = DistributionStatus::Completed;
                event.allocations = Some(output.result.clone());
                Ok(output)
            }
            Err(e) => {
                event.status = DistributionStatus::Failed;
                Err(e)
            }
        }
    }

    fn run(
        &self,
        guard: &mut OfferingGuard<'_>,
        event: &DistributionEvent,
        definition: &WaterfallDefinition,
        catch_up_target: Option<Money>,
    ) -> RecapResult<ComputationOutput<AllocationResult>> {
        // stage everything on a working copy; the shared ledger is only
        // replaced once every step has succeeded
        let mut working = guard.clone();

        for position in &mut working.positions {
            *position = accrue_preferred_with(position, event.date, self.compounding)?;
        }

        let output = allocate(
            event.total_amount,
            &working.positions,
            definition,
            catch_up_target,
        )?;

        working.apply(&output.result)?;
        **guard = working;
        Ok(output)
    }
}

impl Default for DistributionEngine {
    fn default() -> Self {
        Self::new()
    }
}
