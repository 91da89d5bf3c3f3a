use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::RecapError;
use crate::ledger::position::InvestorPosition;
use crate::types::{with_metadata, ComputationOutput, InvestorId, Money};
use crate::waterfall::definition::{Tier, TierKind, WaterfallDefinition};
use crate::RecapResult;

const CENT: Decimal = dec!(0.01);

/// Cut-off below which pro-rata residue is treated as exhausted.
const DUST: Decimal = dec!(0.0000001);

/// Tolerance on the ownership-percentage sum across an offering.
const OWNERSHIP_TOLERANCE: Decimal = dec!(0.000001);

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Who a line of the allocation pays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    Investor(InvestorId),
    Sponsor,
}

/// One per-recipient, per-tier allocation amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationLine {
    pub tier_order: u32,
    pub kind: TierKind,
    pub recipient: Recipient,
    pub amount: Money,
}

/// Per-tier rollup, including zero-amount tiers so the consumption order
/// is visible in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub order: u32,
    pub kind: TierKind,
    /// Total cash consumed by this tier
    pub amount: Money,
    pub to_sponsor: Money,
    pub to_investors: Money,
    /// Cash left for lower-priority tiers after this one
    pub remaining: Money,
}

/// Full waterfall allocation for one distribution event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    pub offering_id: String,
    pub total_amount: Money,
    pub lines: Vec<AllocationLine>,
    pub tiers: Vec<TierBreakdown>,
    pub total_to_sponsor: Money,
    pub total_to_investors: Money,
}

impl AllocationResult {
    /// Sum of every allocation line; equals `total_amount` by construction.
    pub fn allocated_total(&self) -> Money {
        self.lines.iter().map(|l| l.amount).sum()
    }

    /// Total paid to one investor across all tiers.
    pub fn investor_total(&self, investor_id: &str) -> Money {
        self.lines
            .iter()
            .filter(|l| matches!(&l.recipient, Recipient::Investor(id) if id == investor_id))
            .map(|l| l.amount)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Allocate a distribution amount through an offering's waterfall.
///
/// Pure function over the position snapshot: consumes `total_amount` tier
/// by tier in priority order and returns per-recipient lines that sum to
/// `total_amount` penny-exact (largest-remainder rounding). The caller
/// commits the result to the ledger separately.
///
/// A GpCatchUp tier without its own `target_amount` requires the
/// externally computed `catch_up_target`; missing both is rejected, never
/// defaulted to zero.
pub fn allocate(
    total_amount: Money,
    positions: &[InvestorPosition],
    definition: &WaterfallDefinition,
    catch_up_target: Option<Money>,
) -> RecapResult<ComputationOutput<AllocationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // --- Validation, all before any allocation step ---
    if total_amount <= Decimal::ZERO {
        return Err(RecapError::InvalidDistributionAmount {
            amount: total_amount,
        });
    }
    definition.validate()?;
    validate_positions(positions, &definition.offering_id)?;

    let ordered = definition.ordered_tiers();
    for tier in &ordered {
        if tier.kind == TierKind::GpCatchUp
            && tier.target_amount.is_none()
            && catch_up_target.is_none()
        {
            return Err(RecapError::InvalidWaterfallDefinition(format!(
                "tier {}: GP catch-up requires an externally computed target amount",
                tier.order
            )));
        }
    }

    // --- Tier-by-tier consumption ---
    let mut remaining = total_amount;
    let mut lines: Vec<AllocationLine> = Vec::new();
    let mut tier_breakdowns: Vec<TierBreakdown> = Vec::with_capacity(ordered.len());

    for &tier in &ordered {
        let tier_lines = match tier.kind {
            TierKind::ReturnOfCapital => {
                let needs: Vec<Money> = positions
                    .iter()
                    .map(|p| payable_cents(p.unreturned_capital()))
                    .collect();
                capped_tier_lines(tier, remaining, positions, &needs, &mut warnings)
            }
            TierKind::PreferredReturn => {
                let needs: Vec<Money> = positions
                    .iter()
                    .map(|p| payable_cents(p.preferred_unpaid()))
                    .collect();
                capped_tier_lines(tier, remaining, positions, &needs, &mut warnings)
            }
            TierKind::GpCatchUp => {
                let target = resolve_catch_up_target(tier, catch_up_target, &mut warnings);
                split_tier_lines(tier, remaining.min(target).max(Decimal::ZERO), positions)
            }
            TierKind::ResidualSplit => split_tier_lines(tier, remaining, positions),
        };

        let to_sponsor: Money = tier_lines
            .iter()
            .filter(|l| l.recipient == Recipient::Sponsor)
            .map(|l| l.amount)
            .sum();
        let tier_total: Money = tier_lines.iter().map(|l| l.amount).sum();

        remaining -= tier_total;
        tier_breakdowns.push(TierBreakdown {
            order: tier.order,
            kind: tier.kind,
            amount: tier_total,
            to_sponsor,
            to_investors: tier_total - to_sponsor,
            remaining,
        });
        lines.extend(tier_lines);
    }

    let total_to_sponsor: Money = tier_breakdowns.iter().map(|t| t.to_sponsor).sum();
    let total_to_investors: Money = tier_breakdowns.iter().map(|t| t.to_investors).sum();

    let result = AllocationResult {
        offering_id: definition.offering_id.clone(),
        total_amount,
        lines,
        tiers: tier_breakdowns,
        total_to_sponsor,
        total_to_investors,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Capital Distribution Waterfall (tiered, pro-rata capped)",
        &serde_json::json!({
            "offering_id": definition.offering_id,
            "total_amount": total_amount.to_string(),
            "num_tiers": definition.tiers.len(),
            "num_positions": positions.len(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

fn validate_positions(positions: &[InvestorPosition], offering_id: &str) -> RecapResult<()> {
    let inconsistent = |reason: String| {
        Err(RecapError::LedgerInconsistency {
            offering_id: offering_id.to_string(),
            reason,
        })
    };

    if positions.is_empty() {
        return inconsistent("offering has no investor positions".into());
    }
    for p in positions {
        if let Err(reason) = p.check_invariants() {
            return inconsistent(reason);
        }
    }
    let ownership_sum: Decimal = positions.iter().map(|p| p.ownership_pct).sum();
    if (ownership_sum - Decimal::ONE).abs() > OWNERSHIP_TOLERANCE {
        return inconsistent(format!(
            "ownership percentages sum to {ownership_sum}, expected 1"
        ));
    }
    Ok(())
}

fn resolve_catch_up_target(
    tier: &Tier,
    catch_up_target: Option<Money>,
    warnings: &mut Vec<String>,
) -> Money {
    match (tier.target_amount, catch_up_target) {
        (Some(configured), Some(supplied)) if configured != supplied => {
            warnings.push(format!(
                "tier {}: configured catch-up target {configured} overrides supplied {supplied}",
                tier.order
            ));
            configured
        }
        (Some(configured), _) => configured,
        (None, Some(supplied)) => supplied,
        // unreachable: presence is validated before allocation starts
        (None, None) => Decimal::ZERO,
    }
}

/// Whole cents of an owed balance. Accrual tracks sub-cent precision, but
/// only whole cents are payable; capping tier needs at the cent floor keeps
/// cent-rounded lines from ever breaching a position's owed balance. The
/// sub-cent tail stays on the books for a later distribution.
fn payable_cents(owed: Money) -> Money {
    owed.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Lines for a capped, investors-only tier (return of capital, preferred).
///
/// Cash is spread pro-rata by ownership re-normalised across investors who
/// still have unmet need, capped per investor at that need, repeating until
/// the pool or the needs are exhausted (each pass either drains the pool or
/// fully satisfies at least one investor).
fn capped_tier_lines(
    tier: &Tier,
    pool: Money,
    positions: &[InvestorPosition],
    needs: &[Money],
    warnings: &mut Vec<String>,
) -> Vec<AllocationLine> {
    let n = positions.len();
    let mut raw = vec![Decimal::ZERO; n];
    let mut available = pool;

    loop {
        if available <= DUST {
            break;
        }
        let active: Vec<usize> = (0..n).filter(|&i| needs[i] - raw[i] > DUST).collect();
        if active.is_empty() {
            break;
        }
        let weight_sum: Decimal = active.iter().map(|&i| positions[i].ownership_pct).sum();
        if weight_sum <= Decimal::ZERO {
            warnings.push(format!(
                "tier {}: unmet need held only by zero-ownership positions; cash passes through",
                tier.order
            ));
            break;
        }

        let mut consumed = Decimal::ZERO;
        for &i in &active {
            let share = available * positions[i].ownership_pct / weight_sum;
            let take = share.min(needs[i] - raw[i]);
            raw[i] += take;
            consumed += take;
        }
        if consumed <= DUST {
            break;
        }
        available -= consumed;
    }

    let consumed_exact: Decimal = raw.iter().copied().sum();
    let tier_total = consumed_exact.round_dp(2).min(pool);
    let rounded = largest_remainder_round(&raw, tier_total);

    (0..n)
        .filter(|&i| !rounded[i].is_zero())
        .map(|i| AllocationLine {
            tier_order: tier.order,
            kind: tier.kind,
            recipient: Recipient::Investor(positions[i].investor_id.clone()),
            amount: rounded[i],
        })
        .collect()
}

/// Lines for a sponsor/investor split tier (catch-up, residual).
///
/// The sponsor takes `split_to_sponsor` of the tier amount; the balance is
/// spread across all investors pro-rata by ownership, uncapped.
fn split_tier_lines(tier: &Tier, amount: Money, positions: &[InvestorPosition]) -> Vec<AllocationLine> {
    if amount <= Decimal::ZERO {
        return Vec::new();
    }

    let sponsor_raw = amount * tier.split_to_sponsor;
    let investor_pool = amount - sponsor_raw;

    let mut raw = Vec::with_capacity(positions.len() + 1);
    raw.push(sponsor_raw);
    for p in positions {
        raw.push(investor_pool * p.ownership_pct);
    }

    // target the exact tier amount: the residual tier must absorb every
    // remaining sub-cent so the grand total stays penny-exact
    let rounded = largest_remainder_round(&raw, amount);

    let mut lines = Vec::with_capacity(rounded.len());
    if !rounded[0].is_zero() {
        lines.push(AllocationLine {
            tier_order: tier.order,
            kind: tier.kind,
            recipient: Recipient::Sponsor,
            amount: rounded[0],
        });
    }
    for (i, p) in positions.iter().enumerate() {
        if !rounded[i + 1].is_zero() {
            lines.push(AllocationLine {
                tier_order: tier.order,
                kind: tier.kind,
                recipient: Recipient::Investor(p.investor_id.clone()),
                amount: rounded[i + 1],
            });
        }
    }
    lines
}

/// Round a set of raw amounts to cents so they sum exactly to `target`.
///
/// Floor every amount to a cent, then hand out the leftover cent by cent in
/// order of largest fractional remainder; any sub-cent residue of the
/// target itself lands on the largest-remainder line.
fn largest_remainder_round(raw: &[Decimal], target: Money) -> Vec<Money> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut rounded: Vec<Decimal> = raw
        .iter()
        .map(|v| v.round_dp_with_strategy(2, RoundingStrategy::ToZero))
        .collect();

    let mut order: Vec<usize> = (0..raw.len()).collect();
    order.sort_by(|&a, &b| (raw[b] - rounded[b]).cmp(&(raw[a] - rounded[a])));

    let mut leftover = target - rounded.iter().copied().sum::<Decimal>();
    let mut cursor = 0;
    while leftover >= CENT {
        rounded[order[cursor % order.len()]] += CENT;
        leftover -= CENT;
        cursor += 1;
    }
    if leftover > Decimal::ZERO {
        rounded[order[cursor % order.len()]] += leftover;
    }

    rounded
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
