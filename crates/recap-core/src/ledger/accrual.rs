use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RecapError;
use crate::ledger::position::InvestorPosition;
use crate::RecapResult;

const DAYS_PER_YEAR: Decimal = dec!(365);

/// Preferred-return accrual convention.
///
/// `Simple` is the engine default. `Annual` capitalises accrued-but-unpaid
/// preferred into the accrual base at each anniversary of the funding date,
/// for deals documented with a compounding hurdle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compounding {
    #[default]
    Simple,
    Annual,
}

/// Accrue preferred return on a position up to `as_of`, simple convention.
///
/// Accrual runs on the outstanding (unreturned) capital balance from
/// `max(funded_at, last_accrual_date)` at the position's annual rate,
/// day-counted actual/365. Idempotent: a second call with the same `as_of`
/// is a no-op. Zero or negative elapsed days is a no-op, not an error.
/// A wound-down position accrues nothing.
pub fn accrue_preferred(
    position: &InvestorPosition,
    as_of: NaiveDate,
) -> RecapResult<InvestorPosition> {
    accrue_preferred_with(position, as_of, Compounding::Simple)
}

/// Accrue preferred return under an explicit compounding convention.
pub fn accrue_preferred_with(
    position: &InvestorPosition,
    as_of: NaiveDate,
    compounding: Compounding,
) -> RecapResult<InvestorPosition> {
    if let Err(reason) = position.check_invariants() {
        return Err(RecapError::LedgerInconsistency {
            offering_id: String::new(),
            reason,
        });
    }

    if position.wound_down {
        return Ok(position.clone());
    }

    let start = position
        .last_accrual_date
        .map_or(position.funded_at, |d| d.max(position.funded_at));

    let days = (as_of - start).num_days();
    if days <= 0 {
        return Ok(position.clone());
    }

    let outstanding = position.unreturned_capital();
    let rate = position.preferred_rate_annual;

    let increment = match compounding {
        Compounding::Simple => outstanding * rate * Decimal::from(days) / DAYS_PER_YEAR,
        Compounding::Annual => compound_increment(position, start, as_of, outstanding, rate)?,
    };

    let mut updated = position.clone();
    updated.preferred_accrued += increment;
    updated.last_accrual_date = Some(as_of);
    Ok(updated)
}

/// Annual-compounding accrual: walk the window segment by segment, folding
/// the unpaid preferred into the base at each funding-date anniversary.
fn compound_increment(
    position: &InvestorPosition,
    start: NaiveDate,
    as_of: NaiveDate,
    outstanding: Decimal,
    rate: Decimal,
) -> RecapResult<Decimal> {
    let opening_unpaid = position.preferred_unpaid();
    let mut capitalised_unpaid = opening_unpaid;
    let mut pending = Decimal::ZERO;
    let mut cursor = start;

    while cursor < as_of {
        let next_anniv = next_anniversary_after(position.funded_at, cursor)?;
        let segment_end = next_anniv.min(as_of);
        let seg_days = (segment_end - cursor).num_days();

        let base = outstanding + capitalised_unpaid;
        pending += base * rate * Decimal::from(seg_days) / DAYS_PER_YEAR;

        if segment_end == next_anniv {
            capitalised_unpaid += pending;
            pending = Decimal::ZERO;
        }
        cursor = segment_end;
    }

    Ok(capitalised_unpaid - opening_unpaid + pending)
}

/// First anniversary of `funded` strictly after `cursor`.
fn next_anniversary_after(funded: NaiveDate, cursor: NaiveDate) -> RecapResult<NaiveDate> {
    use chrono::Datelike;

    let mut k = (cursor.year() - funded.year()).max(0) as u32;
    loop {
        let anniv = funded
            .checked_add_months(Months::new(12 * k))
            .ok_or_else(|| RecapError::DateError("anniversary out of range".into()))?;
        if anniv > cursor {
            return Ok(anniv);
        }
        k += 1;
    }
}
