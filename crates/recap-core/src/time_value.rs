use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::RecapError;
use crate::types::{Money, Rate};
use crate::RecapResult;

/// Convergence tolerance on the bisection interval width.
const IRR_TOLERANCE: Decimal = dec!(0.000001);

/// Search bounds for the IRR root. Rates outside this range are not
/// meaningful for real-asset cash flow streams.
const IRR_LOWER_BOUND: Decimal = dec!(-0.99);
const IRR_UPPER_BOUND: Decimal = dec!(10.0);

/// Number of segments used to scan the bounds for a sign change.
const IRR_SCAN_STEPS: u32 = 50;

const MAX_BISECTION_ITERATIONS: u32 = 100;

/// Net Present Value of a series of periodic cash flows.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> RecapResult<Money> {
    if rate <= dec!(-1) {
        return Err(RecapError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        if discount.is_zero() {
            return Err(RecapError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result += cf / discount;
    }

    Ok(result)
}

/// Internal Rate of Return by sign-change scan plus bisection.
///
/// Solves NPV(r) = 0 on [-0.99, 10.0] to 1e-6. No closed form exists for
/// irregular streams, and Newton's method diverges on the flat tails these
/// equity cash flows produce, so the root is bracketed first; if no sign
/// change exists in the bounds (e.g. all flows negative) the stream has no
/// meaningful IRR and `IrrDidNotConverge` is returned.
pub fn irr(cash_flows: &[Money]) -> RecapResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(RecapError::InvalidInput {
            field: "cash_flows".into(),
            reason: "IRR requires at least 2 cash flows".into(),
        });
    }

    let step = (IRR_UPPER_BOUND - IRR_LOWER_BOUND) / Decimal::from(IRR_SCAN_STEPS);

    let mut lo = IRR_LOWER_BOUND;
    let mut f_lo = npv_signed(lo, cash_flows);
    let mut bracket: Option<(Decimal, Decimal, Decimal)> = None;

    for i in 1..=IRR_SCAN_STEPS {
        let hi = if i == IRR_SCAN_STEPS {
            IRR_UPPER_BOUND
        } else {
            IRR_LOWER_BOUND + step * Decimal::from(i)
        };
        let f_hi = npv_signed(hi, cash_flows);

        if f_lo.is_zero() {
            return Ok(lo);
        }
        if (f_lo.is_sign_negative() && f_hi.is_sign_positive())
            || (f_lo.is_sign_positive() && f_hi.is_sign_negative())
            || f_hi.is_zero()
        {
            bracket = Some((lo, hi, f_lo));
            break;
        }

        lo = hi;
        f_lo = f_hi;
    }

    let (mut lo, mut hi, f_lo) = match bracket {
        Some(b) => b,
        None => {
            return Err(RecapError::IrrDidNotConverge {
                lower: IRR_LOWER_BOUND,
                upper: IRR_UPPER_BOUND,
            })
        }
    };

    let lo_is_negative = f_lo.is_sign_negative();

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let f_mid = npv_signed(mid, cash_flows);

        if f_mid.is_zero() || (hi - lo) < IRR_TOLERANCE {
            return Ok(mid);
        }

        if f_mid.is_sign_negative() == lo_is_negative {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Ok((lo + hi) / dec!(2))
}

/// NPV sign-equivalent evaluation that stays inside Decimal's range across
/// the whole search interval.
///
/// Near r = -1 the discount factors 1/(1+r)^t underflow, so the terminal
/// value form sum(CF_t * (1+r)^(n-t)) is used there instead; it shares the
/// sign of NPV because (1+r)^n > 0 for r > -1.
fn npv_signed(rate: Rate, cash_flows: &[Money]) -> Decimal {
    let one_plus_r = Decimal::ONE + rate;
    let n = cash_flows.len() - 1;

    if rate >= dec!(-0.5) {
        let mut result = Decimal::ZERO;
        let mut discount = Decimal::ONE;
        for (t, cf) in cash_flows.iter().enumerate() {
            if t > 0 {
                discount *= one_plus_r;
            }
            if !discount.is_zero() {
                result += cf / discount;
            }
        }
        result
    } else {
        // compound factors are all <= 1 here, so no overflow
        let mut result = Decimal::ZERO;
        let mut factor = Decimal::ONE;
        for (t, cf) in cash_flows.iter().enumerate().rev() {
            if t < n {
                factor *= one_plus_r;
            }
            result += cf * factor;
        }
        result
    }
}

/// Fixed-payment mortgage payment per period: P * r(1+r)^n / ((1+r)^n - 1).
///
/// A zero rate degrades to straight-line repayment.
pub fn pmt(rate_per_period: Rate, periods: u32, principal: Money) -> RecapResult<Money> {
    if periods == 0 {
        return Err(RecapError::InvalidInput {
            field: "periods".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }
    if rate_per_period < Decimal::ZERO {
        return Err(RecapError::InvalidInput {
            field: "rate_per_period".into(),
            reason: "Period rate cannot be negative".into(),
        });
    }

    if rate_per_period.is_zero() {
        return Ok(principal / Decimal::from(periods));
    }

    let mut compound = Decimal::ONE;
    for _ in 0..periods {
        compound *= Decimal::ONE + rate_per_period;
    }

    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(RecapError::DivisionByZero {
            context: "mortgage payment denominator".into(),
        });
    }

    Ok(principal * rate_per_period * compound / denominator)
}
