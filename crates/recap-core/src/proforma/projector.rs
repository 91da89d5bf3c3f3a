use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::RecapError;
use crate::time_value;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::RecapResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Underwriting assumptions for a pro-forma projection.
///
/// Year-1 NOI comes from `year_one_noi` when supplied, otherwise it is
/// derived as `purchase_price * entry_cap_rate`; at least one of the two is
/// required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProFormaAssumptions {
    pub purchase_price: Money,
    /// Closing/diligence costs as a fraction of purchase price
    pub acquisition_cost_pct: Rate,
    pub ltv: Rate,
    /// Annual fixed interest rate on the acquisition loan
    pub interest_rate: Rate,
    pub amortization_years: u32,
    pub hold_period_years: u32,
    pub rent_growth_pct: Rate,
    pub expense_growth_pct: Rate,
    pub vacancy_pct: Rate,
    /// Operating expenses as a share of gross revenue; weights the expense
    /// growth leg of the blended NOI growth rate
    pub operating_expense_ratio: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_cap_rate: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_one_noi: Option<Money>,
    pub exit_cap_rate: Rate,
    /// Broker/transfer costs at sale, as a fraction of exit value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition_cost_pct: Option<Rate>,
}

/// One year of the projected cash-flow schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlyProjection {
    pub year: u32,
    pub noi: Money,
    pub debt_service: Money,
    pub cash_flow: Money,
    /// Cumulative cash distributed over equity required, in percent
    pub cumulative_return_pct: Decimal,
}

/// Headline return metrics for the hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProFormaSummary {
    pub irr: Rate,
    pub equity_multiple: Multiple,
    /// Mean annual cash-on-cash yield over the hold
    pub average_cash_yield: Rate,
}

/// Immutable pro-forma snapshot. Re-running with changed assumptions
/// produces a new model; a saved model backing an investor memo is never
/// mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProFormaModel {
    pub assumptions: ProFormaAssumptions,
    pub yearly_projections: Vec<YearlyProjection>,
    pub loan_amount: Money,
    pub equity_required: Money,
    pub exit_value: Money,
    pub remaining_debt_balance: Money,
    pub net_sale_proceeds: Money,
    pub summary: ProFormaSummary,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project the yearly cash-flow schedule and hold-level returns for a set
/// of acquisition/financing/operating/exit assumptions.
pub fn project(
    assumptions: &ProFormaAssumptions,
) -> RecapResult<ComputationOutput<ProFormaModel>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(assumptions, &mut warnings)?;

    let loan_amount = assumptions.purchase_price * assumptions.ltv;
    let equity_required =
        assumptions.purchase_price * (Decimal::ONE + assumptions.acquisition_cost_pct)
            - loan_amount;
    if equity_required <= Decimal::ZERO {
        return Err(RecapError::InvalidInput {
            field: "ltv".into(),
            reason: "financing structure leaves no equity requirement".into(),
        });
    }

    // --- Debt service ---
    let months = assumptions.amortization_years * 12;
    let monthly_payment = if loan_amount.is_zero() {
        Decimal::ZERO
    } else {
        time_value::pmt(assumptions.interest_rate / dec!(12), months, loan_amount)?
    };
    let annual_debt_service = monthly_payment * dec!(12);

    // --- Yearly NOI / cash flow schedule ---
    let noi_year_one = first_year_noi(assumptions, &mut warnings)?;
    let blended_growth = blended_noi_growth(assumptions)?;

    let hold = assumptions.hold_period_years;
    let mut yearly_projections = Vec::with_capacity(hold as usize);
    let mut noi = noi_year_one;
    let mut cumulative_cash = Decimal::ZERO;

    for year in 1..=hold {
        if year > 1 {
            noi *= Decimal::ONE + blended_growth;
        }
        let cash_flow = noi - annual_debt_service;
        cumulative_cash += cash_flow;

        if year == 1 && !annual_debt_service.is_zero() {
            let dscr = noi / annual_debt_service;
            if dscr < dec!(1.2) {
                warnings.push(format!(
                    "Year-1 DSCR of {dscr:.2} is below 1.20x — lender covenant risk"
                ));
            }
        }

        yearly_projections.push(YearlyProjection {
            year,
            noi,
            debt_service: annual_debt_service,
            cash_flow,
            cumulative_return_pct: cumulative_cash / equity_required * dec!(100),
        });
    }

    // --- Exit ---
    let exit_noi = yearly_projections
        .last()
        .map(|p| p.noi)
        .unwrap_or(noi_year_one);
    let exit_value = exit_noi / assumptions.exit_cap_rate;
    let disposition_costs =
        exit_value * assumptions.disposition_cost_pct.unwrap_or(Decimal::ZERO);
    let remaining_debt_balance =
        remaining_balance(loan_amount, assumptions.interest_rate, monthly_payment, hold * 12);
    let net_sale_proceeds = exit_value - remaining_debt_balance - disposition_costs;

    if net_sale_proceeds < Decimal::ZERO {
        warnings.push(format!(
            "Net sale proceeds of {net_sale_proceeds:.0} are negative — exit value does not cover debt"
        ));
    }

    // --- Returns ---
    let mut flows: Vec<Money> = Vec::with_capacity(hold as usize + 1);
    flows.push(-equity_required);
    for p in &yearly_projections {
        flows.push(p.cash_flow);
    }
    if let Some(last) = flows.last_mut() {
        *last += net_sale_proceeds;
    }

    let irr = time_value::irr(&flows)?;

    let total_cash: Money = yearly_projections.iter().map(|p| p.cash_flow).sum();
    let equity_multiple = (total_cash + net_sale_proceeds) / equity_required;
    let average_cash_yield = total_cash / equity_required / Decimal::from(hold);

    let model = ProFormaModel {
        assumptions: assumptions.clone(),
        yearly_projections,
        loan_amount,
        equity_required,
        exit_value,
        remaining_debt_balance,
        net_sale_proceeds,
        summary: ProFormaSummary {
            irr,
            equity_multiple,
            average_cash_yield,
        },
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Pro-Forma Return Projection (levered, direct-cap exit)",
        assumptions,
        warnings,
        elapsed,
        model,
    ))
}

/// Blended NOI growth netting rent growth against expense growth and
/// vacancy: with expense ratio e and vacancy v,
/// g = ((1+g_rent)(1-v) - e(1+g_exp)) / ((1-v) - e) - 1.
fn blended_noi_growth(assumptions: &ProFormaAssumptions) -> RecapResult<Rate> {
    let v = assumptions.vacancy_pct;
    let e = assumptions.operating_expense_ratio;
    let margin = (Decimal::ONE - v) - e;

    if margin <= Decimal::ZERO {
        return Err(RecapError::InvalidInput {
            field: "operating_expense_ratio".into(),
            reason: "vacancy and expense ratio leave no operating margin".into(),
        });
    }

    let numerator = (Decimal::ONE + assumptions.rent_growth_pct) * (Decimal::ONE - v)
        - e * (Decimal::ONE + assumptions.expense_growth_pct);
    Ok(numerator / margin - Decimal::ONE)
}

fn first_year_noi(
    assumptions: &ProFormaAssumptions,
    warnings: &mut Vec<String>,
) -> RecapResult<Money> {
    let noi = match (assumptions.year_one_noi, assumptions.entry_cap_rate) {
        (Some(noi), Some(_)) => {
            warnings.push(
                "Both year_one_noi and entry_cap_rate supplied; using year_one_noi".into(),
            );
            noi
        }
        (Some(noi), None) => noi,
        (None, Some(cap)) => assumptions.purchase_price * cap,
        (None, None) => {
            return Err(RecapError::InvalidInput {
                field: "year_one_noi".into(),
                reason: "either year_one_noi or entry_cap_rate is required".into(),
            })
        }
    };

    if noi <= Decimal::ZERO {
        return Err(RecapError::InvalidInput {
            field: "year_one_noi".into(),
            reason: "year-1 NOI must be positive".into(),
        });
    }
    Ok(noi)
}

/// Outstanding loan balance after `payments_made` monthly payments.
fn remaining_balance(
    loan_amount: Money,
    annual_rate: Rate,
    monthly_payment: Money,
    payments_made: u32,
) -> Money {
    if loan_amount.is_zero() {
        return Decimal::ZERO;
    }

    let monthly_rate = annual_rate / dec!(12);
    let mut balance = loan_amount;
    for _ in 0..payments_made {
        let interest = balance * monthly_rate;
        let principal = monthly_payment - interest;
        balance -= principal;
        if balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
    }
    balance
}

pub(crate) fn validate(
    assumptions: &ProFormaAssumptions,
    warnings: &mut Vec<String>,
) -> RecapResult<()> {
    let invalid = |field: &str, reason: &str| {
        Err(RecapError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        })
    };

    if assumptions.purchase_price <= Decimal::ZERO {
        return invalid("purchase_price", "Purchase price must be positive");
    }
    if assumptions.acquisition_cost_pct < Decimal::ZERO {
        return invalid("acquisition_cost_pct", "Acquisition costs cannot be negative");
    }
    if assumptions.ltv < Decimal::ZERO || assumptions.ltv >= Decimal::ONE {
        return invalid("ltv", "LTV must be within [0, 1)");
    }
    if assumptions.interest_rate < Decimal::ZERO {
        return invalid("interest_rate", "Interest rate cannot be negative");
    }
    if assumptions.ltv > Decimal::ZERO && assumptions.amortization_years == 0 {
        return invalid("amortization_years", "Amortization must be at least 1 year");
    }
    if assumptions.hold_period_years == 0 {
        return invalid("hold_period_years", "Holding period must be at least 1 year");
    }
    if assumptions.rent_growth_pct <= dec!(-1) || assumptions.expense_growth_pct <= dec!(-1) {
        return invalid("rent_growth_pct", "Growth rates must exceed -100%");
    }
    if assumptions.vacancy_pct < Decimal::ZERO || assumptions.vacancy_pct >= Decimal::ONE {
        return invalid("vacancy_pct", "Vacancy must be within [0, 1)");
    }
    if assumptions.operating_expense_ratio < Decimal::ZERO
        || assumptions.operating_expense_ratio >= Decimal::ONE
    {
        return invalid("operating_expense_ratio", "Expense ratio must be within [0, 1)");
    }
    if assumptions.exit_cap_rate <= Decimal::ZERO {
        return invalid("exit_cap_rate", "Exit cap rate must be positive");
    }
    if let Some(cap) = assumptions.entry_cap_rate {
        if cap <= Decimal::ZERO {
            return invalid("entry_cap_rate", "Entry cap rate must be positive");
        }
    }
    if let Some(pct) = assumptions.disposition_cost_pct {
        if pct < Decimal::ZERO || pct >= Decimal::ONE {
            return invalid("disposition_cost_pct", "Disposition costs must be within [0, 1)");
        }
    }

    if assumptions.ltv > dec!(0.80) {
        warnings.push(format!(
            "LTV of {:.1}% exceeds 80% — high leverage",
            assumptions.ltv * dec!(100)
        ));
    }
    if assumptions.exit_cap_rate < dec!(0.03) {
        warnings.push(format!(
            "Exit cap rate {} is below 3% — unusually low, verify market data",
            assumptions.exit_cap_rate
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// $10M purchase, 70% LTV at 6% over 30 years, $700k year-1 NOI,
    /// 5-year hold, 6% exit cap.
    fn sample_assumptions() -> ProFormaAssumptions {
        ProFormaAssumptions {
            purchase_price: dec!(10_000_000),
            acquisition_cost_pct: dec!(0.02),
            ltv: dec!(0.70),
            interest_rate: dec!(0.06),
            amortization_years: 30,
            hold_period_years: 5,
            rent_growth_pct: dec!(0.03),
            expense_growth_pct: dec!(0.02),
            vacancy_pct: dec!(0.05),
            operating_expense_ratio: dec!(0.35),
            entry_cap_rate: None,
            year_one_noi: Some(dec!(700_000)),
            exit_cap_rate: dec!(0.06),
            disposition_cost_pct: Some(dec!(0.02)),
        }
    }

    #[test]
    fn test_five_year_schedule() {
        let out = project(&sample_assumptions()).unwrap();
        let model = &out.result;

        assert_eq!(model.yearly_projections.len(), 5);
        assert_eq!(model.yearly_projections[0].noi, dec!(700_000));
        assert_eq!(model.loan_amount, dec!(7_000_000));
        // equity = 10M * 1.02 - 7M = 3.2M
        assert_eq!(model.equity_required, dec!(3_200_000));

        // NOI grows each year at the blended rate
        for pair in model.yearly_projections.windows(2) {
            assert!(pair[1].noi > pair[0].noi);
        }
    }

    #[test]
    fn test_debt_service_constant_and_positive() {
        let out = project(&sample_assumptions()).unwrap();
        let model = &out.result;

        let ds = model.yearly_projections[0].debt_service;
        // $7M at 6%/30yr is roughly $503.7k/yr
        assert!(ds > dec!(500_000) && ds < dec!(507_000), "debt service {ds}");
        assert!(model
            .yearly_projections
            .iter()
            .all(|p| p.debt_service == ds));
        assert!(model
            .yearly_projections
            .iter()
            .all(|p| p.cash_flow == p.noi - ds));
    }

    #[test]
    fn test_exit_block() {
        let out = project(&sample_assumptions()).unwrap();
        let model = &out.result;

        let exit_noi = model.yearly_projections.last().unwrap().noi;
        assert_eq!(model.exit_value, exit_noi / dec!(0.06));

        // ~5 years of amortization paid down some principal
        assert!(model.remaining_debt_balance < dec!(7_000_000));
        assert!(model.remaining_debt_balance > dec!(6_000_000));

        let disposition = model.exit_value * dec!(0.02);
        assert_eq!(
            model.net_sale_proceeds,
            model.exit_value - model.remaining_debt_balance - disposition
        );
    }

    #[test]
    fn test_irr_converges_in_sane_range() {
        let out = project(&sample_assumptions()).unwrap();
        let irr = out.result.summary.irr;
        assert!(irr > dec!(-0.99) && irr < dec!(10), "IRR {irr} out of range");
        // a healthy levered deal at these numbers lands well above zero
        assert!(irr > dec!(0.05), "IRR {irr} implausibly low");
    }

    #[test]
    fn test_equity_multiple_consistent_with_flows() {
        let out = project(&sample_assumptions()).unwrap();
        let model = &out.result;

        let total_cash: Decimal = model.yearly_projections.iter().map(|p| p.cash_flow).sum();
        let expected = (total_cash + model.net_sale_proceeds) / model.equity_required;
        assert_eq!(model.summary.equity_multiple, expected);
        assert!(model.summary.equity_multiple > Decimal::ONE);
    }

    #[test]
    fn test_cumulative_return_is_monotonic_for_positive_flows() {
        let out = project(&sample_assumptions()).unwrap();
        let rows = &out.result.yearly_projections;
        for pair in rows.windows(2) {
            assert!(pair[1].cumulative_return_pct > pair[0].cumulative_return_pct);
        }
    }

    #[test]
    fn test_determinism() {
        let a = project(&sample_assumptions()).unwrap();
        let b = project(&sample_assumptions()).unwrap();
        assert_eq!(a.result.summary.irr, b.result.summary.irr);
        assert_eq!(a.result.summary.equity_multiple, b.result.summary.equity_multiple);
    }

    #[test]
    fn test_entry_cap_rate_derivation() {
        let mut assumptions = sample_assumptions();
        assumptions.year_one_noi = None;
        assumptions.entry_cap_rate = Some(dec!(0.07));
        let out = project(&assumptions).unwrap();
        assert_eq!(out.result.yearly_projections[0].noi, dec!(700_000));
    }

    #[test]
    fn test_noi_source_required() {
        let mut assumptions = sample_assumptions();
        assumptions.year_one_noi = None;
        assumptions.entry_cap_rate = None;
        assert!(project(&assumptions).is_err());
    }

    #[test]
    fn test_both_noi_sources_warns() {
        let mut assumptions = sample_assumptions();
        assumptions.entry_cap_rate = Some(dec!(0.07));
        let out = project(&assumptions).unwrap();
        assert_eq!(out.result.yearly_projections[0].noi, dec!(700_000));
        assert!(out.warnings.iter().any(|w| w.contains("year_one_noi")));
    }

    #[test]
    fn test_unlevered_deal() {
        let mut assumptions = sample_assumptions();
        assumptions.ltv = Decimal::ZERO;
        let out = project(&assumptions).unwrap();
        let model = &out.result;

        assert_eq!(model.loan_amount, Decimal::ZERO);
        assert_eq!(model.remaining_debt_balance, Decimal::ZERO);
        assert!(model
            .yearly_projections
            .iter()
            .all(|p| p.debt_service.is_zero() && p.cash_flow == p.noi));
    }

    #[test]
    fn test_validation_rejections() {
        let mut a = sample_assumptions();
        a.purchase_price = Decimal::ZERO;
        assert!(project(&a).is_err());

        let mut a = sample_assumptions();
        a.ltv = dec!(1.0);
        assert!(project(&a).is_err());

        let mut a = sample_assumptions();
        a.hold_period_years = 0;
        assert!(project(&a).is_err());

        let mut a = sample_assumptions();
        a.exit_cap_rate = Decimal::ZERO;
        assert!(project(&a).is_err());

        let mut a = sample_assumptions();
        a.vacancy_pct = dec!(1.0);
        assert!(project(&a).is_err());

        let mut a = sample_assumptions();
        a.operating_expense_ratio = dec!(0.97); // no margin left after vacancy
        assert!(project(&a).is_err());
    }

    #[test]
    fn test_irr_did_not_converge_propagates() {
        // Thin NOI on heavy debt with a collapsed exit: every flow negative
        let mut a = sample_assumptions();
        a.year_one_noi = Some(dec!(100_000));
        a.ltv = dec!(0.90);
        a.exit_cap_rate = dec!(5.0);
        match project(&a) {
            Err(RecapError::IrrDidNotConverge { .. }) => {}
            other => panic!("Expected IrrDidNotConverge, got {other:?}"),
        }
    }

    #[test]
    fn test_high_leverage_warning() {
        let mut a = sample_assumptions();
        a.ltv = dec!(0.85);
        let out = project(&a).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("exceeds 80%")));
    }
}
