use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::RecapError;
use crate::proforma::projector::{self, ProFormaAssumptions};
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::RecapResult;

/// Input for an exit-cap x rent-growth sensitivity sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    /// Base-case assumptions; exit cap and rent growth are overridden per cell
    pub base: ProFormaAssumptions,
    pub exit_cap_rates: Vec<Rate>,
    pub rent_growth_rates: Vec<Rate>,
}

/// IRR matrix over the scenario grid.
///
/// `irr_matrix[i][j]` is the IRR at `exit_cap_rates[i]` and
/// `rent_growth_rates[j]`; a cell whose IRR has no root in the search
/// bounds is `None` rather than failing the whole grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub exit_cap_rates: Vec<Rate>,
    pub rent_growth_rates: Vec<Rate>,
    pub irr_matrix: Vec<Vec<Option<Rate>>>,
    /// Count of cells that failed to converge
    pub failed_cells: u32,
}

/// Re-run the pro-forma projector across the Cartesian product of the two
/// scenario grids. Pure fan-out of `projector::project`; cells share no
/// state and grids are small enough to return whole.
pub fn sensitize(input: &SensitivityInput) -> RecapResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.exit_cap_rates.is_empty() || input.rent_growth_rates.is_empty() {
        return Err(RecapError::InvalidInput {
            field: "exit_cap_rates".into(),
            reason: "both scenario grids need at least one value".into(),
        });
    }
    for cap in &input.exit_cap_rates {
        if *cap <= Decimal::ZERO {
            return Err(RecapError::InvalidInput {
                field: "exit_cap_rates".into(),
                reason: format!("exit cap rate {cap} must be positive"),
            });
        }
    }
    projector::validate(&input.base, &mut Vec::new())?;

    let mut irr_matrix = Vec::with_capacity(input.exit_cap_rates.len());
    let mut failed_cells = 0u32;

    for exit_cap in &input.exit_cap_rates {
        let mut row = Vec::with_capacity(input.rent_growth_rates.len());
        for rent_growth in &input.rent_growth_rates {
            let mut scenario = input.base.clone();
            scenario.exit_cap_rate = *exit_cap;
            scenario.rent_growth_pct = *rent_growth;

            match projector::project(&scenario) {
                Ok(output) => row.push(Some(output.result.summary.irr)),
                Err(RecapError::IrrDidNotConverge { .. }) => {
                    warnings.push(format!(
                        "No IRR at exit cap {exit_cap}, rent growth {rent_growth}"
                    ));
                    failed_cells += 1;
                    row.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        irr_matrix.push(row);
    }

    let output = SensitivityOutput {
        exit_cap_rates: input.exit_cap_rates.clone(),
        rent_growth_rates: input.rent_growth_rates.clone(),
        irr_matrix,
        failed_cells,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Exit-Cap x Rent-Growth IRR Sensitivity",
        &serde_json::json!({
            "exit_cap_cells": input.exit_cap_rates.len(),
            "rent_growth_cells": input.rent_growth_rates.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> ProFormaAssumptions {
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
    fn test_matrix_dimensions() {
        let input = SensitivityInput {
            base: base(),
            exit_cap_rates: vec![dec!(0.055), dec!(0.06), dec!(0.065)],
            rent_growth_rates: vec![dec!(0.02), dec!(0.03)],
        };
        let out = sensitize(&input).unwrap();
        assert_eq!(out.result.irr_matrix.len(), 3);
        assert!(out.result.irr_matrix.iter().all(|row| row.len() == 2));
        assert_eq!(out.result.failed_cells, 0);
    }

    #[test]
    fn test_irr_monotonic_in_exit_cap() {
        // a lower exit cap means a richer sale, so IRR must fall as the
        // exit cap rises down each column
        let input = SensitivityInput {
            base: base(),
            exit_cap_rates: vec![dec!(0.05), dec!(0.06), dec!(0.07)],
            rent_growth_rates: vec![dec!(0.03)],
        };
        let out = sensitize(&input).unwrap();
        let col: Vec<Decimal> = out
            .result
            .irr_matrix
            .iter()
            .map(|row| row[0].unwrap())
            .collect();
        assert!(col[0] > col[1] && col[1] > col[2]);
    }

    #[test]
    fn test_failed_cell_does_not_abort() {
        // an absurd exit cap crushes the sale value below the loan payoff;
        // that cell has no IRR while its neighbour still does
        let input = SensitivityInput {
            base: base(),
            exit_cap_rates: vec![dec!(0.06), dec!(5.0)],
            rent_growth_rates: vec![dec!(0.03)],
        };
        let out = sensitize(&input).unwrap();
        assert!(out.result.irr_matrix[0][0].is_some());
        assert!(out.result.irr_matrix[1][0].is_none());
        assert_eq!(out.result.failed_cells, 1);
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_empty_grid_rejected() {
        let input = SensitivityInput {
            base: base(),
            exit_cap_rates: vec![],
            rent_growth_rates: vec![dec!(0.03)],
        };
        assert!(sensitize(&input).is_err());
    }

    #[test]
    fn test_non_positive_exit_cap_rejected() {
        let input = SensitivityInput {
            base: base(),
            exit_cap_rates: vec![dec!(0.06), Decimal::ZERO],
            rent_growth_rates: vec![dec!(0.03)],
        };
        assert!(sensitize(&input).is_err());
    }
}
