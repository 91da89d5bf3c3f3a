use pretty_assertions::assert_eq;
use recap_core::proforma::projector::{project, ProFormaAssumptions};
use recap_core::proforma::sensitivity::{sensitize, SensitivityInput};
use recap_core::RecapError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Representative acquisition: $10M purchase, 70% LTV at 6% over 30 years,
/// $700k year-1 NOI, 5-year hold, 6% exit cap.
fn underwriting() -> ProFormaAssumptions {
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

// ===========================================================================
// Projection shape and convergence
// ===========================================================================

#[test]
fn test_representative_deal_projects_and_converges() {
    let out = project(&underwriting()).unwrap();
    let model = &out.result;

    assert_eq!(model.yearly_projections.len(), 5);
    assert_eq!(model.yearly_projections[0].noi, dec!(700_000));

    // the IRR search bounds are wide; a plain stabilised deal must land
    // comfortably inside them, and never raise IrrDidNotConverge
    let irr = model.summary.irr;
    assert!(irr > dec!(-0.99) && irr < dec!(10.0), "IRR {irr} out of bounds");
    assert!(model.summary.equity_multiple > Decimal::ONE);
    assert!(model.summary.average_cash_yield > Decimal::ZERO);
}

#[test]
fn test_schedule_internal_consistency() {
    let out = project(&underwriting()).unwrap();
    let model = &out.result;

    let mut cumulative = Decimal::ZERO;
    for (i, row) in model.yearly_projections.iter().enumerate() {
        assert_eq!(row.year as usize, i + 1);
        assert_eq!(row.cash_flow, row.noi - row.debt_service);
        cumulative += row.cash_flow;
        assert_eq!(
            row.cumulative_return_pct,
            cumulative / model.equity_required * dec!(100)
        );
    }

    let exit_noi = model.yearly_projections.last().unwrap().noi;
    assert_eq!(model.exit_value, exit_noi / dec!(0.06));
    assert_eq!(
        model.net_sale_proceeds,
        model.exit_value - model.remaining_debt_balance - model.exit_value * dec!(0.02)
    );
}

// ===========================================================================
// Determinism
// ===========================================================================

#[test]
fn test_rerun_with_identical_assumptions_is_identical() {
    let first = project(&underwriting()).unwrap();
    let second = project(&underwriting()).unwrap();

    assert_eq!(first.result.summary.irr, second.result.summary.irr);
    assert_eq!(
        first.result.summary.equity_multiple,
        second.result.summary.equity_multiple
    );
    let rows_a: Vec<Decimal> = first
        .result
        .yearly_projections
        .iter()
        .map(|p| p.cash_flow)
        .collect();
    let rows_b: Vec<Decimal> = second
        .result
        .yearly_projections
        .iter()
        .map(|p| p.cash_flow)
        .collect();
    assert_eq!(rows_a, rows_b);
}

#[test]
fn test_models_are_snapshots_not_mutations() {
    // changing assumptions produces a new model; the first is untouched
    let first = project(&underwriting()).unwrap();
    let mut revised = underwriting();
    revised.exit_cap_rate = dec!(0.07);
    let second = project(&revised).unwrap();

    assert_eq!(first.result.assumptions.exit_cap_rate, dec!(0.06));
    assert!(second.result.summary.irr < first.result.summary.irr);
}

// ===========================================================================
// Failure modes
// ===========================================================================

#[test]
fn test_all_negative_stream_raises_did_not_converge() {
    let mut assumptions = underwriting();
    assumptions.year_one_noi = Some(dec!(100_000));
    assumptions.ltv = dec!(0.90);
    assumptions.exit_cap_rate = dec!(5.0);

    match project(&assumptions) {
        Err(RecapError::IrrDidNotConverge { lower, upper }) => {
            assert_eq!(lower, dec!(-0.99));
            assert_eq!(upper, dec!(10.0));
        }
        other => panic!("Expected IrrDidNotConverge, got {other:?}"),
    }
}

#[test]
fn test_missing_noi_source_is_invalid_input() {
    let mut assumptions = underwriting();
    assumptions.year_one_noi = None;
    assumptions.entry_cap_rate = None;
    assert!(matches!(
        project(&assumptions),
        Err(RecapError::InvalidInput { .. })
    ));
}

// ===========================================================================
// Sensitivity grid
// ===========================================================================

#[test]
fn test_three_by_three_grid_completes() {
    let input = SensitivityInput {
        base: underwriting(),
        exit_cap_rates: vec![dec!(0.055), dec!(0.06), dec!(0.065)],
        rent_growth_rates: vec![dec!(0.01), dec!(0.02), dec!(0.03)],
    };
    let out = sensitize(&input).unwrap();
    let matrix = &out.result.irr_matrix;

    assert_eq!(matrix.len(), 3);
    assert!(matrix.iter().all(|row| row.len() == 3));
    assert!(matrix.iter().flatten().all(|cell| cell.is_some()));
    assert_eq!(out.result.failed_cells, 0);

    // richer exit (lower cap) and faster rent growth both lift IRR
    assert!(matrix[0][2].unwrap() > matrix[2][0].unwrap());
}

#[test]
fn test_base_case_cell_matches_standalone_projection() {
    let base_irr = project(&underwriting()).unwrap().result.summary.irr;
    let input = SensitivityInput {
        base: underwriting(),
        exit_cap_rates: vec![dec!(0.06)],
        rent_growth_rates: vec![dec!(0.03)],
    };
    let out = sensitize(&input).unwrap();
    assert_eq!(out.result.irr_matrix[0][0], Some(base_irr));
}

#[test]
fn test_diverging_cell_is_null_not_fatal() {
    let input = SensitivityInput {
        base: underwriting(),
        exit_cap_rates: vec![dec!(0.06), dec!(5.0)],
        rent_growth_rates: vec![dec!(0.03)],
    };
    let out = sensitize(&input).unwrap();
    assert!(out.result.irr_matrix[0][0].is_some());
    assert!(out.result.irr_matrix[1][0].is_none());
    assert_eq!(out.result.failed_cells, 1);
}
