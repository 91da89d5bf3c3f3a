use napi::Result as NapiResult;
use napi_derive::napi;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Waterfall
// ---------------------------------------------------------------------------

/// Request shape for a distribution allocation from the web tier.
#[derive(serde::Deserialize)]
struct AllocationRequest {
    total_amount: rust_decimal::Decimal,
    positions: Vec<recap_core::ledger::InvestorPosition>,
    definition: recap_core::waterfall::WaterfallDefinition,
    catch_up_target: Option<rust_decimal::Decimal>,
}

#[napi]
pub fn allocate_distribution(input_json: String) -> NapiResult<String> {
    let request: AllocationRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = recap_core::waterfall::allocate(
        request.total_amount,
        &request.positions,
        &request.definition,
        request.catch_up_target,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Preferred accrual
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct AccrualRequest {
    position: recap_core::ledger::InvestorPosition,
    as_of: chrono::NaiveDate,
    #[serde(default)]
    compounding: recap_core::ledger::Compounding,
}

#[napi]
pub fn accrue_preferred(input_json: String) -> NapiResult<String> {
    let request: AccrualRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let updated = recap_core::ledger::accrue_preferred_with(
        &request.position,
        request.as_of,
        request.compounding,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&updated).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Pro-Forma
// ---------------------------------------------------------------------------

#[napi]
pub fn project_pro_forma(input_json: String) -> NapiResult<String> {
    let input: recap_core::proforma::ProFormaAssumptions =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = recap_core::proforma::project(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn sensitivity_matrix(input_json: String) -> NapiResult<String> {
    let input: recap_core::proforma::SensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = recap_core::proforma::sensitize(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
