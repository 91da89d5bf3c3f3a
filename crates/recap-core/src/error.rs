use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecapError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid distribution amount: {amount} (must be positive)")]
    InvalidDistributionAmount { amount: Decimal },

    #[error("Invalid waterfall definition: {0}")]
    InvalidWaterfallDefinition(String),

    #[error("Ledger inconsistency for offering {offering_id}: {reason}")]
    LedgerInconsistency {
        offering_id: String,
        reason: String,
    },

    #[error("IRR did not converge: no sign change of NPV found on [{lower}, {upper}]")]
    IrrDidNotConverge { lower: Decimal, upper: Decimal },

    #[error("Distribution already in flight for offering {offering_id}; retry")]
    ConcurrentDistributionConflict { offering_id: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RecapError {
    fn from(e: serde_json::Error) -> Self {
        RecapError::SerializationError(e.to_string())
    }
}
