pub mod error;
pub mod time_value;
pub mod types;

pub mod ledger;

pub mod waterfall;

pub mod distribution;

#[cfg(feature = "proforma")]
pub mod proforma;

pub use error::RecapError;
pub use types::*;

/// Standard result type for all engine operations
pub type RecapResult<T> = Result<T, RecapError>;
