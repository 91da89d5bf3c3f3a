pub mod engine;
pub mod event;

pub use engine::{DistributionEngine, OfferingGuard};
pub use event::{DistributionEvent, DistributionStatus};
