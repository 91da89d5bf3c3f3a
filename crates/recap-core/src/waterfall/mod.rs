pub mod allocator;
pub mod definition;

pub use allocator::{allocate, AllocationLine, AllocationResult, Recipient, TierBreakdown};
pub use definition::{Tier, TierKind, WaterfallDefinition};
