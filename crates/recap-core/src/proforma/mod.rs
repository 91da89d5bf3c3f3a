pub mod projector;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

pub use projector::{
    project, ProFormaAssumptions, ProFormaModel, ProFormaSummary, YearlyProjection,
};

#[cfg(feature = "sensitivity")]
pub use sensitivity::{sensitize, SensitivityInput, SensitivityOutput};
