use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use recap_core::proforma::projector::{self, ProFormaAssumptions};
use recap_core::proforma::sensitivity::{self, SensitivityInput};

use crate::input;

/// Arguments for pro-forma projection
#[derive(Args)]
pub struct ProformaArgs {
    /// Path to a JSON or YAML assumptions file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_proforma(args: ProformaArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let assumptions: ProFormaAssumptions = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json|file.yaml> or stdin required for pro-forma".into());
    };

    let result = projector::project(&assumptions)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to base-case assumptions (JSON or YAML)
    #[arg(long)]
    pub base: String,

    /// Exit cap rates to sweep (comma-separated, e.g. "0.05,0.055,0.06")
    #[arg(long, value_delimiter = ',')]
    pub exit_caps: Vec<Decimal>,

    /// Rent growth rates to sweep (comma-separated, e.g. "0.01,0.02,0.03")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub rent_growth: Vec<Decimal>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let base: ProFormaAssumptions = input::file::read_document(&args.base)?;

    let sens_input = SensitivityInput {
        base,
        exit_cap_rates: args.exit_caps,
        rent_growth_rates: args.rent_growth,
    };

    let result = sensitivity::sensitize(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}
