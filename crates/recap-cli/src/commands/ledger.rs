use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde_json::Value;

use recap_core::ledger::{accrue_preferred_with, Compounding, InvestorPosition};

use crate::input;

/// Arguments for preferred-return accrual
#[derive(Args)]
pub struct AccrueArgs {
    /// Path to a JSON or YAML file holding the investor position
    #[arg(long)]
    pub input: Option<String>,

    /// Accrue through this date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: String,

    /// Accrual convention
    #[arg(long, default_value = "simple")]
    pub compounding: CompoundingArg,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CompoundingArg {
    Simple,
    Annual,
}

impl From<CompoundingArg> for Compounding {
    fn from(arg: CompoundingArg) -> Self {
        match arg {
            CompoundingArg::Simple => Compounding::Simple,
            CompoundingArg::Annual => Compounding::Annual,
        }
    }
}

pub fn run_accrue(args: AccrueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let position: InvestorPosition = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json|file.yaml> or stdin required for accrual".into());
    };

    let as_of = NaiveDate::parse_from_str(&args.as_of, "%Y-%m-%d")
        .map_err(|e| format!("--as-of must be YYYY-MM-DD: {e}"))?;

    let updated = accrue_preferred_with(&position, as_of, args.compounding.into())?;
    let increment = updated.preferred_accrued - position.preferred_accrued;
    Ok(serde_json::json!({
        "result": updated,
        "accrued_increment": increment.to_string(),
    }))
}
