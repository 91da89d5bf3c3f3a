use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::Value;

use recap_core::ledger::InvestorPosition;
use recap_core::waterfall::{allocate, WaterfallDefinition};

use crate::input;

/// Arguments for waterfall allocation
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to a JSON or YAML request file (see `AllocateRequest`)
    #[arg(long)]
    pub input: Option<String>,

    /// Externally computed GP catch-up target; overrides the request field
    #[arg(long)]
    pub catch_up_target: Option<Decimal>,

    /// Sponsor share of the residual tier when the request carries no
    /// waterfall definition and a standard one is synthesised
    #[arg(long)]
    pub standard_split: Option<Decimal>,
}

/// Allocation request: the position snapshot plus either a full waterfall
/// definition or just an offering id (a standard ROC/preferred/residual
/// waterfall is then built from `--standard-split`).
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub total_amount: Decimal,
    pub positions: Vec<InvestorPosition>,
    #[serde(default)]
    pub definition: Option<WaterfallDefinition>,
    #[serde(default)]
    pub offering_id: Option<String>,
    #[serde(default)]
    pub catch_up_target: Option<Decimal>,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: AllocateRequest = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json|file.yaml> or stdin required for allocation".into());
    };

    let definition = match request.definition {
        Some(definition) => definition,
        None => {
            let offering_id = request
                .offering_id
                .ok_or("request needs either a definition or an offering_id")?;
            let split = args.standard_split.unwrap_or(dec!(0.20));
            WaterfallDefinition::standard(offering_id, split)
        }
    };

    let catch_up_target = args.catch_up_target.or(request.catch_up_target);
    let result = allocate(
        request.total_amount,
        &request.positions,
        &definition,
        catch_up_target,
    )?;
    Ok(serde_json::to_value(result)?)
}
