mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::ledger::AccrueArgs;
use commands::proforma::{ProformaArgs, SensitivityArgs};
use commands::waterfall::AllocateArgs;

/// Distribution waterfall and underwriting analytics
#[derive(Parser)]
#[command(
    name = "recap",
    version,
    about = "Capital distribution waterfalls and pro-forma returns for real-estate syndications",
    long_about = "Compute tier-by-tier distribution waterfalls, preferred-return accrual, \
                  yearly pro-forma cash flow schedules with IRR and equity multiple, and \
                  exit-cap/rent-growth sensitivity grids, all with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate a distribution amount through an offering's waterfall
    Allocate(AllocateArgs),
    /// Accrue preferred return on an investor position to a date
    Accrue(AccrueArgs),
    /// Project yearly cash flow, IRR and equity multiple from assumptions
    Proforma(ProformaArgs),
    /// IRR sensitivity grid over exit cap rate and rent growth
    Sensitivity(SensitivityArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Allocate(args) => commands::waterfall::run_allocate(args),
        Commands::Accrue(args) => commands::ledger::run_accrue(args),
        Commands::Proforma(args) => commands::proforma::run_proforma(args),
        Commands::Sensitivity(args) => commands::proforma::run_sensitivity(args),
        Commands::Version => {
            println!("recap {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
