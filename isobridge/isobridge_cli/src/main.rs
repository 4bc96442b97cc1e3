use anyhow::Result;
use clap::{Parser, Subcommand};

mod bridge;
mod commands;

use commands::domains::DomainsArgs;
use commands::inspect::InspectArgs;

/// Isobridge host simulator
///
/// Drives the bridge through its exported functions the way a native host
/// does.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bridge version and component
    Version,

    /// Create isolation domains and optionally unload them
    Domains(DomainsArgs),

    /// List the objects of a bundle
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            let rt = isobridge_ffi::runtime()?;
            println!(
                "isobridge {}",
                bridge::version().unwrap_or_else(|| "unknown".to_string())
            );
            println!("component: {}", rt.config().component_type);
            println!("exports: {}", rt.root().exports().len());
        }
        Commands::Domains(args) => commands::domains::execute(&args)?,
        Commands::Inspect(args) => commands::inspect::execute(&args)?,
    }
    Ok(())
}
