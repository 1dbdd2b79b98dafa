// src/main.rs

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use miso_enrich::isotopes::registry::nuc_id_to_isotope;
use miso_enrich::{parse_input_deck, CascadeResult, EnrichmentCalculator, EnrichmentOutput};

/// CLI arguments for the cascade calculator.
#[derive(Debug, Parser)]
#[command(name = "miso-enrich")]
#[command(about = "Multi-isotope uranium enrichment cascade calculator", long_about = None)]
struct Args {
    /// Path to the YAML input deck.
    deck: String,

    /// Timestep at which the SWU schedule is evaluated (overrides the deck).
    #[arg(long)]
    timestep: Option<u32>,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Yaml,
}

/// Initialise the tracing subscriber on stderr so that stdout only carries results.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

fn run(args: &Args) -> CascadeResult<()> {
    let mut deck = parse_input_deck(&args.deck)?;
    if let Some(timestep) = args.timestep {
        deck.timestep = timestep;
    }
    let params = deck.cascade_parameters()?;
    info!(deck = %args.deck, timestep = deck.timestep, "solving cascade");

    let calc = EnrichmentCalculator::new(params)?;
    let output = calc.enrichment_output()?;
    info!(binding = ?calc.binding_constraint(), "cascade designed");

    match args.format {
        OutputFormat::Text => print_table(&output),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&output)?),
    }
    Ok(())
}

fn print_table(output: &EnrichmentOutput) {
    println!("Enriching stages   {:>14}", output.n_enriching.to_string());
    println!("Stripping stages   {:>14}", output.n_stripping.to_string());
    println!("Feed used          {:>14.6} kg", output.feed_used);
    println!("Product produced   {:>14.6} kg", output.product_produced);
    println!("Tails produced     {:>14.6} kg", output.tails_produced);
    println!("SWU used           {:>14.6} kg SWU", output.swu_used);
    println!();
    println!("{:<8} {:>16} {:>16}", "Isotope", "Product", "Tails");
    let nuclides = output
        .product_composition
        .keys()
        .chain(output.tails_composition.keys())
        .copied()
        .collect::<std::collections::BTreeSet<_>>();
    for nuc in nuclides {
        let label = match nuc_id_to_isotope(nuc) {
            Ok(mass_number) => format!("U-{}", mass_number),
            Err(_) => nuc.to_string(),
        };
        let product = output.product_composition.get(&nuc).copied().unwrap_or(0.0);
        let tails = output.tails_composition.get(&nuc).copied().unwrap_or(0.0);
        println!("{:<8} {:>16.8e} {:>16.8e}", label, product, tails);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("miso-enrich: {}", e);
            ExitCode::FAILURE
        }
    }
}
