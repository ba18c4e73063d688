//! `wafermap` — command-line interface for the wafermap compiler.
//!
//! ```text
//! USAGE:
//!   wafermap map --network net.json --manifest wafer.json -o results.bin.gz
//!   wafermap inspect results.bin.gz
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wafermap_bio::BioGraph;
use wafermap_chip::Wafer;
use wafermap_core::{MapperConfig, Results};
use wafermap_core::pipeline::Mapper;
use wafermap_hal::ResourceManifest;

#[derive(Parser)]
#[command(name = "wafermap", about = "Neuromorphic wafer mapping compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Map a biological network onto the wafer and save the results.
    Map {
        /// Network description (JSON).
        #[arg(long)]
        network: PathBuf,
        /// Resource manifest (JSON). Defaults to a full wafer 0.
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Mapper configuration (JSON). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Results output path; the extension selects the format
        /// (.json/.bin, optionally .gz).
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a summary of saved mapping results.
    Inspect {
        /// Results file written by `map`.
        results: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Cmd::Map { network, manifest, config, output } => cmd_map(&network, manifest.as_deref(), config.as_deref(), &output),
        Cmd::Inspect { results } => cmd_inspect(&results),
    }
}

fn cmd_map(
    network: &std::path::Path,
    manifest: Option<&std::path::Path>,
    config: Option<&std::path::Path>,
    output: &std::path::Path,
) -> Result<()> {
    let graph: BioGraph = read_json(network).context("reading network description")?;
    let manifest: ResourceManifest = match manifest {
        Some(path) => read_json(path).context("reading resource manifest")?,
        None => ResourceManifest::full_wafer(Wafer(0)),
    };
    let config: MapperConfig = match config {
        Some(path) => read_json(path).context("reading mapper configuration")?,
        None => MapperConfig::default(),
    };

    let mapping = Mapper::new(&config, &graph, &manifest).run()?;
    mapping.results.save(output)?;

    let stats = &mapping.stats;
    println!("Mapping finished in {} ms", stats.time_total_ms);
    println!("  neurons placed : {}", stats.neurons_placed);
    println!("  chips used     : {}", stats.chips_used);
    println!("  L1 routes      : {}", stats.routes);
    println!("  synapses       : {} set, {} lost", stats.synapses_set, stats.synapses_lost);
    println!("  results        : {}", output.display());
    Ok(())
}

fn cmd_inspect(path: &std::path::Path) -> Result<()> {
    let results = Results::load(path)?;

    println!("Results from {}", path.display());
    println!("  wafer          : {}", results.resources.wafer.0);
    println!("  chips          : {}", results.resources.allocated.len());
    println!("  placements     : {}", results.placement.len());
    println!("  L1 routes      : {}", results.l1_routing.items().len());
    println!("  synapses       : {}", results.synapse_routing.synapse_count());
    println!("  spike trains   : {}", results.spike_times.len());
    println!("  lookup entries : {}", results.lookup.len());

    for chip in &results.resources.allocated {
        let neurons = results.placement.find_chip(*chip).count();
        let routes = results.l1_routing.by_target(*chip).count();
        println!("  {chip}: {neurons} neurons, {routes} incoming routes");
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}
