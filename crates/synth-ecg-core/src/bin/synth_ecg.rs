// ─────────────────────────────────────────────────────────────────────
// SynthECG — Command-Line Generator
// ─────────────────────────────────────────────────────────────────────
//! `synth-ecg --config configs/generate_ecgs.json`
//!
//! Generates the configured batch and writes `<output_dir>/ecgs.npy`.
//! Verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use synth_ecg_core::EcgGenerator;
use synth_ecg_types::GeneratorConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Generate synthetic 12-lead ECGs", long_about = None)]
struct Args {
    /// JSON generator configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override number of samples
    #[arg(short, long)]
    n_samples: Option<usize>,

    /// Override worker threads (0 = all cores)
    #[arg(short = 'j', long)]
    n_jobs: Option<usize>,

    /// Override batch seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; `log` records from the library crates are forwarded.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => GeneratorConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(n) = args.n_samples {
        config.n_samples = n;
    }
    if let Some(j) = args.n_jobs {
        config.n_jobs = j;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    if args.print_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(ExitCode::SUCCESS);
    }

    let generator = EcgGenerator::new(config).context("invalid generator configuration")?;
    let batch = generator.generate_ecgs();
    log::info!("ECGs generated successfully.");
    let path = generator.save_ecgs(&batch).context("saving ECGs")?;
    log::info!("ECGs saved to {}", path.display());

    Ok(if batch.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
