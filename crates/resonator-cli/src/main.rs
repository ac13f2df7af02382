mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resonator", about = "Resonator video brightness extraction")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every video in an input folder
    Run(commands::run::RunArgs),
    /// Extract the sliced brightness signal from one video
    Extract(commands::extract::ExtractArgs),
    /// Align a sliced signal with reference data
    Reconcile(commands::reconcile::ReconcileArgs),
    /// Register a video against the basis image and report the mapped ROI
    Register(commands::register::RegisterArgs),
    /// Print the default configuration or check an existing one
    Config(commands::config::ConfigArgs),
    /// Store calibration coefficients in a config file
    Calibrate(commands::calibrate::CalibrateArgs),
    /// Save a new basis image and ROI
    Reset(commands::reset::ResetArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Extract(args) => commands::extract::run(args),
        Commands::Reconcile(args) => commands::reconcile::run(args),
        Commands::Register(args) => commands::register::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Calibrate(args) => commands::calibrate::run(args),
        Commands::Reset(args) => commands::reset::run(args),
    }
}
