//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use stratoswarm_tilt_optimizer::{Algorithm, ObjectiveKind};

#[derive(Parser)]
#[command(name = "tilt")]
#[command(version, about = "Evolutionary tilt optimizer for solar panel rows", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Optimize the tilt of every panel row
    Run(RunArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of panel rows
    #[arg(long)]
    pub rows: Option<usize>,

    /// Search strategy
    #[arg(long, value_enum)]
    pub algorithm: Option<AlgorithmArg>,

    /// Yield objective
    #[arg(long, value_enum)]
    pub objective: Option<ObjectiveArg>,

    /// Particles or individuals per outer step
    #[arg(long)]
    pub population: Option<usize>,

    /// Outer step budget
    #[arg(long)]
    pub steps: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Site latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum AlgorithmArg {
    Swarm,
    Genetic,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Swarm => Algorithm::ParticleSwarm,
            AlgorithmArg::Genetic => Algorithm::Genetic,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ObjectiveArg {
    Daily,
    Yearly,
}

impl From<ObjectiveArg> for ObjectiveKind {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::Daily => ObjectiveKind::Daily,
            ObjectiveArg::Yearly => ObjectiveKind::Yearly,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}
