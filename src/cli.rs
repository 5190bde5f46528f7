use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "irrigation-sim",
    version,
    about = "Simulated soil sensors with rule-based irrigation per zone"
)]
pub struct Cli {
    /// Load environment from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Use an in-memory store seeded with demo zones (no Supabase needed)
    #[arg(long)]
    pub memory: bool,

    /// Run a single cycle and exit
    #[arg(long, conflicts_with = "cycles")]
    pub once: bool,

    /// Stop after this many cycles
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub cycles: Option<u64>,

    /// Seed the reading simulator (overrides SIMULATION_SEED)
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn max_cycles(&self) -> Option<u64> {
        if self.once { Some(1) } else { self.cycles }
    }
}
