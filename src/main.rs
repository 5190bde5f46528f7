pub mod cli;
pub mod client;
pub mod config;
pub mod db {
    pub mod gateway;
    pub mod memory;
    pub mod models;
}
pub mod error;
pub mod utils;
pub mod services {
    pub mod alerts;
    pub mod context;
    pub mod irrigation;
    pub mod realtime;
    pub mod requests;
    pub mod rules;
    pub mod simulate;
    pub mod usage;
}

use crate::cli::Cli;
use crate::client::SupabaseClient;
use crate::config::Config;
use crate::db::gateway::Gateway;
use crate::db::memory::MemoryStore;
use crate::error::AppError;
use crate::services::context::{Context, Policy};
use crate::services::realtime::{self, Shutdown};
use crate::services::simulate::{seed_demo_zones, SensorSimulator};
use crate::utils::SystemClock;
use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::PathBuf;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run(cli: &Cli, shutdown: &Shutdown) -> error::Result<()> {
    // 1) Load config
    let cfg = Config::from_env(!cli.memory)?;
    info!(
        "Config loaded (poll_interval={}s, cooldown={}m, alert_window={}m, flow_rate={} L/min, request_timeout={}s, seed={})",
        cfg.poll_interval.as_secs(),
        cfg.cooldown_minutes,
        cfg.alert_window_minutes,
        cfg.flow_rate_lpm,
        cfg.request_timeout.as_secs(),
        cli.seed
            .or(cfg.simulation_seed)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );

    // 2) Pick the store
    let clock = SystemClock;
    let store: Box<dyn Gateway> = match (&cfg.store, cli.memory) {
        (Some(creds), false) => {
            info!("Using Supabase store at {}", creds.url);
            Box::new(SupabaseClient::new(&creds.url, creds.api_key.clone(), cfg.request_timeout))
        }
        (_, true) => {
            info!("Using in-memory store with demo zones");
            let store = MemoryStore::new(Box::new(SystemClock));
            seed_demo_zones(&store, &clock)?;
            Box::new(store)
        }
        (None, false) => return Err(config::ConfigError::Missing("SUPABASE_URL").into()),
    };

    // 3) Driver loop (steady cadence)
    let ctx = Context::new(store.as_ref(), &clock, Policy::from_config(&cfg));
    let mut simulator = SensorSimulator::new(cli.seed.or(cfg.simulation_seed));
    let max_cycles = cli.max_cycles();
    info!(
        "Starting driver loop: interval={}s, max_cycles={}",
        cfg.poll_interval.as_secs(),
        max_cycles
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );
    realtime::run_loop(&ctx, &mut simulator, cfg.poll_interval, shutdown, max_cycles);

    Ok(())
}

fn load_env(cli: &Cli) -> error::Result<Option<LoadedEnvFile>> {
    if let Some(path) = cli.env_file.clone() {
        if !path.is_file() {
            return Err(AppError::EnvFileMissing(path));
        }
        dotenvy::from_path(&path).map_err(|source| AppError::EnvFile {
            path: path.clone(),
            source,
        })?;
        return Ok(Some(LoadedEnvFile { path, explicit: true }));
    }

    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(LoadedEnvFile { path, explicit: false })),
        Err(e) if e.not_found() => Ok(None),
        Err(source) => Err(AppError::EnvFile {
            path: PathBuf::from(".env"),
            source,
        }),
    }
}

fn main() {
    let cli = Cli::parse();

    let loaded_env = match load_env(&cli) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(default_filter);
    match cli.verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.format_timestamp_secs().init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "irrigation-sim {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    // No signal hook is installed: only --once/--cycles or process termination
    // end the loop. A hook would call `shutdown.trigger()` on a clone.
    let shutdown = Shutdown::new();
    if let Err(e) = run(&cli, &shutdown) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
