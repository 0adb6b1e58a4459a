#![forbid(unsafe_code)]

use std::env;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use huddle_core::WidgetKind;
use huddle_sim::campaign::{CampaignConfig, replay_seed, run_campaign};
use huddle_sim::network::FaultConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "huddle-sim: deterministic fault-injection campaigns for widget sessions",
    long_about = None
)]
struct Cli {
    /// First seed to run.
    #[arg(long, default_value_t = 0)]
    from: u64,

    /// Number of seeds to run.
    #[arg(long, default_value_t = 100)]
    seeds: u64,

    /// Participant sessions per seed.
    #[arg(long, default_value_t = 4)]
    sessions: usize,

    /// Simulation rounds per seed.
    #[arg(long, default_value_t = 24)]
    rounds: u64,

    /// Restrict to these widget kinds (repeatable). Defaults to all kinds.
    #[arg(long = "kind", value_parser = parse_kind)]
    kinds: Vec<WidgetKind>,

    /// Only delay, duplicate and reorder; never drop or partition.
    #[arg(long)]
    lossless: bool,

    /// Replay a single seed and print its trace.
    #[arg(long)]
    replay: Option<u64>,

    /// Emit the campaign report as JSON.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn campaign(&self) -> CampaignConfig {
        let defaults = CampaignConfig::default();
        CampaignConfig {
            seed_range: self.from..self.from.saturating_add(self.seeds),
            kinds: if self.kinds.is_empty() {
                defaults.kinds.clone()
            } else {
                self.kinds.clone()
            },
            session_count: self.sessions,
            rounds: self.rounds,
            fault: if self.lossless {
                FaultConfig::lossless()
            } else {
                defaults.fault
            },
            ..defaults
        }
    }
}

fn parse_kind(raw: &str) -> Result<WidgetKind, String> {
    WidgetKind::from_str(raw).map_err(|err| err.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HUDDLE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "huddle_sim=debug,huddle_core=debug,info"
        } else {
            "huddle_sim=info,warn"
        })
    });

    let format = env::var("HUDDLE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.campaign();

    if let Some(seed) = cli.replay {
        let trace = replay_seed(seed, &config)?;
        for event in &trace.result.trace {
            println!("{:>4} {:?}", event.round, event.kind);
        }
        println!(
            "seed {seed} ({}): version={} passed={}",
            trace.result.config.kind, trace.result.stored.version, trace.oracle.passed
        );
        for violation in &trace.oracle.violations {
            println!("  {violation}");
        }
        return Ok(());
    }

    let report = run_campaign(&config)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "campaign complete: seeds={} passed={} interesting={}",
            report.seeds_run, report.seeds_passed, report.interesting_states_reached
        );
        for failure in &report.failures {
            println!("seed {} ({}):", failure.seed, failure.kind);
            for violation in &failure.violations {
                println!("  {violation}");
            }
        }
    }

    if !report.all_passed() {
        anyhow::bail!(
            "{} of {} seeds failed; replay with --replay {}",
            report.failures.len(),
            report.seeds_run,
            report.first_failure.unwrap_or_default()
        );
    }
    Ok(())
}
