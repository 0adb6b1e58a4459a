//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds, rotating through widget kinds, collecting pass/fail
//! results and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use huddle_core::WidgetKind;
use serde::{Deserialize, Serialize};

use crate::clock::ClockConfig;
use crate::network::FaultConfig;
use crate::oracle::{ConvergenceOracle, OracleResult};
use crate::{SimulationConfig, SimulationResult, Simulator};

/// How many seeds to run and with which parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g. `0..100`.
    pub seed_range: Range<u64>,
    /// Kinds to rotate through; seed `s` simulates `kinds[s % kinds.len()]`.
    pub kinds: Vec<WidgetKind>,
    pub session_count: usize,
    pub rounds: u64,
    pub activity_percent: u8,
    /// Percent of seeds in which the creator closes the widget.
    pub close_percent: u8,
    pub fault: FaultConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..100,
            kinds: WidgetKind::ALL.to_vec(),
            session_count: 4,
            rounds: 24,
            activity_percent: 60,
            close_percent: 50,
            fault: FaultConfig {
                max_delay_rounds: 3,
                drop_rate_percent: 10,
                duplicate_rate_percent: 5,
                reorder_rate_percent: 10,
                partition_rate_percent: 5,
                freeze_rate_percent: 5,
                freeze_duration_rounds: 2,
            },
        }
    }
}

impl CampaignConfig {
    /// Build the [`SimulationConfig`] for one seed.
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        let len = u64::try_from(self.kinds.len()).unwrap_or(1).max(1);
        let kind = usize::try_from(seed % len)
            .ok()
            .and_then(|i| self.kinds.get(i).copied())
            .unwrap_or(WidgetKind::Poll);
        // Spread close decisions independently of the kind rotation.
        let closes = (seed.wrapping_mul(0x9E37_79B9) >> 7) % 100 < u64::from(self.close_percent);
        SimulationConfig {
            seed,
            session_count: self.session_count,
            rounds: self.rounds,
            kind,
            activity_percent: self.activity_percent,
            close_at_round: closes.then_some(self.rounds * 3 / 4),
            fault: self.fault,
            clock: ClockConfig::default(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.kinds.is_empty() {
            bail!("kinds must not be empty");
        }
        if self.close_percent > 100 {
            bail!("close_percent must be <= 100");
        }
        self.sim_config_for_seed(self.seed_range.start).validate()
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub kind: WidgetKind,
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed, for prioritized replay.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds in which a session lost packets and recovered by refreshing.
    pub interesting_states_reached: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Full record of one seed.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    pub oracle: OracleResult,
}

/// Run every seed in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_states_reached: 0,
    };

    for seed in config.seed_range.clone() {
        let trace = replay_seed(seed, config)?;
        report.seeds_run += 1;
        if trace.result.interesting_state_reached {
            report.interesting_states_reached += 1;
        }

        if trace.oracle.passed {
            report.seeds_passed += 1;
            continue;
        }

        tracing::warn!(
            seed,
            kind = %trace.result.config.kind,
            violations = trace.oracle.violations.len(),
            "seed failed"
        );
        report.first_failure.get_or_insert(seed);
        report.failures.push(SeedFailure {
            seed,
            kind: trace.result.config.kind,
            violations: trace
                .oracle
                .violations
                .iter()
                .map(ToString::to_string)
                .collect(),
        });
    }

    tracing::info!(
        seeds_run = report.seeds_run,
        seeds_passed = report.seeds_passed,
        interesting = report.interesting_states_reached,
        "campaign complete"
    );
    Ok(report)
}

/// Run one seed and keep everything for debugging.
///
/// # Errors
///
/// Returns an error when the simulation itself fails; invariant violations
/// are reported in [`DetailedTrace::oracle`].
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    let mut simulator = Simulator::new(config.sim_config_for_seed(seed))?;
    let result = simulator.run()?;
    let oracle = ConvergenceOracle::check_all(&result);
    Ok(DetailedTrace { result, oracle })
}
