use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_core::ManualClock;
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

/// How simulated wall clocks are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Server time at round zero, in milliseconds since the epoch.
    pub base_millis: i64,
    /// Wall time that passes per simulation round.
    pub tick_millis: i64,
    /// Maximum absolute offset of a session clock from the server's.
    pub max_abs_skew_millis: i64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            base_millis: 1_700_000_000_000,
            tick_millis: 1_000,
            max_abs_skew_millis: 250,
        }
    }
}

/// A [`ManualClock`] moved by the simulator, with skew and freezes.
///
/// The handle is shared with the engine or a session's reconciler; they
/// read it, the simulator writes it.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    config: ClockConfig,
    skew_millis: i64,
    frozen_until: Option<u64>,
    handle: Arc<ManualClock>,
}

impl SimulatedClock {
    /// The engine's clock: no skew.
    #[must_use]
    pub fn server(config: ClockConfig) -> Self {
        Self::with_skew(config, 0)
    }

    /// A session clock with a random fixed skew.
    #[must_use]
    pub fn session(config: ClockConfig, rng: &mut DeterministicRng) -> Self {
        let bound = config.max_abs_skew_millis.abs();
        Self::with_skew(config, rng.in_range(-bound, bound))
    }

    fn with_skew(config: ClockConfig, skew_millis: i64) -> Self {
        let clock = Self {
            config,
            skew_millis,
            frozen_until: None,
            handle: Arc::new(ManualClock::default()),
        };
        clock.handle.set(clock.at(0));
        clock
    }

    #[must_use]
    pub fn handle(&self) -> Arc<ManualClock> {
        Arc::clone(&self.handle)
    }

    #[must_use]
    pub const fn skew_millis(&self) -> i64 {
        self.skew_millis
    }

    /// Wall time this clock shows at `round` when running.
    #[must_use]
    pub fn at(&self, round: u64) -> DateTime<Utc> {
        let round = i64::try_from(round).unwrap_or(i64::MAX);
        let millis = self
            .config
            .base_millis
            .saturating_add(self.skew_millis)
            .saturating_add(self.config.tick_millis.saturating_mul(round));
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Move to `round` unless frozen; a freeze ends once its round passes.
    pub fn tick(&mut self, round: u64) {
        if let Some(until) = self.frozen_until {
            if round < until {
                return;
            }
            self.frozen_until = None;
        }
        self.handle.set(self.at(round));
    }

    /// Stop advancing for `rounds` rounds starting at `round`.
    pub fn freeze(&mut self, round: u64, rounds: u8) {
        self.frozen_until = Some(round.saturating_add(u64::from(rounds)));
    }

    pub const fn unfreeze(&mut self) {
        self.frozen_until = None;
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen_until.is_some()
    }
}
