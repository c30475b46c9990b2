use std::time::Duration;

use crate::item_kinds::KindWeights;
use crate::types::Difficulty;

/// Session-level pool bounds (workers and stations each).
pub const MIN_POOL: usize = 1;
pub const MAX_POOL: usize = 3;
/// Hard caps on the fixed-capacity arrays.
pub const WORKER_CAPACITY: usize = 5;
pub const STATION_CAPACITY: usize = 5;
pub const ITEM_CAPACITY: usize = 100;
/// Instruction buffer length in printable characters.
pub const INSTRUCTION_CAPACITY: usize = 15;
pub const SESSION_SECS: u32 = 120;

/// Sleep intervals for every loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cadence {
    pub generation: Duration,
    pub worker: Duration,
    pub input: Duration,
    pub render: Duration,
    pub clock: Duration,
    pub monitor: Duration,
}

impl Cadence {
    /// Real-time pacing: one worker and clock tick per second.
    pub fn reference() -> Self {
        Self {
            generation: Duration::from_millis(200),
            worker: Duration::from_secs(1),
            input: Duration::from_millis(50),
            render: Duration::from_millis(200),
            clock: Duration::from_secs(1),
            monitor: Duration::from_millis(100),
        }
    }

    /// Every interval divided by `factor`; used for headless runs.
    pub fn scaled(factor: u32) -> Self {
        let factor = factor.max(1);
        let base = Self::reference();
        Self {
            generation: base.generation / factor,
            worker: base.worker / factor,
            input: base.input / factor,
            render: base.render / factor,
            clock: base.clock / factor,
            monitor: base.monitor / factor,
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::reference()
    }
}

/// Everything needed to set up one session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub difficulty: Difficulty,
    pub workers: usize,
    pub stations: usize,
    pub session_secs: u32,
    /// Items that must be resolved to win; also the generation cap.
    pub required_resolved: usize,
    /// Generator ticks between interval-driven items.
    pub generation_interval: u32,
    pub kind_weights: KindWeights,
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    pub cadence: Cadence,
    /// Run the invariant monitor alongside the loops.
    pub validate: bool,
}

impl SessionConfig {
    pub fn new(difficulty: Difficulty) -> Self {
        let (required_resolved, generation_interval) = match difficulty {
            // 100 ticks * 0.2s = 20s between items.
            Difficulty::Easy => (4, 100),
            Difficulty::Medium => (8, 75),
            Difficulty::Hard => (12, 50),
        };
        Self {
            difficulty,
            workers: MIN_POOL,
            stations: MIN_POOL,
            session_secs: SESSION_SECS,
            required_resolved,
            generation_interval,
            kind_weights: KindWeights::for_difficulty(difficulty),
            seed: None,
            cadence: Cadence::reference(),
            validate: false,
        }
    }

    /// Set pool sizes, clamped to `MIN_POOL..=MAX_POOL`.
    pub fn with_pools(mut self, workers: usize, stations: usize) -> Self {
        self.workers = workers.clamp(MIN_POOL, MAX_POOL);
        self.stations = stations.clamp(MIN_POOL, MAX_POOL);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_kind_weights(mut self, weights: KindWeights) -> Self {
        self.kind_weights = weights;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Maximum items ever generated in this session.
    pub fn max_items(&self) -> usize {
        self.required_resolved.min(ITEM_CAPACITY)
    }
}
