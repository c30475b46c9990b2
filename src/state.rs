//! The shared game aggregate and every transition applied to it.
//!
//! `GameState` is plain data plus methods; it has no locking of its own.
//! Every method here is meant to run inside one critical section of
//! [`crate::store::SharedState`], so each transition is observed either
//! completely or not at all.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{INSTRUCTION_CAPACITY, SessionConfig, STATION_CAPACITY, WORKER_CAPACITY};
use crate::coordinator::InstructionBuffer;
use crate::item_kinds::{self, KindWeights, Puzzle};
use crate::types::{
    Difficulty, ItemId, ItemState, Outcome, StationId, StationState, WorkerId, WorkerState,
};

const MIN_ITEM_SECS: u32 = 3;
const MAX_ITEM_SECS: u32 = 8;

/// A timed unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub puzzle: Puzzle,
    pub total_secs: u32,
    /// Counts down only while assigned; reset to `total_secs` otherwise.
    pub remaining_secs: u32,
    pub state: ItemState,
    pub submitted: String,
    /// Seconds since resolution; `None` until resolved.
    pub resolved_age: Option<u32>,
}

impl Item {
    pub fn correct(&self) -> &str {
        &self.puzzle.correct
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Worker {
    pub id: WorkerId,
    pub state: WorkerState,
    /// Index into the item arena.
    pub item: Option<usize>,
    /// Index into the station arena.
    pub station: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Station {
    pub id: StationId,
    pub state: StationState,
    /// Index into the worker arena.
    pub occupant: Option<usize>,
}

/// Result of a successful allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub item: ItemId,
    pub worker: WorkerId,
    pub station: StationId,
}

/// Why a submission did not allocate anything. Never fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Unassigned {
    #[error("no free worker")]
    NoFreeWorker,
    #[error("no pending item")]
    NoPendingItem,
    #[error("no free station")]
    NoFreeStation,
}

/// What happened when a worker's countdown reached zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub item: ItemId,
    pub worker: WorkerId,
    pub station: Option<StationId>,
    /// True when the submitted instruction matched.
    pub accepted: bool,
    /// Item generated because the pending pool ran dry.
    pub spawned: Option<ItemId>,
}

/// A broken allocation invariant. Seeing one of these is a bug.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("busy worker {worker} holds no item or station")]
    BusyWorkerIncomplete { worker: WorkerId },
    #[error("free worker {worker} still holds resources")]
    FreeWorkerHoldsResources { worker: WorkerId },
    #[error("worker {worker} points at item {item} which is {state}")]
    ItemNotAssigned {
        worker: WorkerId,
        item: ItemId,
        state: ItemState,
    },
    #[error("item {item} is referenced by workers {first} and {second}")]
    ItemShared {
        item: ItemId,
        first: WorkerId,
        second: WorkerId,
    },
    #[error("assigned item {item} has no worker")]
    OrphanAssignment { item: ItemId },
    #[error("worker {worker} and station {station} disagree on occupancy")]
    AsymmetricOccupancy { worker: WorkerId, station: StationId },
    #[error("station {station} state does not match its occupant")]
    StationStateMismatch { station: StationId },
    #[error("item id {id} follows {previous}")]
    NonIncreasingIds { previous: ItemId, id: ItemId },
    #[error("{unresolved} unresolved items exceed the cap of {max}")]
    TooManyUnresolved { unresolved: usize, max: usize },
    #[error("dangling index {index} in {arena}")]
    DanglingIndex { arena: &'static str, index: usize },
}

/// Read-only copy of the aggregate for presentation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub difficulty: Difficulty,
    pub items: Vec<Item>,
    pub workers: Vec<Worker>,
    pub stations: Vec<Station>,
    pub session_secs: u32,
    pub remaining_secs: u32,
    pub required_resolved: usize,
    pub resolved: usize,
    pub pending: usize,
    pub failed_attempts: u32,
    pub instruction: String,
    pub notice: Option<String>,
    pub outcome: Option<Outcome>,
    pub active: bool,
}

/// The single mutable aggregate shared by every loop.
pub struct GameState {
    difficulty: Difficulty,
    items: Vec<Item>,
    next_item_id: ItemId,
    workers: Vec<Worker>,
    stations: Vec<Station>,
    kind_weights: KindWeights,
    rng: StdRng,
    generation_ticks: u32,
    generation_interval: u32,
    max_items: usize,
    required_resolved: usize,
    session_secs: u32,
    remaining_secs: u32,
    running: bool,
    finished: bool,
    outcome: Option<Outcome>,
    instruction: InstructionBuffer,
    notice: Option<String>,
    failed_attempts: u32,
}

impl GameState {
    /// Build the pools and generate the first item right away.
    pub fn new(config: &SessionConfig) -> Self {
        let worker_count = config.workers.clamp(1, WORKER_CAPACITY);
        let station_count = config.stations.clamp(1, STATION_CAPACITY);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let max_items = config.max_items();
        let mut game = Self {
            difficulty: config.difficulty,
            items: Vec::with_capacity(max_items),
            next_item_id: 1,
            workers: (0..worker_count)
                .map(|idx| Worker {
                    id: idx as WorkerId + 1,
                    state: WorkerState::Free,
                    item: None,
                    station: None,
                })
                .collect(),
            stations: (0..station_count)
                .map(|idx| Station {
                    id: idx as StationId + 1,
                    state: StationState::Free,
                    occupant: None,
                })
                .collect(),
            kind_weights: config.kind_weights,
            rng,
            generation_ticks: 0,
            generation_interval: config.generation_interval.max(1),
            max_items,
            required_resolved: config.required_resolved,
            session_secs: config.session_secs,
            remaining_secs: config.session_secs,
            running: true,
            finished: false,
            outcome: None,
            instruction: InstructionBuffer::new(),
            notice: None,
            failed_attempts: 0,
        };
        game.generate_item();
        game
    }

    // ---- generation ------------------------------------------------------

    /// Create one item unless the session cap is reached.
    pub fn generate_item(&mut self) -> Option<ItemId> {
        if self.items.len() >= self.max_items {
            return None;
        }
        let kind = self.kind_weights.pick(&mut self.rng);
        let puzzle = item_kinds::generate(kind, self.difficulty, &mut self.rng);
        let total_secs = self.rng.gen_range(MIN_ITEM_SECS..=MAX_ITEM_SECS);
        let id = self.next_item_id;
        self.next_item_id += 1;
        debug!(item = id, %kind, total_secs, "item generated");
        self.items.push(Item {
            id,
            puzzle,
            total_secs,
            remaining_secs: total_secs,
            state: ItemState::Pending,
            submitted: String::new(),
            resolved_age: None,
        });
        self.debug_check();
        Some(id)
    }

    /// Generate immediately when nothing is pending and the cap allows it.
    pub fn refill_if_starved(&mut self) -> Option<ItemId> {
        if self.pending_count() == 0 {
            self.generate_item()
        } else {
            None
        }
    }

    /// One generator tick: the interval path plus the starvation guard.
    pub fn generation_tick(&mut self) -> Vec<ItemId> {
        let mut created = Vec::new();
        if self.items.len() < self.max_items {
            self.generation_ticks += 1;
            if self.generation_ticks >= self.generation_interval {
                created.extend(self.generate_item());
                self.generation_ticks = 0;
            }
        }
        created.extend(self.refill_if_starved());
        created
    }

    // ---- worker resolution -----------------------------------------------

    /// Advance the age of every resolved item by one second.
    pub fn age_resolved(&mut self) {
        for item in &mut self.items {
            if item.state == ItemState::Resolved {
                if let Some(age) = item.resolved_age.as_mut() {
                    *age += 1;
                }
            }
        }
    }

    /// One worker tick: housekeeping, countdown, and resolution at zero.
    pub fn worker_tick(&mut self, worker: usize) -> Option<Resolution> {
        self.age_resolved();
        let current = self.workers.get(worker)?;
        if current.state != WorkerState::Busy {
            return None;
        }
        let item_idx = current.item?;
        let item = &mut self.items[item_idx];
        item.remaining_secs = item.remaining_secs.saturating_sub(1);
        if item.remaining_secs > 0 {
            return None;
        }
        Some(self.resolve(worker))
    }

    /// Judge the worker's item and release the worker/station pair.
    fn resolve(&mut self, worker_idx: usize) -> Resolution {
        let worker = &mut self.workers[worker_idx];
        let worker_id = worker.id;
        let item_idx = worker.item.take();
        let station_idx = worker.station.take();
        worker.state = WorkerState::Free;

        let mut resolution = Resolution {
            item: 0,
            worker: worker_id,
            station: None,
            accepted: false,
            spawned: None,
        };

        if let Some(item_idx) = item_idx {
            let item = &mut self.items[item_idx];
            resolution.item = item.id;
            if item_kinds::validate(&item.puzzle, &item.submitted) {
                item.state = ItemState::Resolved;
                item.remaining_secs = 0;
                item.resolved_age = Some(0);
                resolution.accepted = true;
                debug!(item = item.id, worker = worker_id, "item resolved");
            } else {
                debug!(
                    item = item.id,
                    worker = worker_id,
                    submitted = %item.submitted,
                    "wrong instruction, item back to pending"
                );
                item.state = ItemState::Pending;
                item.remaining_secs = item.total_secs;
                item.submitted.clear();
                item.resolved_age = None;
                self.failed_attempts += 1;
            }
        }

        if let Some(station_idx) = station_idx {
            let station = &mut self.stations[station_idx];
            station.state = StationState::Free;
            station.occupant = None;
            resolution.station = Some(station.id);
        }

        resolution.spawned = self.refill_if_starved();
        self.debug_check();
        resolution
    }

    // ---- allocation --------------------------------------------------------

    /// Allocate the first pending item to the first free worker and station.
    ///
    /// The instruction buffer becomes the item's submission and is cleared;
    /// on failure nothing changes.
    pub fn assign(&mut self) -> Result<Assignment, Unassigned> {
        let worker_idx = self
            .workers
            .iter()
            .position(|w| w.state == WorkerState::Free)
            .ok_or(Unassigned::NoFreeWorker)?;
        // Items are stored in id order, so the first match has the lowest id.
        let item_idx = self
            .items
            .iter()
            .position(|item| item.state == ItemState::Pending)
            .ok_or(Unassigned::NoPendingItem)?;
        let station_idx = self
            .stations
            .iter()
            .position(|s| s.state == StationState::Free)
            .ok_or(Unassigned::NoFreeStation)?;

        let submitted: String = self
            .instruction
            .take()
            .chars()
            .take(INSTRUCTION_CAPACITY)
            .collect();

        let item = &mut self.items[item_idx];
        item.submitted = submitted;
        item.state = ItemState::Assigned;
        item.remaining_secs = item.total_secs;
        item.resolved_age = None;

        let worker = &mut self.workers[worker_idx];
        worker.state = WorkerState::Busy;
        worker.item = Some(item_idx);
        worker.station = Some(station_idx);

        let station = &mut self.stations[station_idx];
        station.state = StationState::Occupied;
        station.occupant = Some(worker_idx);

        let assignment = Assignment {
            item: self.items[item_idx].id,
            worker: self.workers[worker_idx].id,
            station: self.stations[station_idx].id,
        };
        debug!(
            item = assignment.item,
            worker = assignment.worker,
            station = assignment.station,
            "item assigned"
        );
        self.debug_check();
        Ok(assignment)
    }

    // ---- session clock -----------------------------------------------------

    /// One session clock tick; returns the outcome when the session ends.
    pub fn session_tick(&mut self) -> Option<Outcome> {
        if !self.is_active() {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.resolved_count() >= self.required_resolved {
            self.finish(Outcome::Won);
        } else if self.remaining_secs == 0 {
            self.finish(Outcome::Lost);
        }
        self.outcome.filter(|_| self.finished)
    }

    fn finish(&mut self, outcome: Outcome) {
        self.finished = true;
        self.outcome.get_or_insert(outcome);
        info!(%outcome, resolved = self.resolved_count(), "session finished");
    }

    /// Stop every loop at its next iteration.
    pub fn quit(&mut self) {
        self.running = false;
        self.outcome.get_or_insert(Outcome::Quit);
        info!("session quit by player");
    }

    /// True while loops should keep iterating.
    pub fn is_active(&self) -> bool {
        self.running && !self.finished
    }

    // ---- queries -------------------------------------------------------------

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn pending_count(&self) -> usize {
        self.count_in(ItemState::Pending)
    }

    pub fn resolved_count(&self) -> usize {
        self.count_in(ItemState::Resolved)
    }

    fn count_in(&self, state: ItemState) -> usize {
        self.items.iter().filter(|item| item.state == state).count()
    }

    pub fn first_pending(&self) -> Option<&Item> {
        self.items.iter().find(|item| item.state == ItemState::Pending)
    }

    pub fn has_free_worker(&self) -> bool {
        self.workers.iter().any(|w| w.state == WorkerState::Free)
    }

    pub fn has_free_station(&self) -> bool {
        self.stations.iter().any(|s| s.state == StationState::Free)
    }

    pub fn required_resolved(&self) -> usize {
        self.required_resolved
    }

    #[cfg(test)]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn instruction(&self) -> &InstructionBuffer {
        &self.instruction
    }

    pub fn instruction_mut(&mut self) -> &mut InstructionBuffer {
        &mut self.instruction
    }

    #[cfg(test)]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: Option<String>) {
        self.notice = notice;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            difficulty: self.difficulty,
            items: self.items.clone(),
            workers: self.workers.clone(),
            stations: self.stations.clone(),
            session_secs: self.session_secs,
            remaining_secs: self.remaining_secs,
            required_resolved: self.required_resolved,
            resolved: self.resolved_count(),
            pending: self.pending_count(),
            failed_attempts: self.failed_attempts,
            instruction: self.instruction.as_str().to_string(),
            notice: self.notice.clone(),
            outcome: self.outcome,
            active: self.is_active(),
        }
    }

    // ---- invariants ------------------------------------------------------

    /// Verify the allocation invariants; returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut holder: Vec<Option<WorkerId>> = vec![None; self.items.len()];

        for (worker_idx, worker) in self.workers.iter().enumerate() {
            match worker.state {
                WorkerState::Free => {
                    if worker.item.is_some() || worker.station.is_some() {
                        return Err(InvariantViolation::FreeWorkerHoldsResources {
                            worker: worker.id,
                        });
                    }
                }
                WorkerState::Busy => {
                    let (Some(item_idx), Some(station_idx)) = (worker.item, worker.station)
                    else {
                        return Err(InvariantViolation::BusyWorkerIncomplete { worker: worker.id });
                    };
                    let item = self.items.get(item_idx).ok_or(InvariantViolation::DanglingIndex {
                        arena: "items",
                        index: item_idx,
                    })?;
                    if item.state != ItemState::Assigned {
                        return Err(InvariantViolation::ItemNotAssigned {
                            worker: worker.id,
                            item: item.id,
                            state: item.state,
                        });
                    }
                    if let Some(first) = holder[item_idx].replace(worker.id) {
                        return Err(InvariantViolation::ItemShared {
                            item: item.id,
                            first,
                            second: worker.id,
                        });
                    }
                    let station =
                        self.stations
                            .get(station_idx)
                            .ok_or(InvariantViolation::DanglingIndex {
                                arena: "stations",
                                index: station_idx,
                            })?;
                    if station.occupant != Some(worker_idx) {
                        return Err(InvariantViolation::AsymmetricOccupancy {
                            worker: worker.id,
                            station: station.id,
                        });
                    }
                }
            }
        }

        for (station_idx, station) in self.stations.iter().enumerate() {
            match (station.state, station.occupant) {
                (StationState::Free, None) => {}
                (StationState::Occupied, Some(worker_idx)) => {
                    let worker =
                        self.workers
                            .get(worker_idx)
                            .ok_or(InvariantViolation::DanglingIndex {
                                arena: "workers",
                                index: worker_idx,
                            })?;
                    if worker.station != Some(station_idx) {
                        return Err(InvariantViolation::AsymmetricOccupancy {
                            worker: worker.id,
                            station: station.id,
                        });
                    }
                }
                _ => {
                    return Err(InvariantViolation::StationStateMismatch {
                        station: station.id,
                    });
                }
            }
        }

        for (item, held_by) in self.items.iter().zip(&holder) {
            if item.state == ItemState::Assigned && held_by.is_none() {
                return Err(InvariantViolation::OrphanAssignment { item: item.id });
            }
        }

        for pair in self.items.windows(2) {
            if pair[1].id <= pair[0].id {
                return Err(InvariantViolation::NonIncreasingIds {
                    previous: pair[0].id,
                    id: pair[1].id,
                });
            }
        }

        let unresolved = self.items.len() - self.resolved_count();
        if unresolved > self.max_items {
            return Err(InvariantViolation::TooManyUnresolved {
                unresolved,
                max: self.max_items,
            });
        }
        Ok(())
    }

    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            if let Err(violation) = self.check_invariants() {
                debug_assert!(false, "invariant violated: {violation}");
            }
        }
    }

    /// Test-only hook to place an item with a known puzzle.
    #[cfg(test)]
    pub(crate) fn push_item_for_test(&mut self, puzzle: Puzzle, total_secs: u32) -> ItemId {
        let id = self.next_item_id;
        self.next_item_id += 1;
        self.items.push(Item {
            id,
            puzzle,
            total_secs,
            remaining_secs: total_secs,
            state: ItemState::Pending,
            submitted: String::new(),
            resolved_age: None,
        });
        id
    }

    /// Test-only hook to break an invariant on purpose.
    #[cfg(test)]
    pub(crate) fn stations_mut_for_test(&mut self) -> &mut Vec<Station> {
        &mut self.stations
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::item_kinds::{ButtonColor, ItemKind, KindPolicy};
    use proptest::prelude::*;

    pub(crate) fn test_config(workers: usize, stations: usize) -> SessionConfig {
        SessionConfig::new(Difficulty::Easy)
            .with_pools(workers, stations)
            .with_seed(Some(42))
            .with_kind_weights(KindWeights::button_only())
    }

    fn type_text(game: &mut GameState, text: &str) {
        for c in text.chars() {
            game.instruction_mut().push(c);
        }
    }

    fn run_until_resolved(game: &mut GameState, worker: usize) -> Resolution {
        for _ in 0..=MAX_ITEM_SECS {
            if let Some(resolution) = game.worker_tick(worker) {
                return resolution;
            }
        }
        panic!("worker {worker} never resolved its item");
    }

    #[test]
    fn new_state_has_one_pending_item_and_free_pools() {
        let game = GameState::new(&test_config(2, 3));
        assert_eq!(game.items().len(), 1);
        assert_eq!(game.items()[0].id, 1);
        assert_eq!(game.pending_count(), 1);
        assert_eq!(game.workers().len(), 2);
        assert_eq!(game.stations().len(), 3);
        assert!(game.is_active());
        let total = game.items()[0].total_secs;
        assert!((MIN_ITEM_SECS..=MAX_ITEM_SECS).contains(&total));
        game.check_invariants().expect("fresh state is consistent");
    }

    #[test]
    fn button_policy_generates_only_buttons() {
        let config = SessionConfig::new(Difficulty::Hard)
            .with_seed(Some(8))
            .with_kind_weights(KindPolicy::ButtonOnly.weights(Difficulty::Hard));
        let mut game = GameState::new(&config);
        while game.generate_item().is_some() {}
        assert_eq!(game.items().len(), 12);
        assert!(game
            .items()
            .iter()
            .all(|item| item.puzzle.payload.kind() == ItemKind::Button));
    }

    #[test]
    fn generation_stops_at_max_items() {
        let mut game = GameState::new(&test_config(1, 1));
        while game.generate_item().is_some() {}
        assert_eq!(game.items().len(), game.max_items());
        assert_eq!(game.generate_item(), None);
        let ids: Vec<ItemId> = game.items().iter().map(|item| item.id).collect();
        let expected: Vec<ItemId> = (1..=game.max_items() as ItemId).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn interval_path_generates_after_interval_ticks() {
        let mut config = test_config(1, 1);
        config.generation_interval = 3;
        let mut game = GameState::new(&config);
        assert!(game.generation_tick().is_empty());
        assert!(game.generation_tick().is_empty());
        assert_eq!(game.generation_tick(), vec![2]);
        assert!(game.generation_tick().is_empty());
    }

    #[test]
    fn starvation_guard_generates_when_nothing_pending() {
        let mut game = GameState::new(&test_config(1, 1));
        type_text(&mut game, "x");
        game.assign().expect("assignment");
        assert_eq!(game.pending_count(), 0);
        assert_eq!(game.generation_tick(), vec![2]);
        assert_eq!(game.pending_count(), 1);
    }

    #[test]
    fn correct_submission_resolves_and_releases_pair() {
        let mut game = GameState::new(&test_config(1, 1));
        let answer = game.items()[0].correct().to_string();
        type_text(&mut game, &answer);
        let assignment = game.assign().expect("assignment");
        assert_eq!(assignment, Assignment { item: 1, worker: 1, station: 1 });
        assert!(game.instruction().is_empty());
        assert_eq!(game.items()[0].state, ItemState::Assigned);
        assert_eq!(game.items()[0].submitted, answer);

        let resolution = run_until_resolved(&mut game, 0);
        assert!(resolution.accepted);
        assert_eq!(resolution.item, 1);
        assert_eq!(resolution.worker, 1);
        assert_eq!(resolution.station, Some(1));

        let item = &game.items()[0];
        assert_eq!(item.state, ItemState::Resolved);
        assert_eq!(item.resolved_age, Some(0));
        assert_eq!(game.workers()[0].state, WorkerState::Free);
        assert_eq!(game.workers()[0].item, None);
        assert_eq!(game.stations()[0].state, StationState::Free);
        assert_eq!(game.stations()[0].occupant, None);
    }

    #[test]
    fn wrong_submission_recycles_item() {
        let mut game = GameState::new(&test_config(1, 1));
        type_text(&mut game, "nope");
        game.assign().expect("assignment");
        let resolution = run_until_resolved(&mut game, 0);
        assert!(!resolution.accepted);
        // The item itself went back to pending, so nothing new is spawned.
        assert_eq!(resolution.spawned, None);

        let item = &game.items()[0];
        assert_eq!(item.state, ItemState::Pending);
        assert_eq!(item.remaining_secs, item.total_secs);
        assert!(item.submitted.is_empty());
        assert_eq!(item.resolved_age, None);
        assert_eq!(game.failed_attempts(), 1);
        assert_eq!(game.workers()[0].state, WorkerState::Free);
        assert_eq!(game.stations()[0].state, StationState::Free);
    }

    #[test]
    fn single_worker_scenario_spawns_when_pool_runs_dry() {
        let mut game = GameState::new(&test_config(1, 1));
        game.generate_item();
        assert_eq!(game.pending_count(), 2);

        let answer = game.items()[0].correct().to_string();
        type_text(&mut game, &answer);
        game.assign().expect("first assignment");
        let first = run_until_resolved(&mut game, 0);
        assert!(first.accepted);
        assert_eq!(first.spawned, None);

        type_text(&mut game, "wrong");
        let second = game.assign().expect("second assignment");
        assert_eq!(second.item, 2);
        // Resolve item 2 correctly this time by fixing the submission.
        game.items[1].submitted = game.items[1].correct().to_string();
        let resolution = run_until_resolved(&mut game, 0);
        assert!(resolution.accepted);
        assert_eq!(resolution.spawned, Some(3));
        assert_eq!(game.pending_count(), 1);
    }

    #[test]
    fn enter_without_free_worker_changes_nothing() {
        let mut game = GameState::new(&test_config(1, 2));
        game.generate_item();
        type_text(&mut game, "p");
        game.assign().expect("assignment");
        type_text(&mut game, "pp");
        let before = game.snapshot();
        assert_eq!(game.assign(), Err(Unassigned::NoFreeWorker));
        assert_eq!(game.snapshot(), before);
        assert_eq!(game.instruction().as_str(), "pp");
    }

    #[test]
    fn enter_without_free_station_keeps_buffer() {
        let mut game = GameState::new(&test_config(2, 1));
        game.generate_item();
        game.assign().expect("assignment");
        type_text(&mut game, "ppp");
        assert_eq!(game.assign(), Err(Unassigned::NoFreeStation));
        assert_eq!(game.instruction().as_str(), "ppp");
        assert_eq!(game.items()[1].state, ItemState::Pending);
    }

    #[test]
    fn enter_without_pending_item_is_noop() {
        let mut game = GameState::new(&test_config(2, 2));
        game.assign().expect("assignment");
        assert_eq!(game.assign(), Err(Unassigned::NoPendingItem));
    }

    #[test]
    fn resolved_items_age_once_per_tick() {
        let mut game = GameState::new(&test_config(2, 2));
        let answer = game.items()[0].correct().to_string();
        type_text(&mut game, &answer);
        game.assign().expect("assignment");
        run_until_resolved(&mut game, 0);
        assert_eq!(game.items()[0].resolved_age, Some(0));
        game.worker_tick(1);
        game.worker_tick(1);
        assert_eq!(game.items()[0].resolved_age, Some(2));
        // Unresolved items never age.
        assert!(game.items()[1..].iter().all(|item| item.resolved_age.is_none()));
    }

    #[test]
    fn idle_worker_tick_is_housekeeping_only() {
        let mut game = GameState::new(&test_config(1, 1));
        let before = game.snapshot();
        assert_eq!(game.worker_tick(0), None);
        assert_eq!(game.snapshot(), before);
        assert_eq!(game.worker_tick(7), None);
    }

    #[test]
    fn submission_is_truncated_to_capacity() {
        let mut game = GameState::new(&test_config(1, 1));
        game.instruction_mut().replace_for_test(&"9".repeat(40));
        game.assign().expect("assignment");
        assert_eq!(game.items()[0].submitted.len(), INSTRUCTION_CAPACITY);
    }

    #[test]
    fn known_puzzle_flows_through_state() {
        let mut game = GameState::new(&test_config(1, 1));
        game.items.clear();
        let id = game.push_item_for_test(Puzzle::password("ABC"), 1);
        type_text(&mut game, "952");
        game.assign().expect("assignment");
        let resolution = game.worker_tick(0).expect("one second item resolves");
        assert!(resolution.accepted);
        assert_eq!(resolution.item, id);
        assert_eq!(resolution.spawned, Some(id + 1));

        let red = game.push_item_for_test(Puzzle::button(ButtonColor::Red), 2);
        assert_eq!(game.pending_count(), 2);
        assert_eq!(game.items().last().map(Item::correct), Some("p"));
        assert_eq!(red, id + 2);
    }

    #[test]
    fn clock_decides_win_and_loss() {
        let mut config = test_config(1, 1);
        config.session_secs = 2;
        let mut game = GameState::new(&config);
        assert_eq!(game.session_tick(), None);
        assert_eq!(game.session_tick(), Some(Outcome::Lost));
        assert!(!game.is_active());
        assert_eq!(game.session_tick(), None);

        let mut config = test_config(1, 1);
        config.required_resolved = 1;
        let mut game = GameState::new(&config);
        let answer = game.items()[0].correct().to_string();
        type_text(&mut game, &answer);
        game.assign().expect("assignment");
        run_until_resolved(&mut game, 0);
        assert_eq!(game.session_tick(), Some(Outcome::Won));
    }

    #[test]
    fn quit_stops_the_session() {
        let mut game = GameState::new(&test_config(1, 1));
        game.quit();
        assert!(!game.is_active());
        assert_eq!(game.outcome(), Some(Outcome::Quit));
    }

    #[test]
    fn broken_occupancy_is_reported() {
        let mut game = GameState::new(&test_config(1, 1));
        game.assign().expect("assignment");
        game.stations_mut_for_test()[0].occupant = None;
        assert!(matches!(
            game.check_invariants(),
            Err(InvariantViolation::AsymmetricOccupancy { .. })
                | Err(InvariantViolation::StationStateMismatch { .. })
        ));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Generate,
        GenerationTick,
        Type(bool),
        Assign,
        WorkerTick(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Generate),
            Just(Op::GenerationTick),
            any::<bool>().prop_map(Op::Type),
            Just(Op::Assign),
            (0usize..3).prop_map(Op::WorkerTick),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_sequence(
            workers in 1usize..=3,
            stations in 1usize..=3,
            ops in proptest::collection::vec(op_strategy(), 1..200),
        ) {
            let mut config = test_config(workers, stations);
            config.difficulty = Difficulty::Hard;
            config.required_resolved = 12;
            config.generation_interval = 5;
            config.kind_weights = KindWeights::for_difficulty(Difficulty::Hard);
            let mut game = GameState::new(&config);
            let mut last_id = 0;
            for op in ops {
                match op {
                    Op::Generate => {
                        game.generate_item();
                    }
                    Op::GenerationTick => {
                        game.generation_tick();
                    }
                    Op::Type(correct) => {
                        let text = match (correct, game.first_pending()) {
                            (true, Some(item)) => item.correct().to_string(),
                            _ => "0".to_string(),
                        };
                        game.instruction_mut().take();
                        for c in text.chars() {
                            game.instruction_mut().push(c);
                        }
                    }
                    Op::Assign => {
                        let _ = game.assign();
                    }
                    Op::WorkerTick(worker) => {
                        game.worker_tick(worker);
                    }
                }
                prop_assert!(game.check_invariants().is_ok(), "{:?}", game.check_invariants());
                let newest = game.items().last().map_or(0, |item| item.id);
                prop_assert!(newest >= last_id);
                last_id = newest;
                prop_assert_eq!(newest as usize, game.items().len());
            }
        }
    }
}
