//! Periodic invariant sampling for validation runs.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::state::InvariantViolation;
use crate::store::SharedState;

struct MonitorState {
    samples: usize,
    violations: Vec<InvariantViolation>,
}

/// Records the result of each invariant check it is asked to make.
pub struct InvariantMonitor {
    state: Mutex<MonitorState>,
}

impl InvariantMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState {
                samples: 0,
                violations: Vec::new(),
            }),
        }
    }

    /// Check the store once; returns true when it is consistent.
    pub fn observe(&self, store: &SharedState) -> bool {
        // Check under the store lock, record under ours; never hold both.
        let result = store.lock().check_invariants();
        let mut guard = self.state.lock().expect("invariant monitor mutex poisoned");
        guard.samples += 1;
        match result {
            Ok(()) => true,
            Err(violation) => {
                warn!(%violation, "invariant violated");
                guard.violations.push(violation);
                false
            }
        }
    }

    pub fn samples(&self) -> usize {
        let guard = self.state.lock().expect("invariant monitor mutex poisoned");
        guard.samples
    }

    pub fn violations(&self) -> Vec<InvariantViolation> {
        let guard = self.state.lock().expect("invariant monitor mutex poisoned");
        guard.violations.clone()
    }
}

/// Sample the store every `poll` until the session stops.
pub fn spawn(
    monitor: Arc<InvariantMonitor>,
    store: Arc<SharedState>,
    poll: Duration,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("invariant-monitor".to_string())
        .spawn(move || {
            debug!("invariant monitor started");
            loop {
                monitor.observe(&store);
                if !store.pause(poll) {
                    break;
                }
            }
            // One last look at the final state.
            monitor.observe(&store);
            debug!(samples = monitor.samples(), "invariant monitor stopped");
        })
        .expect("failed to spawn invariant monitor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_config;

    #[test]
    fn consistent_store_records_samples_only() {
        let monitor = InvariantMonitor::new();
        let store = SharedState::new(&test_config(2, 2));
        assert!(monitor.observe(&store));
        assert!(monitor.observe(&store));
        assert_eq!(monitor.samples(), 2);
        assert!(monitor.violations().is_empty());
    }

    #[test]
    fn broken_store_is_recorded() {
        let monitor = InvariantMonitor::new();
        let store = SharedState::new(&test_config(1, 1));
        store.with(|game| {
            game.assign().expect("assignment");
            game.stations_mut_for_test()[0].occupant = None;
        });
        assert!(!monitor.observe(&store));
        assert_eq!(monitor.violations().len(), 1);
    }

    #[test]
    fn spawned_monitor_stops_with_session() {
        let monitor = Arc::new(InvariantMonitor::new());
        let store = Arc::new(SharedState::new(&test_config(1, 1)));
        let handle = spawn(Arc::clone(&monitor), Arc::clone(&store), Duration::from_millis(1));
        thread::sleep(Duration::from_millis(10));
        store.quit();
        handle.join().expect("monitor panicked");
        assert!(monitor.samples() >= 2);
        assert!(monitor.violations().is_empty());
    }
}
