use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::state::Resolution;
use crate::store::{SharedState, Signal};

/// One worker tick; broadcasts when the worker's item was resolved.
pub fn tick(state: &SharedState, worker: usize) -> Option<Resolution> {
    let resolution = state.with(|game| game.worker_tick(worker))?;
    if resolution.accepted {
        info!(
            item = resolution.item,
            worker = resolution.worker,
            "item defused"
        );
    } else {
        info!(
            item = resolution.item,
            worker = resolution.worker,
            "wrong instruction, item returned to the board"
        );
    }
    state.notify(Signal::ItemAvailable);
    state.notify(Signal::StationAvailable);
    state.notify(Signal::ViewUpdated);
    Some(resolution)
}

pub fn run(state: &SharedState, worker: usize, interval: Duration) {
    debug!(worker, "worker started");
    while state.is_active() {
        tick(state, worker);
        if !state.pause(interval) {
            break;
        }
    }
    debug!(worker, "worker stopped");
}

pub fn spawn(
    state: Arc<SharedState>,
    worker: usize,
    interval: Duration,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name(format!("worker-{}", worker + 1))
        .spawn(move || run(&state, worker, interval))
        .expect("failed to spawn worker thread")
}
