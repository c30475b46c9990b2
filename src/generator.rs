use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::store::{SharedState, Signal};

/// Run one generator tick and broadcast if anything was created.
pub fn tick(state: &SharedState) -> usize {
    let created = state.with(|game| game.generation_tick());
    if !created.is_empty() {
        debug!(?created, "generator produced items");
        state.notify(Signal::ItemAvailable);
        state.notify(Signal::ViewUpdated);
    }
    created.len()
}

pub fn run(state: &SharedState, interval: Duration) {
    debug!("generator started");
    while state.is_active() {
        tick(state);
        if !state.pause(interval) {
            break;
        }
    }
    debug!("generator stopped");
}

pub fn spawn(state: Arc<SharedState>, interval: Duration) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("generator".to_string())
        .spawn(move || run(&state, interval))
        .expect("failed to spawn generator")
}
