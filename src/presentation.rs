use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::state::Snapshot;
use crate::store::SharedState;
use crate::types::{ItemState, StationState, WorkerState};

pub trait Presenter: Send {
    fn render(&mut self, snapshot: &Snapshot);
}

/// Render a full text frame for one snapshot.
pub fn render_frame(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== DEFUSE [{}] time {:>3}s/{}s  resolved {}/{}  errors {} ==",
        snapshot.difficulty,
        snapshot.remaining_secs,
        snapshot.session_secs,
        snapshot.resolved,
        snapshot.required_resolved,
        snapshot.failed_attempts,
    );

    let _ = writeln!(out, "-- board --");
    let mut shown = 0;
    for item in &snapshot.items {
        match item.state {
            ItemState::Pending => {
                let _ = writeln!(
                    out,
                    "  M{:<3} {:<9} {}s  {}",
                    item.id, item.state, item.total_secs, item.puzzle.payload
                );
                shown += 1;
            }
            ItemState::Assigned => {
                let _ = writeln!(
                    out,
                    "  M{:<3} {:<9} {}s left  {}",
                    item.id, item.state, item.remaining_secs, item.puzzle.payload
                );
                shown += 1;
            }
            // Only freshly resolved items stay on the board.
            ItemState::Resolved if item.resolved_age.is_some_and(|age| age < 3) => {
                let _ = writeln!(out, "  M{:<3} {:<9} {}", item.id, item.state, item.puzzle.payload);
                shown += 1;
            }
            ItemState::Resolved => {}
        }
    }
    if shown == 0 {
        let _ = writeln!(out, "  (empty)");
    }

    let _ = writeln!(out, "-- crew --");
    for worker in &snapshot.workers {
        match (worker.state, worker.item, worker.station) {
            (WorkerState::Busy, Some(item), Some(station)) => {
                let item_id = snapshot.items.get(item).map_or(0, |item| item.id);
                let station_id = snapshot.stations.get(station).map_or(0, |s| s.id);
                let _ = writeln!(out, "  T{} busy on M{item_id} at B{station_id}", worker.id);
            }
            _ => {
                let _ = writeln!(out, "  T{} free", worker.id);
            }
        }
    }
    let benches: Vec<String> = snapshot
        .stations
        .iter()
        .map(|station| match station.state {
            StationState::Free => format!("B{}:free", station.id),
            StationState::Occupied => format!("B{}:busy", station.id),
        })
        .collect();
    let _ = writeln!(out, "  {}", benches.join(" "));

    let _ = writeln!(out, "> {}", snapshot.instruction);
    if let Some(notice) = &snapshot.notice {
        let _ = writeln!(out, "! {notice}");
    }
    if let Some(outcome) = snapshot.outcome {
        let _ = writeln!(out, "** session {outcome} **");
    }
    out
}

/// Writes a frame to any writer whenever the view changes.
pub struct FramePresenter<W: Write + Send> {
    out: W,
    last: Option<Snapshot>,
}

impl<W: Write + Send> FramePresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Presenter for FramePresenter<W> {
    fn render(&mut self, snapshot: &Snapshot) {
        if self.last.as_ref() == Some(snapshot) {
            return;
        }
        let frame = render_frame(snapshot);
        if let Err(err) = self.out.write_all(frame.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(%err, "failed to write frame");
        }
        self.last = Some(snapshot.clone());
    }
}

/// Emits a compact status line through tracing; for headless runs.
#[derive(Default)]
pub struct TracingPresenter {
    last: Option<(usize, usize, u32, u32)>,
}

impl Presenter for TracingPresenter {
    fn render(&mut self, snapshot: &Snapshot) {
        let busy = snapshot
            .workers
            .iter()
            .filter(|w| w.state == WorkerState::Busy)
            .count();
        let key = (snapshot.resolved, busy, snapshot.failed_attempts, snapshot.remaining_secs);
        if self.last == Some(key) {
            return;
        }
        self.last = Some(key);
        debug!(
            remaining = snapshot.remaining_secs,
            pending = snapshot.pending,
            busy,
            resolved = snapshot.resolved,
            errors = snapshot.failed_attempts,
            "board"
        );
    }
}

/// Render until the session stops, then draw the final frame.
pub fn run(state: &SharedState, presenter: &mut dyn Presenter, interval: Duration) {
    debug!("presenter started");
    loop {
        let snapshot = state.wait_for_view(interval);
        presenter.render(&snapshot);
        if !snapshot.active {
            break;
        }
    }
    debug!("presenter stopped");
}

pub fn spawn(
    state: Arc<SharedState>,
    mut presenter: Box<dyn Presenter>,
    interval: Duration,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("presenter".to_string())
        .spawn(move || run(&state, presenter.as_mut(), interval))
        .expect("failed to spawn presenter")
}
