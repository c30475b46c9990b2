use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::state::{GameState, Snapshot};

/// State-change signals. Each one is broadcast, never targeted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// A pending item appeared or came back.
    ItemAvailable,
    /// A station was released.
    StationAvailable,
    /// Anything a presenter would draw changed.
    ViewUpdated,
    /// The session stopped running or finished.
    Halted,
}

/// One session's game state behind a single mutex.
pub struct SharedState {
    inner: Mutex<GameState>,
    item_available: Condvar,
    station_available: Condvar,
    view_updated: Condvar,
    halted: Condvar,
}

impl SharedState {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            inner: Mutex::new(GameState::new(config)),
            item_available: Condvar::new(),
            station_available: Condvar::new(),
            view_updated: Condvar::new(),
            halted: Condvar::new(),
        }
    }

    /// Acquire the lock for one critical section.
    pub fn lock(&self) -> MutexGuard<'_, GameState> {
        self.inner.lock().expect("game state mutex poisoned")
    }

    /// Run `f` under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut GameState) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    fn condvar(&self, signal: Signal) -> &Condvar {
        match signal {
            Signal::ItemAvailable => &self.item_available,
            Signal::StationAvailable => &self.station_available,
            Signal::ViewUpdated => &self.view_updated,
            Signal::Halted => &self.halted,
        }
    }

    /// Wake every thread waiting on `signal`.
    pub fn notify(&self, signal: Signal) {
        self.condvar(signal).notify_all();
    }

    /// Wait for `signal` or `timeout`, whichever comes first.
    ///
    /// The lock is released while waiting and held again on return.
    /// Spurious wakeups are not filtered; callers re-check state.
    pub fn wait<'a>(
        &'a self,
        guard: MutexGuard<'a, GameState>,
        signal: Signal,
        timeout: Duration,
    ) -> MutexGuard<'a, GameState> {
        let (guard, _) = self
            .condvar(signal)
            .wait_timeout(guard, timeout)
            .expect("condvar wait failed");
        guard
    }

    /// Sleep for one loop interval, waking early if the session halts.
    /// Returns whether the session is still active.
    pub fn pause(&self, interval: Duration) -> bool {
        let guard = self.lock();
        // Wait releases the lock and re-acquires it before returning.
        let (guard, _) = self
            .halted
            .wait_timeout_while(guard, interval, |game| game.is_active())
            .expect("condvar wait failed");
        guard.is_active()
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    /// Stop the session and wake every waiting loop.
    pub fn quit(&self) {
        self.lock().quit();
        self.notify(Signal::Halted);
        self.notify(Signal::ViewUpdated);
    }

    /// Block until the view changes (or `timeout`), then copy it.
    pub fn wait_for_view(&self, timeout: Duration) -> Snapshot {
        let guard = self.lock();
        let guard = self.wait(guard, Signal::ViewUpdated, timeout);
        guard.snapshot()
    }
}
