use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::audio::{self, Audio, Soundtrack};
use crate::config::SessionConfig;
use crate::input::InputSource;
use crate::monitor::{self, InvariantMonitor};
use crate::presentation::Presenter;
use crate::store::{SharedState, Signal};
use crate::types::{Difficulty, Outcome};
use crate::{coordinator, generator, presentation, worker};

/// Final numbers for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub difficulty: Difficulty,
    pub workers: usize,
    pub stations: usize,
    pub outcome: Outcome,
    pub resolved: usize,
    pub required: usize,
    pub generated: usize,
    pub failed_attempts: u32,
    pub remaining_secs: u32,
    pub elapsed: Duration,
    pub invariant_samples: usize,
    pub invariant_violations: usize,
}

/// One game: a shared store plus the config used to drive its loops.
pub struct Session {
    config: SessionConfig,
    state: Arc<SharedState>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let state = Arc::new(SharedState::new(&config));
        Self { config, state }
    }

    /// Handle for collaborators that need to read the store (e.g. autopilot).
    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// Advance the session clock once and wake everyone if it ended.
    pub fn clock_tick(state: &SharedState) -> Option<Outcome> {
        let outcome = state.with(|game| game.session_tick());
        if outcome.is_some() {
            state.notify(Signal::Halted);
        }
        state.notify(Signal::ViewUpdated);
        outcome
    }

    /// Run every loop until win, loss, or quit; blocks the caller, which
    /// drives the session clock.
    pub fn run(
        self,
        input: Box<dyn InputSource>,
        presenter: Box<dyn Presenter>,
        audio: &mut dyn Audio,
        soundtrack: &Soundtrack,
    ) -> SessionReport {
        let config = &self.config;
        let cadence = config.cadence;
        let (workers, stations) = {
            let game = self.state.lock();
            (game.workers().len(), game.stations().len())
        };
        info!(
            difficulty = %config.difficulty,
            workers,
            stations,
            required = config.required_resolved,
            "session starting"
        );
        audio::report(audio.play_looping(&soundtrack.theme));

        let monitor = Arc::new(InvariantMonitor::new());
        let mut handles: Vec<thread::JoinHandle<()>> = Vec::new();
        if config.validate {
            handles.push(monitor::spawn(
                Arc::clone(&monitor),
                Arc::clone(&self.state),
                cadence.monitor,
            ));
        }
        handles.push(generator::spawn(Arc::clone(&self.state), cadence.generation));
        for idx in 0..workers {
            handles.push(worker::spawn(Arc::clone(&self.state), idx, cadence.worker));
        }
        handles.push(coordinator::spawn(
            Arc::clone(&self.state),
            input,
            cadence.input,
        ));
        handles.push(presentation::spawn(
            Arc::clone(&self.state),
            presenter,
            cadence.render,
        ));

        let start = Instant::now();
        while self.state.pause(cadence.clock) {
            if let Some(outcome) = Self::clock_tick(&self.state) {
                debug!(%outcome, "clock stopped the session");
                break;
            }
        }
        // Quit may have come from the coordinator; make sure nobody is parked.
        self.state.notify(Signal::Halted);
        self.state.notify(Signal::ViewUpdated);

        for handle in handles {
            handle.join().expect("session thread panicked");
        }
        let elapsed = start.elapsed();

        if audio.is_playing() {
            audio.stop();
        }
        let game = self.state.lock();
        let outcome = game.outcome().unwrap_or(Outcome::Quit);
        if let Some(track) = soundtrack.for_outcome(outcome) {
            audio::report(audio.play_once(track));
        }

        let report = SessionReport {
            difficulty: config.difficulty,
            workers,
            stations,
            outcome,
            resolved: game.resolved_count(),
            required: game.required_resolved(),
            generated: game.items().len(),
            failed_attempts: game.failed_attempts(),
            remaining_secs: game.remaining_secs(),
            elapsed,
            invariant_samples: monitor.samples(),
            invariant_violations: monitor.violations().len(),
        };
        info!(
            %outcome,
            resolved = report.resolved,
            failed = report.failed_attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "session finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioSettings, SilentAudio};
    use crate::config::Cadence;
    use crate::input::{Autopilot, KeyEvent, ScriptedInput};
    use crate::item_kinds::KindWeights;
    use crate::presentation::{FramePresenter, TracingPresenter};

    fn fast_config(difficulty: Difficulty) -> SessionConfig {
        SessionConfig::new(difficulty)
            .with_pools(2, 2)
            .with_seed(Some(77))
            .with_cadence(Cadence::scaled(50))
            .with_validation(true)
    }

    fn silent(difficulty: Difficulty) -> SilentAudio {
        SilentAudio::new(AudioSettings::new(difficulty, false))
    }

    #[test]
    fn autopilot_wins_an_easy_session() {
        let config = fast_config(Difficulty::Easy);
        let session = Session::new(config);
        let pilot = Autopilot::new(session.state(), Some(1), 0.0);
        let report = session.run(
            Box::new(pilot),
            Box::new(TracingPresenter::default()),
            &mut silent(Difficulty::Easy),
            &Soundtrack::in_dir("assets"),
        );
        assert_eq!(report.outcome, Outcome::Won);
        assert_eq!(report.resolved, report.required);
        assert_eq!(report.failed_attempts, 0);
        assert_eq!(report.invariant_violations, 0);
        assert!(report.invariant_samples > 0);
    }

    /// Appends a stray digit to the first submission of the wrapped source.
    struct FirstAnswerWrong {
        inner: Autopilot,
        corrupted: bool,
        held_enter: bool,
    }

    impl InputSource for FirstAnswerWrong {
        fn poll(&mut self) -> Option<KeyEvent> {
            if self.held_enter {
                self.held_enter = false;
                return Some(KeyEvent::Enter);
            }
            let key = self.inner.poll()?;
            if key == KeyEvent::Enter && !self.corrupted {
                self.corrupted = true;
                self.held_enter = true;
                return Some(KeyEvent::Char('0'));
            }
            Some(key)
        }
    }

    #[test]
    fn mistakes_are_recycled_and_still_win() {
        let mut config = fast_config(Difficulty::Medium).with_kind_weights(
            KindWeights::for_difficulty(Difficulty::Medium),
        );
        // Room for the retry on top of eight full-length items.
        config.session_secs = 240;
        let session = Session::new(config);
        let pilot = FirstAnswerWrong {
            inner: Autopilot::new(session.state(), Some(3), 0.0),
            corrupted: false,
            held_enter: false,
        };
        let report = session.run(
            Box::new(pilot),
            Box::new(TracingPresenter::default()),
            &mut silent(Difficulty::Medium),
            &Soundtrack::in_dir("assets"),
        );
        assert_eq!(report.invariant_violations, 0);
        assert!(report.failed_attempts > 0);
        assert_eq!(report.outcome, Outcome::Won);
        assert_eq!(report.resolved, report.required);
        assert!(report.generated <= report.required);
    }

    #[test]
    fn idle_player_loses_when_clock_expires() {
        let mut config = fast_config(Difficulty::Hard);
        config.session_secs = 5;
        let session = Session::new(config);
        let report = session.run(
            Box::new(ScriptedInput::new(Vec::new())),
            Box::new(FramePresenter::new(Vec::new())),
            &mut silent(Difficulty::Hard),
            &Soundtrack::in_dir("assets"),
        );
        assert_eq!(report.outcome, Outcome::Lost);
        assert_eq!(report.resolved, 0);
        assert_eq!(report.remaining_secs, 0);
        assert!(report.generated < report.required);
        assert_eq!(report.failed_attempts, 0);
    }

    #[test]
    fn quit_key_ends_session_early() {
        let config = fast_config(Difficulty::Easy);
        let session = Session::new(config);
        let report = session.run(
            Box::new(ScriptedInput::new([KeyEvent::Char('1'), KeyEvent::Quit])),
            Box::new(TracingPresenter::default()),
            &mut silent(Difficulty::Easy),
            &Soundtrack::in_dir("assets"),
        );
        assert_eq!(report.outcome, Outcome::Quit);
        assert!(report.remaining_secs > 0);
    }

    #[test]
    fn clock_tick_reports_loss_once() {
        let mut config = fast_config(Difficulty::Easy);
        config.session_secs = 1;
        let state = SharedState::new(&config);
        assert_eq!(Session::clock_tick(&state), Some(Outcome::Lost));
        assert_eq!(Session::clock_tick(&state), None);
    }
}
