use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::config::INSTRUCTION_CAPACITY;
use crate::input::{InputSource, KeyEvent};
use crate::state::{Assignment, GameState, Unassigned};
use crate::store::{SharedState, Signal};

/// The player's pending instruction, at most `INSTRUCTION_CAPACITY` chars.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstructionBuffer {
    text: String,
}

impl InstructionBuffer {
    pub fn new() -> Self {
        Self {
            text: String::with_capacity(INSTRUCTION_CAPACITY),
        }
    }

    /// Append a printable ASCII char; returns false when full or rejected.
    pub fn push(&mut self, c: char) -> bool {
        if !(' '..='~').contains(&c) || self.is_full() {
            return false;
        }
        self.text.push(c);
        true
    }

    pub fn backspace(&mut self) -> bool {
        self.text.pop().is_some()
    }

    /// Hand the contents over and leave the buffer empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.text.len() >= INSTRUCTION_CAPACITY
    }

    #[cfg(test)]
    pub(crate) fn replace_for_test(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

/// Effect of one key on the shared state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Quit,
    Edited,
    Ignored,
    Assigned(Assignment),
    Rejected(Unassigned),
}

/// Apply one key inside a critical section.
///
/// Typing and backspace work regardless of worker availability; only
/// enter needs a free worker, pending item, and free station.
pub fn handle_key(game: &mut GameState, key: KeyEvent) -> KeyOutcome {
    match key {
        KeyEvent::Quit => {
            game.quit();
            KeyOutcome::Quit
        }
        KeyEvent::Backspace => {
            if game.instruction_mut().backspace() {
                KeyOutcome::Edited
            } else {
                KeyOutcome::Ignored
            }
        }
        KeyEvent::Char(c) => {
            if game.instruction_mut().push(c) {
                KeyOutcome::Edited
            } else {
                KeyOutcome::Ignored
            }
        }
        KeyEvent::Enter => match game.assign() {
            Ok(assignment) => {
                game.set_notice(None);
                KeyOutcome::Assigned(assignment)
            }
            Err(reason) => {
                game.set_notice(Some(reason.to_string()));
                KeyOutcome::Rejected(reason)
            }
        },
    }
}

/// Poll `input` until the session stops.
pub fn run(state: &SharedState, mut input: Box<dyn InputSource>, interval: Duration) {
    debug!("coordinator started");
    while state.is_active() {
        // Poll outside the lock; sources like the autopilot lock on their own.
        if let Some(key) = input.poll() {
            if key == KeyEvent::Quit {
                state.quit();
                break;
            }
            match state.with(|game| handle_key(game, key)) {
                KeyOutcome::Quit => break,
                KeyOutcome::Assigned(assignment) => {
                    debug!(?assignment, "submission accepted");
                    state.notify(Signal::ViewUpdated);
                }
                KeyOutcome::Rejected(reason) => {
                    debug!(%reason, "submission not allocated");
                    state.notify(Signal::ViewUpdated);
                }
                KeyOutcome::Edited => state.notify(Signal::ViewUpdated),
                KeyOutcome::Ignored => {}
            }
        }
        if !state.pause(interval) {
            break;
        }
    }
    debug!("coordinator stopped");
}

pub fn spawn(
    state: Arc<SharedState>,
    input: Box<dyn InputSource>,
    interval: Duration,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("coordinator".to_string())
        .spawn(move || run(&state, input, interval))
        .expect("failed to spawn coordinator")
}
