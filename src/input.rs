use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::store::SharedState;

const KEY_BACKSPACE_CURSES: i32 = 263;

/// A decoded keystroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Quit,
    Backspace,
    Enter,
    Char(char),
}

impl KeyEvent {
    /// Decode a raw terminal key code; unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0x71 | 0x51 => Some(KeyEvent::Quit),
            8 | 127 | KEY_BACKSPACE_CURSES => Some(KeyEvent::Backspace),
            0x0a | 0x0d => Some(KeyEvent::Enter),
            32..=126 => char::from_u32(code as u32).map(KeyEvent::Char),
            _ => None,
        }
    }
}

/// A non-blocking stream of key events; `None` means nothing is waiting.
pub trait InputSource: Send {
    fn poll(&mut self) -> Option<KeyEvent>;
}

/// Fixed list of keys, handed out one per poll.
pub struct ScriptedInput {
    keys: VecDeque<KeyEvent>,
}

impl ScriptedInput {
    pub fn new(keys: impl IntoIterator<Item = KeyEvent>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Keys for typing `text` and pressing enter.
    pub fn line(text: &str) -> Vec<KeyEvent> {
        text.chars()
            .map(KeyEvent::Char)
            .chain(std::iter::once(KeyEvent::Enter))
            .collect()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<KeyEvent> {
        self.keys.pop_front()
    }
}

/// Keys delivered over a channel from another thread.
pub struct ChannelInput {
    rx: Receiver<KeyEvent>,
    disconnected: bool,
}

impl ChannelInput {
    pub fn new(rx: Receiver<KeyEvent>) -> Self {
        Self {
            rx,
            disconnected: false,
        }
    }

    pub fn pair() -> (Sender<KeyEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl InputSource for ChannelInput {
    fn poll(&mut self) -> Option<KeyEvent> {
        if self.disconnected {
            return None;
        }
        match self.rx.try_recv() {
            Ok(key) => Some(key),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                // A closed input stream means the player is gone.
                self.disconnected = true;
                Some(KeyEvent::Quit)
            }
        }
    }
}

/// Translate one line of text into key events, ending with enter.
///
/// Keys are emitted in order; a quit key ends the line.
pub fn decode_line(line: &str) -> Vec<KeyEvent> {
    let mut keys = Vec::with_capacity(line.len() + 1);
    for byte in line.bytes() {
        let Some(key) = KeyEvent::from_code(i32::from(byte)) else {
            continue;
        };
        keys.push(key);
        if key == KeyEvent::Quit {
            return keys;
        }
    }
    keys.push(KeyEvent::Enter);
    keys
}

/// Read stdin line by line on a background thread.
///
/// The thread ends at EOF; dropping the sender then surfaces as a quit.
pub fn spawn_stdin_reader() -> ChannelInput {
    let (tx, input) = ChannelInput::pair();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                for key in decode_line(&line) {
                    if tx.send(key).is_err() {
                        return;
                    }
                }
            }
            debug!("stdin closed");
        })
        .expect("failed to spawn stdin reader");
    input
}

/// Plays the game by peeking at the store and typing answers.
///
/// With `mistake_rate > 0` some answers are deliberately corrupted, which
/// exercises the recycle path.
pub struct Autopilot {
    state: Arc<SharedState>,
    script: ScriptedInput,
    rng: StdRng,
    mistake_rate: f64,
}

impl Autopilot {
    pub fn new(state: Arc<SharedState>, seed: Option<u64>, mistake_rate: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ 0x5eed),
            None => StdRng::from_entropy(),
        };
        Self {
            state,
            script: ScriptedInput::new(Vec::new()),
            rng,
            mistake_rate: mistake_rate.clamp(0.0, 1.0),
        }
    }

    fn plan(&mut self) {
        let game = self.state.lock();
        if !game.is_active() {
            return;
        }
        let stale = game.instruction().len();
        let answer = match game.first_pending() {
            Some(item) if game.has_free_worker() && game.has_free_station() => {
                item.correct().to_string()
            }
            _ => return,
        };
        drop(game);

        let mut answer = answer;
        if self.rng.gen_bool(self.mistake_rate) {
            answer.push('0');
        }
        let keys = &mut self.script.keys;
        keys.extend(std::iter::repeat_n(KeyEvent::Backspace, stale));
        keys.extend(ScriptedInput::line(&answer));
    }
}

impl InputSource for Autopilot {
    fn poll(&mut self) -> Option<KeyEvent> {
        if let Some(key) = self.script.poll() {
            return Some(key);
        }
        self.plan();
        self.script.poll()
    }
}
