use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::types::{Difficulty, Outcome};

const VOLUME_DEFAULT: u8 = 64;
const VOLUME_MEDIUM: u8 = 80;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio backend available")]
    BackendUnavailable,
    #[error("music file not found: {0}")]
    MissingFile(PathBuf),
}

/// Music on/off plus the medium-difficulty boost.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioSettings {
    pub music_on: bool,
    pub medium_phase: bool,
}

impl AudioSettings {
    pub fn new(difficulty: Difficulty, music_on: bool) -> Self {
        Self {
            music_on,
            medium_phase: difficulty == Difficulty::Medium,
        }
    }

    pub fn volume(&self) -> u8 {
        match (self.music_on, self.medium_phase) {
            (false, _) => 0,
            (true, true) => VOLUME_MEDIUM,
            (true, false) => VOLUME_DEFAULT,
        }
    }
}

pub trait Audio: Send {
    fn play_looping(&mut self, path: &Path) -> Result<(), AudioError>;
    fn play_once(&mut self, path: &Path) -> Result<(), AudioError>;
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

/// Backend used when no sound device is wired in. Every play reports
/// `BackendUnavailable` after checking the file exists.
pub struct SilentAudio {
    settings: AudioSettings,
}

impl SilentAudio {
    pub fn new(settings: AudioSettings) -> Self {
        Self { settings }
    }

    fn open(&self, path: &Path) -> Result<(), AudioError> {
        if !path.exists() {
            return Err(AudioError::MissingFile(path.to_path_buf()));
        }
        Err(AudioError::BackendUnavailable)
    }
}

impl Audio for SilentAudio {
    fn play_looping(&mut self, path: &Path) -> Result<(), AudioError> {
        if self.settings.volume() == 0 {
            return Ok(());
        }
        self.open(path)
    }

    fn play_once(&mut self, path: &Path) -> Result<(), AudioError> {
        self.play_looping(path)
    }

    fn stop(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }
}

/// Track names used by the session.
#[derive(Clone, Debug)]
pub struct Soundtrack {
    pub theme: PathBuf,
    pub victory: PathBuf,
    pub defeat: PathBuf,
}

impl Soundtrack {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            theme: dir.join("theme.mp3"),
            victory: dir.join("victory.mp3"),
            defeat: dir.join("defeat.mp3"),
        }
    }

    pub fn for_outcome(&self, outcome: Outcome) -> Option<&Path> {
        match outcome {
            Outcome::Won => Some(self.victory.as_path()),
            Outcome::Lost => Some(self.defeat.as_path()),
            Outcome::Quit => None,
        }
    }
}

/// Log an audio failure as a warning and carry on.
pub fn report(result: Result<(), AudioError>) {
    if let Err(err) = result {
        warn!(%err, "audio disabled");
    }
}
