pub mod controller;
pub mod engine;
#[cfg(feature = "gpio")]
pub mod gpio;
pub mod input;

pub use controller::PlaybackController;
pub use engine::{PlaybackEngine, ProcessEngine};
pub use input::{InputMultiplexer, LineLevel, LineSource};

use std::fmt;
use std::path::PathBuf;

/// What a button press asks the player to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PlayClip(PathBuf),
    Pause,
    Stop,
}

impl Action {
    /// `pause` and `stop` (any case) are commands, anything else is a clip path
    pub fn parse(target: &str) -> Self {
        match target.trim() {
            t if t.eq_ignore_ascii_case("pause") => Action::Pause,
            t if t.eq_ignore_ascii_case("stop") => Action::Stop,
            t => Action::PlayClip(PathBuf::from(t)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::PlayClip(path) => write!(f, "play {}", path.display()),
            Action::Pause => write!(f, "pause"),
            Action::Stop => write!(f, "stop"),
        }
    }
}

/// A GPIO line (BCM numbering) wired to one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonBinding {
    pub line: u8,
    pub action: Action,
}

impl ButtonBinding {
    pub fn new(line: u8, action: Action) -> Self {
        Self { line, action }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(PathBuf),
    Paused(PathBuf),
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing(path) => write!(f, "playing {}", path.display()),
            PlaybackState::Paused(path) => write!(f, "paused {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(Action::parse("pause"), Action::Pause);
        assert_eq!(Action::parse(" STOP "), Action::Stop);
        assert_eq!(
            Action::parse("/home/pi/Videos/1.mp4"),
            Action::PlayClip(PathBuf::from("/home/pi/Videos/1.mp4"))
        );
    }
}
