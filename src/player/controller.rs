use super::engine::PlaybackEngine;
use super::{Action, PlaybackState};
use std::path::Path;
use tracing::{error, info};

/// Sole owner of the playback engine. State advances on the requested action
/// even when the engine reports a failure; the engine's own status is not
/// read back.
pub struct PlaybackController {
    engine: Box<dyn PlaybackEngine>,
    state: PlaybackState,
}

impl PlaybackController {
    pub fn new(engine: Box<dyn PlaybackEngine>) -> Self {
        Self {
            engine,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub async fn apply(&mut self, action: &Action) {
        match action {
            Action::PlayClip(path) => self.play_clip(path).await,
            Action::Pause => self.pause().await,
            Action::Stop => self.stop().await,
        }
    }

    async fn play_clip(&mut self, path: &Path) {
        // Stop, load, play: the old clip is gone before the new one starts
        if let Err(e) = self.engine.stop().await {
            error!("Playback error for {}: {}", path.display(), e);
        }
        let started = match self.engine.load(path).await {
            Ok(()) => self.engine.play().await,
            Err(e) => Err(e),
        };
        match started {
            Ok(()) => info!("Playing video: {}", path.display()),
            Err(e) => error!("Playback error for {}: {}", path.display(), e),
        }
        self.state = PlaybackState::Playing(path.to_path_buf());
    }

    async fn pause(&mut self) {
        match self.engine.pause().await {
            Ok(()) => info!("Video paused"),
            Err(e) => error!("Pause error: {}", e),
        }
        if let PlaybackState::Playing(path) = &self.state {
            self.state = PlaybackState::Paused(path.clone());
        }
    }

    async fn stop(&mut self) {
        match self.engine.stop().await {
            Ok(()) => info!("Video stopped"),
            Err(e) => error!("Stop error: {}", e),
        }
        self.state = PlaybackState::Idle;
    }

    /// Terminal transition: stop whatever is loaded and release the engine
    pub async fn shutdown(&mut self) {
        info!("Shutting down player from state: {}", self.state);
        if let Err(e) = self.engine.stop().await {
            error!("Stop error during shutdown: {}", e);
        }
        if let Err(e) = self.engine.release().await {
            error!("Failed to release player: {}", e);
        }
        self.state = PlaybackState::Idle;
    }
}
