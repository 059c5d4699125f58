use super::controller::PlaybackController;
use super::ButtonBinding;
use crate::error::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLevel {
    High,
    Low,
}

/// Claimed digital input lines
pub trait LineSource: Send {
    fn read(&mut self, line: u8) -> Result<LineLevel>;

    /// Give the lines back to the system
    fn release(&mut self);
}

/// Polls the bound lines on a fixed tick and dispatches each press, with a
/// per-line debounce window.
pub struct InputMultiplexer {
    lines: Box<dyn LineSource>,
    bindings: Vec<ButtonBinding>,
    poll_interval: Duration,
    debounce: Duration,
    last_fired: HashMap<u8, Instant>,
}

impl InputMultiplexer {
    pub fn new(
        lines: Box<dyn LineSource>,
        bindings: Vec<ButtonBinding>,
        poll_interval: Duration,
        debounce: Duration,
    ) -> Self {
        Self {
            lines,
            bindings,
            poll_interval,
            debounce,
            last_fired: HashMap::new(),
        }
    }

    /// Poll forever. Only the caller dropping this future ends the loop.
    pub async fn run(&mut self, controller: &mut PlaybackController) {
        info!(
            "Starting main loop: {} buttons, poll every {:?}, debounce {:?}",
            self.bindings.len(),
            self.poll_interval,
            self.debounce
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.scan(Instant::now(), controller).await;
        }
    }

    /// One pass over every line; returns how many actions were dispatched
    pub async fn scan(&mut self, now: Instant, controller: &mut PlaybackController) -> usize {
        let mut fired = 0;
        for binding in &self.bindings {
            let level = match self.lines.read(binding.line) {
                Ok(level) => level,
                Err(e) => {
                    warn!("Failed to read line {}: {}", binding.line, e);
                    continue;
                }
            };
            if level != LineLevel::Low {
                continue;
            }

            if let Some(last) = self.last_fired.get(&binding.line) {
                if now.saturating_duration_since(*last) < self.debounce {
                    continue;
                }
            }

            debug!("Line {} pressed: {}", binding.line, binding.action);
            self.last_fired.insert(binding.line, now);
            controller.apply(&binding.action).await;
            fired += 1;
        }
        fired
    }

    pub fn release(&mut self) {
        self.lines.release();
        info!("GPIO lines released");
    }
}
