use crate::player::{Action, ButtonBinding};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEST_DIR: &str = "/home/apex";
/// Time the OS mounter gets after a USB partition appears
pub const DEFAULT_MOUNT_GRACE: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Minimum gap between two accepted presses on the same line
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
pub const DEFAULT_PLAYER_PROGRAM: &str = "cvlc";
pub const DEFAULT_PLAYER_ARGS: &[&str] = &[
    "--fullscreen",
    "--play-and-exit",
    "--no-video-title-show",
    "--quiet",
];

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub player: PlayerConfig,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root every USB volume is copied into
    pub dest_dir: PathBuf,

    /// Wait between an add event and mount-path lookup
    pub mount_grace: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from(DEFAULT_DEST_DIR),
            mount_grace: DEFAULT_MOUNT_GRACE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// BCM pin to action map, scanned in this order
    pub bindings: Vec<ButtonBinding>,

    pub poll_interval: Duration,

    pub debounce: Duration,

    /// External player binary; the clip path is appended to `player_args`
    pub player_program: String,

    pub player_args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let clip = |n: u8| Action::PlayClip(PathBuf::from(format!("/home/pi/Videos/{}.mp4", n)));

        Self {
            bindings: vec![
                ButtonBinding::new(13, clip(1)),
                ButtonBinding::new(19, clip(2)),
                ButtonBinding::new(26, clip(3)),
                ButtonBinding::new(21, clip(4)),
                ButtonBinding::new(20, Action::Pause),
                ButtonBinding::new(16, Action::Stop),
            ],
            poll_interval: DEFAULT_POLL_INTERVAL,
            debounce: DEFAULT_DEBOUNCE,
            player_program: DEFAULT_PLAYER_PROGRAM.to_string(),
            player_args: DEFAULT_PLAYER_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PlayerConfig {
    pub fn lines(&self) -> Vec<u8> {
        self.bindings.iter().map(|b| b.line).collect()
    }
}

impl Config {
    /// Load config from `.env` and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override defaults from any key/value lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dest) = lookup("INGEST_DEST") {
            self.ingest.dest_dir = PathBuf::from(dest);
        }

        if let Some(grace) = lookup("MOUNT_GRACE") {
            self.ingest.mount_grace = parse_duration("MOUNT_GRACE", &grace)?;
        }

        if let Some(interval) = lookup("POLL_INTERVAL") {
            self.player.poll_interval = parse_duration("POLL_INTERVAL", &interval)?;
            if self.player.poll_interval.is_zero() {
                bail!("POLL_INTERVAL must be greater than zero");
            }
        }

        if let Some(debounce) = lookup("DEBOUNCE") {
            self.player.debounce = parse_duration("DEBOUNCE", &debounce)?;
        }

        if let Some(program) = lookup("PLAYER_PROGRAM") {
            self.player.player_program = program;
        }

        if let Some(args) = lookup("PLAYER_ARGS") {
            self.player.player_args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Some(bindings) = lookup("BUTTON_BINDINGS") {
            self.player.bindings = parse_bindings(&bindings)?;
        }

        Ok(())
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim()).with_context(|| format!("invalid {}: {:?}", key, value))
}

/// Parse `13=/home/pi/Videos/1.mp4,20=pause,16=stop`
pub fn parse_bindings(raw: &str) -> Result<Vec<ButtonBinding>> {
    let mut bindings = Vec::new();
    let mut seen = HashSet::new();

    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (pin, target) = item
            .split_once('=')
            .with_context(|| format!("binding {:?} is not PIN=TARGET", item))?;
        let line: u8 = pin
            .trim()
            .parse()
            .with_context(|| format!("invalid pin in binding {:?}", item))?;
        if target.trim().is_empty() {
            bail!("binding {:?} has no target", item);
        }
        if !seen.insert(line) {
            bail!("pin {} is bound more than once", line);
        }
        bindings.push(ButtonBinding::new(line, Action::parse(target)));
    }

    if bindings.is_empty() {
        bail!("BUTTON_BINDINGS is empty");
    }
    Ok(bindings)
}

pub fn load_config() -> Result<Config> {
    Config::load()
}
