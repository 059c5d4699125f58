//! Kiosk host services: copy newly attached USB volumes into a fixed
//! directory, and drive a video player from GPIO buttons.

pub mod error;
pub mod ingest;
pub mod player;
pub mod utils;

pub use error::{KioskError, Result};
