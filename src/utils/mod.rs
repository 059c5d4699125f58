pub mod config;
pub mod disk;
pub mod logging;
pub mod shutdown;
