pub mod copier;
pub mod monitor;
pub mod watcher;

pub use copier::{copy_dir_tree, copy_entries, CopyReport};
pub use monitor::UdevMonitor;
pub use watcher::{DeviceSource, VolumeWatcher};

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    Usb,
    Other,
}

impl Bus {
    /// Classify a udev `ID_BUS` value
    pub fn from_id_bus(value: &str) -> Self {
        if value.eq_ignore_ascii_case("usb") {
            Bus::Usb
        } else {
            Bus::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    Add,
    Remove,
    Other,
}

impl DeviceAction {
    pub fn parse(value: &str) -> Self {
        match value {
            "add" => DeviceAction::Add,
            "remove" => DeviceAction::Remove,
            _ => DeviceAction::Other,
        }
    }
}

/// A block-device partition as seen in an enumeration or a hot-plug event
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDevice {
    /// Kernel device name, e.g. `sda1`
    pub name: String,
    /// sysfs path below `/sys`, e.g. `/devices/.../block/sda/sda1`
    pub devpath: String,
    pub bus: Bus,
    pub action: DeviceAction,
    /// Present only once the OS has mounted the partition
    pub mount_path: Option<PathBuf>,
    /// Raw udev properties
    pub properties: HashMap<String, String>,
}

impl BlockDevice {
    pub fn devnode(&self) -> PathBuf {
        PathBuf::from("/dev").join(&self.name)
    }

    pub fn is_usb(&self) -> bool {
        self.bus == Bus::Usb
    }
}

/// One ingestion attempt: copy a mounted volume into the destination root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl CopyTask {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    /// Run the copy; failures are logged and never propagated
    pub fn run(&self) -> Option<CopyReport> {
        info!("Copying {} into {}", self.source.display(), self.dest.display());
        match copy_entries(&self.source, &self.dest) {
            Ok(report) => {
                info!(
                    "Finished {}: {} files copied, {} directories created, {} skipped",
                    self.source.display(),
                    report.files_copied,
                    report.dirs_created,
                    report.skipped.len()
                );
                Some(report)
            }
            Err(e) => {
                error!("Error copying files from {}: {}", self.source.display(), e);
                None
            }
        }
    }
}
