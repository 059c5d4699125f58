use super::{BlockDevice, CopyTask, DeviceAction};
use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of block-device partitions: a snapshot of what is attached now and
/// a blocking stream of later attach/detach events.
pub trait DeviceSource: Send {
    /// Partitions currently attached, with mount paths already resolved
    fn enumerate(&mut self) -> Result<Vec<BlockDevice>>;

    /// Block until the next partition event. An error is fatal to the watcher.
    fn next_event(&mut self) -> Result<BlockDevice>;

    /// Look up where the OS mounted `device`, if it has
    fn resolve_mount(&self, device: &BlockDevice) -> Option<PathBuf>;
}

/// Turns USB partitions into copy tasks against a fixed destination root
pub struct VolumeWatcher {
    source: Box<dyn DeviceSource>,
    dest: PathBuf,
    mount_grace: Duration,
}

impl VolumeWatcher {
    pub fn new(source: Box<dyn DeviceSource>, dest: impl Into<PathBuf>, mount_grace: Duration) -> Self {
        Self {
            source,
            dest: dest.into(),
            mount_grace,
        }
    }

    /// Watch forever, running each copy task inline
    pub fn run(&mut self) -> Result<()> {
        self.run_with(|task| {
            task.run();
        })
    }

    /// Watch forever, handing each copy task to `submit`. Returns only when the
    /// event source fails.
    pub fn run_with<F>(&mut self, mut submit: F) -> Result<()>
    where
        F: FnMut(CopyTask),
    {
        info!("Monitoring for USB devices...");

        for device in self.source.enumerate()? {
            if !device.is_usb() {
                continue;
            }
            match &device.mount_path {
                Some(mount) => {
                    info!("Found existing USB {} at {}", device.name, mount.display());
                    submit(CopyTask::new(mount, &self.dest));
                }
                None => debug!("USB partition {} present but not mounted", device.name),
            }
        }

        loop {
            let device = self.source.next_event()?;
            if let Some(task) = self.handle_event(&device) {
                submit(task);
            }
        }
    }

    fn handle_event(&self, device: &BlockDevice) -> Option<CopyTask> {
        if !device.is_usb() || device.action != DeviceAction::Add {
            debug!("Ignoring {:?} event for {} ({:?})", device.action, device.name, device.bus);
            return None;
        }

        info!("USB partition {} attached, waiting {:?} for mount", device.name, self.mount_grace);
        std::thread::sleep(self.mount_grace);

        match self.source.resolve_mount(device) {
            Some(mount) => {
                info!("New USB detected at {}", mount.display());
                Some(CopyTask::new(mount, &self.dest))
            }
            None => {
                warn!("USB partition {} has no mount point, dropping event", device.name);
                None
            }
        }
    }
}
