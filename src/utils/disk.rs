use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::debug;

const UDEV_DATA_DIR: &str = "/run/udev/data";

/// Property some automounters publish with the mount point
pub const MEDIA_MOUNT_PROPERTY: &str = "MEDIA_MNT";

/// Find where `devnode` (e.g. `/dev/sda1`) is mounted in the live mount table
pub fn mount_point_for(devnode: &Path) -> Option<PathBuf> {
    let disks = Disks::new_with_refreshed_list();
    let found = disks
        .list()
        .iter()
        .find(|disk| Path::new(disk.name()) == devnode)
        .map(|disk| disk.mount_point().to_path_buf());
    debug!("Mount lookup for {}: {:?}", devnode.display(), found);
    found
}

/// Read the udev database record for a block device `major:minor`
pub fn udev_properties(major: &str, minor: &str) -> HashMap<String, String> {
    let path = Path::new(UDEV_DATA_DIR).join(format!("b{}:{}", major, minor));
    match fs::read_to_string(&path) {
        Ok(content) => parse_udev_db(&content),
        Err(_) => HashMap::new(),
    }
}

/// Parse `E:KEY=value` lines of a udev database record
pub fn parse_udev_db(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.strip_prefix("E:"))
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
