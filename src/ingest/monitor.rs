use super::watcher::DeviceSource;
use super::{BlockDevice, Bus, DeviceAction};
use crate::error::{KioskError, Result};
use crate::utils::disk::{self, MEDIA_MOUNT_PROPERTY};
use nix::errno::Errno;
use nix::sys::socket::{
    bind, recv, socket, AddressFamily, MsgFlags, NetlinkAddr, SockFlag, SockProtocol, SockType,
};
use std::collections::HashMap;
use std::fs;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const SYS_CLASS_BLOCK: &str = "/sys/class/block";
/// Multicast group udevd re-broadcasts processed events on
const UDEV_MONITOR_GROUP: u32 = 2;
const UDEV_PREFIX: &[u8] = b"libudev\0";
const UDEV_MAGIC: u32 = 0xfeed_cafe;
const UDEV_HEADER_MIN: usize = 24;
const RECV_BUFFER_SIZE: usize = 16 * 1024;

/// Block-partition events as published by udevd, after its rules have run, so
/// `ID_BUS` and any automounter properties are already attached.
pub struct UdevMonitor {
    socket: OwnedFd,
    buf: Vec<u8>,
}

impl UdevMonitor {
    pub fn open() -> Result<Self> {
        let socket = socket(
            AddressFamily::Netlink,
            SockType::Datagram,
            SockFlag::SOCK_CLOEXEC,
            SockProtocol::NetlinkKObjectUEvent,
        )
        .map_err(|e| KioskError::DeviceSource(format!("failed to open udev monitor: {}", e)))?;

        let addr = NetlinkAddr::new(0, UDEV_MONITOR_GROUP);
        bind(socket.as_raw_fd(), &addr)
            .map_err(|e| KioskError::DeviceSource(format!("failed to bind udev monitor: {}", e)))?;

        info!("Listening for udev block device events");
        Ok(Self {
            socket,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    fn recv_message(&mut self) -> Result<usize> {
        loop {
            match recv(self.socket.as_raw_fd(), &mut self.buf, MsgFlags::empty()) {
                Ok(n) => return Ok(n),
                Err(Errno::EINTR) => continue,
                Err(Errno::ENOBUFS) => {
                    warn!("udev monitor overflowed, some device events were lost");
                    continue;
                }
                Err(e) => {
                    return Err(KioskError::DeviceSource(format!(
                        "failed to read udev monitor: {}",
                        e
                    )))
                }
            }
        }
    }
}

impl DeviceSource for UdevMonitor {
    fn enumerate(&mut self) -> Result<Vec<BlockDevice>> {
        let mut devices = Vec::new();
        let entries = fs::read_dir(SYS_CLASS_BLOCK)
            .map_err(|e| KioskError::DeviceSource(format!("{}: {}", SYS_CLASS_BLOCK, e)))?;

        for entry in entries.flatten() {
            let sys_path = entry.path();
            if !sys_path.join("partition").exists() {
                continue;
            }
            let uevent = match fs::read_to_string(sys_path.join("uevent")) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Cannot read uevent for {}: {}", sys_path.display(), e);
                    continue;
                }
            };

            let mut props = parse_properties(uevent.lines());
            props.insert("SUBSYSTEM".into(), "block".into());
            if let (Some(major), Some(minor)) = (props.get("MAJOR"), props.get("MINOR")) {
                for (k, v) in disk::udev_properties(major, minor) {
                    props.entry(k).or_insert(v);
                }
            }

            if let Some(mut device) = block_device_from(props) {
                device.mount_path = self.resolve_mount(&device);
                debug!("Found partition {} ({:?}) mounted at {:?}", device.name, device.bus, device.mount_path);
                devices.push(device);
            }
        }

        Ok(devices)
    }

    fn next_event(&mut self) -> Result<BlockDevice> {
        loop {
            let len = self.recv_message()?;
            let Some(props) = parse_udev_message(&self.buf[..len]) else {
                continue;
            };
            if let Some(device) = block_device_from(props) {
                debug!("udev {:?} for {} ({:?})", device.action, device.name, device.bus);
                return Ok(device);
            }
        }
    }

    fn resolve_mount(&self, device: &BlockDevice) -> Option<PathBuf> {
        // The automounter may have published its mount point after the event
        let fresh = match (device.properties.get("MAJOR"), device.properties.get("MINOR")) {
            (Some(major), Some(minor)) => disk::udev_properties(major, minor),
            _ => HashMap::new(),
        };
        fresh
            .get(MEDIA_MOUNT_PROPERTY)
            .or_else(|| device.properties.get(MEDIA_MOUNT_PROPERTY))
            .map(PathBuf::from)
            .filter(|p| p.is_dir())
            .or_else(|| disk::mount_point_for(&device.devnode()))
    }
}

/// Parse a udevd broadcast: a `libudev` header followed by `KEY=value\0` pairs
/// at the offset the header names. Anything else on the socket is `None`.
pub fn parse_udev_message(msg: &[u8]) -> Option<HashMap<String, String>> {
    if msg.len() < UDEV_HEADER_MIN || !msg.starts_with(UDEV_PREFIX) {
        return None;
    }
    let word = |at: usize| -> Option<[u8; 4]> { msg.get(at..at + 4)?.try_into().ok() };
    if u32::from_be_bytes(word(8)?) != UDEV_MAGIC {
        return None;
    }

    let offset = u32::from_ne_bytes(word(16)?) as usize;
    let len = u32::from_ne_bytes(word(20)?) as usize;
    let body = msg.get(offset..offset.checked_add(len)?)?;

    let pairs = body
        .split(|b| *b == 0)
        .filter_map(|p| std::str::from_utf8(p).ok());
    Some(parse_properties(pairs))
}

fn parse_properties<'a>(pairs: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    pairs
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Build a `BlockDevice` from udev properties; `None` unless it is a block
/// partition.
pub fn block_device_from(props: HashMap<String, String>) -> Option<BlockDevice> {
    if props.get("SUBSYSTEM").map(String::as_str) != Some("block")
        || props.get("DEVTYPE").map(String::as_str) != Some("partition")
    {
        return None;
    }

    let name = props.get("DEVNAME")?.trim_start_matches("/dev/").to_string();
    let devpath = props.get("DEVPATH").cloned().unwrap_or_default();
    let action = props
        .get("ACTION")
        .map(|a| DeviceAction::parse(a))
        .unwrap_or(DeviceAction::Other);
    let bus = props
        .get("ID_BUS")
        .map(|b| Bus::from_id_bus(b))
        .unwrap_or(Bus::Other);

    Some(BlockDevice {
        name,
        devpath,
        bus,
        action,
        mount_path: None,
        properties: props,
    })
}
