use anyhow::{bail, Context, Result};
use tokio::sync::oneshot;
use tracing::info;

use usb_kiosk::ingest::{UdevMonitor, VolumeWatcher};
use usb_kiosk::utils;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    utils::logging::init_tracing();

    let config = utils::config::load_config()?;
    info!("Starting USB copy service v{}", env!("CARGO_PKG_VERSION"));

    let dest = &config.ingest.dest_dir;
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create destination {}", dest.display()))?;
    info!("Copying USB volumes into {}", dest.display());

    let source = UdevMonitor::open().context("Device event source unavailable")?;
    let mut watcher = VolumeWatcher::new(Box::new(source), dest.clone(), config.ingest.mount_grace);

    // The watcher blocks on the udev monitor socket, so it gets its own thread; the
    // process exiting closes the socket.
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("volume-watcher".to_string())
        .spawn(move || {
            let _ = done_tx.send(watcher.run());
        })
        .context("Failed to start volume watcher")?;

    tokio::select! {
        finished = done_rx => match finished {
            Ok(Err(e)) => return Err(e).context("Volume watcher failed"),
            _ => bail!("Volume watcher exited unexpectedly"),
        },
        _ = utils::shutdown::shutdown_signal() => {
            info!("Stopped watching for USB devices");
        }
    }

    Ok(())
}
