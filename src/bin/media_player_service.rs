use anyhow::{Context, Result};
use tracing::info;

use usb_kiosk::player::gpio::GpioLines;
use usb_kiosk::player::{InputMultiplexer, PlaybackController, ProcessEngine};
use usb_kiosk::utils;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    utils::logging::init_tracing();

    let config = utils::config::load_config()?;
    let player = config.player;
    info!("Starting media player service v{}", env!("CARGO_PKG_VERSION"));

    let lines = GpioLines::claim(&player.lines()).context("GPIO setup error")?;

    let engine = ProcessEngine::new(player.player_program.clone(), player.player_args.clone());
    let version = engine.probe().await.context("Media player setup error")?;
    info!("Media player initialized successfully ({})", version);

    let mut controller = PlaybackController::new(Box::new(engine));
    let mut buttons = InputMultiplexer::new(
        Box::new(lines),
        player.bindings,
        player.poll_interval,
        player.debounce,
    );

    // On a panic the player child is killed and the pins reset by their Drop
    // impls; every other exit path goes through the cleanup below.
    tokio::select! {
        _ = buttons.run(&mut controller) => {},
        _ = utils::shutdown::shutdown_signal() => {
            info!("Shutting down");
        }
    }

    controller.shutdown().await;
    buttons.release();
    info!("Cleanup complete");

    Ok(())
}
