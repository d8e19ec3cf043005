//! Commands that read key events from the keyboard.

use anyhow::Context;
use orione_driver::transport::{MessageDecoder, SerialSettings, SerialTransport};
use orione_driver::{CoordKey, DriverConfig, KeyEmitter, Keymap, LogEmitter, Pipeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use super::CommandResult;

/// Wait between reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Inject keys through a uinput virtual keyboard
pub async fn run(config: DriverConfig, reconnect: bool) -> CommandResult {
    let keymap = config.load_keymap().context("Failed to load keymap")?;
    let emitter = virtual_keyboard(&config.device.name)?;
    serve(config, keymap, emitter, reconnect).await
}

#[cfg(target_os = "linux")]
fn virtual_keyboard(name: &str) -> anyhow::Result<orione_driver::UinputEmitter> {
    orione_driver::UinputEmitter::new(name)
        .context("Failed to create virtual keyboard (is /dev/uinput writable?)")
}

#[cfg(not(target_os = "linux"))]
fn virtual_keyboard(_name: &str) -> anyhow::Result<LogEmitter> {
    Err(orione_driver::EmitError::Unsupported.into())
}

/// Log resolved keys (or raw coordinates) without injecting them
pub async fn monitor(config: DriverConfig, raw: bool) -> CommandResult {
    if raw {
        return monitor_raw(config.serial).await;
    }
    let keymap = config.load_keymap().context("Failed to load keymap")?;
    serve(config, keymap, LogEmitter::new(), true).await
}

/// Set `shutdown` on Ctrl+C
fn watch_ctrl_c(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
}

/// Sleep before reconnecting. Returns false if interrupted.
async fn reconnect_pause(shutdown: &AtomicBool) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(RECONNECT_DELAY) => !shutdown.load(Ordering::Relaxed),
        _ = tokio::signal::ctrl_c() => {
            shutdown.store(true, Ordering::Relaxed);
            false
        }
    }
}

async fn serve<E: KeyEmitter + 'static>(
    config: DriverConfig,
    keymap: Keymap,
    emitter: E,
    reconnect: bool,
) -> CommandResult {
    let (rows, cols) = keymap.dimensions();
    let pipeline = Arc::new(Pipeline::new(Handle::current(), &config, keymap, emitter));
    info!(
        "Keymap {}x{}, profile {}, emitting to {}",
        rows,
        cols,
        pipeline.router().active_profile(),
        pipeline.router().with_emitter(|e| e.describe())
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    watch_ctrl_c(shutdown.clone());

    let result = loop {
        let session = tokio::task::spawn_blocking({
            let pipeline = pipeline.clone();
            let shutdown = shutdown.clone();
            let settings = config.serial.clone();
            move || -> anyhow::Result<_> {
                let mut transport = SerialTransport::open(&settings)?;
                transport.clear()?;
                let mut decoder = MessageDecoder::new();
                Ok(pipeline.run_blocking(&mut transport, &mut decoder, &shutdown)?)
            }
        })
        .await
        .context("Decode thread panicked")?;

        match session {
            Ok(stats) => {
                info!(
                    "{} messages, {} discarded, {} stalls",
                    stats.messages, stats.desyncs, stats.timeouts
                );
                break Ok(());
            }
            Err(e) => {
                // Never leave keys stuck down while the link is away
                pipeline.release_all();
                if !reconnect {
                    break Err(e);
                }
                warn!("Link to {} lost: {:#}", config.serial.port, e);
                if !reconnect_pause(&shutdown).await {
                    break Ok(());
                }
                info!("Reconnecting to {}", config.serial.port);
            }
        }
    };

    pipeline.release_all();
    if pipeline.router().emit_errors() > 0 {
        error!("{} key events could not be injected", pipeline.router().emit_errors());
    }
    result
}

/// Print decoded coordinates straight from the link
async fn monitor_raw(settings: SerialSettings) -> CommandResult {
    let shutdown = Arc::new(AtomicBool::new(false));
    watch_ctrl_c(shutdown.clone());

    tokio::task::spawn_blocking(move || -> CommandResult {
        let mut transport = SerialTransport::open(&settings)
            .with_context(|| format!("Failed to open {}", settings.port))?;
        let mut decoder = MessageDecoder::new();
        println!("Listening on {} (Ctrl+C to stop)", settings.port);

        while !shutdown.load(Ordering::Relaxed) {
            if let Some(msg) = decoder.poll_message(&mut transport)? {
                let transition = msg.transition();
                let label = if transition.fn_layer {
                    "fn".to_string()
                } else {
                    CoordKey::from(transition).to_string()
                };
                println!(
                    "{:>6}  {}",
                    label,
                    if msg.is_pressed() { "down" } else { "up" }
                );
            }
        }

        let stats = decoder.stats();
        println!(
            "{} messages, {} discarded, {} stalls",
            stats.messages, stats.desyncs, stats.timeouts
        );
        Ok(())
    })
    .await
    .context("Decode thread panicked")?
}
