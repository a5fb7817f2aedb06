//! Padlink Daemon - chat-driven emulator session service
//!
//! Runs one emulation session at a time and takes its commands from a chat
//! bridge over a line-delimited JSON socket:
//! - Session lifecycle (load / quit / exit / kill)
//! - Joypad input, injected one event per frame
//! - Save state next to the program file (`<program>.state`)
//!
//! Configuration lives in `config.json` under the data directory and can be
//! overridden with `PADLINK_*` environment variables:
//! - Linux: ~/.local/share/padlink/
//! - Windows: %APPDATA%\padlink\
//! - MacOS: ~/Library/Application Support/padlink/

use padlink::console::ConsoleBoot;
use padlink::daemon::Daemon;
use padlink::dispatch::Dispatcher;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod paths;
mod runtime;
mod transport;

use config::DaemonConfig;
use paths::AppPaths;
use transport::{Context, Scope};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let paths = match std::env::var_os("PADLINK_DATA_DIR") {
        Some(dir) => AppPaths::at(dir),
        None => AppPaths::new()?,
    };
    info!("Data directory: {:?}", paths.data_dir());

    let config = DaemonConfig::load(&paths)?;
    let program = config.program_path()?;
    info!("Config: {:?}", config);
    info!("Program: {:?}", program);

    let shutdown = CancellationToken::new();
    let daemon = Daemon::new(ConsoleBoot::default(), config.queue_policy);
    let (rt, handle) = runtime::channel(
        daemon,
        Dispatcher::new(program),
        config.fps,
        shutdown.clone(),
    );
    let tick_task = tokio::spawn(rt.run());

    // Ctrl-C goes through the same path as `kill`: the tick task saves a
    // running session before it exits.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C: shutting down");
                shutdown.cancel();
            }
        });
    }

    let listener = TcpListener::bind(&config.listen).await?;
    info!("Padlink daemon listening on {}", config.listen);

    let ctx = Context {
        handle,
        scope: Scope {
            guild: config.guild.clone(),
            channel: config.channel.clone(),
        },
    };
    if let Err(e) = transport::serve(listener, ctx).await {
        error!("Listener failed: {}", e);
        shutdown.cancel();
    }

    if let Err(e) = tick_task.await {
        error!("Tick task panicked: {}", e);
    }
    // Let in-flight responses reach their clients.
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!("Padlink daemon stopped");
    Ok(())
}
