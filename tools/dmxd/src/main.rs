//! The `dmxd` daemon binary: CLI parsing, logging and config setup,
//! signal handling, and the wiring that hands the Art-Net transport's
//! ports to the registry and its inbound DMX events to the service
//! facade.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};

use dmxd_artnet::{ArtNetEvent, ArtNetPlugin, ArtNetPluginConfig};
use dmxd_core::{Timestamp, PRIORITY_DEFAULT};
use dmxd_registry::{FilePreferences, PortRegistry};
use dmxd_reactor::Reactor;
use dmxd_service::Service;
use dmxd_transport::Plugin;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "dmxd", version, about = "DMX512/Art-Net routing daemon")]
struct Cli {
    /// Run in the foreground instead of daemonizing.
    #[arg(short = 'f', long = "no-daemon")]
    no_daemon: bool,

    /// Initial log verbosity: 0=off, 1=error, 2=warn, 3=info, 4=debug.
    #[arg(short = 'd', long = "debug", value_parser = clap::value_parser!(u8).range(0..=4), default_value_t = 3)]
    debug: u8,

    /// Log to stderr in a plain, uncolored format instead of syslog-style.
    #[arg(short = 's', long = "no-syslog")]
    no_syslog: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut level = logging::init(cli.debug, cli.no_syslog);

    if !cli.no_daemon {
        tracing::warn!("daemonization is not implemented; continuing in the foreground");
    }

    let config = Config::load(&Config::default_path()).context("loading configuration")?;
    tracing::info!(bind = %config.bind_address, preferences_dir = %config.preferences_dir.display(), "dmxd starting");

    let prefs = Box::new(FilePreferences::new(&config.preferences_dir, dmxd_registry::PORT_PREFERENCES));
    let registry = Arc::new(PortRegistry::new(prefs));
    let service = Arc::new(Service::new(registry.clone()));

    let mut artnet_config = ArtNetPluginConfig::default();
    artnet_config.node.bind_address = config.bind_address;
    artnet_config.node.always_broadcast = config.always_broadcast;
    artnet_config.node.use_limited_broadcast_address = config.use_limited_broadcast_address;
    artnet_config.node.broadcast_threshold = config.broadcast_threshold;
    // Port 0 in, port 0 out, both addressed to net 0 / sub-universe 0 by
    // default; further ports are left disabled until patched.
    artnet_config.input_addresses[0] = Some((0, 0));
    artnet_config.output_addresses[0] = Some((0, 0));

    let mut plugin = ArtNetPlugin::new(artnet_config).await.context("binding Art-Net socket")?;
    plugin.start().await.context("starting Art-Net transport")?;
    let events = plugin.take_events().expect("events taken exactly once");
    let descriptor = plugin.device_descriptor();
    registry
        .register_device(descriptor.unique_id, descriptor.name, descriptor.ports)
        .context("registering Art-Net device")?;

    tokio::spawn(drain_artnet_events(service.clone(), events));

    let mut reactor = Reactor::new();
    let tick_service = service.clone();
    reactor.register_repeating_timeout(std::time::Duration::from_secs(1), move || {
        let service = tick_service.clone();
        tokio::spawn(async move {
            service.expire_sources(Timestamp::now()).await;
            service.garbage_collect();
        });
        true
    });

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    tokio::select! {
        result = reactor.run() => {
            result.context("reactor loop failed")?;
        }
        _ = sigint.recv() => {
            tracing::info!("SIGINT received, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received, shutting down");
        }
        _ = run_signal_loop(&mut sighup, &mut sigusr1, &mut level) => {}
    }

    Ok(())
}

/// `SIGHUP` is a documented no-op placeholder; `SIGUSR1` raises the log
/// level. Neither terminates the daemon, so this loop runs forever beside
/// the reactor and the terminating signals in `main`'s `select!`.
async fn run_signal_loop(
    sighup: &mut tokio::signal::unix::Signal,
    sigusr1: &mut tokio::signal::unix::Signal,
    level: &mut logging::LevelControl,
) {
    loop {
        tokio::select! {
            _ = sighup.recv() => {
                tracing::debug!("SIGHUP received (no-op)");
            }
            _ = sigusr1.recv() => {
                level.bump();
            }
        }
    }
}

/// Forwards inbound Art-Net DMX into the universe merge it addresses, and
/// logs RDM requests the daemon has no RPC surface to route anywhere yet.
async fn drain_artnet_events(service: Arc<Service>, mut events: tokio::sync::mpsc::UnboundedReceiver<ArtNetEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ArtNetEvent::Dmx { address, source, data, .. } => {
                let universe = address.to_universe_id();
                if let Err(e) = service
                    .ingest_remote_dmx(universe, source, data, PRIORITY_DEFAULT)
                    .await
                {
                    tracing::debug!(%e, %universe, "dropped remote DMX contribution");
                }
            }
            ArtNetEvent::RdmRequestReceived { port_id, request } => {
                tracing::debug!(port_id, ?request, "RDM request received with no RPC client to route it to");
            }
        }
    }
}
