//! pxeward - network boot negotiator daemon.
//!
//! Listens for DHCP (and optionally PXE boot server) requests on each
//! configured interface until SIGTERM/SIGINT. SIGHUP reloads host records.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, info_span};

use pxeward::config::{Config, ServerContext, DEFAULT_CONFIG_PATH};
use pxeward::dispatcher::{list_interfaces, resolve_interfaces, Dispatcher, Listener};
use pxeward::handler::{DhcpHandler, PxeHandler, DHCP_SERVER_PORT, PXE_PORT};
use pxeward::logging;
use pxeward::store::HostStore;
use pxeward::token::TokenCodec;

#[derive(Parser)]
#[command(name = "pxeward")]
#[command(about = "Answers DHCP/PXE boot requests with signed chainload tokens")]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// List network interfaces and exit
    #[arg(long)]
    list_interfaces: bool,

    /// Answer boot options only; leave address assignment to another server
    #[arg(long)]
    proxy_only: bool,

    /// Also answer deferred PXE clients on port 4011
    #[arg(long)]
    pxe_listener: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_interfaces {
        println!("Available network interfaces:");
        for line in list_interfaces() {
            println!("  {}", line);
        }
        return Ok(());
    }

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.proxy_only |= args.proxy_only;
    config.pxe_listener |= args.pxe_listener;

    logging::init(&config.tracing_filter())?;
    info!(config = %args.config.display(), "Starting pxeward");

    let secret = config.token_secret().context("Failed to load token secret")?;
    let tokens = TokenCodec::new(&secret).context("Invalid token secret")?;

    let hosts = Arc::new(HostStore::load(&config.hosts_file).with_context(|| {
        format!("Failed to load hosts from {}", config.hosts_file.display())
    })?);

    let bindings =
        resolve_interfaces(&config.interfaces).context("Failed to resolve listen interfaces")?;
    let ctx = Arc::new(ServerContext::new(&config, bindings));
    info!(
        proxy_only = ctx.proxy_only,
        pxe_listener = ctx.pxe_listener,
        interfaces = ctx.interfaces.len(),
        "Negotiation mode configured"
    );

    let dhcp = Arc::new(
        DhcpHandler::new(ctx.clone(), hosts.clone(), tokens.clone()).with_span(info_span!("dhcp")),
    );
    let pxe = Arc::new(PxeHandler::new(hosts.clone(), tokens).with_span(info_span!("pxe")));

    let mut dispatchers: Vec<Dispatcher> = Vec::new();
    for binding in &ctx.interfaces {
        let span = info_span!("listener", iface = %binding.name, addr = %binding.address);

        let listener = Listener::bind(binding.clone(), DHCP_SERVER_PORT)
            .with_context(|| format!("Failed to listen on {}:{}", binding.name, DHCP_SERVER_PORT))?
            .with_span(span.clone());
        dispatchers.push(listener.spawn(dhcp.clone())?);

        if ctx.pxe_listener {
            let listener = Listener::bind(binding.clone(), PXE_PORT)
                .with_context(|| format!("Failed to listen on {}:{}", binding.name, PXE_PORT))?
                .with_span(span);
            dispatchers.push(listener.spawn(pxe.clone())?);
        }
    }

    tokio::spawn(handle_sighup(hosts));

    let received = shutdown_signal().await?;
    info!(signal = received, "Shutting down");

    let grace = config.shutdown_grace;
    let pending: Vec<_> = dispatchers
        .into_iter()
        .map(|dispatcher| tokio::spawn(dispatcher.shutdown(grace)))
        .collect();

    let mut failed = 0;
    for handle in pending {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "Listener did not drain in time");
                failed += 1;
            }
            Err(e) => {
                error!(error = %e, "Shutdown task failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{} listener(s) exceeded the {:?} shutdown deadline", failed, grace);
    }

    info!("Stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT and name the one received.
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Reload host records on SIGHUP.
async fn handle_sighup(hosts: Arc<HostStore>) {
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(sighup) => sighup,
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler, host reload disabled");
            return;
        }
    };

    loop {
        sighup.recv().await;
        info!("Received SIGHUP, reloading host records");

        if let Err(e) = hosts.reload().await {
            error!(error = %e, "Failed to reload host records");
        }
    }
}
