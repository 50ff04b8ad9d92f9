#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use futures::Future;
use structopt::StructOpt;
use tokio::signal::unix;

use snapshot_gateway::config;
use snapshot_gateway::context::GatewayContext;
use snapshot_gateway::handler;
use snapshot_gateway::probe;

/// The Snapshot Gateway Command-line tool
///
/// Start the gateway with the configuration taken from the environment:
///
///     $ snapshot-gateway -vvv
#[derive(StructOpt)]
#[structopt(name = "Snapshot Gateway")]
struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    verbose: i32,
}

#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose)?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }
    let config = config::load()?;
    let ctx = GatewayContext::new(config)?;
    // a pre-configured key becomes the signing identity right away.
    if let Some(key) = ctx.config.private_key.clone() {
        let address = ctx.actions().import_identity(&key).await?;
        tracing::info!(%address, "imported signing identity from config");
    }
    let (addr, server) = build_gateway(ctx.clone())?;
    tracing::info!("Starting the server on {}", addr);
    // fire the server.
    let server_handle = tokio::spawn(server);
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true
    );
    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    let shutdown = || {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Lifecycle,
            shutdown = true
        );
        tracing::warn!("Shutting down...");
        // send shutdown signal to all of the application.
        ctx.shutdown();
        // also abort the server task
        server_handle.abort();
        std::thread::sleep(std::time::Duration::from_millis(300));
        tracing::info!("Clean Exit ..");
    };
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
            shutdown();
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
            shutdown();
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
            shutdown();
        },
    }
    Ok(())
}

fn setup_logger(verbosity: i32) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("snapshot_gateway={}", log_level).parse()?);
    tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter)
        .pretty()
        .init();
    Ok(())
}

fn build_gateway(
    ctx: GatewayContext,
) -> anyhow::Result<(SocketAddr, impl Future<Output = ()> + 'static)> {
    let port = ctx.config.port;
    let mut shutdown_signal = ctx.shutdown_signal();
    let shutdown_signal = async move {
        shutdown_signal.recv().await;
    };
    let routes = handler::routes(Arc::new(ctx));
    warp::serve(routes)
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), shutdown_signal)
        .map_err(Into::into)
}
