use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::client::{
    GovernanceActions, GovernanceData, SequencerClient, SnapshotClient,
};
use crate::config::GatewayConfig;

/// GatewayContext contains the gateway's configuration, both upstream
/// clients and the shutdown signal.
///
/// The context is the single owner of all per-process mutable state (the
/// rate window and the signing identity live inside the clients); `main`
/// builds one and hands `Arc`s to the request filters, so there are no
/// process-wide singletons.
#[derive(Clone)]
pub struct GatewayContext {
    /// The configuration of the gateway.
    pub config: GatewayConfig,
    /// Broadcasts a shutdown signal to all active connections.
    ///
    /// The initial `shutdown` trigger is provided by the `run` caller. The
    /// server is responsible for gracefully shutting down active
    /// connections: when a graceful shutdown is initiated, a `()` value is
    /// sent via the broadcast::Sender and each receiver reaches a safe
    /// terminal state.
    notify_shutdown: broadcast::Sender<()>,
    data: Arc<dyn GovernanceData>,
    actions: Arc<dyn GovernanceActions>,
}

impl GatewayContext {
    /// Creates a new GatewayContext with the real upstream clients.
    pub fn new(config: GatewayConfig) -> crate::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;
        let data = Arc::new(SnapshotClient::new(
            http.clone(),
            config.graphql_endpoint.clone(),
            config.rate_limit,
        ));
        let actions = Arc::new(SequencerClient::new(
            http,
            config.sequencer_endpoint.clone(),
            config.rpc_endpoint.clone(),
        ));
        Ok(Self {
            config,
            notify_shutdown,
            data,
            actions,
        })
    }

    /// Creates a context around explicit collaborators. This is the seam
    /// the test-suite uses to substitute stub clients.
    pub fn with_collaborators(
        config: GatewayConfig,
        data: Arc<dyn GovernanceData>,
        actions: Arc<dyn GovernanceActions>,
    ) -> Self {
        let (notify_shutdown, _) = broadcast::channel(2);
        Self {
            config,
            notify_shutdown,
            data,
            actions,
        }
    }

    /// The upstream data client.
    pub fn data(&self) -> &dyn GovernanceData {
        &*self.data
    }

    /// The upstream action client.
    pub fn actions(&self) -> &dyn GovernanceActions {
        &*self.actions
    }

    /// Returns a new `Shutdown` receiver handle.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends the shutdown signal to all active connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single
/// value is ever sent; once it has been, the server should shut down. The
/// `Shutdown` struct listens for the signal and tracks that it has been
/// received.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,
    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
