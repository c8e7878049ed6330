//! Server context and the accept loop.

use std::sync::Arc;

use rand::distr::{Alphanumeric, SampleString};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{Config, Role};
use crate::connection::handle_client_connection;
use crate::rdb::load_snapshot_file;
use crate::replication::{ReplicaRegistry, run_replication_client};
use crate::store::Store;

/// Process-wide state shared by every connection task.
///
/// Built once in `main` and passed around behind an `Arc`; there is no
/// module-global state, which keeps tests hermetic.
#[derive(Debug)]
pub struct ServerContext {
    pub config: Config,
    /// 40-character replication ID minted at startup.
    pub repl_id: String,
    pub store: Store,
    pub replicas: ReplicaRegistry,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl ServerContext {
    pub fn new(config: Config) -> Self {
        // A master serves immediately; a replica first has to finish its
        // sync with the master.
        let initially_ready = config.role == Role::Master;
        let (ready_tx, ready_rx) = watch::channel(initially_ready);

        Self {
            config,
            repl_id: Alphanumeric.sample_string(&mut rand::rng(), 40),
            store: Store::new(),
            replicas: ReplicaRegistry::new(),
            ready_tx,
            ready_rx,
        }
    }

    /// Signals that the snapshot sync finished and clients may be served.
    pub fn mark_ready(&self) {
        self.ready_tx.send_replace(true);
    }

    /// Waits until the server is ready to serve clients.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready_rx.clone();

        while !*ready.borrow() {
            if ready.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Binds the configured port and runs the server. Returns only on a fatal
/// startup error; serving continues indefinitely otherwise.
pub async fn run(ctx: Arc<ServerContext>) -> std::io::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", ctx.config.port)).await?;
    info!(port = ctx.config.port, role = ctx.config.role.as_str(), "listening");

    run_with_listener(ctx, listener).await
}

/// Accept loop over an already-bound listener. Split out so tests can bind
/// an ephemeral port themselves.
pub async fn run_with_listener(
    ctx: Arc<ServerContext>,
    listener: TcpListener,
) -> std::io::Result<()> {
    load_initial_snapshot(&ctx).await;

    if let Role::Replica { .. } = ctx.config.role {
        let replication_ctx = Arc::clone(&ctx);

        tokio::spawn(async move {
            if let Err(err) = run_replication_client(replication_ctx).await {
                error!(%err, "replication client terminated");
            }
        });
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let ctx = Arc::clone(&ctx);

                tokio::spawn(async move {
                    handle_client_connection(stream, ctx, peer_addr.to_string()).await;
                });
            }
            Err(err) => {
                error!(%err, "failed to accept connection");
                return Err(err);
            }
        }
    }
}

/// Startup snapshot load is best-effort: a missing or corrupt snapshot logs
/// a warning and the server starts with an empty store.
async fn load_initial_snapshot(ctx: &ServerContext) {
    let Some(path) = ctx.config.snapshot_path() else {
        info!("no snapshot filename configured, skipping load");
        return;
    };

    if let Err(err) = load_snapshot_file(&path, &ctx.store).await {
        warn!(path = %path.display(), %err, "snapshot load failed, starting empty");
    }
}
