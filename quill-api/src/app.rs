use crate::{
    Env, InitError,
    server::{self, ServerState},
};
use quill_db::{client::DbClient, memory::MemoryStore, store::Store};
use std::{future::IntoFuture, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// `DATABASE_URL` selecting the in-memory store.
pub const MEMORY_DATABASE_URL: &str = "memory:";

pub async fn connect_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    if env.database_url == MEMORY_DATABASE_URL {
        warn!("Using the in-memory store, nothing is persisted");
        return Ok(Arc::new(MemoryStore::new(env.worker_id, env.process_id)));
    }

    let client = DbClient::connect(
        &env.database_url,
        env.database_max_connections,
        env.worker_id,
        env.process_id,
    )
    .await
    .map_err(InitError::Database)?;
    client.ensure_schema().await.map_err(InitError::Database)?;
    info!("Connected to database");

    Ok(Arc::new(client))
}

/// A started application. Only obtainable from [`start`], so shutting down
/// always follows a completed startup.
#[derive(Debug)]
pub struct RunningApplication {
    store: Arc<dyn Store>,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
}

pub async fn start(
    store: Arc<dyn Store>,
    address: SocketAddr,
) -> Result<RunningApplication, InitError> {
    let (listener, local_addr) = match bind(address).await {
        Ok(bound) => bound,
        Err(err) => {
            store.close().await;
            return Err(InitError::TcpBind(err));
        }
    };

    let app = server::routes()
        .with_state(ServerState {
            store: Arc::clone(&store),
        })
        .layer(TraceLayer::new_for_http());

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future(),
    );

    Ok(RunningApplication {
        store,
        local_addr,
        shutdown,
        server,
    })
}

async fn bind(address: SocketAddr) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(address).await?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

impl RunningApplication {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until ctrl-c, then shuts down.
    pub async fn serve_until_signal(mut self) -> Result<(), InitError> {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(InitError::Signal)?;
                info!("Received shutdown signal");
            }
            served = &mut self.server => {
                self.store.close().await;
                return served.map_err(InitError::ServerTask)?.map_err(InitError::TcpServe);
            }
        }

        self.shutdown().await
    }

    /// Closes the store, then stops the listener and waits for the server.
    pub async fn shutdown(self) -> Result<(), InitError> {
        info!("Shutting down");
        self.store.close().await;
        self.shutdown.cancel();

        self.server
            .await
            .map_err(InitError::ServerTask)?
            .map_err(InitError::TcpServe)
    }
}
