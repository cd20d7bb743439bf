//! Server builder and accept loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parlor_engine::GameType;
use parlor_room::{ConnectionId, CoordinatorConfig, PasswordScheme, RoomCoordinator, SaltedDigest};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::gateway::handle_connection;
use crate::ServerError;

/// Counter for assigning connection ids at accept time.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared server state: the coordinator behind one lock, which is what
/// serializes all room and session mutation onto a single timeline.
pub type SharedCoordinator = Arc<Mutex<RoomCoordinator>>;

/// Builder for configuring and starting a Parlor server.
pub struct ServerBuilder {
    bind_addr: String,
    config: CoordinatorConfig,
    game_types: Vec<GameType>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7070".to_string(),
            config: CoordinatorConfig::default(),
            game_types: Vec::new(),
        }
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Overrides the coordinator tunables (grace periods, code length).
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a game type to host.
    pub fn game(mut self, game_type: GameType) -> Self {
        self.game_types.push(game_type);
        self
    }

    /// Builds the server with the default password scheme.
    pub async fn build(self) -> Result<GameServer, ServerError> {
        self.build_with_scheme(SaltedDigest).await
    }

    /// Builds the server with a custom password scheme.
    pub async fn build_with_scheme(
        self,
        scheme: impl PasswordScheme,
    ) -> Result<GameServer, ServerError> {
        let mut coordinator = RoomCoordinator::new(scheme, self.config);
        for game_type in self.game_types {
            coordinator.register(game_type)?;
        }

        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "server listening");

        Ok(GameServer {
            listener,
            state: Arc::new(Mutex::new(coordinator)),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Parlor server. Call [`run`](Self::run) to start accepting
/// connections.
pub struct GameServer {
    listener: TcpListener,
    state: SharedCoordinator,
}

impl GameServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The bound address, useful when binding port 0.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle to the shared coordinator, for the HTTP-style
    /// collaborator surface ([`crate::api`]).
    pub fn coordinator(&self) -> SharedCoordinator {
        Arc::clone(&self.state)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let conn_id = ConnectionId::new(
                        NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                    );
                    tracing::debug!(%conn_id, %addr, "connection accepted");
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, conn_id, state).await {
                            tracing::debug!(%conn_id, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
