//! Demo server: hosts tic-tac-toe and connect four on port 7070.

use parlor::{GameServer, ServerError};
use parlor_games::{ConnectFour, TikTakToe};
use tracing_subscriber::EnvFilter;

const ADDR: &str = "0.0.0.0:7070";

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("starting server");
    let server = GameServer::builder()
        .bind(ADDR)
        .game(TikTakToe::game_type())
        .game(ConnectFour::game_type())
        .build()
        .await?;

    tracing::info!(addr = ADDR, "server started");
    server.run().await
}
