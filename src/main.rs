mod auth;
mod config;
mod conn;
mod protocol;
mod rooms;
mod routes;
mod session;
mod state;

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "collab-notes", about = "Real-time note collaboration relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the websocket relay (default).
    Serve,
    /// Print a signed session token for local development.
    IssueToken {
        user_id: String,
        #[arg(long, help = "Token lifetime in hours (default 72)")]
        ttl_hours: Option<u64>,
    },
}

impl Command {
    fn token_ttl(ttl_hours: Option<u64>) -> Duration {
        ttl_hours.map_or(auth::DEFAULT_TOKEN_TTL, |hours| Duration::from_secs(hours * 60 * 60))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let env_file = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("collab_notes=info,tower_http=info")),
        )
        .init();

    if env_file.is_err() {
        tracing::info!("no .env file found, continuing");
    }

    let config = config::AppConfig::from_env().expect("invalid configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::IssueToken { user_id, ttl_hours } => {
            let token = auth::issue_token(&user_id, &config.jwt_secret, Command::token_ttl(ttl_hours))
                .expect("token signing failed");
            println!("{token}");
        }
    }
}

async fn serve(config: config::AppConfig) {
    let addr = config.bind_addr().expect("invalid bind address");
    let policy = config.message_policy;
    let state = state::AppState::new(config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind");

    tracing::info!(%addr, ?policy, "collab-notes listening");
    axum::serve(listener, app).await.expect("server failed");
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
