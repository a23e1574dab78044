//! Command-line interface and server configuration.

use clap::Parser;

/// Trigrid - real-time tic-tac-toe server over TCP and WebSocket
#[derive(Parser, Debug)]
#[command(name = "trigrid")]
#[command(about = "Multiplayer tic-tac-toe server (standard and ultimate)", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Host to bind both listeners to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the line-framed TCP listener
    #[arg(long, default_value_t = 8888)]
    pub tcp_port: u16,

    /// Port for the WebSocket listener
    #[arg(long, default_value_t = 8765)]
    pub ws_port: u16,

    /// Path to the results database (created if it doesn't exist)
    #[arg(long, default_value = "game_results.db")]
    pub db_path: String,

    /// Seconds in each player's time bank
    #[arg(long, default_value_t = 120)]
    pub time_bank_secs: u64,

    /// Seconds an empty session waits for a reconnect before removal
    #[arg(long, default_value_t = 600)]
    pub grace_secs: u64,

    /// Seconds of silence before an idle connection is dropped
    #[arg(long, default_value_t = 900)]
    pub idle_timeout_secs: u64,
}

/// Runtime configuration shared by listeners, registry, and sessions.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for both listeners.
    pub host: String,
    /// Line-framed TCP port.
    pub tcp_port: u16,
    /// WebSocket port.
    pub ws_port: u16,
    /// Results database path.
    pub db_path: String,
    /// Initial per-player time bank, in seconds.
    pub time_bank_secs: f64,
    /// Grace period for empty sessions, in seconds.
    pub grace_secs: u64,
    /// Idle read timeout per connection, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            tcp_port: 8888,
            ws_port: 8765,
            db_path: "game_results.db".to_string(),
            time_bank_secs: 120.0,
            grace_secs: 600,
            idle_timeout_secs: 900,
        }
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            tcp_port: cli.tcp_port,
            ws_port: cli.ws_port,
            db_path: cli.db_path,
            time_bank_secs: cli.time_bank_secs as f64,
            grace_secs: cli.grace_secs,
            idle_timeout_secs: cli.idle_timeout_secs,
        }
    }
}
