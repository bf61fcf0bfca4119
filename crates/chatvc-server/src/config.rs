//! Server configuration from command-line flags with environment fallbacks.

use clap::{ArgAction, Parser};

#[derive(Debug, Clone, Parser)]
#[command(name = "chatvc-server", version, about = "Conversation version-control API server")]
pub struct ServerConfig {
    /// SQLite database file.
    #[arg(long, env = "CHATVC_DB_PATH", default_value = "chatvc.db")]
    pub db_path: String,

    #[arg(long, env = "CHATVC_PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "CHATVC_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Keep all state in memory; nothing survives a restart.
    #[arg(
        long,
        env = "CHATVC_IN_MEMORY",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub in_memory: bool,
}

impl ServerConfig {
    /// `bind:port` listen address.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
