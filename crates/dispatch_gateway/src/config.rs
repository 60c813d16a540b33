//! Gateway configuration: flags with environment fallbacks.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "dispatch-gateway",
    about = "Last-mile metro ride-dispatch coordinator"
)]
pub struct GatewayConfig {
    /// Address for the HTTP + WebSocket listener.
    #[arg(long, env = "DISPATCH_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// SQLite file for the durable trip log. Unset disables persistence.
    #[arg(long, env = "DISPATCH_DATABASE_PATH")]
    pub database_path: Option<String>,

    /// Push delivery endpoint (Expo-compatible).
    #[arg(
        long,
        env = "DISPATCH_PUSH_ENDPOINT",
        default_value = "https://exp.host/--/api/v2/push/send"
    )]
    pub push_endpoint: String,

    /// Base URL of the external driver/location directory. Unset disables
    /// best-effort registration.
    #[arg(long, env = "DISPATCH_DIRECTORY_URL")]
    pub directory_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_require_no_flags() {
        let config = GatewayConfig::parse_from(["dispatch-gateway"]);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.database_path.is_none());
        assert!(config.directory_url.is_none());
        assert!(config.push_endpoint.contains("exp.host"));
    }

    #[test]
    fn flags_override_defaults() {
        let config = GatewayConfig::parse_from([
            "dispatch-gateway",
            "--bind-addr",
            "127.0.0.1:9000",
            "--database-path",
            "/tmp/dispatch.db",
        ]);
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.database_path.as_deref(), Some("/tmp/dispatch.db"));
    }
}
