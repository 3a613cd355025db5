use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

/// Orchestrator endpoint paths.
pub mod upstream {
    pub const STREAM: &str = "/stream";
    pub const RUN: &str = "/run";
    pub const ASSESS: &str = "/cab-safety/assess";
    pub const ARTIFACTS: &str = "/artifacts";
    pub const DOWNLOAD_ARTIFACT: &str = "/download-artifact";
}

#[derive(Debug, Parser)]
#[command(name = "oracle-gateway")]
#[command(about = "Relay between plan clients and the orchestrator")]
pub struct Cli {
    #[arg(long, env = "ORACLE_GATEWAY_LISTEN", default_value = "127.0.0.1:3001")]
    pub listen: SocketAddr,
    /// Base URL of the orchestrator that produces plans and scores.
    #[arg(long, env = "ORCHESTRATOR_URL", default_value = "http://127.0.0.1:8000")]
    pub orchestrator_url: String,
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,
    /// Applies to non-streaming calls only; streams run until the upstream closes.
    #[arg(long, default_value_t = 120)]
    pub request_timeout_secs: u64,
    /// Answer ride scoring locally when the orchestrator is unreachable.
    #[arg(long, env = "ORACLE_RISK_FALLBACK")]
    pub risk_fallback: bool,
}

/// Resolved gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    pub orchestrator_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub risk_fallback: bool,
}

impl GatewayConfig {
    pub fn new(orchestrator_url: impl Into<String>) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3001)),
            orchestrator_url: orchestrator_url.into().trim_end_matches('/').to_owned(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            risk_fallback: false,
        }
    }

    /// Absolute orchestrator URL for `path`.
    pub fn upstream(&self, path: &str) -> String {
        format!("{}{path}", self.orchestrator_url)
    }
}

impl From<Cli> for GatewayConfig {
    fn from(cli: Cli) -> Self {
        Self {
            listen: cli.listen,
            connect_timeout: Duration::from_secs(cli.connect_timeout_secs.max(1)),
            request_timeout: Duration::from_secs(cli.request_timeout_secs.max(1)),
            risk_fallback: cli.risk_fallback,
            ..Self::new(cli.orchestrator_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_resolve() {
        let cli = Cli::parse_from(["oracle-gateway", "--orchestrator-url", "http://up:9000/"]);
        let config = GatewayConfig::from(cli);
        assert_eq!(config.listen.port(), 3001);
        assert_eq!(config.upstream("/stream"), "http://up:9000/stream");
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(!config.risk_fallback);
    }

    #[test]
    fn zero_timeouts_are_clamped() {
        let cli = Cli::parse_from([
            "oracle-gateway",
            "--connect-timeout-secs",
            "0",
            "--risk-fallback",
        ]);
        let config = GatewayConfig::from(cli);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert!(config.risk_fallback);
    }
}
