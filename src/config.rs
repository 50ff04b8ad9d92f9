use serde::{Deserialize, Serialize};
use url::Url;

/// The default port the gateway will listen on. Defaults to 3000.
const fn default_port() -> u16 {
    3000
}
/// The default request timeout toward the upstream services, in seconds.
const fn default_request_timeout() -> u64 {
    30
}
/// The default GraphQL endpoint of the governance data hub.
fn default_graphql_endpoint() -> Url {
    Url::parse("https://hub.snapshot.org/graphql")
        .expect("default graphql endpoint is a valid url")
}
/// The default sequencer endpoint that accepts signed governance messages.
fn default_sequencer_endpoint() -> Url {
    Url::parse("https://seq.snapshot.org")
        .expect("default sequencer endpoint is a valid url")
}
/// The default Ethereum JSON-RPC endpoint used to resolve the chain head.
fn default_rpc_endpoint() -> Url {
    Url::parse("https://cloudflare-eth.com")
        .expect("default rpc endpoint is a valid url")
}
/// The upstream hub allows 50 queries per minute, so the advisory local
/// limit matches it.
const fn default_max_requests() -> u32 {
    50
}
/// The length of the rate limiting window, in seconds.
const fn default_window_secs() -> u64 {
    60
}

/// GatewayConfig is the configuration for the snapshot gateway.
///
/// Every field can be overridden from the process environment with the
/// `SNAPSHOT_` prefix, e.g. `SNAPSHOT_PORT=8080`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// HTTP server port number.
    ///
    /// default to 3000
    #[serde(default = "default_port")]
    pub port: u16,
    /// The GraphQL endpoint of the governance data hub.
    #[serde(default = "default_graphql_endpoint")]
    pub graphql_endpoint: Url,
    /// The sequencer endpoint that signed governance actions are submitted to.
    #[serde(default = "default_sequencer_endpoint")]
    pub sequencer_endpoint: Url,
    /// The Ethereum JSON-RPC endpoint used to resolve the current chain head
    /// when a proposal asks for the `latest` snapshot block.
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: Url,
    /// Timeout applied to every upstream call, in seconds.
    ///
    /// A stalled upstream fails the request instead of hanging it forever.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Advisory self-throttling toward the upstream data hub.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// An optional private key to import as the signing identity at startup.
    ///
    /// Never serialized back out.
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            graphql_endpoint: default_graphql_endpoint(),
            sequencer_endpoint: default_sequencer_endpoint(),
            rpc_endpoint: default_rpc_endpoint(),
            request_timeout: default_request_timeout(),
            rate_limit: RateLimitConfig::default(),
            private_key: None,
        }
    }
}

/// RateLimitConfig is the configuration for the data client's sliding window.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Maximum number of upstream queries per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Length of the window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Try to parse the [`GatewayConfig`] from the process environment.
pub fn load() -> crate::Result<GatewayConfig> {
    let cfg = config::Config::builder()
        .add_source(config::Environment::with_prefix("SNAPSHOT"))
        .build()?;
    let config: GatewayConfig = serde_path_to_error::deserialize(cfg)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_public_hub() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(
            config.graphql_endpoint.as_str(),
            "https://hub.snapshot.org/graphql"
        );
        assert_eq!(config.rate_limit.max_requests, 50);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert!(config.private_key.is_none());
    }

    #[test]
    fn private_key_is_never_serialized() {
        let config = GatewayConfig {
            private_key: Some("deadbeef".into()),
            ..Default::default()
        };
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("deadbeef"));
        assert!(!rendered.contains("private_key"));
    }
}
