//! Runtime configuration.
//!
//! Every setting can come from a command-line flag or an `EMBED_PROXY_*`
//! environment variable; flags win.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How HTML bodies are scanned for attribute URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RewriteStrategy {
    /// Regex over the raw text. Also hits comments and script text.
    #[default]
    Pattern,
    /// Streaming HTML tokenizer. Only real element attributes are touched.
    Tokenizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "embed-proxy", version, about)]
pub struct ProxyConfig {
    /// Address to listen on.
    #[arg(long, env = "EMBED_PROXY_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Endpoint written into rewritten URLs; a path or an absolute URL.
    #[arg(long, env = "EMBED_PROXY_ENDPOINT", default_value = "/proxy")]
    pub endpoint: String,

    /// Total time allowed for one upstream fetch, in seconds.
    #[arg(long, env = "EMBED_PROXY_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long, env = "EMBED_PROXY_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "EMBED_PROXY_MAX_REDIRECTS", default_value_t = 10)]
    pub max_redirects: usize,

    /// Upstream bodies larger than this are refused.
    #[arg(long, env = "EMBED_PROXY_MAX_BODY_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: usize,

    #[arg(long, env = "EMBED_PROXY_STRATEGY", value_enum, default_value_t = RewriteStrategy::Pattern)]
    pub strategy: RewriteStrategy,

    #[arg(long, env = "EMBED_PROXY_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, env = "EMBED_PROXY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            endpoint: "/proxy".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
            max_body_bytes: 10 * 1024 * 1024,
            strategy: RewriteStrategy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check the settings that clap cannot check on its own.
    pub fn validate(&self) -> Result<ProxyEndpoint, String> {
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err("timeouts must be at least one second".into());
        }
        if self.max_body_bytes == 0 {
            return Err("max body size must be non-zero".into());
        }
        ProxyEndpoint::parse(&self.endpoint)
    }
}

/// Where rewritten references point back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    endpoint: String,
    route: String,
}

impl ProxyEndpoint {
    pub fn parse(endpoint: &str) -> Result<Self, String> {
        let endpoint = endpoint.trim();
        let route = if endpoint.starts_with('/') {
            endpoint.split(['?', '#']).next().unwrap_or(endpoint).to_string()
        } else {
            let url = Url::parse(endpoint)
                .map_err(|e| format!("endpoint '{endpoint}' is neither a path nor a URL: {e}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(format!("endpoint '{endpoint}' must use http or https"));
            }
            url.path().to_string()
        };

        if route.is_empty() || route == "/" {
            return Err(format!("endpoint '{endpoint}' needs a non-root path"));
        }

        Ok(Self {
            endpoint: endpoint.to_string(),
            route,
        })
    }

    /// Path the router serves the proxy on.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn as_str(&self) -> &str {
        &self.endpoint
    }

    /// `<endpoint>?url=<encoded>` for an already-absolute URL.
    pub fn proxied(&self, absolute: &str) -> String {
        self.with_param(&urlencoding::encode(absolute))
    }

    /// `<endpoint>?url=<value>` with `value` written as given.
    pub fn with_param(&self, value: &str) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}url={}", self.endpoint, sep, value)
    }
}
