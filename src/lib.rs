//! Content-rewriting HTTP proxy for embedding third-party pages.
//!
//! A request to `<endpoint>?url=<target>` fetches the target, drops the
//! headers that forbid framing, rewrites embedded references so they point
//! back at the proxy, and returns the result.

pub mod config;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod logging;
pub mod proxy;
pub mod rewrite;
pub mod shared;
pub mod target;

pub use config::{ProxyConfig, ProxyEndpoint, RewriteStrategy};
pub use error::{FetchError, InvalidUrl, ProxyError};
pub use fetch::{FetchResult, Fetcher, OutboundRequest, ReqwestFetcher};
pub use shared::{ProxyState, ProxyResponse};
