use clap::Parser;
use tokio::net::TcpListener;

use embed_proxy::config::ProxyConfig;
use embed_proxy::logging::init_logging;
use embed_proxy::proxy;
use embed_proxy::shared::ProxyState;

#[tokio::main]
async fn main() {
    let config = ProxyConfig::parse();
    init_logging(config.log_format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "embed-proxy exited");
        std::process::exit(1);
    }
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = config.validate()?;
    let state = ProxyState::from_config(&config, endpoint)?;

    let listener = TcpListener::bind(config.listen).await?;
    proxy::serve(listener, state).await?;
    Ok(())
}
