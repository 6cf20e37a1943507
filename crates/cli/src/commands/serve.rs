//! `sitechat serve` — start the HTTP chat gateway.

use sitechat_config::SiteConfig;
use sitechat_providers::{build_provider, resolve_model};
use tracing::info;

pub async fn run(config_path: &str, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SiteConfig::load(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let provider = build_provider(&config.chat)?;
    let source = super::content_source(&config);
    info!(
        provider = provider.name(),
        model = %resolve_model(&config.chat),
        "starting gateway"
    );

    sitechat_gateway::start(config, provider, source).await
}
