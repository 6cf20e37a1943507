//! `sitechat check` — validate the deployment without serving.
//!
//! Exercises the same construction paths as `serve`: config parsing,
//! provider credential lookup, and a full corpus load. Exits non-zero
//! on the first failure so it can gate a deploy script.

use sitechat_config::SiteConfig;
use sitechat_content::ContentSource;
use sitechat_providers::{build_provider, resolve_model};

pub async fn run(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = SiteConfig::load(config_path)?;
    println!("config      ok  ({config_path})");

    if !config.chat.enabled {
        println!("chat        disabled (requests will get 403)");
    }

    let provider = build_provider(&config.chat)?;
    println!(
        "provider    ok  ({}, model {})",
        provider.name(),
        resolve_model(&config.chat)
    );

    let source = super::content_source(&config);
    let items = source.load_all().await?;
    if config.content.corpus_path.is_empty() {
        println!("corpus      empty (no corpus_path configured)");
    } else {
        println!(
            "corpus      ok  ({} items from {})",
            items.len(),
            config.content.corpus_path
        );
    }

    println!("language    default '{}'", config.chat.default_language);
    Ok(())
}
