pub mod check;
pub mod serve;

use std::sync::Arc;

use sitechat_config::SiteConfig;
use sitechat_content::{ContentSource, JsonFileSource, StaticSource};

/// Pick the content source the configuration asks for. An empty
/// corpus path means an empty in-memory corpus, which keeps the chat
/// usable on a site that has not exported its content yet.
pub fn content_source(config: &SiteConfig) -> Arc<dyn ContentSource> {
    if config.content.corpus_path.is_empty() {
        Arc::new(StaticSource::new(Vec::new()))
    } else {
        Arc::new(JsonFileSource::new(&config.content.corpus_path))
    }
}
