pub mod hacker_news;
pub mod resource_link;
pub mod rss_feed;

pub use hacker_news::HackerNewsSource;
pub use resource_link::ResourceLinkSource;
pub use rss_feed::RssFeedSource;

use crate::config::{FeedConfig, SourceKind};
use crate::ledger::Ledger;
use crate::traits::{PageFetcher, PullFeed};
use std::sync::Arc;

/// Stories considered per Hacker News run when the feed sets no limit.
pub const DEFAULT_HACKER_NEWS_ITEMS: usize = 30;

/// Build the source a feed configuration describes.
pub fn build_source(
    config: &FeedConfig,
    fetcher: Arc<dyn PageFetcher>,
    ledger: Arc<Ledger>,
) -> Box<dyn PullFeed> {
    match config.kind {
        SourceKind::Rss => Box::new(RssFeedSource::new(config.url.clone(), fetcher)),
        SourceKind::HackerNews => Box::new(HackerNewsSource::new(
            if config.url.trim().is_empty() {
                hacker_news::HACKER_NEWS_API.to_string()
            } else {
                config.url.clone()
            },
            config.max_items.unwrap_or(DEFAULT_HACKER_NEWS_ITEMS),
            ledger,
            fetcher,
        )),
        SourceKind::ResourceLinks => Box::new(ResourceLinkSource::new(
            config.url.clone(),
            config.allowed_hosts.clone(),
            fetcher,
        )),
    }
}
