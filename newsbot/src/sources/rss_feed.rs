use crate::traits::{PageFetcher, PullFeed};
use crate::types::{CandidateItem, Result};
use crate::FeedParser;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Generic RSS/Atom feed source
pub struct RssFeedSource {
    pub url: String,
    fetcher: Arc<dyn PageFetcher>,
}

impl RssFeedSource {
    pub fn new(url: String, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { url, fetcher }
    }
}

#[async_trait]
impl PullFeed for RssFeedSource {
    fn source_id(&self) -> String {
        format!("rss:{}", self.url)
    }

    async fn pull(&mut self) -> Result<Vec<CandidateItem>> {
        info!("Pulling RSS feed: {}", self.url);

        let content = self.fetcher.fetch_page(&self.url).await?;
        let items = FeedParser::parse_feed(&content)?;

        info!("Pulled {} items from RSS feed {}", items.len(), self.url);
        Ok(items)
    }
}
