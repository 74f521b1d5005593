use crate::ledger::Ledger;
use crate::traits::{PageFetcher, PullFeed};
use crate::types::{BotError, CandidateItem, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const HACKER_NEWS_API: &str = "https://hacker-news.firebaseio.com/v0";

/// Ledger cursor holding the newest story id seen by the previous run.
const CURSOR: &str = "hacker_news";

#[derive(Debug, Deserialize)]
struct Story {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// New stories from the Hacker News JSON API.
///
/// Stories older than the previous run's newest id are not fetched again.
pub struct HackerNewsSource {
    api_url: String,
    max_items: usize,
    ledger: Arc<Ledger>,
    fetcher: Arc<dyn PageFetcher>,
}

impl HackerNewsSource {
    pub fn new(api_url: String, max_items: usize, ledger: Arc<Ledger>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            max_items,
            ledger,
            fetcher,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.fetcher.fetch_page(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PullFeed for HackerNewsSource {
    fn source_id(&self) -> String {
        CURSOR.to_string()
    }

    async fn pull(&mut self) -> Result<Vec<CandidateItem>> {
        let min_id = self
            .ledger
            .cursor(CURSOR)
            .await?
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(-1);

        let story_ids: Vec<i64> = self.fetch_json(&format!("{}/newstories.json", self.api_url)).await?;
        let Some(newest) = story_ids.first() else {
            return Err(BotError::General("no new stories listed".to_string()));
        };
        self.ledger.set_cursor(CURSOR, &newest.to_string()).await?;

        let mut items = Vec::new();
        for (position, id) in story_ids.iter().enumerate() {
            if *id < min_id || position >= self.max_items {
                break;
            }

            let story: Story = match self.fetch_json(&format!("{}/item/{}.json", self.api_url, id)).await {
                Ok(story) => story,
                Err(e) => {
                    warn!("Could not load story {}: {}", id, e);
                    continue;
                }
            };

            match (story.title, story.url) {
                (Some(title), Some(url)) if !url.trim().is_empty() && !title.trim().is_empty() => {
                    items.push(CandidateItem::new(title.trim(), url.trim()));
                }
                _ => debug!("Story {} has no link, skipping", id),
            }
        }

        info!("Pulled {} stories from Hacker News (cursor was {})", items.len(), min_id);
        Ok(items)
    }
}
