use crate::types::{BotError, CandidateItem, Result};
use feed_rs::parser;
use tracing::{debug, info};

pub struct FeedParser;

impl FeedParser {
    /// Parse RSS or Atom content into candidates, in feed order.
    ///
    /// Repeated links are kept; removing them is the dedupe filter's job.
    pub fn parse_feed(content: &str) -> Result<Vec<CandidateItem>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| BotError::Parse(format!("Failed to parse feed: {}", e)))?;

        let items: Vec<CandidateItem> = feed.entries.into_iter().filter_map(Self::parse_entry).collect();

        info!("Parsed feed with {} entries", items.len());
        Ok(items)
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> Option<CandidateItem> {
        let url = entry.links.first()?.href.trim().to_string();
        if url.is_empty() {
            return None;
        }

        let title = entry.title.map(|t| t.content.trim().to_string()).unwrap_or_default();
        if title.is_empty() {
            debug!("Skipping untitled entry: {}", url);
            return None;
        }

        Some(CandidateItem::new(title, url))
    }
}
