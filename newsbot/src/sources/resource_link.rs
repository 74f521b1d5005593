use crate::traits::{PageFetcher, PullFeed};
use crate::types::{BotError, CandidateItem, Result};
use crate::FeedParser;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const RESOURCE_BUTTON: &str = "a.btn-primary";
const RESOURCE_BUTTON_TEXT: &str = "Visit resource";

pub const DEFAULT_ALLOWED_HOSTS: [&str; 2] = ["towardsdatascience.com", "aihub.org"];

/// Aggregator feed whose entries point at an intermediate page with a
/// "Visit resource" button. The button's target is the actual article.
pub struct ResourceLinkSource {
    feed_url: String,
    allowed_hosts: Vec<String>,
    fetcher: Arc<dyn PageFetcher>,
}

impl ResourceLinkSource {
    pub fn new(feed_url: String, allowed_hosts: Vec<String>, fetcher: Arc<dyn PageFetcher>) -> Self {
        let allowed_hosts = if allowed_hosts.is_empty() {
            DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect()
        } else {
            allowed_hosts
        };

        Self {
            feed_url,
            allowed_hosts,
            fetcher,
        }
    }

    fn is_allowed(&self, url: &str) -> bool {
        self.allowed_hosts.iter().any(|host| url.contains(host.as_str()))
    }
}

#[async_trait]
impl PullFeed for ResourceLinkSource {
    fn source_id(&self) -> String {
        format!("resource:{}", self.feed_url)
    }

    async fn pull(&mut self) -> Result<Vec<CandidateItem>> {
        let content = self.fetcher.fetch_page(&self.feed_url).await?;
        let entries = FeedParser::parse_feed(&content)?;

        let mut items = Vec::new();
        for entry in entries {
            let page = match self.fetcher.fetch_page(&entry.url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Could not load resource page {}: {}", entry.url, e);
                    continue;
                }
            };

            let Some(target) = find_resource_link(&page)? else {
                debug!("No resource link on {}", entry.url);
                continue;
            };

            let target = strip_tracking_params(&target).unwrap_or(target);
            if self.is_allowed(&target) {
                items.push(CandidateItem::new(entry.title, target));
            }
        }

        info!("Resolved {} resource links from {}", items.len(), self.feed_url);
        Ok(items)
    }
}

/// Target of the first "Visit resource" button on the page.
pub fn find_resource_link(html: &str) -> Result<Option<String>> {
    let selector =
        Selector::parse(RESOURCE_BUTTON).map_err(|e| BotError::Parse(format!("Bad selector: {:?}", e)))?;
    let document = Html::parse_document(html);

    let link = document
        .select(&selector)
        .filter(|element| element.text().collect::<String>().trim() == RESOURCE_BUTTON_TEXT)
        .find_map(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    Ok(link)
}

/// Drop the `source` and `utm_*` query parameters.
pub fn strip_tracking_params(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "source" && !key.starts_with("utm_"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_parameters() {
        let cleaned =
            strip_tracking_params("https://aihub.org/post?id=7&utm_source=x&source=feed&utm_medium=rss").unwrap();
        assert_eq!(cleaned, "https://aihub.org/post?id=7");

        let bare = strip_tracking_params("https://aihub.org/post?utm_campaign=y").unwrap();
        assert_eq!(bare, "https://aihub.org/post");
    }

    #[test]
    fn finds_visit_resource_button() {
        let html = r#"<html><body>
            <a class="btn btn-primary" href="https://example.com/other">Subscribe</a>
            <a class="btn btn-primary" href=" https://towardsdatascience.com/a ">Visit resource</a>
        </body></html>"#;

        assert_eq!(
            find_resource_link(html).unwrap().as_deref(),
            Some("https://towardsdatascience.com/a")
        );
        assert_eq!(find_resource_link("<p>nothing</p>").unwrap(), None);
    }
}
