use crate::types::{CandidateItem, Credential, NewPost, PublishedItem, Result};
use async_trait::async_trait;

/// Trait for pulling candidate items from a source (RSS feeds, APIs, etc.)
#[async_trait]
pub trait PullFeed: Send + Sync {
    /// Unique identifier for this feed source
    fn source_id(&self) -> String;

    /// Fetch the current items of the source. The sequence is finite and can
    /// be pulled again on the next run.
    async fn pull(&mut self) -> Result<Vec<CandidateItem>>;
}

/// The social-news site the bot publishes to.
#[async_trait]
pub trait PublishingApi: Send + Sync {
    /// Every currently published item, sorted by id ascending.
    async fn list_all_published(&self) -> Result<Vec<PublishedItem>>;

    /// Non-2xx responses are errors.
    async fn publish(&self, post: &NewPost, credential: &Credential) -> Result<()>;

    async fn retract(&self, post_id: i64, credential: &Credential) -> Result<()>;

    async fn upvote(&self, post_id: i64, credential: &Credential) -> Result<()>;

    async fn register(&self, username: &str, password: &str) -> Result<Credential>;

    async fn login(&self, username: &str, password: &str) -> Result<Credential>;
}

/// Fetches article pages linked from candidate items.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;

    /// Whether the URL currently answers with a success status.
    async fn is_reachable(&self, url: &str) -> bool;
}
