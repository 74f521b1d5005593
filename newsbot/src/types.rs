use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
// Use the interfaces crate for the values crossing collaborator boundaries
pub use interfaces::defs::{CandidateItem, Credential, Identity, NewPost, PublishedItem};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "newsbot/0.1".to_string(),
            timeout_seconds: 8,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_redirects: 5,
        }
    }
}

/// Every item currently published upstream, sorted by id ascending.
///
/// Loaded once at the start of a run and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct PublishedSnapshot {
    items: Vec<PublishedItem>,
}

impl PublishedSnapshot {
    pub fn new(mut items: Vec<PublishedItem>) -> Self {
        items.sort_by_key(|item| item.id);
        Self { items }
    }

    pub fn items(&self) -> &[PublishedItem] {
        &self.items
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &PublishedItem> {
        self.items.iter().rev()
    }

    pub fn published_on(&self, day: NaiveDate) -> impl Iterator<Item = &PublishedItem> {
        self.items.iter().filter(move |item| item.published.date() == day)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of one filter pass over a batch of candidates.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<CandidateItem>,
    pub removed: usize,
}

/// Outcome counts of one `rss` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub feeds_processed: usize,
    pub feeds_skipped: usize,
    pub feeds_failed: usize,
    pub items_fetched: usize,
    pub dropped_volume_cap: usize,
    pub dropped_already_posted: usize,
    pub dropped_rejected: usize,
    pub dropped_topic: usize,
    pub dropped_enrichment: usize,
    pub publish_failed: usize,
    pub published: usize,
}

/// Outcome counts of one moderation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub skipped_blank: usize,
    pub flagged_url: usize,
    pub flagged_title: usize,
    pub flagged_duplicate: usize,
    pub retracted: usize,
    pub retraction_failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpvoteSummary {
    pub identities_used: usize,
    pub identities_failed: usize,
    pub upvoted: usize,
    pub upvote_failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Identity error for {username}: {reason}")]
    Identity { username: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

impl BotError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Http(e) => e.is_timeout() || e.is_connect(),
            BotError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
