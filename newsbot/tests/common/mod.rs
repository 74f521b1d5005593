// Shared doubles for the integration tests. Not every test binary uses all of them.
#![allow(dead_code)]

pub use newsbot::config::{FeedConfig, FeedPlan};
pub use newsbot::identity::{IdentityCatalog, IdentityPool, PasswordPolicy};
pub use newsbot::ledger::Ledger;
pub use newsbot::llm_adapter::LlmAdapter;
pub use newsbot::traits::{PageFetcher, PublishingApi, PullFeed};
pub use newsbot::types::*;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const ARTICLE_HTML: &str = r#"<html>
  <head><title>Article</title><script>track()</script></head>
  <body><h1>Deep learning news</h1><p>A new machine learning model was released today.</p></body>
</html>"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

pub fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
}

pub fn published(id: i64, title: &str, url: &str, when: NaiveDateTime) -> PublishedItem {
    PublishedItem {
        id,
        title: title.to_string(),
        url: url.to_string(),
        ap_id: format!("https://news.example/post/{}", id),
        published: when,
        newest_activity: None,
        community_id: 4,
    }
}

pub fn candidate(title: &str, url: &str) -> CandidateItem {
    CandidateItem::new(title, url)
}

pub fn feed_plan(url: &str, username: &str) -> FeedPlan {
    FeedPlan::compile(FeedConfig {
        url: url.to_string(),
        username: username.to_string(),
        ..Default::default()
    })
    .unwrap()
}

pub async fn memory_ledger() -> Arc<Ledger> {
    Arc::new(Ledger::in_memory().await.unwrap())
}

pub fn identity_pool(ledger: Arc<Ledger>, api: Arc<MockPublishingApi>, catalog: IdentityCatalog) -> Arc<IdentityPool> {
    Arc::new(IdentityPool::new(ledger, api, catalog, PasswordPolicy::new("-test")))
}

/// In-memory publishing site recording every call.
#[derive(Default)]
pub struct MockPublishingApi {
    pub listed: Mutex<Vec<PublishedItem>>,
    pub publishes: Mutex<Vec<(NewPost, Credential)>>,
    pub retractions: Mutex<Vec<i64>>,
    pub upvotes: Mutex<Vec<(i64, Credential)>>,
    pub registrations: Mutex<Vec<String>>,
    pub logins: Mutex<Vec<String>>,
    pub fail_register: AtomicBool,
    pub fail_login: AtomicBool,
    pub fail_publish: AtomicBool,
    pub fail_retract_ids: Mutex<HashSet<i64>>,
}

impl MockPublishingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_listed(items: Vec<PublishedItem>) -> Arc<Self> {
        let api = Self::default();
        *api.listed.lock().unwrap() = items;
        Arc::new(api)
    }

    pub fn published_urls(&self) -> Vec<String> {
        self.publishes.lock().unwrap().iter().map(|(post, _)| post.url.clone()).collect()
    }

    pub fn registrations_of(&self, username: &str) -> usize {
        self.registrations.lock().unwrap().iter().filter(|u| *u == username).count()
    }

    pub fn logins_of(&self, username: &str) -> usize {
        self.logins.lock().unwrap().iter().filter(|u| *u == username).count()
    }

    pub fn retracted(&self) -> Vec<i64> {
        self.retractions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishingApi for MockPublishingApi {
    async fn list_all_published(&self) -> Result<Vec<PublishedItem>> {
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn publish(&self, post: &NewPost, credential: &Credential) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BotError::Api {
                status: 500,
                body: "publish disabled".to_string(),
            });
        }
        self.publishes.lock().unwrap().push((post.clone(), credential.clone()));
        Ok(())
    }

    async fn retract(&self, post_id: i64, _credential: &Credential) -> Result<()> {
        if self.fail_retract_ids.lock().unwrap().contains(&post_id) {
            return Err(BotError::Api {
                status: 403,
                body: "not allowed".to_string(),
            });
        }
        self.retractions.lock().unwrap().push(post_id);
        Ok(())
    }

    async fn upvote(&self, post_id: i64, credential: &Credential) -> Result<()> {
        self.upvotes.lock().unwrap().push((post_id, credential.clone()));
        Ok(())
    }

    async fn register(&self, username: &str, _password: &str) -> Result<Credential> {
        let mut registrations = self.registrations.lock().unwrap();
        if self.fail_register.load(Ordering::SeqCst) || registrations.iter().any(|u| u == username) {
            return Err(BotError::Api {
                status: 400,
                body: "user_already_exists".to_string(),
            });
        }
        registrations.push(username.to_string());
        Ok(Credential::new(format!("register-{}", username)))
    }

    async fn login(&self, username: &str, _password: &str) -> Result<Credential> {
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(BotError::Api {
                status: 400,
                body: "incorrect_login".to_string(),
            });
        }
        self.logins.lock().unwrap().push(username.to_string());
        Ok(Credential::new(format!("login-{}", username)))
    }
}

/// Text service double with a fixed topic rating.
pub struct MockLlmAdapter {
    pub rating: Option<u8>,
    pub fail_summarize: bool,
    pub ratings_requested: Mutex<usize>,
}

impl MockLlmAdapter {
    pub fn new(rating: Option<u8>) -> Arc<Self> {
        Arc::new(Self {
            rating,
            fail_summarize: false,
            ratings_requested: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            rating: Some(8),
            fail_summarize: true,
            ratings_requested: Mutex::new(0),
        })
    }

    pub fn rating_calls(&self) -> usize {
        *self.ratings_requested.lock().unwrap()
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        "Mock LLM Adapter".to_string()
    }

    async fn summarize(&self, title: &str, excerpt: &str) -> Result<String> {
        if self.fail_summarize {
            return Err(BotError::General("summaries disabled".to_string()));
        }
        let lead: Vec<&str> = excerpt.split_whitespace().take(8).collect();
        Ok(format!("{}: {}", title, lead.join(" ")))
    }

    async fn rephrase_title(&self, title: &str, _excerpt: &str) -> Result<String> {
        Ok(format!("{} (rephrased)", title))
    }

    async fn rate_topic(&self, _excerpt: &str) -> Result<Option<u8>> {
        *self.ratings_requested.lock().unwrap() += 1;
        Ok(self.rating)
    }
}

/// Feed returning the same items on every pull.
pub struct StaticFeed {
    pub id: String,
    pub items: Vec<CandidateItem>,
    pub fail: bool,
}

impl StaticFeed {
    pub fn boxed(id: &str, items: Vec<CandidateItem>) -> Box<dyn PullFeed> {
        Box::new(Self {
            id: id.to_string(),
            items,
            fail: false,
        })
    }

    pub fn failing(id: &str) -> Box<dyn PullFeed> {
        Box::new(Self {
            id: id.to_string(),
            items: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl PullFeed for StaticFeed {
    fn source_id(&self) -> String {
        self.id.clone()
    }

    async fn pull(&mut self) -> Result<Vec<CandidateItem>> {
        if self.fail {
            return Err(BotError::Parse(format!("{} is down", self.id)));
        }
        Ok(self.items.clone())
    }
}

/// Page fetcher serving fixed bodies; unknown URLs get the default page.
#[derive(Default)]
pub struct StaticPages {
    pub pages: HashMap<String, String>,
    pub default_page: Option<String>,
    pub unreachable: HashSet<String>,
}

impl StaticPages {
    pub fn serving(default_page: &str) -> Self {
        Self {
            default_page: Some(default_page.to_string()),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticPages {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .or(self.default_page.as_ref())
            .cloned()
            .ok_or_else(|| BotError::Api {
                status: 404,
                body: format!("no page for {}", url),
            })
    }

    async fn is_reachable(&self, url: &str) -> bool {
        !self.unreachable.contains(url)
    }
}
