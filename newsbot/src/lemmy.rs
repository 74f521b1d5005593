use crate::fetcher::{api_error, Fetcher};
use crate::traits::PublishingApi;
use crate::types::{BotError, Credential, NewPost, PublishedItem, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const PAGE_SIZE: usize = 50;

/// Upper bound on listing pages, for servers that ignore `page`.
pub const MAX_PAGES: usize = 2_000;

#[derive(Debug, Deserialize)]
struct PostListResponse {
    #[serde(default)]
    posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
struct PostView {
    post: PostRecord,
    #[serde(default)]
    counts: Option<PostCounts>,
}

#[derive(Debug, Deserialize)]
struct PostRecord {
    id: i64,
    name: String,
    #[serde(default)]
    url: Option<String>,
    published: String,
    #[serde(default)]
    ap_id: String,
    #[serde(default)]
    community_id: i64,
}

#[derive(Debug, Deserialize)]
struct PostCounts {
    #[serde(default)]
    newest_comment_time: Option<String>,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    password_verify: &'a str,
    show_nsfw: bool,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username_or_email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct JwtResponse {
    #[serde(default)]
    jwt: Option<String>,
}

#[derive(Serialize)]
struct CreatePostRequest<'a> {
    name: &'a str,
    url: &'a str,
    auth: &'a str,
    community_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

#[derive(Serialize)]
struct RemovePostRequest<'a> {
    post_id: i64,
    removed: bool,
    auth: &'a str,
}

#[derive(Serialize)]
struct LikePostRequest<'a> {
    post_id: i64,
    score: i32,
    auth: &'a str,
}

/// Timestamps come either naive (`2023-09-01T10:00:00.123456`) or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}

/// Client for a Lemmy v3 instance.
pub struct LemmyClient {
    fetcher: Fetcher,
    base_url: String,
    reader_prefix: String,
    max_pages: usize,
}

impl LemmyClient {
    pub fn new(fetcher: Fetcher, base_url: impl Into<String>, reader_prefix: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reader_prefix: reader_prefix.into(),
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v3/{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B, credential: Option<&Credential>) -> Result<String> {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let mut request = self.fetcher.client().post(&url).json(body);
        if let Some(credential) = credential {
            request = request.bearer_auth(credential.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), text));
        }
        Ok(text)
    }

    async fn post_for_jwt<B: Serialize + Sync>(&self, path: &str, body: &B, username: &str) -> Result<Credential> {
        let text = self.post_json(path, body, None).await?;
        let response: JwtResponse = parse_body(&text)?;

        match response.jwt.map(Credential::new) {
            Some(credential) if !credential.is_empty() => Ok(credential),
            _ => Err(BotError::Identity {
                username: username.to_string(),
                reason: format!("{} returned no session token", path),
            }),
        }
    }

    fn to_published(&self, view: PostView) -> PublishedItem {
        let url = view.post.url.unwrap_or_default();
        let url = url.strip_prefix(self.reader_prefix.as_str()).unwrap_or(&url).to_string();

        let published = parse_timestamp(&view.post.published).unwrap_or_else(|| {
            warn!("Post {} has an unreadable publish time {:?}", view.post.id, view.post.published);
            NaiveDateTime::default()
        });
        let newest_activity = view
            .counts
            .and_then(|counts| counts.newest_comment_time)
            .and_then(|raw| parse_timestamp(&raw));

        PublishedItem {
            id: view.post.id,
            title: view.post.name,
            url,
            ap_id: view.post.ap_id,
            published,
            newest_activity,
            community_id: view.post.community_id,
        }
    }
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

#[async_trait]
impl PublishingApi for LemmyClient {
    async fn list_all_published(&self) -> Result<Vec<PublishedItem>> {
        let mut items = Vec::new();
        let mut exhausted = false;

        for page in 1..=self.max_pages {
            let url = self.endpoint(&format!("post/list?limit={}&page={}", PAGE_SIZE, page));
            let response: PostListResponse = self.fetcher.fetch_json(&url).await?;
            if response.posts.is_empty() {
                exhausted = true;
                break;
            }
            items.extend(response.posts.into_iter().map(|view| self.to_published(view)));
        }

        // A partial snapshot would let old URLs through dedupe and moderation.
        if !exhausted {
            return Err(BotError::General(format!(
                "post listing did not end within {} pages",
                self.max_pages
            )));
        }

        items.sort_by_key(|item| item.id);
        info!("Listed {} published posts", items.len());
        Ok(items)
    }

    async fn publish(&self, post: &NewPost, credential: &Credential) -> Result<()> {
        let request = CreatePostRequest {
            name: &post.title,
            url: &post.url,
            auth: credential.as_str(),
            community_id: post.community_id,
            body: post.body.as_deref(),
        };
        self.post_json("post", &request, Some(credential)).await?;
        info!("Published {:?} into community {}", post.title, post.community_id);
        Ok(())
    }

    async fn retract(&self, post_id: i64, credential: &Credential) -> Result<()> {
        let request = RemovePostRequest {
            post_id,
            removed: true,
            auth: credential.as_str(),
        };
        self.post_json("post/remove", &request, Some(credential)).await?;
        Ok(())
    }

    async fn upvote(&self, post_id: i64, credential: &Credential) -> Result<()> {
        let request = LikePostRequest {
            post_id,
            score: 1,
            auth: credential.as_str(),
        };
        self.post_json("post/like", &request, Some(credential)).await?;
        Ok(())
    }

    async fn register(&self, username: &str, password: &str) -> Result<Credential> {
        let request = RegisterRequest {
            username,
            password,
            password_verify: password,
            show_nsfw: false,
        };
        self.post_for_jwt("user/register", &request, username).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let request = LoginRequest {
            username_or_email: username,
            password,
        };
        self.post_for_jwt("user/login", &request, username).await
    }
}
