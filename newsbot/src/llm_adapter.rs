use crate::fetcher::{api_error, Fetcher};
use crate::types::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const CHECK_TOPIC: &str = "check-if-post-is-about-ai";
const SUMMARIZE: &str = "write-summary-of-website";
const REPHRASE_TITLE: &str = "rephrase-title";

/// Text service used to classify, summarize and retitle articles
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Short summary used as the post body
    async fn summarize(&self, title: &str, excerpt: &str) -> Result<String>;

    async fn rephrase_title(&self, title: &str, excerpt: &str) -> Result<String>;

    /// Topic rating on a 0-10 scale, `None` when the answer holds no
    /// whole number.
    async fn rate_topic(&self, excerpt: &str) -> Result<Option<u8>>;
}

/// Parse a free-text rating answer: every character except digits and the
/// decimal point is dropped; empty or fractional results are no rating.
pub fn parse_rating(answer: &str) -> Option<u8> {
    let digits: String = answer.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if digits.is_empty() || digits.contains('.') {
        return None;
    }
    digits.parse::<u8>().ok()
}

pub fn is_on_topic(rating: Option<u8>) -> bool {
    matches!(rating, Some(r) if r > 5 && r <= 10)
}

#[derive(Serialize)]
struct CheckTopicPayload<'a> {
    article_text: &'a str,
}

#[derive(Serialize)]
struct SummarizePayload<'a> {
    title: &'a str,
    post: &'a str,
}

#[derive(Serialize)]
struct RephrasePayload<'a> {
    title: &'a str,
    excerpt: &'a str,
}

#[derive(Deserialize)]
struct RunResponse {
    #[serde(default)]
    data: String,
}

/// Adapter for prompts hosted on PromptBetter.
pub struct PromptBetterAdapter {
    client: Client,
    base_url: String,
    token: String,
}

impl PromptBetterAdapter {
    pub fn new(fetcher: &Fetcher, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: fetcher.client().clone(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn run<P: Serialize + Sync>(&self, prompt: &str, payload: &P) -> Result<String> {
        let url = format!("{}/{}", self.base_url, prompt);
        debug!("Running prompt {}", prompt);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), body));
        }

        let answer: RunResponse = response.json().await?;
        Ok(answer.data.trim().to_string())
    }

    async fn run_non_empty<P: Serialize + Sync>(&self, prompt: &str, payload: &P) -> Result<String> {
        let answer = self.run(prompt, payload).await?;
        if answer.is_empty() {
            return Err(BotError::General(format!("prompt {} returned no text", prompt)));
        }
        Ok(answer)
    }
}

#[async_trait]
impl LlmAdapter for PromptBetterAdapter {
    fn adapter_name(&self) -> String {
        format!("PromptBetter ({})", self.base_url)
    }

    async fn summarize(&self, title: &str, excerpt: &str) -> Result<String> {
        self.run_non_empty(SUMMARIZE, &SummarizePayload { title, post: excerpt }).await
    }

    async fn rephrase_title(&self, title: &str, excerpt: &str) -> Result<String> {
        self.run_non_empty(REPHRASE_TITLE, &RephrasePayload { title, excerpt }).await
    }

    async fn rate_topic(&self, excerpt: &str) -> Result<Option<u8>> {
        let answer = self.run(CHECK_TOPIC, &CheckTopicPayload { article_text: excerpt }).await?;
        Ok(parse_rating(&answer))
    }
}
