use crate::ledger::Ledger;
use crate::types::{CandidateItem, FilterOutcome, PublishedSnapshot, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

/// Read side of the posted-URL set, as seen by the dedupe filter.
#[async_trait]
pub trait PostedLookup: Send + Sync {
    async fn has_posted(&self, url: &str) -> Result<bool>;
}

#[async_trait]
impl PostedLookup for Ledger {
    async fn has_posted(&self, url: &str) -> Result<bool> {
        Ledger::has_posted(self, url).await
    }
}

#[async_trait]
impl PostedLookup for HashSet<String> {
    async fn has_posted(&self, url: &str) -> Result<bool> {
        Ok(self.contains(url))
    }
}

/// Host part of a candidate URL, if it has one.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_string())
}

/// Drop candidates whose host already reached `max_per_host` publications on
/// `today`.
///
/// A published item counts toward a host when its URL contains the host as a
/// substring, so `example.com` also counts `blog.example.com` and
/// `notexample.com`. Candidates kept earlier in the same pass count too,
/// unless their URL is already published: exact dedupe removes those, so
/// they must not use up the host's quota.
pub fn filter_too_much_posted(
    candidates: Vec<CandidateItem>,
    snapshot: &PublishedSnapshot,
    max_per_host: usize,
    today: NaiveDate,
) -> FilterOutcome {
    let total = candidates.len();
    let published_today: Vec<&str> = snapshot.published_on(today).map(|item| item.url.as_str()).collect();
    let published_urls: HashSet<&str> = snapshot.items().iter().map(|item| item.url.as_str()).collect();

    let mut kept: Vec<CandidateItem> = Vec::with_capacity(total);
    let mut kept_urls: HashSet<String> = HashSet::new();

    for candidate in candidates {
        let host = match host_of(&candidate.url) {
            Some(host) => host,
            None => {
                warn!("Could not parse host of {:?}, dropping", candidate.url);
                continue;
            }
        };

        let already = published_today.iter().filter(|url| url.contains(host.as_str())).count()
            + kept_urls.iter().filter(|url| url.contains(host.as_str())).count();

        if already >= max_per_host {
            debug!("Host {} already has {} posts today, dropping {}", host, already, candidate.url);
            continue;
        }

        if !published_urls.contains(candidate.url.as_str()) {
            kept_urls.insert(candidate.url.clone());
        }
        kept.push(candidate);
    }

    let removed = total - kept.len();
    info!("Filtered out {} in 'filter_too_much_posted'", removed);
    FilterOutcome { kept, removed }
}

/// Drop candidates already in the posted set, and repeats within the batch.
///
/// A failed lookup keeps the item; only a confirmed hit removes it.
pub async fn filter_already_posted(candidates: Vec<CandidateItem>, posted: &dyn PostedLookup) -> FilterOutcome {
    let total = candidates.len();
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(total);

    for candidate in candidates {
        if !seen.insert(candidate.url.clone()) {
            debug!("Skipping repeated URL in batch: {}", candidate.url);
            continue;
        }

        match posted.has_posted(&candidate.url).await {
            Ok(true) => debug!("Already posted: {}", candidate.url),
            Ok(false) => kept.push(candidate),
            Err(e) => {
                warn!("Posted lookup failed for {}, keeping it: {}", candidate.url, e);
                kept.push(candidate);
            }
        }
    }

    let removed = total - kept.len();
    info!("Filtered out {} in 'filter_already_posted'", removed);
    FilterOutcome { kept, removed }
}
