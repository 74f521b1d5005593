use crate::config::{CommunityRouting, FeedPlan};
use crate::dedupe::{filter_already_posted, filter_too_much_posted};
use crate::excerpt::enrich_with_excerpt;
use crate::identity::{IdentityPool, RANDOM_IDENTITY};
use crate::ledger::Ledger;
use crate::llm_adapter::LlmAdapter;
use crate::topic_filter::{
    filter_by_ai_content, filter_by_keywords_in_title, filter_by_title_regex, filter_previously_rejected, strip_title,
};
use crate::traits::{PageFetcher, PublishingApi, PullFeed};
use crate::types::{BotError, CandidateItem, NewPost, PublishedSnapshot, Result, RunSummary};
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A configured feed paired with the source that pulls it.
pub struct FeedJob {
    pub plan: FeedPlan,
    pub source: Box<dyn PullFeed>,
}

impl FeedJob {
    pub fn new(plan: FeedPlan, source: Box<dyn PullFeed>) -> Self {
        Self { plan, source }
    }
}

/// The `rss` command: pull every feed, filter, then publish the survivors in
/// random order.
pub struct RssRun {
    ledger: Arc<Ledger>,
    identities: Arc<IdentityPool>,
    api: Arc<dyn PublishingApi>,
    llm: Arc<dyn LlmAdapter>,
    pages: Arc<dyn PageFetcher>,
    communities: CommunityRouting,
    reader_prefix: String,
    max_per_host: usize,
}

impl RssRun {
    pub fn new(
        ledger: Arc<Ledger>,
        identities: Arc<IdentityPool>,
        api: Arc<dyn PublishingApi>,
        llm: Arc<dyn LlmAdapter>,
        pages: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            ledger,
            identities,
            api,
            llm,
            pages,
            communities: CommunityRouting::default(),
            reader_prefix: String::new(),
            max_per_host: crate::config::DEFAULT_MAX_PER_HOST,
        }
    }

    pub fn with_communities(mut self, communities: CommunityRouting) -> Self {
        self.communities = communities;
        self
    }

    pub fn with_reader_prefix(mut self, reader_prefix: impl Into<String>) -> Self {
        self.reader_prefix = reader_prefix.into();
        self
    }

    pub fn with_max_per_host(mut self, max_per_host: usize) -> Self {
        self.max_per_host = max_per_host;
        self
    }

    pub async fn run<R: Rng + Send>(
        &self,
        feeds: Vec<FeedJob>,
        snapshot: &PublishedSnapshot,
        today: NaiveDate,
        rng: &mut R,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut batch: Vec<CandidateItem> = Vec::new();

        for mut job in feeds {
            let url = job.plan.config.url.clone();

            if let Some(spread) = job.plan.config.spread {
                let roll: u32 = rng.gen_range(0..100);
                if roll >= spread {
                    info!("Skipping {} this run (rolled {} against spread {})", url, roll, spread);
                    summary.feeds_skipped += 1;
                    continue;
                }
            }

            if job.plan.config.username.trim().is_empty() {
                warn!("No username configured for {}, skipping", url);
                summary.feeds_skipped += 1;
                continue;
            }

            match self.prepare_feed(&mut job, snapshot, today, rng, &mut summary).await {
                Ok(items) => {
                    info!("Feed {} contributed {} items", url, items.len());
                    summary.feeds_processed += 1;
                    batch.extend(items);
                }
                Err(e) => {
                    error!("Feed {} failed: {}", url, e);
                    summary.feeds_failed += 1;
                }
            }
        }

        batch.shuffle(rng);
        info!("Publishing up to {} items", batch.len());

        for item in batch {
            self.publish_item(item, &mut summary).await;
        }

        info!(
            "rss run finished: {} published, {} feeds processed, {} skipped, {} failed",
            summary.published, summary.feeds_processed, summary.feeds_skipped, summary.feeds_failed
        );
        summary
    }

    async fn prepare_feed<R: Rng + Send>(
        &self,
        job: &mut FeedJob,
        snapshot: &PublishedSnapshot,
        today: NaiveDate,
        rng: &mut R,
        summary: &mut RunSummary,
    ) -> Result<Vec<CandidateItem>> {
        let plan = &job.plan;
        let mut items = job.source.pull().await?;
        summary.items_fetched += items.len();

        if let Some(max_items) = plan.config.max_items {
            if items.len() > max_items {
                info!("Got {} items from {}, keeping {}", items.len(), job.source.source_id(), max_items);
                items.truncate(max_items);
            }
        }

        let capped = filter_too_much_posted(items, snapshot, self.max_per_host, today);
        summary.dropped_volume_cap += capped.removed;

        let fresh = filter_already_posted(capped.kept, &*self.ledger).await;
        summary.dropped_already_posted += fresh.removed;

        let remembered = filter_previously_rejected(fresh.kept, &self.ledger).await;
        summary.dropped_rejected += remembered.removed;
        let mut items = remembered.kept;

        if plan.config.check_title {
            let outcome = filter_by_keywords_in_title(items);
            summary.dropped_topic += outcome.removed;
            items = outcome.kept;
        }
        if let Some(pattern) = &plan.title_regex {
            let outcome = filter_by_title_regex(items, pattern, true);
            summary.dropped_topic += outcome.removed;
            items = outcome.kept;
        }
        if let Some(pattern) = &plan.title_not_regex {
            let outcome = filter_by_title_regex(items, pattern, false);
            summary.dropped_topic += outcome.removed;
            items = outcome.kept;
        }

        if items.is_empty() {
            return Ok(items);
        }

        let enriched = enrich_with_excerpt(items, self.pages.as_ref()).await;
        summary.dropped_enrichment += enriched.removed;
        let mut items = enriched.kept;

        if plan.config.check_link_content {
            let outcome = filter_by_ai_content(items, self.llm.as_ref(), &self.ledger).await;
            summary.dropped_topic += outcome.removed;
            items = outcome.kept;
        }

        if let Some(pattern) = &plan.title_strip {
            strip_title(&mut items, pattern);
        }

        if items.is_empty() {
            return Ok(items);
        }

        let username = plan.config.username.trim();
        let identity = if username == RANDOM_IDENTITY {
            self.identities.random_credential(rng).await?
        } else {
            self.identities.credential_for(username).await?
        };
        debug!("Feed {} publishes as {}", plan.config.url, identity.username);

        for item in items.iter_mut() {
            item.credential = Some(identity.credential.clone());
            item.via_reader = plan.config.use_reader;
        }

        Ok(items)
    }

    fn link_for(&self, item: &CandidateItem) -> String {
        if item.via_reader {
            format!("{}{}", self.reader_prefix, item.url)
        } else {
            item.url.clone()
        }
    }

    /// Reachability check, summary and title rewrite for one item.
    async fn compose_post(&self, item: &CandidateItem, link: String) -> Result<NewPost> {
        if !self.pages.is_reachable(&link).await {
            return Err(BotError::General(format!("{} is not reachable", link)));
        }

        let excerpt = item.excerpt.as_deref().unwrap_or_default();
        let body = self.llm.summarize(&item.title, excerpt).await?;
        let title = self.llm.rephrase_title(&item.title, excerpt).await?;

        Ok(NewPost {
            title,
            community_id: self.communities.community_for(&link),
            url: link,
            body: Some(body),
        })
    }

    async fn publish_item(&self, item: CandidateItem, summary: &mut RunSummary) {
        // Another feed of this run may have published the same URL already.
        match self.ledger.has_posted(&item.url).await {
            Ok(true) => {
                debug!("Already posted during this run: {}", item.url);
                summary.dropped_already_posted += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => warn!("Posted re-check failed for {}: {}", item.url, e),
        }

        let Some(credential) = item.credential.clone() else {
            warn!("No credential assigned to {}, dropping", item.url);
            summary.publish_failed += 1;
            return;
        };

        let post = match self.compose_post(&item, self.link_for(&item)).await {
            Ok(post) => post,
            Err(e) => {
                warn!("Dropping {}: {}", item.url, e);
                summary.dropped_enrichment += 1;
                return;
            }
        };

        if let Err(e) = self.api.publish(&post, &credential).await {
            error!("Could not publish {}: {}", item.url, e);
            summary.publish_failed += 1;
            return;
        }
        summary.published += 1;

        if let Err(e) = self.ledger.mark_posted(&item.url).await {
            error!("Published {} but could not record it: {}", item.url, e);
        }
    }
}
