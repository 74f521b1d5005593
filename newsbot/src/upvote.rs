use crate::identity::IdentityPool;
use crate::traits::PublishingApi;
use crate::types::{PublishedSnapshot, UpvoteSummary};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_ROUNDS: usize = 4;
/// Newest posts considered per round.
pub const UPVOTE_WINDOW: usize = 31;
pub const UPVOTE_CHANCE_PERCENT: u32 = 5;

/// Sparse random upvotes on recent posts from pool identities.
pub struct UpvoteRun {
    api: Arc<dyn PublishingApi>,
    identities: Arc<IdentityPool>,
    rounds: usize,
    window: usize,
    chance_percent: u32,
}

impl UpvoteRun {
    pub fn new(api: Arc<dyn PublishingApi>, identities: Arc<IdentityPool>, rounds: usize) -> Self {
        Self {
            api,
            identities,
            rounds,
            window: UPVOTE_WINDOW,
            chance_percent: UPVOTE_CHANCE_PERCENT,
        }
    }

    pub fn with_chance_percent(mut self, chance_percent: u32) -> Self {
        self.chance_percent = chance_percent.min(100);
        self
    }

    pub async fn run<R: Rng + Send>(&self, snapshot: &PublishedSnapshot, rng: &mut R) -> UpvoteSummary {
        let mut summary = UpvoteSummary::default();

        for round in 0..self.rounds {
            let identity = match self.identities.random_credential(rng).await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("Round {}: no identity available: {}", round + 1, e);
                    summary.identities_failed += 1;
                    continue;
                }
            };
            summary.identities_used += 1;

            for post in snapshot.newest_first().take(self.window) {
                if rng.gen_range(0..100) >= self.chance_percent {
                    continue;
                }

                match self.api.upvote(post.id, &identity.credential).await {
                    Ok(()) => {
                        debug!("{} upvoted post {}", identity.username, post.id);
                        summary.upvoted += 1;
                    }
                    Err(e) => {
                        warn!("{} could not upvote post {}: {}", identity.username, post.id, e);
                        summary.upvote_failed += 1;
                    }
                }
            }
        }

        info!(
            "Upvote finished: {} identities, {} upvotes, {} failures",
            summary.identities_used, summary.upvoted, summary.upvote_failed
        );
        summary
    }
}
