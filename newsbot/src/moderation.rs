use crate::identity::IdentityPool;
use crate::traits::PublishingApi;
use crate::types::{Credential, PublishedSnapshot, SweepSummary};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Patterns shorter than this would match nearly every post.
pub const MIN_PATTERN_LEN: usize = 4;

/// Contents of `moderate_rules.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationRules {
    #[serde(default)]
    pub forbidden_title_regex: Vec<String>,
    #[serde(default)]
    pub forbidden_url_regex: Vec<String>,
}

impl ModerationRules {
    pub fn compile(&self) -> CompiledRules {
        CompiledRules {
            url_patterns: compile_patterns("url", &self.forbidden_url_regex),
            title_patterns: compile_patterns("title", &self.forbidden_title_regex),
        }
    }
}

fn compile_patterns(kind: &str, raw_patterns: &[String]) -> Vec<ForbiddenPattern> {
    raw_patterns
        .iter()
        .filter_map(|raw| {
            let pattern = ForbiddenPattern::parse(raw);
            if pattern.is_none() {
                warn!("Skip too short {} pattern {:?}", kind, raw);
            }
            pattern
        })
        .collect()
}

/// Case-insensitive substring rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbiddenPattern {
    needle: String,
}

impl ForbiddenPattern {
    /// `None` when the pattern is shorter than [`MIN_PATTERN_LEN`] once runs
    /// of whitespace are collapsed. The needle itself keeps its spaces.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.chars().count() < MIN_PATTERN_LEN {
            return None;
        }
        Some(Self {
            needle: raw.to_lowercase(),
        })
    }

    pub fn matches(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.needle)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    pub url_patterns: Vec<ForbiddenPattern>,
    pub title_patterns: Vec<ForbiddenPattern>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    SkipBlank,
    ForbiddenUrl,
    ForbiddenTitle,
    DuplicateUrl,
    DuplicateTitle,
}

impl Verdict {
    pub fn is_retraction(self) -> bool {
        matches!(
            self,
            Verdict::ForbiddenUrl | Verdict::ForbiddenTitle | Verdict::DuplicateUrl | Verdict::DuplicateTitle
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationDecision {
    pub post_id: i64,
    pub title: String,
    pub url: String,
    pub verdict: Verdict,
}

/// Decide, newest first, which published items to retract.
///
/// The newest instance of a title or URL survives; every older instance is a
/// duplicate. An item is recorded as seen whatever its verdict.
pub fn plan_sweep(snapshot: &PublishedSnapshot, rules: &CompiledRules) -> Vec<ModerationDecision> {
    let mut seen_titles: HashSet<&str> = HashSet::new();
    let mut seen_urls: HashSet<&str> = HashSet::new();
    let mut decisions = Vec::with_capacity(snapshot.len());

    for item in snapshot.newest_first() {
        let verdict = if item.url.trim().is_empty() {
            Verdict::SkipBlank
        } else if rules.url_patterns.iter().any(|p| p.matches(&item.url)) {
            Verdict::ForbiddenUrl
        } else if rules.title_patterns.iter().any(|p| p.matches(&item.title)) {
            Verdict::ForbiddenTitle
        } else if seen_urls.contains(item.url.as_str()) {
            Verdict::DuplicateUrl
        } else if seen_titles.contains(item.title.as_str()) {
            Verdict::DuplicateTitle
        } else {
            Verdict::Keep
        };

        if verdict != Verdict::SkipBlank {
            seen_titles.insert(&item.title);
            seen_urls.insert(&item.url);
        }

        decisions.push(ModerationDecision {
            post_id: item.id,
            title: item.title.clone(),
            url: item.url.clone(),
            verdict,
        });
    }

    decisions
}

/// Retracts the items [`plan_sweep`] flags, acting as the moderator account.
pub struct ModerationSweep {
    api: Arc<dyn PublishingApi>,
    identities: Arc<IdentityPool>,
    moderator: String,
}

impl ModerationSweep {
    pub fn new(api: Arc<dyn PublishingApi>, identities: Arc<IdentityPool>, moderator: impl Into<String>) -> Self {
        Self {
            api,
            identities,
            moderator: moderator.into(),
        }
    }

    pub async fn run(&self, snapshot: &PublishedSnapshot, rules: &ModerationRules) -> SweepSummary {
        let compiled = rules.compile();
        let mut summary = SweepSummary::default();
        let mut moderator: Option<Credential> = None;

        for decision in plan_sweep(snapshot, &compiled) {
            summary.examined += 1;
            match decision.verdict {
                Verdict::Keep => continue,
                Verdict::SkipBlank => {
                    summary.skipped_blank += 1;
                    continue;
                }
                Verdict::ForbiddenUrl => {
                    info!("Delete because of url pattern: {} ({})", decision.url, decision.post_id);
                    summary.flagged_url += 1;
                }
                Verdict::ForbiddenTitle => {
                    info!("Delete because of title pattern: {} ({})", decision.title, decision.post_id);
                    summary.flagged_title += 1;
                }
                Verdict::DuplicateUrl | Verdict::DuplicateTitle => {
                    info!("Delete because of newer duplicate: {} ({})", decision.title, decision.post_id);
                    summary.flagged_duplicate += 1;
                }
            }

            if moderator.is_none() {
                match self.identities.credential_for(&self.moderator).await {
                    Ok(identity) => moderator = Some(identity.credential),
                    Err(e) => {
                        error!("Could not log in as {}: {}", self.moderator, e);
                        summary.retraction_failed += 1;
                        continue;
                    }
                }
            }
            let Some(credential) = moderator.as_ref() else {
                continue;
            };

            match self.api.retract(decision.post_id, credential).await {
                Ok(()) => {
                    debug!("Retracted post {}", decision.post_id);
                    summary.retracted += 1;
                }
                Err(e) => {
                    error!("Could not retract post {} {:?}: {}", decision.post_id, decision.title, e);
                    summary.retraction_failed += 1;
                }
            }
        }

        info!(
            "Moderation sweep examined {} posts, retracted {}, failed {}",
            summary.examined, summary.retracted, summary.retraction_failed
        );
        summary
    }
}
