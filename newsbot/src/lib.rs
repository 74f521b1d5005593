pub mod config;
pub mod dedupe;
pub mod excerpt;
pub mod fetcher;
pub mod identity;
pub mod ledger;
pub mod lemmy;
pub mod llm_adapter;
pub mod moderation;
pub mod parser;
pub mod pipeline;
pub mod sitemap;
pub mod sources;
pub mod topic_filter;
pub mod traits;
pub mod types;
pub mod upvote;

pub use config::{BotConfig, CommunityRouting, FeedConfig, FeedPlan, SourceKind};
pub use fetcher::Fetcher;
pub use identity::{IdentityCatalog, IdentityPool, PasswordPolicy};
pub use ledger::Ledger;
pub use lemmy::LemmyClient;
pub use llm_adapter::{LlmAdapter, PromptBetterAdapter};
pub use moderation::{ModerationRules, ModerationSweep};
pub use parser::FeedParser;
pub use pipeline::{FeedJob, RssRun};
pub use traits::{PageFetcher, PublishingApi, PullFeed};
pub use types::*;
pub use upvote::UpvoteRun;
