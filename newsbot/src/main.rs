use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use newsbot::pipeline::FeedJob;
use newsbot::sitemap::{write_sitemap, Publication};
use newsbot::sources::build_source;
use newsbot::upvote::DEFAULT_ROUNDS;
use newsbot::{
    BotConfig, Fetcher, IdentityPool, Ledger, LemmyClient, ModerationSweep, PageFetcher, PasswordPolicy,
    PromptBetterAdapter, PublishedSnapshot, PublishingApi, RssRun, UpvoteRun,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Syndicates feed items to a Lemmy instance", long_about = None)]
struct Cli {
    /// Directory holding the ledger and the JSON configuration files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Seed for identity draws, spread rolls and shuffling
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull the configured feeds and publish new items
    Rss,
    /// Retract published posts that break the moderation rules or repeat earlier ones
    Moderate,
    /// Cast sparse upvotes on recent posts from pool identities
    Upvote {
        #[arg(long, default_value_t = DEFAULT_ROUNDS)]
        rounds: usize,
    },
    /// Write a news sitemap of every published post
    Sitemap {
        #[arg(default_value = "sitemap.xml")]
        path: PathBuf,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Rss => "rss",
            Command::Moderate => "moderate",
            Command::Upvote { .. } => "upvote",
            Command::Sitemap { .. } => "sitemap",
        }
    }
}

struct Bot {
    config: BotConfig,
    ledger: Arc<Ledger>,
    fetcher: Fetcher,
    api: Arc<dyn PublishingApi>,
    identities: Arc<IdentityPool>,
    snapshot: PublishedSnapshot,
}

impl Bot {
    async fn start(config: BotConfig) -> Result<Self> {
        let ledger = Ledger::open(config.ledger_path())
            .await
            .with_context(|| format!("could not open ledger at {}", config.ledger_path().display()))?;
        let ledger = Arc::new(ledger);

        let fetcher = Fetcher::new(config.fetch.clone()).context("could not build HTTP client")?;
        let api: Arc<dyn PublishingApi> = Arc::new(LemmyClient::new(
            fetcher.clone(),
            config.api_url.clone(),
            config.reader_prefix.clone(),
        ));

        let catalog = config.load_catalog().context("could not load username catalog")?;
        let identities = Arc::new(IdentityPool::new(
            ledger.clone(),
            api.clone(),
            catalog,
            PasswordPolicy::new(config.password_suffix.clone()),
        ));

        let published = api
            .list_all_published()
            .await
            .context("could not load published posts")?;
        let snapshot = PublishedSnapshot::new(published);
        let recorded = ledger
            .record_published(&snapshot)
            .await
            .context("could not record published posts")?;
        info!("Snapshot holds {} posts, {} newly recorded", snapshot.len(), recorded);

        Ok(Self {
            config,
            ledger,
            fetcher,
            api,
            identities,
            snapshot,
        })
    }

    async fn rss(&self, rng: &mut StdRng) -> Result<()> {
        let feeds = self.config.load_feeds().context("could not load feed configuration")?;
        let token = self
            .config
            .promptbetter_token
            .clone()
            .context("PROMPTBETTER_TOKEN must be set for the rss command")?;

        let pages: Arc<dyn PageFetcher> = Arc::new(self.fetcher.clone());
        let llm = Arc::new(PromptBetterAdapter::new(&self.fetcher, self.config.promptbetter_url.clone(), token));

        let jobs: Vec<FeedJob> = feeds
            .into_iter()
            .map(|plan| {
                let source = build_source(&plan.config, pages.clone(), self.ledger.clone());
                FeedJob::new(plan, source)
            })
            .collect();

        let run = RssRun::new(self.ledger.clone(), self.identities.clone(), self.api.clone(), llm, pages)
            .with_communities(self.config.communities.clone())
            .with_reader_prefix(self.config.reader_prefix.clone())
            .with_max_per_host(self.config.max_per_host);

        let summary = run.run(jobs, &self.snapshot, Utc::now().date_naive(), rng).await;
        info!(?summary, "rss finished");
        Ok(())
    }

    async fn moderate(&self) -> Result<()> {
        let rules = self
            .config
            .load_moderation_rules()
            .context("could not load moderation rules")?;
        let sweep = ModerationSweep::new(self.api.clone(), self.identities.clone(), self.config.moderator.clone());
        let summary = sweep.run(&self.snapshot, &rules).await;
        info!(?summary, "moderation finished");
        Ok(())
    }

    async fn upvote(&self, rounds: usize, rng: &mut StdRng) -> Result<()> {
        let summary = UpvoteRun::new(self.api.clone(), self.identities.clone(), rounds)
            .run(&self.snapshot, rng)
            .await;
        info!(?summary, "upvote finished");
        Ok(())
    }

    fn sitemap(&self, path: &Path) -> Result<()> {
        write_sitemap(&self.snapshot, &Publication::default(), path)
            .with_context(|| format!("could not write sitemap to {}", path.display()))?;
        Ok(())
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = BotConfig::from_env(cli.data_dir).context("invalid configuration")?;
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let bot = Bot::start(config).await?;
    let outcome = match &cli.command {
        Command::Rss => bot.rss(&mut rng).await,
        Command::Moderate => bot.moderate().await,
        Command::Upvote { rounds } => bot.upvote(*rounds, &mut rng).await,
        Command::Sitemap { path } => bot.sitemap(path),
    };

    bot.ledger.close().await;
    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let span = info_span!("newsbot", run_id = %Uuid::new_v4(), command = cli.command.name());

    execute(cli).instrument(span).await
}
