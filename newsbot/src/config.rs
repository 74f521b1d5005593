use crate::identity::IdentityCatalog;
use crate::moderation::ModerationRules;
use crate::types::{BotError, FetchConfig, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

pub const FEEDS_FILE: &str = "rss_feeds.json";
pub const MODERATION_RULES_FILE: &str = "moderate_rules.json";
pub const USERNAMES_FILE: &str = "usernames.json";
pub const LEDGER_FILE: &str = "newsbot.db";

pub const DEFAULT_API_URL: &str = "https://news.aiapipro.com";
pub const DEFAULT_READER_PREFIX: &str = "https://reader.aiapipro.com/?url=";
pub const DEFAULT_PROMPTBETTER_URL: &str = "https://api.promptbetter.ai/v1/2qcutndk/run";
pub const DEFAULT_MODERATOR: &str = "moderator_bot";
pub const DEFAULT_MAX_PER_HOST: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Rss,
    HackerNews,
    ResourceLinks,
}

/// One entry of `rss_feeds.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub title_regex: Option<String>,
    #[serde(default)]
    pub title_not_regex: Option<String>,
    #[serde(default)]
    pub title_regex_remove: Option<String>,
    #[serde(default)]
    pub check_title: bool,
    #[serde(default)]
    pub check_link_content: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Percent chance (0..=100) that the feed is processed in a run.
    #[serde(default)]
    pub spread: Option<u32>,
    #[serde(default)]
    pub use_reader: bool,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

/// A feed configuration with its title patterns compiled.
#[derive(Debug, Clone)]
pub struct FeedPlan {
    pub config: FeedConfig,
    pub title_regex: Option<Regex>,
    pub title_not_regex: Option<Regex>,
    pub title_strip: Option<Regex>,
}

impl FeedPlan {
    pub fn compile(config: FeedConfig) -> Result<Self> {
        let compile = |pattern: &Option<String>| -> Result<Option<Regex>> {
            pattern
                .as_deref()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        BotError::Config(format!("feed {}: invalid pattern {:?}: {}", config.url, p, e))
                    })
                })
                .transpose()
        };

        let title_regex = compile(&config.title_regex)?;
        let title_not_regex = compile(&config.title_not_regex)?;
        let title_strip = compile(&config.title_regex_remove)?;

        Ok(Self {
            config,
            title_regex,
            title_not_regex,
            title_strip,
        })
    }
}

/// Parse the contents of `rss_feeds.json`.
pub fn parse_feed_configs(json: &str) -> Result<Vec<FeedPlan>> {
    let configs: Vec<FeedConfig> = serde_json::from_str(json)?;
    configs.into_iter().map(FeedPlan::compile).collect()
}

/// Which community a link is published into.
#[derive(Debug, Clone)]
pub struct CommunityRouting {
    pub default_community: i64,
    pub papers_community: i64,
    pub papers_hosts: Vec<String>,
}

impl Default for CommunityRouting {
    fn default() -> Self {
        Self {
            default_community: 4,
            papers_community: 7,
            papers_hosts: vec!["arxiv.org".to_string(), "paperswithcode.com".to_string()],
        }
    }
}

impl CommunityRouting {
    /// Paper hosts are matched as substrings of the whole link, so a
    /// reader-wrapped link routes the same as the bare one.
    pub fn community_for(&self, url: &str) -> i64 {
        if self.papers_hosts.iter().any(|host| url.contains(host.as_str())) {
            self.papers_community
        } else {
            self.default_community
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub data_dir: PathBuf,
    pub api_url: String,
    pub reader_prefix: String,
    pub password_suffix: String,
    pub promptbetter_url: String,
    pub promptbetter_token: Option<String>,
    pub moderator: String,
    pub max_per_host: usize,
    pub fetch: FetchConfig,
    pub communities: CommunityRouting,
}

impl BotConfig {
    /// Read settings from the environment. `data_dir` overrides
    /// `NEWSBOT_DATA_DIR`; without either the executable's directory is used.
    pub fn from_env(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir.or_else(|| env::var("NEWSBOT_DATA_DIR").ok().map(PathBuf::from)) {
            Some(dir) => dir,
            None => executable_dir()?,
        };

        let password_suffix = env::var("PASSWORD_SUFFIX").unwrap_or_default();
        if password_suffix.is_empty() {
            debug!("PASSWORD_SUFFIX is not set, passwords equal usernames");
        }

        let config = Self {
            data_dir,
            api_url: env_or("NEWSBOT_API_URL", DEFAULT_API_URL),
            reader_prefix: env_or("NEWSBOT_READER_PREFIX", DEFAULT_READER_PREFIX),
            password_suffix,
            promptbetter_url: env_or("PROMPTBETTER_URL", DEFAULT_PROMPTBETTER_URL),
            promptbetter_token: env::var("PROMPTBETTER_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            moderator: env_or("NEWSBOT_MODERATOR", DEFAULT_MODERATOR),
            max_per_host: env_parse("NEWSBOT_MAX_PER_HOST", DEFAULT_MAX_PER_HOST)?,
            fetch: FetchConfig::default(),
            communities: CommunityRouting::default(),
        };

        info!("Using data directory {}", config.data_dir.display());
        Ok(config)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    pub fn load_feeds(&self) -> Result<Vec<FeedPlan>> {
        let json = read_config_file(&self.data_dir.join(FEEDS_FILE))?;
        let feeds = parse_feed_configs(&json)?;
        info!("Loaded {} feed configurations", feeds.len());
        Ok(feeds)
    }

    pub fn load_moderation_rules(&self) -> Result<ModerationRules> {
        let json = read_config_file(&self.data_dir.join(MODERATION_RULES_FILE))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// The username catalog from `usernames.json`, or the builtin one.
    pub fn load_catalog(&self) -> Result<IdentityCatalog> {
        let path = self.data_dir.join(USERNAMES_FILE);
        if !path.exists() {
            return Ok(IdentityCatalog::builtin());
        }

        let usernames: Vec<String> = serde_json::from_str(&read_config_file(&path)?)?;
        let catalog = IdentityCatalog::new(usernames)?;
        info!("Loaded {} usernames from {}", catalog.len(), path.display());
        Ok(catalog)
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| BotError::Config(format!("could not read {}: {}", path.display(), e)))
}

fn executable_dir() -> Result<PathBuf> {
    let exe = env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| BotError::Config("executable has no parent directory".to_string()))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| BotError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        _ => Ok(default),
    }
}
