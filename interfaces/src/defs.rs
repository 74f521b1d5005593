use std::fmt;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;

/// Session token of one pseudonymous account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

// Tokens end up in logs via {:?} on containing structs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub credential: Credential,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateItem {
    pub title: String,
    pub url: String,
    pub excerpt: Option<String>,
    pub credential: Option<Credential>,
    pub via_reader: bool,
}

impl CandidateItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            excerpt: None,
            credential: None,
            via_reader: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedItem {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub ap_id: String,
    pub published: NaiveDateTime,
    pub newest_activity: Option<NaiveDateTime>,
    pub community_id: i64,
}

/// Body of a publish call, as sent upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub url: String,
    pub body: Option<String>,
    pub community_id: i64,
}

// Object style note:
// These are plain values crossing the boundary between the bot and its
// collaborators. Anything that needs I/O lives in the newsbot crate behind a
// trait, so these stay free of runtime dependencies.
