pub mod defs;

pub use defs::{CandidateItem, Credential, Identity, NewPost, PublishedItem};
