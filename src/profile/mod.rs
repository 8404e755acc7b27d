//! Sender profiles: who the email is from and how they write.
//!
//! A profile carries identity (name, company, signature), a preferred tone,
//! and a history of sent emails used as style references by the writer.

mod github;
pub mod model;
pub mod store;

pub use github::GithubMirror;
pub use model::{SenderProfile, SentExample};
pub use store::{
    DEFAULT_USER, JsonProfileStore, MemoryProfileStore, ProfileConfig, ProfileEdit, ProfileStore,
    record_sent,
};
