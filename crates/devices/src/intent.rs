//! Boundary to the NLP intent classifier. Explicitly out of scope (spec
//! Non-goals): a black box `classify(text) -> intent` this crate never
//! implements. The fast-path dispatcher falls back to this seam only when
//! its own regex table finds no match — no concrete `IntentClassifier` is
//! constructed anywhere in this workspace.

use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    AuthorizeVisitor,
    OpenDoor,
    FileIncident,
    QueryLog,
    Unknown,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Intent;
}
