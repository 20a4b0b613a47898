//! Course identity across the local store and the remote course API.
//!
//! A course is born locally with a client id and may later be given a
//! backend id when the remote system persists it. Every lookup that has to
//! accept either id goes through [`ExternalRef::matches_key`].

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub local_id: String,
    pub remote_id: Option<String>,
}

impl ExternalRef {
    pub fn new(local_id: impl Into<String>, remote_id: Option<String>) -> Self {
        ExternalRef {
            local_id: local_id.into(),
            remote_id,
        }
    }

    /// True when `key` is this course's local id or its backend id.
    pub fn matches_key(&self, key: &str) -> bool {
        let key = normalize(key);
        if key.is_empty() {
            return false;
        }
        normalize(&self.local_id) == key
            || self
                .remote_id
                .as_deref()
                .is_some_and(|remote| normalize(remote) == key)
    }
}

// Remote ids arrive as numbers or strings; both end up as trimmed text.
fn normalize(id: &str) -> &str {
    id.trim()
}
