use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::store::DEFAULT_SYNC_PAGE_LIMIT;

pub const DEFAULT_STORAGE_KEY: &str = "lms_canonical_store_v1";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub storage_disabled: bool,
    /// Unset means no remote course API: reconciliation is a no-op.
    pub api_base_url: Option<String>,
    pub api_timeout: Duration,
    pub sync_page_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let nonempty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        AppConfig {
            port: nonempty("PORT").and_then(|s| s.parse().ok()).unwrap_or(8081),
            data_dir: PathBuf::from(nonempty("DATA_DIR").unwrap_or_else(|| "./data".into())),
            storage_key: nonempty("LMS_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.into()),
            storage_disabled: nonempty("LMS_STORAGE_DISABLED")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            api_base_url: nonempty("LMS_API_BASE_URL"),
            api_timeout: Duration::from_secs(
                nonempty("LMS_API_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
            sync_page_limit: nonempty("LMS_SYNC_PAGE_LIMIT")
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_SYNC_PAGE_LIMIT),
        }
    }
}
