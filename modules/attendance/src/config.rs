use serde::{Deserialize, Serialize};

/// Configuration for the attendance module, read from `modules.attendance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AttendanceConfig {
    /// HS256 signing secret. Empty means a random per-process secret.
    pub jwt_secret: String,
    /// Token lifetime in seconds; absent means tokens never expire.
    pub token_ttl_secs: Option<u64>,
    /// Upper bound on documents returned by any list query.
    pub list_limit: usize,
    /// Widest date range, in days, a CSV report may span.
    pub report_max_days: u32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: None,
            list_limit: 1000,
            report_max_days: 366,
        }
    }
}
