use serde::{Deserialize, Serialize};

/// HTTP front door settings, read from `modules.api_ingress` in the app config.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ApiIngressConfig {
    /// `host:port`; empty means "use server.host/server.port".
    pub bind_addr: String,
    pub enable_docs: bool,
    pub cors_enabled: bool,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::new(),
            enable_docs: true,
            cors_enabled: true,
            request_timeout_secs: 30,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}
