//! Backend API configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Candidate-facing backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    /// Value of the `Cookie` header carrying the candidate's login session
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// Candidate id used for the assessment listing and attempt start
    #[serde(default)]
    pub user_id: String,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_sec() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_sec: default_timeout_sec(),
            session_cookie: None,
            user_id: String::new(),
        }
    }
}

impl ApiConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    /// Join a path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ApiConfig {
            base_url: "https://api.example.com/".into(),
            ..ApiConfig::default()
        };
        assert_eq!(
            config.url("/candidate/verify-face"),
            "https://api.example.com/candidate/verify-face"
        );
    }
}
