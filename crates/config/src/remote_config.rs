//! Remote store configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Default name of the environment variable holding the write token
pub const DEFAULT_TOKEN_ENV: &str = "TIMERSHARE_WRITE_TOKEN";

/// Where the shared document lives and how to reach it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// URL of the shared document
    pub endpoint: String,

    pub connect_timeout_secs: u64,

    pub request_timeout_secs: u64,

    /// Overrides the default `TimerShare/<version>` user agent
    pub user_agent: Option<String>,

    /// Name of the environment variable holding the write token
    ///
    /// The token itself never lives in the config file.
    pub write_token_env: String,
}

impl RemoteConfig {
    /// Reads the write token from the configured environment variable
    ///
    /// Blank values count as absent.
    pub fn write_token(&self) -> Option<String> {
        std::env::var(&self.write_token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787/timer_sync.json".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            user_agent: None,
            write_token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

impl ConfigSection for RemoteConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::http_url(&self.endpoint, "remote.endpoint"),
            Validator::in_range(self.connect_timeout_secs, 1, 60, "remote.connect_timeout_secs"),
            Validator::in_range(self.request_timeout_secs, 1, 120, "remote.request_timeout_secs"),
            Validator::env_var_name(&self.write_token_env, "remote.write_token_env"),
        ];
        if let Some(agent) = &self.user_agent {
            results.push(Validator::not_empty(agent, "remote.user_agent"));
        }
        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.endpoint = other.endpoint;
        self.connect_timeout_secs = other.connect_timeout_secs;
        self.request_timeout_secs = other.request_timeout_secs;
        self.user_agent = other.user_agent;
        self.write_token_env = other.write_token_env;
    }

    fn section_name(&self) -> &'static str {
        "remote"
    }
}
