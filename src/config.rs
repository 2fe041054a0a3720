use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::stream::DEFAULT_MAX_LINE_BYTES;
use crate::util::is_local_endpoint_url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub api_token: Option<String>,
    pub settings_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub max_line_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            settings_path: None,
            log_path: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = non_empty_env("CHATDESK_API_URL")
            .map(|url| url.trim().to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_token = non_empty_env("CHATDESK_API_TOKEN");
        let settings_path = non_empty_env("CHATDESK_SETTINGS").map(PathBuf::from);
        let log_path = non_empty_env("CHATDESK_LOG_PATH").map(PathBuf::from);
        let max_line_bytes = match non_empty_env("CHATDESK_MAX_LINE_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid CHATDESK_MAX_LINE_BYTES '{raw}'"))?,
            None => DEFAULT_MAX_LINE_BYTES,
        };

        Ok(Self {
            api_url,
            api_token,
            settings_path,
            log_path,
            max_line_bytes,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid CHATDESK_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if self.max_line_bytes == 0 {
            bail!("CHATDESK_MAX_LINE_BYTES must be greater than zero");
        }

        if !self.is_local_endpoint() && self.api_token.is_none() {
            bail!(
                "CHATDESK_API_TOKEN must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScopedEnv;

    const KEYS: [&str; 5] = [
        "CHATDESK_API_URL",
        "CHATDESK_API_TOKEN",
        "CHATDESK_SETTINGS",
        "CHATDESK_LOG_PATH",
        "CHATDESK_MAX_LINE_BYTES",
    ];

    fn clean_env() -> ScopedEnv {
        let mut env = ScopedEnv::new();
        for key in KEYS {
            env.remove(key);
        }
        env
    }

    #[test]
    fn test_load_defaults_to_local_backend() {
        let _env = clean_env();
        let config = Config::load().expect("defaults should load");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
        assert!(config.api_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_treats_blank_token_as_missing() {
        let mut env = clean_env();
        env.set("CHATDESK_API_URL", "https://desk.example.com");
        env.set("CHATDESK_API_TOKEN", "   ");
        let config = Config::load().expect("config should load");
        assert!(config.api_token.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reads_paths_and_line_bound() {
        let mut env = clean_env();
        env.set("CHATDESK_SETTINGS", "/etc/chatdesk/settings.json");
        env.set("CHATDESK_MAX_LINE_BYTES", "4096");
        let config = Config::load().expect("config should load");
        assert_eq!(
            config.settings_path,
            Some(PathBuf::from("/etc/chatdesk/settings.json"))
        );
        assert_eq!(config.max_line_bytes, 4096);
    }

    #[test]
    fn test_load_rejects_unparseable_line_bound() {
        let mut env = clean_env();
        env.set("CHATDESK_MAX_LINE_BYTES", "lots");
        assert!(Config::load().is_err());
    }
}
