use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{CustomTool, McpServer};

pub const DEFAULT_AUDIT_MODE: &str = "standard";

/// User preferences that shape each completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub audit_mode: String,
    /// Show thought text as it streams instead of only the status caption.
    pub auto_expand_thoughts: bool,
    pub custom_tools: Vec<CustomTool>,
    pub mcp_servers: Vec<McpServer>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            audit_mode: DEFAULT_AUDIT_MODE.to_string(),
            auto_expand_thoughts: true,
            custom_tools: Vec::new(),
            mcp_servers: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Reads settings from a JSON file. A missing path or file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn active_custom_tools(&self) -> Vec<CustomTool> {
        self.custom_tools
            .iter()
            .filter(|tool| tool.enabled)
            .cloned()
            .collect()
    }

    pub fn active_mcp_servers(&self) -> Vec<McpServer> {
        self.mcp_servers
            .iter()
            .filter(|server| server.enabled)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(AppSettings::load(None).unwrap().audit_mode, DEFAULT_AUDIT_MODE);
    }

    #[test]
    fn test_disabled_entries_are_not_active() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "audit_mode": "strict",
                "custom_tools": [
                    {{"name": "weather", "desc": "w", "method": "GET", "url": "http://w"}},
                    {{"name": "stock", "desc": "s", "method": "GET", "url": "http://s", "enabled": false}}
                ],
                "mcp_servers": [
                    {{"name": "fs", "type": "stdio", "command": "mcp-fs", "enabled": false}}
                ]
            }}"#
        )
        .unwrap();

        let settings = AppSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.audit_mode, "strict");
        assert!(settings.auto_expand_thoughts);
        let names: Vec<_> = settings
            .active_custom_tools()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, vec!["weather".to_string()]);
        assert!(settings.active_mcp_servers().is_empty());
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(AppSettings::load(Some(file.path())).is_err());
    }
}
