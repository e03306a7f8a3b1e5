/// Sidebar configuration, stored under `sidebar_config`
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONFIG_KEY: &str = "sidebar_config";

/// Optional features of the sidebar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Features {
    /// Checklist notes on bookmarked tasks
    pub notes: bool,
    /// Keep showing tasks whose tab was closed (bookmark mode); off gives plain add/remove
    pub closed_tasks: bool,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            notes: true,
            closed_tasks: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SidebarConfig {
    pub storage_key: String,
    pub extraction_timeout_ms: u32,
    pub features: Features,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        SidebarConfig {
            storage_key: "tasks".to_string(),
            extraction_timeout_ms: 1500,
            features: Features::default(),
        }
    }
}

impl SidebarConfig {
    /// Parse a stored config; anything unusable falls back to defaults
    pub fn from_value(value: Option<Value>) -> SidebarConfig {
        let Some(value) = value else {
            return SidebarConfig::default();
        };

        match serde_json::from_value::<SidebarConfig>(value) {
            Ok(config) if config.storage_key.trim().is_empty() => {
                log::warn!("Empty storage key in config, using defaults");
                SidebarConfig::default()
            }
            Ok(config) => config,
            Err(e) => {
                log::warn!("Invalid sidebar config ({}), using defaults", e);
                SidebarConfig::default()
            }
        }
    }
}
