use crate::config::{ConfigStore, TRUNK_KEY};
use crate::errors::{AtError, Result};
use serde::{Deserialize, Serialize};

pub const FALLBACK_BRANCHES_KEY: &str = "at.squash.fallbackBranches";
pub const AUTOSTASH_KEY: &str = "at.squash.autostash";
pub const BRANCH_PREFIX_KEY: &str = "at.squash.branchPrefix";
pub const PR_SQUASH_KEY: &str = "at.pr.squash";

/// Trunk assumed by pull-request squashes when `at.trunk` is unset
pub const DEFAULT_TRUNK: &str = "main";

/// Effective settings for a squash run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquashSettings {
    /// Configured trunk branch, if any
    pub trunk: Option<String>,
    /// Conventional branch names tried last, in order
    pub fallback_branches: Vec<String>,
    /// Stash a dirty working tree instead of refusing to run
    pub autostash: bool,
    /// Optional namespace for temporary branch names
    pub branch_prefix: Option<String>,
    /// Squash automatically before a pull request is opened
    pub pr_squash: bool,
}

impl Default for SquashSettings {
    fn default() -> Self {
        Self {
            trunk: None,
            fallback_branches: vec![
                "main".to_string(),
                "master".to_string(),
                "develop".to_string(),
                "development".to_string(),
            ],
            autostash: true,
            branch_prefix: None,
            pr_squash: false,
        }
    }
}

impl SquashSettings {
    /// Load settings from a config store, keeping defaults for unset keys
    pub fn load(store: &dyn ConfigStore) -> Result<Self> {
        let mut settings = Self::default();

        settings.trunk = store.get(TRUNK_KEY).map(|v| v.trim().to_string());

        if let Some(list) = store.get(FALLBACK_BRANCHES_KEY) {
            let branches: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string)
                .collect();
            if branches.is_empty() {
                return Err(AtError::config(format!(
                    "{FALLBACK_BRANCHES_KEY} must list at least one branch"
                )));
            }
            settings.fallback_branches = branches;
        }

        if let Some(value) = store.get(AUTOSTASH_KEY) {
            settings.autostash = bool_setting(AUTOSTASH_KEY, &value)?;
        }
        if let Some(value) = store.get(PR_SQUASH_KEY) {
            settings.pr_squash = bool_setting(PR_SQUASH_KEY, &value)?;
        }

        settings.branch_prefix = store
            .get(BRANCH_PREFIX_KEY)
            .map(|p| p.trim().trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty());

        Ok(settings)
    }

    /// Branch a pull-request squash is measured against
    pub fn pr_trunk(&self) -> &str {
        self.trunk.as_deref().unwrap_or(DEFAULT_TRUNK)
    }
}

fn bool_setting(key: &str, value: &str) -> Result<bool> {
    parse_bool(value)
        .ok_or_else(|| AtError::config(format!("Invalid boolean value for {key}: {value}")))
}

/// Git-style boolean parsing
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
