//! Fail-closed permission policy over high-level capability names.
//!
//! Read-only capabilities are always available. Mutating capabilities must be
//! listed in the permission file's `allow` array (wildcard `"*"` accepted);
//! `deny` overrides `allow`; `blocked_apps` additionally gates `launch_app`
//! targets. With no permission file at all, only the read-only set is
//! exposed. Denied capabilities are hidden from tool discovery, not merely
//! rejected at call time.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::paths::config_dirs;

const PERMISSIONS_FILE_NAME: &str = "permissions.json";

/// Capabilities that observe without injecting input.
pub const READ_ONLY_CAPABILITIES: &[&str] =
    &["status", "screenshot", "describe_screen", "window_state"];

/// Capabilities that inject input or otherwise change device state.
pub const MUTATING_CAPABILITIES: &[&str] = &[
    "tap",
    "long_press",
    "double_tap",
    "drag",
    "swipe",
    "type_text",
    "press_key",
    "move",
    "shake",
    "launch_app",
    "home",
    "app_switcher",
    "spotlight",
];

/// Parsed `permissions.json`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PermissionFile {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub blocked_apps: Vec<String>,
}

/// The effective policy: permission file (when present) plus the development
/// bypass flag.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    file: Option<PermissionFile>,
    skip_permissions: bool,
}

impl PermissionPolicy {
    /// Discover the permission file in the standard directories.
    pub fn load(skip_permissions: bool) -> Self {
        for dir in config_dirs() {
            let path = dir.join(PERMISSIONS_FILE_NAME);
            if path.is_file() {
                return Self::from_path(&path, skip_permissions);
            }
        }
        Self::from_file(None, skip_permissions)
    }

    pub fn from_path(path: &Path, skip_permissions: bool) -> Self {
        let file = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(target: "permissions", file = %path.display(), error = %e, "permissions_parse_error");
                    None
                }
            });
        Self::from_file(file, skip_permissions)
    }

    pub fn from_file(file: Option<PermissionFile>, skip_permissions: bool) -> Self {
        if skip_permissions {
            warn!(
                target: "permissions",
                "PERMISSION CHECKS DISABLED: every capability is exposed; do not run unattended"
            );
        } else if file.is_none() {
            info!(target: "permissions", "no permission file; exposing read-only capabilities only");
        }
        Self {
            file,
            skip_permissions,
        }
    }

    pub fn is_read_only(name: &str) -> bool {
        READ_ONLY_CAPABILITIES.contains(&name)
    }

    fn is_known(name: &str) -> bool {
        READ_ONLY_CAPABILITIES.contains(&name) || MUTATING_CAPABILITIES.contains(&name)
    }

    /// Whether the capability may be invoked.
    pub fn allows(&self, name: &str) -> bool {
        if !Self::is_known(name) {
            return false;
        }
        if Self::is_read_only(name) {
            return true;
        }
        if self.skip_permissions {
            return true;
        }
        let Some(file) = &self.file else {
            return false;
        };
        if file.deny.iter().any(|d| d == name) {
            return false;
        }
        file.allow.iter().any(|a| a == "*" || a == name)
    }

    /// Whether `launch_app` may target `app`.
    pub fn allows_app(&self, app: &str) -> bool {
        if self.skip_permissions {
            return true;
        }
        match &self.file {
            Some(file) => !file
                .blocked_apps
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(app)),
            None => true,
        }
    }

    /// The capability names to expose to tool discovery, in catalogue order.
    pub fn visible_capabilities(&self) -> Vec<&'static str> {
        READ_ONLY_CAPABILITIES
            .iter()
            .chain(MUTATING_CAPABILITIES.iter())
            .copied()
            .filter(|name| self.allows(name))
            .collect()
    }
}
