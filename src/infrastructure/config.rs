//! Settings loading and validation.
//!
//! Settings are plain `serde` types, loadable from YAML or JSON:
//!
//! ```yaml
//! provider:
//!   access_key_id: LTAI...
//!   access_key_secret: ...
//!   endpoint: dysmsapi.aliyuncs.com
//! guard:
//!   utc_offset_seconds: 28800
//! scenes:
//!   login-otp:
//!     sign_name: Acme
//!     template_code: SMS_100
//!     type: VERIFY_CODE
//!     expire_seconds: 300
//!     code_param_key: code
//!     param_whitelist: [code]
//!     rate_limit:
//!       per_mobile_interval_seconds: 60
//!     idempotency_window_seconds: 120
//! ```
//!
//! Parsing never validates; call [`SmsSettings::validate`] or build a registry
//! with [`SmsSettings::scene_registry`], which both reject invalid scenes with
//! `InvalidConfig`.

use crate::application::registry::SceneRegistry;
use crate::domain::error::SmsError;
use crate::domain::scene::ScenePolicy;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Provider account settings.
///
/// `Debug` shows the endpoint and timeout only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub access_key_secret: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms", alias = "timeout")]
    pub timeout_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            access_key_id: None,
            access_key_secret: None,
            endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ProviderSettings {
    /// Whether credentials and endpoint are all present and non-blank.
    pub fn is_complete(&self) -> bool {
        [&self.access_key_id, &self.access_key_secret, &self.endpoint]
            .iter()
            .all(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("endpoint", &self.endpoint)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

/// Settings of the guard itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    /// Offset from UTC of the calendar day used by daily limits
    pub utc_offset_seconds: i32,
    /// Hard cap on entries in the in-process store
    pub max_store_entries: Option<usize>,
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsSettings {
    #[serde(default, alias = "aliyun")]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub guard: GuardSettings,
    #[serde(default)]
    pub scenes: BTreeMap<String, ScenePolicy>,
}

impl SmsSettings {
    /// Parse settings from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SmsError> {
        serde_yaml::from_str(yaml)
            .map_err(|err| SmsError::invalid_config("malformed YAML settings").with_source(err))
    }

    /// Parse settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SmsError> {
        serde_json::from_str(json)
            .map_err(|err| SmsError::invalid_config("malformed JSON settings").with_source(err))
    }

    /// Load settings from a `.yaml`, `.yml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SmsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            SmsError::invalid_config(format!("cannot read settings file {}", path.display()))
                .with_source(err)
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(SmsError::invalid_config(format!(
                "unsupported settings file extension: {}",
                path.display()
            ))),
        }
    }

    /// Check every scene and the guard settings.
    ///
    /// # Errors
    /// `InvalidConfig` naming the first violation.
    pub fn validate(&self) -> Result<(), SmsError> {
        if self.scenes.is_empty() {
            return Err(SmsError::invalid_config("at least one scene must be configured"));
        }
        for (scene, policy) in &self.scenes {
            policy.validate(scene)?;
        }
        self.utc_offset()?;
        if self.guard.max_store_entries == Some(0) {
            return Err(SmsError::invalid_config("max_store_entries must be positive"));
        }
        Ok(())
    }

    /// Validate and return the scene table.
    pub fn into_scene_table(self) -> Result<BTreeMap<String, ScenePolicy>, SmsError> {
        self.validate()?;
        Ok(self.scenes)
    }

    /// Build a registry over the configured scenes.
    pub fn scene_registry(&self) -> Result<SceneRegistry, SmsError> {
        self.validate()?;
        SceneRegistry::new(self.scenes.clone())
    }

    /// Calendar-day offset for daily limits.
    pub fn utc_offset(&self) -> Result<FixedOffset, SmsError> {
        FixedOffset::east_opt(self.guard.utc_offset_seconds).ok_or_else(|| {
            SmsError::invalid_config("utc_offset_seconds must be within one day")
        })
    }
}
