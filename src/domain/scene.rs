//! Scene policies.
//!
//! A scene is a named, pre-approved use case: it binds the provider-side sign
//! and template identities, the set of parameter keys that may be forwarded,
//! and the governance thresholds applied before every send.

use crate::domain::error::SmsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a scene sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneKind {
    /// One-time verification codes; requires a code parameter and expiry
    #[serde(alias = "VERIFY_CODE")]
    VerificationCode,
    /// Free-form notifications
    #[default]
    #[serde(alias = "NOTIFY")]
    Notification,
}

/// Messaging provider a scene is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    #[default]
    Aliyun,
}

/// Rate limit thresholds for one scene. Zero disables a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    /// Minimum seconds between two sends to the same address
    #[serde(alias = "per_mobile_interval_seconds")]
    pub per_address_interval_seconds: u64,
    /// Maximum send attempts per address per calendar day
    #[serde(alias = "per_mobile_day_limit")]
    pub per_address_daily_limit: u64,
    /// Maximum send attempts per source identifier per minute
    #[serde(alias = "per_ip_minute_limit")]
    pub per_source_minute_limit: u64,
}

impl RateLimitPolicy {
    /// A policy with every dimension disabled.
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.per_address_interval_seconds = seconds;
        self
    }

    pub fn with_daily_limit(mut self, limit: u64) -> Self {
        self.per_address_daily_limit = limit;
        self
    }

    pub fn with_source_minute_limit(mut self, limit: u64) -> Self {
        self.per_source_minute_limit = limit;
        self
    }

    /// Whether every dimension is disabled.
    pub fn is_unlimited(&self) -> bool {
        self.per_address_interval_seconds == 0
            && self.per_address_daily_limit == 0
            && self.per_source_minute_limit == 0
    }
}

/// Policy for one scene.
///
/// Policies are validated when a [`SceneRegistry`](crate::SceneRegistry) is
/// built; an invalid policy never reaches the send path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePolicy {
    /// Provider-side sign reference
    #[serde(alias = "sign_name")]
    pub sign_identity: String,
    /// Provider-side template reference
    #[serde(alias = "template_code")]
    pub template_identity: String,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: SceneKind,
    /// Validity of a verification code in seconds
    #[serde(default, alias = "expire_seconds")]
    pub expiry_seconds: u64,
    /// Parameter carrying the verification code
    #[serde(default)]
    pub code_param_key: Option<String>,
    /// Parameter keys forwarded to the provider
    pub param_whitelist: BTreeSet<String>,
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
    /// Duplicate suppression window; zero disables it
    #[serde(default)]
    pub idempotency_window_seconds: u64,
}

impl ScenePolicy {
    /// A notification scene forwarding the given parameter keys.
    pub fn notification<I, K>(sign_identity: &str, template_identity: &str, whitelist: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            sign_identity: sign_identity.to_owned(),
            template_identity: template_identity.to_owned(),
            provider: ProviderKind::default(),
            kind: SceneKind::Notification,
            expiry_seconds: 0,
            code_param_key: None,
            param_whitelist: whitelist.into_iter().map(Into::into).collect(),
            rate_limit: RateLimitPolicy::unlimited(),
            idempotency_window_seconds: 0,
        }
    }

    /// A verification-code scene. The code key is added to the whitelist.
    pub fn verification_code(
        sign_identity: &str,
        template_identity: &str,
        code_param_key: &str,
        expiry_seconds: u64,
    ) -> Self {
        Self {
            sign_identity: sign_identity.to_owned(),
            template_identity: template_identity.to_owned(),
            provider: ProviderKind::default(),
            kind: SceneKind::VerificationCode,
            expiry_seconds,
            code_param_key: Some(code_param_key.to_owned()),
            param_whitelist: BTreeSet::from([code_param_key.to_owned()]),
            rate_limit: RateLimitPolicy::unlimited(),
            idempotency_window_seconds: 0,
        }
    }

    /// Allow one more parameter key.
    pub fn with_param(mut self, key: impl Into<String>) -> Self {
        self.param_whitelist.insert(key.into());
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitPolicy) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_idempotency_window(mut self, seconds: u64) -> Self {
        self.idempotency_window_seconds = seconds;
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// The code parameter key, for verification-code scenes.
    pub fn code_param_key(&self) -> Option<&str> {
        self.code_param_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    pub fn is_verification_code(&self) -> bool {
        self.kind == SceneKind::VerificationCode
    }

    /// Check the policy invariants.
    ///
    /// # Errors
    /// Returns an `InvalidConfig` error naming the scene and the violated rule.
    pub fn validate(&self, scene: &str) -> Result<(), SmsError> {
        let invalid = |rule: &str| SmsError::invalid_config(rule.to_owned()).with_scene(scene);

        if scene.trim().is_empty() {
            return Err(SmsError::invalid_config("scene identifier must not be blank"));
        }
        if self.sign_identity.trim().is_empty() {
            return Err(invalid("sign identity must not be blank"));
        }
        if self.template_identity.trim().is_empty() {
            return Err(invalid("template identity must not be blank"));
        }
        if self.param_whitelist.is_empty() {
            return Err(invalid("parameter whitelist must not be empty"));
        }
        if self.param_whitelist.iter().any(|key| key.trim().is_empty()) {
            return Err(invalid("parameter whitelist must not contain blank keys"));
        }

        if self.kind == SceneKind::VerificationCode {
            if self.expiry_seconds == 0 {
                return Err(invalid("verification code scene requires expiry_seconds > 0"));
            }
            let Some(code_key) = self.code_param_key() else {
                return Err(invalid("verification code scene requires a code parameter key"));
            };
            if !self.param_whitelist.contains(code_key) {
                return Err(invalid("parameter whitelist must contain the code parameter key"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[test]
    fn test_verification_scene_is_valid() {
        let policy = ScenePolicy::verification_code("Acme", "SMS_1", "code", 300);
        assert!(policy.validate("login-otp").is_ok());
        assert!(policy.param_whitelist.contains("code"));
    }

    #[test]
    fn test_verification_scene_requires_expiry() {
        let policy = ScenePolicy::verification_code("Acme", "SMS_1", "code", 0);
        let err = policy.validate("login-otp").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert_eq!(err.scene(), Some("login-otp"));
    }

    #[test]
    fn test_verification_scene_requires_code_key() {
        let mut policy = ScenePolicy::verification_code("Acme", "SMS_1", "code", 300);
        policy.code_param_key = Some("   ".to_string());
        assert_eq!(
            policy.validate("otp").unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );

        policy.code_param_key = None;
        assert_eq!(
            policy.validate("otp").unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
    }

    #[test]
    fn test_code_key_must_be_whitelisted() {
        let mut policy = ScenePolicy::verification_code("Acme", "SMS_1", "code", 300);
        policy.param_whitelist = BTreeSet::from(["other".to_string()]);
        assert_eq!(
            policy.validate("otp").unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
    }

    #[test]
    fn test_notification_scene_does_not_need_code_key() {
        let policy = ScenePolicy::notification("Acme", "SMS_2", ["order_no"]);
        assert!(policy.validate("order-notify").is_ok());
        assert_eq!(policy.code_param_key(), None);
    }

    #[test]
    fn test_empty_whitelist_rejected() {
        let policy = ScenePolicy::notification("Acme", "SMS_2", Vec::<String>::new());
        assert_eq!(
            policy.validate("order-notify").unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
    }

    #[test]
    fn test_blank_identities_rejected() {
        let policy = ScenePolicy::notification(" ", "SMS_2", ["a"]);
        assert!(policy.validate("s").is_err());

        let policy = ScenePolicy::notification("Acme", "", ["a"]);
        assert!(policy.validate("s").is_err());

        let policy = ScenePolicy::notification("Acme", "SMS_2", ["a"]);
        assert!(policy.validate(" ").is_err());
    }

    #[test]
    fn test_rate_limit_builders() {
        let limits = RateLimitPolicy::unlimited()
            .with_interval_seconds(60)
            .with_daily_limit(10)
            .with_source_minute_limit(3);

        assert_eq!(limits.per_address_interval_seconds, 60);
        assert_eq!(limits.per_address_daily_limit, 10);
        assert_eq!(limits.per_source_minute_limit, 3);
        assert!(!limits.is_unlimited());
        assert!(RateLimitPolicy::unlimited().is_unlimited());
    }
}
