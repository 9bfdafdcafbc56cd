//! Governance store key layout.
//!
//! Keys are namespaced by purpose, then scene, then identifiers or bucket.
//! Caller-supplied components (scene, address, source) are written as
//! `{byte length}:{value}`, so a `:` inside one of them (an IPv6 source, say)
//! can never make two different keys collide:
//!
//! | Purpose              | Key                                                  |
//! |----------------------|------------------------------------------------------|
//! | last send time       | `limit:interval:{scene}:{address}`                   |
//! | daily counter        | `limit:mobile:day:{scene}:{address}:{yyyyMMdd}`      |
//! | source minute counter| `limit:ip:minute:{scene}:{source}:{minute}`          |
//! | idempotency entry    | `idem:{scene}:{fingerprint}`                         |
//!
//! Backends may prepend a deployment prefix (the Redis store uses `sms:`).

use crate::domain::fingerprint::Fingerprint;

/// A caller-supplied key component, prefixed with its byte length.
fn segment(value: &str) -> String {
    format!("{}:{}", value.len(), value)
}

pub fn interval_key(scene: &str, address: &str) -> String {
    format!("limit:interval:{}:{}", segment(scene), segment(address))
}

/// `day` is the local calendar date formatted as `yyyyMMdd`.
pub fn daily_key(scene: &str, address: &str, day: &str) -> String {
    format!("limit:mobile:day:{}:{}:{day}", segment(scene), segment(address))
}

/// `minute` is the epoch minute, `floor(epoch_seconds / 60)`.
pub fn source_minute_key(scene: &str, source: &str, minute: i64) -> String {
    format!("limit:ip:minute:{}:{}:{minute}", segment(scene), segment(source))
}

pub fn idempotency_key(scene: &str, fingerprint: &Fingerprint) -> String {
    format!("idem:{}:{fingerprint}", segment(scene))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(interval_key("otp", "+1"), "limit:interval:3:otp:2:+1");
        assert_eq!(
            daily_key("otp", "+1", "20240301"),
            "limit:mobile:day:3:otp:2:+1:20240301"
        );
        assert_eq!(
            source_minute_key("otp", "10.0.0.1", 28_000_000),
            "limit:ip:minute:3:otp:8:10.0.0.1:28000000"
        );

        let fp = Fingerprint::new("otp", "+1", ["code"]);
        let key = idempotency_key("otp", &fp);
        assert!(key.starts_with("idem:3:otp:"));
        assert_eq!(key.len(), "idem:3:otp:".len() + 64);
    }

    #[test]
    fn test_colons_in_components_do_not_collide() {
        assert_ne!(interval_key("a:b", "c"), interval_key("a", "b:c"));
        assert_ne!(
            source_minute_key("s", "2001:db8::1", 5),
            source_minute_key("s:2001", "db8::1", 5)
        );
        assert_ne!(
            daily_key("s", "x:1", "20240301"),
            daily_key("s:x", "1", "20240301")
        );
    }
}
