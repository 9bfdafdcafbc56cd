//! Whitelist projection of caller-supplied template parameters.

use crate::domain::error::SmsError;
use crate::domain::scene::ScenePolicy;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;

/// Read access to a parameter map.
///
/// Implemented for the map types callers commonly hold, so that
/// [`filter_params`] can be applied to its own output.
pub trait ParamLookup {
    fn lookup(&self, key: &str) -> Option<&str>;
}

impl<S: BuildHasher> ParamLookup for HashMap<String, String, S> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl ParamLookup for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl ParamLookup for SafeParams {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key)
    }
}

/// Parameters that passed the scene whitelist.
///
/// Keys are kept sorted. `Debug` and `Display` render keys only, so a
/// `SafeParams` can be logged without exposing values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SafeParams(BTreeMap<String, String>);

impl SafeParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Parameter keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Key-value pairs in key order. Values are sensitive; never log them.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl fmt::Debug for SafeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

impl fmt::Display for SafeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, key) in self.keys().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(key)?;
        }
        f.write_str("]")
    }
}

/// Project `raw` onto the scene whitelist.
///
/// Walks the whitelist rather than the input, so the result is always a
/// subset of the whitelist and the cost is bounded by its size. Keys that are
/// not whitelisted are dropped silently. Key matching is exact.
///
/// # Errors
/// `InvalidRequest` when a verification-code scene ends up without its code
/// parameter.
pub fn filter_params<P>(policy: &ScenePolicy, raw: &P) -> Result<SafeParams, SmsError>
where
    P: ParamLookup + ?Sized,
{
    let filtered: BTreeMap<String, String> = policy
        .param_whitelist
        .iter()
        .filter_map(|key| raw.lookup(key).map(|value| (key.clone(), value.to_owned())))
        .collect();

    if policy.is_verification_code() {
        let present = policy
            .code_param_key()
            .is_some_and(|key| filtered.contains_key(key));
        if !present {
            return Err(SmsError::invalid_request(
                "verification code parameter is missing",
            ));
        }
    }

    Ok(SafeParams(filtered))
}
