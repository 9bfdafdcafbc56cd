//! Scene registry.
//!
//! The registry owns the validated scene table. Lookups hand out shared
//! `Arc<ScenePolicy>` handles; a reload swaps the whole table at once, so a
//! request that already resolved its policy keeps using it unchanged.

use crate::domain::error::SmsError;
use crate::domain::scene::ScenePolicy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type SceneTable = Arc<HashMap<String, Arc<ScenePolicy>>>;

/// Immutable mapping from scene identifier to policy.
///
/// Cloning is cheap and clones observe the same table, including later
/// [`replace`](SceneRegistry::replace) calls.
#[derive(Clone)]
pub struct SceneRegistry {
    table: Arc<RwLock<SceneTable>>,
}

impl SceneRegistry {
    /// Build a registry from a scene table.
    ///
    /// # Errors
    /// `InvalidConfig` when the table is empty or any policy is invalid.
    pub fn new<I, K>(scenes: I) -> Result<Self, SmsError>
    where
        I: IntoIterator<Item = (K, ScenePolicy)>,
        K: Into<String>,
    {
        Ok(Self {
            table: Arc::new(RwLock::new(Self::build(scenes)?)),
        })
    }

    fn build<I, K>(scenes: I) -> Result<SceneTable, SmsError>
    where
        I: IntoIterator<Item = (K, ScenePolicy)>,
        K: Into<String>,
    {
        let mut table = HashMap::new();
        for (scene, policy) in scenes {
            let scene = scene.into();
            policy.validate(&scene)?;
            table.insert(scene, Arc::new(policy));
        }

        if table.is_empty() {
            return Err(SmsError::invalid_config("at least one scene must be configured"));
        }

        Ok(Arc::new(table))
    }

    /// Look up the policy for a scene.
    ///
    /// # Errors
    /// `SceneNotFound` when the scene is not configured.
    pub fn resolve(&self, scene: &str) -> Result<Arc<ScenePolicy>, SmsError> {
        self.table
            .read()
            .get(scene)
            .cloned()
            .ok_or_else(|| SmsError::scene_not_found(scene))
    }

    /// Swap in a new scene table.
    ///
    /// The new table is validated first; on error the current table stays in
    /// place.
    pub fn replace<I, K>(&self, scenes: I) -> Result<(), SmsError>
    where
        I: IntoIterator<Item = (K, ScenePolicy)>,
        K: Into<String>,
    {
        let table = Self::build(scenes)?;
        *self.table.write() = table;
        Ok(())
    }

    pub fn contains(&self, scene: &str) -> bool {
        self.table.read().contains_key(scene)
    }

    /// Configured scene identifiers, sorted.
    pub fn scene_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

impl fmt::Debug for SceneRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneRegistry")
            .field("scenes", &self.scene_names())
            .finish()
    }
}
