use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::{SceneifyError, SceneifyResult};

/// Private-storage key holding the [`RefMap`].
pub const REFS_KEY: &str = "REFS";
/// Private-storage key recording whether a scene was adopted by `link` or provisioned by
/// `create`.
pub const LINKED_KEY: &str = "LINKED";

/// Persisted identity map `scene name -> ref -> placement id`.
///
/// Stored whole inside the compositor's private storage of the owning source. Writes are
/// read-modify-write with no concurrency check: one writer per source name at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefMap(BTreeMap<String, BTreeMap<String, i64>>);

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scene: &str, item_ref: &str) -> Option<i64> {
        self.0.get(scene).and_then(|refs| refs.get(item_ref)).copied()
    }

    /// Insert or overwrite a ref, returning the previous id.
    pub fn insert(&mut self, scene: &str, item_ref: &str, id: i64) -> Option<i64> {
        self.0
            .entry(scene.to_string())
            .or_default()
            .insert(item_ref.to_string(), id)
    }

    pub fn remove(&mut self, scene: &str, item_ref: &str) -> Option<i64> {
        let refs = self.0.get_mut(scene)?;
        let id = refs.remove(item_ref);
        if refs.is_empty() {
            self.0.remove(scene);
        }
        id
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of refs across all scenes.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn scene(&self, scene: &str) -> Option<&BTreeMap<String, i64>> {
        self.0.get(scene)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, i64)> + '_ {
        self.0.iter().flat_map(|(scene, refs)| {
            refs.iter()
                .map(move |(item_ref, id)| (scene.as_str(), item_ref.as_str(), *id))
        })
    }

    /// Read the map out of a private-storage object; a missing key is an empty map.
    pub fn from_private(settings: &Value) -> SceneifyResult<Self> {
        match settings.get(REFS_KEY) {
            None | Some(Value::Null) => Ok(Self::new()),
            Some(refs) => serde_json::from_value(refs.clone()).map_err(|e| {
                SceneifyError::protocol(format!("malformed {REFS_KEY} in private settings: {e}"))
            }),
        }
    }
}

impl FromIterator<(String, String, i64)> for RefMap {
    fn from_iter<I: IntoIterator<Item = (String, String, i64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (scene, item_ref, id) in iter {
            map.insert(&scene, &item_ref, id);
        }
        map
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/refs.rs"]
mod tests;
