use std::sync::{Mutex, Weak};

use serde_json::{Value, json};

use crate::backend::Backend;
use crate::compositor::{Compositor, field, lock};
use crate::foundation::error::{SceneifyError, SceneifyResult};
use crate::foundation::geometry::{Transform, TransformPatch};
use crate::scene::{Scene, SceneInner};
use crate::source::Source;

/// Placement of one [`Source`] inside one [`Scene`] at a compositor-assigned id.
///
/// Held by the owning scene's item list and weakly by the source's instance list. After
/// [`SceneItem::remove`] the value is detached from both and must not be used again.
#[derive(Debug)]
pub struct SceneItem {
    id: i64,
    item_ref: String,
    source: Source,
    scene: Weak<SceneInner>,
    scene_name: String,
    state: Mutex<ItemState>,
}

#[derive(Debug)]
struct ItemState {
    transform: Transform,
    enabled: bool,
    locked: bool,
}

impl SceneItem {
    pub(crate) fn new(source: Source, scene: &Scene, id: i64, item_ref: &str) -> Self {
        Self {
            id,
            item_ref: item_ref.to_string(),
            source,
            scene: scene.downgrade(),
            scene_name: scene.name().to_string(),
            state: Mutex::new(ItemState {
                transform: Transform::default(),
                enabled: true,
                locked: false,
            }),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn item_ref(&self) -> &str {
        &self.item_ref
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    /// Owning scene, while it is still alive.
    pub fn scene(&self) -> Option<Scene> {
        self.scene.upgrade().map(Scene::from_inner)
    }

    pub fn transform(&self) -> Transform {
        lock(&self.state).transform.clone()
    }

    pub fn enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    pub fn locked(&self) -> bool {
        lock(&self.state).locked
    }

    pub(crate) fn set_cached_transform(&self, transform: Transform) {
        lock(&self.state).transform = transform;
    }

    fn args(&self) -> Value {
        json!({ "sceneName": self.scene_name, "sceneItemId": self.id })
    }

    fn args_with(&self, key: &str, value: Value) -> Value {
        let mut args = self.args();
        args[key] = value;
        args
    }

    /// Pull transform, enabled and locked state; the three requests run concurrently.
    pub async fn fetch_properties<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let (transform, enabled, locked) = tokio::try_join!(
            obs.call_required("GetSceneItemTransform", self.args()),
            obs.call_required("GetSceneItemEnabled", self.args()),
            obs.call_required("GetSceneItemLocked", self.args()),
        )?;

        let transform: Transform =
            field(&transform, "GetSceneItemTransform", "sceneItemTransform")?;
        let enabled: bool = field(&enabled, "GetSceneItemEnabled", "sceneItemEnabled")?;
        let locked: bool = field(&locked, "GetSceneItemLocked", "sceneItemLocked")?;

        let mut state = lock(&self.state);
        state.transform = transform;
        state.enabled = enabled;
        state.locked = locked;
        Ok(())
    }

    /// Send only the fields present in `patch`, then merge them into the cached transform.
    pub async fn set_transform<B: Backend>(
        &self,
        obs: &Compositor<B>,
        patch: &TransformPatch,
    ) -> SceneifyResult<()> {
        let wire = serde_json::to_value(patch)
            .map_err(|e| SceneifyError::Other(anyhow::Error::new(e)))?;
        obs.call_required(
            "SetSceneItemTransform",
            self.args_with("sceneItemTransform", wire),
        )
        .await?;

        lock(&self.state).transform.apply(patch);
        Ok(())
    }

    pub async fn set_enabled<B: Backend>(
        &self,
        obs: &Compositor<B>,
        enabled: bool,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetSceneItemEnabled",
            self.args_with("sceneItemEnabled", json!(enabled)),
        )
        .await?;

        lock(&self.state).enabled = enabled;
        Ok(())
    }

    pub async fn set_locked<B: Backend>(
        &self,
        obs: &Compositor<B>,
        locked: bool,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetSceneItemLocked",
            self.args_with("sceneItemLocked", json!(locked)),
        )
        .await?;

        lock(&self.state).locked = locked;
        Ok(())
    }

    /// Refresh the source dimensions and the derived rendered size.
    pub fn update_size_from_source(&self, source_width: Option<f64>, source_height: Option<f64>) {
        lock(&self.state)
            .transform
            .update_size_from_source(source_width, source_height);
    }

    /// Delete the placement remotely and detach it from its source and scene.
    pub async fn remove<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        obs.call("RemoveSceneItem", self.args()).await?;

        self.source.core().untrack(self);
        if let Some(scene) = self.scene() {
            scene.detach_item(self);
        }
        tracing::debug!(scene = %self.scene_name, id = self.id, "removed placement");
        Ok(())
    }
}

/// Live transform of placement `id`, or [`SceneifyError::StalePlacement`] if it is gone.
pub(crate) async fn fetch_transform<B: Backend>(
    obs: &Compositor<B>,
    scene_name: &str,
    item_ref: &str,
    id: i64,
) -> SceneifyResult<Transform> {
    let resp = obs
        .call(
            "GetSceneItemTransform",
            json!({ "sceneName": scene_name, "sceneItemId": id }),
        )
        .await?
        .ok_or_else(|| SceneifyError::StalePlacement {
            scene: scene_name.to_string(),
            item_ref: item_ref.to_string(),
            id,
        })?;
    field(&resp, "GetSceneItemTransform", "sceneItemTransform")
}
