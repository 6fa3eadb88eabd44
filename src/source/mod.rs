//! Identity and lifecycle shared by every object the compositor can place into a scene.
//!
//! A source starts local-only, is probed once by [`Source::initialize`], and is then either
//! provisioned (`create_scene_item`) or adopted (`link_item`) by the scenes that declare it.
//! Placements are remembered in a [`RefMap`] persisted inside the compositor's private storage,
//! which is what lets a second run adopt the placements of the first.

pub mod filter;
pub mod refs;

use std::sync::{Arc, Mutex, Weak};

use serde_json::{Value, json};

use crate::backend::Backend;
use crate::compositor::{Compositor, field, lock};
use crate::foundation::error::{SceneifyError, SceneifyResult};
use crate::input::Input;
use crate::scene::Scene;
use crate::scene_item::{self, SceneItem};

pub use filter::{Filter, FilterDef};
pub use refs::{LINKED_KEY, REFS_KEY, RefMap};

/// State common to inputs and scenes.
#[derive(Debug)]
pub struct SourceCore {
    name: String,
    kind: String,
    filters: Vec<Filter>,
    state: Mutex<SourceState>,
}

#[derive(Debug, Default)]
struct SourceState {
    initialized: bool,
    exists: bool,
    /// Set by a completed `Scene::create` or `Scene::link`, not by being placed elsewhere.
    reconciled: bool,
    linked: Option<bool>,
    refs: RefMap,
    /// `refs` mirrors private storage. False after adoption through `link_item`.
    refs_loaded: bool,
    instances: Vec<Weak<SceneItem>>,
}

impl SourceCore {
    pub(crate) fn new(name: String, kind: String, filters: Vec<FilterDef>) -> Self {
        let filters = filters
            .into_iter()
            .map(|def| Filter::new(&name, def))
            .collect();
        Self {
            name,
            kind,
            filters,
            state: Mutex::new(SourceState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.name() == name)
    }

    pub fn initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    pub fn exists(&self) -> bool {
        lock(&self.state).exists
    }

    /// Last `LINKED` flag read from or written to private storage.
    pub fn linked(&self) -> Option<bool> {
        lock(&self.state).linked
    }

    /// Copy of the in-memory ref map.
    pub fn refs(&self) -> RefMap {
        lock(&self.state).refs.clone()
    }

    /// Every live placement of this source in the current process.
    pub fn item_instances(&self) -> Vec<Arc<SceneItem>> {
        let mut state = lock(&self.state);
        state.instances.retain(|w| w.strong_count() > 0);
        state.instances.iter().filter_map(Weak::upgrade).collect()
    }

    fn mark_initialized(&self, exists: bool) {
        let mut state = lock(&self.state);
        state.initialized = true;
        state.exists |= exists;
        // A source that does not exist remotely has nothing persisted yet.
        state.refs_loaded |= !exists;
    }

    pub(crate) fn reconciled(&self) -> bool {
        lock(&self.state).reconciled
    }

    pub(crate) fn mark_reconciled(&self) {
        lock(&self.state).reconciled = true;
    }

    pub(crate) fn mark_existing(&self) {
        lock(&self.state).exists = true;
    }

    /// Adoption without provisioning: the compositor already reported the object.
    pub(crate) fn mark_adopted(&self) {
        let mut state = lock(&self.state);
        state.initialized = true;
        state.exists = true;
    }

    pub(crate) fn track(&self, item: &Arc<SceneItem>) {
        lock(&self.state).instances.push(Arc::downgrade(item));
    }

    pub(crate) fn untrack(&self, item: &SceneItem) {
        lock(&self.state)
            .instances
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), item));
    }

    fn get_ref(&self, scene: &str, item_ref: &str) -> Option<i64> {
        lock(&self.state).refs.get(scene, item_ref)
    }

    async fn set_private_settings<B: Backend>(
        &self,
        obs: &Compositor<B>,
        settings: Value,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetSourcePrivateSettings",
            json!({ "sourceName": self.name, "sourceSettings": settings }),
        )
        .await?;
        Ok(())
    }

    async fn send_refs<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let refs = serde_json::to_value(self.refs())
            .map_err(|e| SceneifyError::Other(anyhow::Error::new(e)))?;
        self.set_private_settings(obs, json!({ REFS_KEY: refs })).await
    }

    async fn add_ref<B: Backend>(
        &self,
        obs: &Compositor<B>,
        scene: &str,
        item_ref: &str,
        id: i64,
    ) -> SceneifyResult<()> {
        lock(&self.state).refs.insert(scene, item_ref, id);
        self.send_refs(obs).await
    }

    async fn remove_ref<B: Backend>(
        &self,
        obs: &Compositor<B>,
        scene: &str,
        item_ref: &str,
    ) -> SceneifyResult<()> {
        lock(&self.state).refs.remove(scene, item_ref);
        self.send_refs(obs).await
    }

    async fn fetch_refs<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let settings = obs
            .call("GetSourcePrivateSettings", json!({ "sourceName": self.name }))
            .await?
            .and_then(|resp| resp.get("sourceSettings").cloned())
            .unwrap_or(Value::Null);
        let refs = RefMap::from_private(&settings)?;
        let linked = settings.get(LINKED_KEY).and_then(Value::as_bool);

        let mut state = lock(&self.state);
        state.refs = refs;
        state.linked = linked;
        state.refs_loaded = true;
        Ok(())
    }

    /// Load the persisted ref map if this source was adopted without reading it.
    async fn ensure_refs<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        if lock(&self.state).refs_loaded {
            return Ok(());
        }
        self.fetch_refs(obs).await
    }

    /// Rebuild the ref map from every tracked placement and persist it whole.
    pub async fn push_refs<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let refs: RefMap = self
            .item_instances()
            .iter()
            .map(|item| {
                (
                    item.scene_name().to_string(),
                    item.item_ref().to_string(),
                    item.id(),
                )
            })
            .collect();
        {
            let mut state = lock(&self.state);
            state.refs = refs;
            state.refs_loaded = true;
        }
        self.send_refs(obs).await
    }

    pub(crate) async fn set_linked<B: Backend>(
        &self,
        obs: &Compositor<B>,
        linked: bool,
    ) -> SceneifyResult<()> {
        self.set_private_settings(obs, json!({ LINKED_KEY: linked }))
            .await?;
        lock(&self.state).linked = Some(linked);
        Ok(())
    }

    pub(crate) async fn create_filters<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        for filter in &self.filters {
            filter.create(obs).await?;
        }
        Ok(())
    }
}

/// Anything placeable into a scene: a leaf [`Input`] or a nested [`Scene`].
#[derive(Clone, Debug)]
pub enum Source {
    Input(Input),
    Scene(Scene),
}

impl From<Input> for Source {
    fn from(input: Input) -> Self {
        Self::Input(input)
    }
}

impl From<Scene> for Source {
    fn from(scene: Scene) -> Self {
        Self::Scene(scene)
    }
}

impl Source {
    pub fn core(&self) -> &SourceCore {
        match self {
            Self::Input(input) => input.core(),
            Self::Scene(scene) => scene.core(),
        }
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn kind(&self) -> &str {
        self.core().kind()
    }

    pub fn as_input(&self) -> Option<&Input> {
        match self {
            Self::Input(input) => Some(input),
            Self::Scene(_) => None,
        }
    }

    pub fn as_scene(&self) -> Option<&Scene> {
        match self {
            Self::Scene(scene) => Some(scene),
            Self::Input(_) => None,
        }
    }

    async fn fetch_exists<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<bool> {
        match self {
            Self::Input(input) => input.fetch_exists(obs).await,
            Self::Scene(scene) => scene.fetch_exists(obs).await,
        }
    }

    async fn create_first_scene_item<B: Backend>(
        &self,
        obs: &Compositor<B>,
        scene: &Scene,
    ) -> SceneifyResult<i64> {
        match self {
            Self::Input(input) => input.create_first_scene_item(obs, scene).await,
            // Nested scenes provision their own children first, which re-enters this path.
            Self::Scene(child) => Box::pin(child.create_first_scene_item(obs, scene)).await,
        }
    }

    /// Probe the compositor for this source's name and load its ref map.
    ///
    /// No-op once initialized. Fails with [`SceneifyError::NameConflict`] when the name is held
    /// by an object of the other variant.
    pub async fn initialize<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let core = self.core();
        if core.initialized() {
            return Ok(());
        }

        let exists = self.fetch_exists(obs).await?;
        if exists {
            core.fetch_refs(obs).await?;
        }
        core.mark_initialized(exists);

        tracing::debug!(source = core.name(), exists, "initialized source");
        Ok(())
    }

    /// Resolve the placement of this source under `item_ref` in `scene`, creating it if needed.
    ///
    /// A remembered placement whose transform is still fetchable is adopted as-is. A remembered
    /// placement that vanished is forgotten and replaced by a fresh one.
    pub async fn create_scene_item<B: Backend>(
        &self,
        obs: &Compositor<B>,
        item_ref: &str,
        scene: &Scene,
    ) -> SceneifyResult<Arc<SceneItem>> {
        let core = self.core();
        if !core.initialized() {
            return Err(SceneifyError::NotInitialized(core.name().to_string()));
        }

        if core.exists() {
            core.ensure_refs(obs).await?;
        }

        let mut adopted_transform = None;
        let id = if core.exists() {
            match core.get_ref(scene.name(), item_ref) {
                Some(id) => {
                    match scene_item::fetch_transform(obs, scene.name(), item_ref, id).await {
                        Ok(transform) => {
                            tracing::debug!(
                                source = core.name(),
                                scene = scene.name(),
                                item_ref,
                                id,
                                "adopting remembered placement"
                            );
                            adopted_transform = Some(transform);
                            id
                        }
                        Err(err @ SceneifyError::StalePlacement { .. }) => {
                            tracing::warn!(source = core.name(), %err, "recreating placement");
                            core.remove_ref(obs, scene.name(), item_ref).await?;
                            self.create_placement(obs, scene).await?
                        }
                        Err(err) => return Err(err),
                    }
                }
                None => self.create_placement(obs, scene).await?,
            }
        } else {
            let id = self.create_first_scene_item(obs, scene).await?;
            core.mark_existing();
            tracing::info!(source = core.name(), scene = scene.name(), id, "provisioned source");
            id
        };

        core.add_ref(obs, scene.name(), item_ref, id).await?;

        let item = self.create_scene_item_object(scene, id, item_ref);
        if let Some(transform) = adopted_transform {
            item.set_cached_transform(transform);
        }
        Ok(item)
    }

    /// Bind to a placement the compositor already reported, without any provisioning call.
    pub fn link_item(&self, scene: &Scene, id: i64, item_ref: &str) -> Arc<SceneItem> {
        self.core().mark_adopted();
        self.create_scene_item_object(scene, id, item_ref)
    }

    /// New placement of this already-existing source.
    async fn create_placement<B: Backend>(
        &self,
        obs: &Compositor<B>,
        scene: &Scene,
    ) -> SceneifyResult<i64> {
        let resp = obs
            .call_required(
                "CreateSceneItem",
                json!({ "sceneName": scene.name(), "sourceName": self.name() }),
            )
            .await?;
        let id = field(&resp, "CreateSceneItem", "sceneItemId")?;
        tracing::debug!(source = self.name(), scene = scene.name(), id, "created placement");
        Ok(id)
    }

    fn create_scene_item_object(&self, scene: &Scene, id: i64, item_ref: &str) -> Arc<SceneItem> {
        let item = Arc::new(SceneItem::new(self.clone(), scene, id, item_ref));
        self.core().track(&item);
        item
    }
}
