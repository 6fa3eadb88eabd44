use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Weak};

use serde::Deserialize;
use serde_json::json;

use crate::backend::Backend;
use crate::compositor::{Compositor, field, lock};
use crate::foundation::error::{SceneifyError, SceneifyResult};
use crate::foundation::geometry::TransformPatch;
use crate::scene_item::SceneItem;
use crate::source::{FilterDef, Source, SourceCore};

/// Remote type tag of scenes.
pub const SCENE_KIND: &str = "scene";

/// Declared placement of a child source.
#[derive(Clone, Debug)]
pub struct ItemSchema {
    pub source: Source,
    /// Overrides applied after the placement is resolved; empty means "keep defaults".
    pub transform: TransformPatch,
}

/// Opt-in pushes performed after a successful [`Scene::link`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkOptions {
    /// Push each declared transform onto the adopted placement.
    pub set_properties: bool,
    /// Push each declared input's settings onto the adopted input.
    pub set_source_settings: bool,
}

/// Composite source owning an ordered schema of child placements.
///
/// Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct Scene(Arc<SceneInner>);

#[derive(Debug)]
pub struct SceneInner {
    core: SourceCore,
    schema: Vec<(String, ItemSchema)>,
    items: Mutex<Vec<Arc<SceneItem>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveItem {
    scene_item_id: i64,
    source_name: String,
}

impl Scene {
    pub fn builder(name: impl Into<String>) -> SceneBuilder {
        SceneBuilder::new(name)
    }

    pub(crate) fn from_inner(inner: Arc<SceneInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<SceneInner> {
        Arc::downgrade(&self.0)
    }

    pub fn core(&self) -> &SourceCore {
        &self.0.core
    }

    pub fn name(&self) -> &str {
        self.0.core.name()
    }

    pub fn exists(&self) -> bool {
        self.0.core.exists()
    }

    pub fn initialized(&self) -> bool {
        self.0.core.initialized()
    }

    pub fn linked(&self) -> Option<bool> {
        self.0.core.linked()
    }

    /// Declared children in schema order.
    pub fn schema(&self) -> &[(String, ItemSchema)] {
        &self.0.schema
    }

    /// Bound placements in resolution order.
    pub fn items(&self) -> Vec<Arc<SceneItem>> {
        lock(&self.0.items).clone()
    }

    /// Placement bound under `item_ref`, if any.
    pub fn item(&self, item_ref: &str) -> Option<Arc<SceneItem>> {
        lock(&self.0.items)
            .iter()
            .find(|item| item.item_ref() == item_ref)
            .cloned()
    }

    pub(crate) fn detach_item(&self, item: &SceneItem) {
        lock(&self.0.items).retain(|i| !std::ptr::eq(Arc::as_ptr(i), item));
    }

    /// Provision this scene and every declared child, adopting whatever a previous run left.
    ///
    /// Returns immediately once this scene was created or linked in this process. Being placed
    /// into a parent does not count: an existing nested scene still reconciles its own children
    /// here. Concurrent calls on the same scene are not supported.
    #[tracing::instrument(skip(self, obs), fields(scene = %self.name()))]
    pub async fn create<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let core = self.core();
        if core.reconciled() {
            return Ok(());
        }

        Source::Scene(self.clone()).initialize(obs).await?;

        if !core.exists() {
            obs.call_required("CreateScene", json!({ "sceneName": self.name() }))
                .await?;
            core.push_refs(obs).await?;
            core.create_filters(obs).await?;
            tracing::info!("created scene");
        }

        core.mark_existing();
        obs.register_scene(self);

        for (item_ref, schema) in &self.0.schema {
            self.create_item(obs, item_ref, schema).await?;
        }

        core.set_linked(obs, false).await?;
        core.mark_reconciled();
        Ok(())
    }

    async fn create_item<B: Backend>(
        &self,
        obs: &Compositor<B>,
        item_ref: &str,
        schema: &ItemSchema,
    ) -> SceneifyResult<Arc<SceneItem>> {
        schema.source.initialize(obs).await?;

        let item = schema.source.create_scene_item(obs, item_ref, self).await?;
        if !schema.transform.is_empty() {
            item.set_transform(obs, &schema.transform).await?;
        }
        // Read back: the compositor may clamp or complete what was requested.
        item.fetch_properties(obs).await?;

        let mut items = lock(&self.0.items);
        // A retried create rebinds refs it resolved before failing.
        items.retain(|i| i.item_ref() != item_ref);
        items.push(item.clone());
        Ok(item)
    }

    /// Adopt an existing remote scene whose placements match the schema one-to-one by source.
    ///
    /// Every declared source must have exactly one live placement; all violations are reported
    /// together in a single [`SceneifyError::AmbiguousLink`].
    #[tracing::instrument(skip(self, obs), fields(scene = %self.name()))]
    pub async fn link<B: Backend>(
        &self,
        obs: &Compositor<B>,
        options: LinkOptions,
    ) -> SceneifyResult<()> {
        let core = self.core();
        if core.initialized() {
            return Err(SceneifyError::AlreadyInitialized(self.name().to_string()));
        }

        let resp = obs
            .call("GetSceneItemList", json!({ "sceneName": self.name() }))
            .await?
            .ok_or_else(|| SceneifyError::SceneNotFound(self.name().to_string()))?;
        let live: Vec<LiveItem> = field(&resp, "GetSceneItemList", "sceneItems")?;

        let mut multiple = Vec::new();
        let mut missing = Vec::new();
        let mut matched = Vec::with_capacity(self.0.schema.len());
        for (item_ref, schema) in &self.0.schema {
            let name = schema.source.name();
            let mut hits = live.iter().filter(|item| item.source_name == name);
            match (hits.next(), hits.next()) {
                (Some(hit), None) => matched.push((item_ref, schema, hit.scene_item_id)),
                (Some(_), Some(_)) => push_unique(&mut multiple, name),
                (None, _) => push_unique(&mut missing, name),
            }
        }
        if !multiple.is_empty() || !missing.is_empty() {
            return Err(SceneifyError::AmbiguousLink {
                scene: self.name().to_string(),
                multiple,
                missing,
            });
        }

        core.mark_adopted();
        obs.register_scene(self);

        for (item_ref, schema, id) in matched {
            let item = schema.source.link_item(self, id, item_ref);
            lock(&self.0.items).push(item.clone());

            item.fetch_properties(obs).await?;

            let push_transform = async {
                if options.set_properties && !schema.transform.is_empty() {
                    item.set_transform(obs, &schema.transform).await
                } else {
                    Ok(())
                }
            };
            let push_settings = async {
                match schema.source.as_input() {
                    Some(input) if options.set_source_settings => {
                        input.set_settings(obs, input.settings()).await
                    }
                    _ => Ok(()),
                }
            };
            tokio::try_join!(push_transform, push_settings)?;
            tracing::debug!(item_ref = item_ref.as_str(), id, "linked placement");
        }

        core.set_linked(obs, true).await?;
        core.mark_reconciled();
        Ok(())
    }

    /// Make this scene the program output, or the preview in studio mode.
    pub async fn make_current<B: Backend>(
        &self,
        obs: &Compositor<B>,
        preview: bool,
    ) -> SceneifyResult<()> {
        let method = if preview {
            "SetCurrentPreviewScene"
        } else {
            "SetCurrentProgramScene"
        };
        obs.call_required(method, json!({ "sceneName": self.name() }))
            .await?;
        Ok(())
    }

    pub(crate) async fn fetch_exists<B: Backend>(
        &self,
        obs: &Compositor<B>,
    ) -> SceneifyResult<bool> {
        let private = obs
            .call("GetSourcePrivateSettings", json!({ "sourceName": self.name() }))
            .await?;
        if private.is_none() {
            return Ok(false);
        }

        if let Some(input) = obs
            .call("GetInputSettings", json!({ "inputName": self.name() }))
            .await?
        {
            let kind = input
                .get("inputKind")
                .and_then(|k| k.as_str())
                .unwrap_or("unknown");
            return Err(SceneifyError::name_conflict(
                self.name(),
                format!("input of kind {kind} already exists"),
            ));
        }

        Ok(true)
    }

    /// Provision this scene, then place it into `parent`.
    pub(crate) async fn create_first_scene_item<B: Backend>(
        &self,
        obs: &Compositor<B>,
        parent: &Scene,
    ) -> SceneifyResult<i64> {
        self.create(obs).await?;

        let resp = obs
            .call_required(
                "CreateSceneItem",
                json!({ "sceneName": parent.name(), "sourceName": self.name() }),
            )
            .await?;
        field(&resp, "CreateSceneItem", "sceneItemId")
    }
}

/// A source declared under several refs is reported once.
fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// Builder for [`Scene`] values.
#[derive(Debug)]
pub struct SceneBuilder {
    name: String,
    filters: Vec<FilterDef>,
    items: Vec<(String, ItemSchema)>,
}

impl SceneBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: FilterDef) -> Self {
        self.filters.push(filter);
        self
    }

    /// Declare a child placement with default geometry.
    pub fn item(self, item_ref: impl Into<String>, source: impl Into<Source>) -> SceneifyResult<Self> {
        self.item_with(item_ref, source, TransformPatch::default())
    }

    /// Declare a child placement with transform overrides.
    pub fn item_with(
        mut self,
        item_ref: impl Into<String>,
        source: impl Into<Source>,
        transform: TransformPatch,
    ) -> SceneifyResult<Self> {
        let item_ref = item_ref.into();
        if item_ref.trim().is_empty() {
            return Err(SceneifyError::validation(format!(
                "scene '{}': item ref must be non-empty",
                self.name
            )));
        }
        if self.items.iter().any(|(r, _)| *r == item_ref) {
            return Err(SceneifyError::validation(format!(
                "scene '{}': duplicate item ref '{item_ref}'",
                self.name
            )));
        }
        self.items.push((
            item_ref,
            ItemSchema {
                source: source.into(),
                transform,
            },
        ));
        Ok(self)
    }

    pub fn build(self) -> SceneifyResult<Scene> {
        if self.name.trim().is_empty() {
            return Err(SceneifyError::validation("scene name must be non-empty"));
        }
        if let Some((_, schema)) = self.items.iter().find(|(_, s)| s.source.name() == self.name) {
            return Err(SceneifyError::validation(format!(
                "scene '{}' cannot contain itself (item of source '{}')",
                self.name,
                schema.source.name()
            )));
        }
        let mut filter_names = BTreeSet::new();
        for filter in &self.filters {
            if !filter_names.insert(filter.name.as_str()) {
                return Err(SceneifyError::validation(format!(
                    "scene '{}': duplicate filter '{}'",
                    self.name, filter.name
                )));
            }
        }

        Ok(Scene(Arc::new(SceneInner {
            core: SourceCore::new(self.name, SCENE_KIND.to_string(), self.filters),
            schema: self.items,
            items: Mutex::new(Vec::new()),
        })))
    }
}

#[cfg(test)]
#[path = "../tests/unit/scene.rs"]
mod tests;
