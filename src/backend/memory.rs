//! In-process compositor model implementing [`Backend`].
//!
//! Mirrors the request/response shapes of the OBS websocket v5 protocol closely enough for the
//! reconciliation engine: missing objects answer `Ok(None)`, invalid requests answer
//! [`BackendError::Request`]. Placement ids are allocated per scene starting at 1.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Backend, BackendError, status};
use crate::foundation::geometry::{Transform, TransformPatch};
use crate::input::MonitorType;

/// Size reported for scenes placed inside other scenes.
pub const CANVAS_WIDTH: f64 = 1920.0;
pub const CANVAS_HEIGHT: f64 = 1080.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    #[serde(default)]
    pub inputs: BTreeMap<String, InputRecord>,
    #[serde(default)]
    pub scenes: BTreeMap<String, SceneRecord>,
    #[serde(default)]
    pub program_scene: Option<String>,
    #[serde(default)]
    pub preview_scene: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub kind: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub private: Map<String, Value>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "unit_volume")]
    pub volume_mul: f64,
    #[serde(default)]
    pub audio_sync_offset: i64,
    #[serde(default)]
    pub monitor_type: MonitorType,
    #[serde(default)]
    pub filters: Vec<FilterRecord>,
}

fn unit_volume() -> f64 {
    1.0
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    #[serde(default)]
    pub private: Map<String, Value>,
    #[serde(default)]
    pub filters: Vec<FilterRecord>,
    #[serde(default)]
    pub last_item_id: i64,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    pub source_name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub locked: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// One request as seen by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<BTreeSet<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: MemoryState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Clone of the current compositor state.
    pub fn snapshot(&self) -> MemoryState {
        lock(&self.state).clone()
    }

    /// Mutate the compositor state directly, bypassing the request log.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        f(&mut lock(&self.state))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of recorded requests for `method`.
    pub fn count(&self, method: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Make every later request for `method` fail at the transport level.
    pub fn fail_on(&self, method: impl Into<String>) {
        lock(&self.failures).insert(method.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    fn dispatch(&self, method: &str, params: &Value) -> Result<Option<Value>, BackendError> {
        if lock(&self.failures).contains(method) {
            return Err(BackendError::Transport(format!(
                "injected failure for {method}"
            )));
        }

        let mut state = lock(&self.state);
        let req = Request { method, params };
        match method {
            "CreateScene" => state.create_scene(&req),
            "CreateInput" => state.create_input(&req),
            "CreateSceneItem" => state.create_scene_item(&req),
            "RemoveSceneItem" => state.remove_scene_item(&req),
            "GetSceneItemList" => state.scene_item_list(&req),
            "GetSceneItemTransform" => state.with_item(&req, |item| {
                Ok(json!({ "sceneItemTransform": item.transform }))
            }),
            "SetSceneItemTransform" => {
                let patch: TransformPatch = req.parse("sceneItemTransform")?;
                state.with_item(&req, |item| {
                    item.transform.apply(&patch);
                    Ok(json!({}))
                })
            }
            "GetSceneItemEnabled" => state.with_item(&req, |item| {
                Ok(json!({ "sceneItemEnabled": item.enabled }))
            }),
            "SetSceneItemEnabled" => {
                let enabled = req.bool("sceneItemEnabled")?;
                state.with_item(&req, |item| {
                    item.enabled = enabled;
                    Ok(json!({}))
                })
            }
            "GetSceneItemLocked" => state.with_item(&req, |item| {
                Ok(json!({ "sceneItemLocked": item.locked }))
            }),
            "SetSceneItemLocked" => {
                let locked = req.bool("sceneItemLocked")?;
                state.with_item(&req, |item| {
                    item.locked = locked;
                    Ok(json!({}))
                })
            }
            "GetSourcePrivateSettings" => {
                let name = req.str("sourceName")?;
                Ok(state
                    .private_settings(name)
                    .map(|p| json!({ "sourceSettings": p })))
            }
            "SetSourcePrivateSettings" => {
                let name = req.str("sourceName")?;
                let patch = req.object("sourceSettings")?;
                Ok(state.private_settings_mut(name).map(|p| {
                    p.extend(patch);
                    json!({})
                }))
            }
            "GetInputSettings" => state.with_input(&req, |input| {
                Ok(json!({ "inputSettings": input.settings, "inputKind": input.kind }))
            }),
            "SetInputSettings" => {
                let patch = req.object("inputSettings")?;
                let overlay = req.params.get("overlay").and_then(Value::as_bool);
                state.with_input(&req, |input| {
                    if overlay == Some(false) {
                        input.settings = patch;
                    } else {
                        input.settings.extend(patch);
                    }
                    Ok(json!({}))
                })
            }
            "GetInputMute" => state.with_input(&req, |input| Ok(json!({ "inputMuted": input.muted }))),
            "SetInputMute" => {
                let muted = req.bool("inputMuted")?;
                state.with_input(&req, |input| {
                    input.muted = muted;
                    Ok(json!({}))
                })
            }
            "ToggleInputMute" => state.with_input(&req, |input| {
                input.muted = !input.muted;
                Ok(json!({ "inputMuted": input.muted }))
            }),
            "GetInputVolume" => state.with_input(&req, |input| Ok(volume_response(input.volume_mul))),
            "SetInputVolume" => {
                let mul = match (
                    req.params.get("inputVolumeMul").and_then(Value::as_f64),
                    req.params.get("inputVolumeDb").and_then(Value::as_f64),
                ) {
                    (Some(mul), _) => mul,
                    (None, Some(db)) => 10f64.powf(db / 20.0),
                    (None, None) => {
                        return Err(BackendError::request(
                            method,
                            status::MISSING_REQUEST_FIELD,
                            "one of inputVolumeMul or inputVolumeDb is required",
                        ));
                    }
                };
                if !(0.0..=20.0).contains(&mul) {
                    return Err(BackendError::request(
                        method,
                        status::INVALID_REQUEST_FIELD,
                        "volume out of range",
                    ));
                }
                state.with_input(&req, |input| {
                    input.volume_mul = mul;
                    Ok(json!({}))
                })
            }
            "GetInputAudioSyncOffset" => state.with_input(&req, |input| {
                Ok(json!({ "inputAudioSyncOffset": input.audio_sync_offset }))
            }),
            "SetInputAudioSyncOffset" => {
                let offset = req.i64("inputAudioSyncOffset")?;
                state.with_input(&req, |input| {
                    input.audio_sync_offset = offset;
                    Ok(json!({}))
                })
            }
            "GetInputAudioMonitorType" => state.with_input(&req, |input| {
                Ok(json!({ "monitorType": input.monitor_type }))
            }),
            "SetInputAudioMonitorType" => {
                let monitor_type: MonitorType = req.parse("monitorType")?;
                state.with_input(&req, |input| {
                    input.monitor_type = monitor_type;
                    Ok(json!({}))
                })
            }
            "SetCurrentProgramScene" | "SetCurrentPreviewScene" => {
                let name = req.str("sceneName")?;
                if !state.scenes.contains_key(name) {
                    return Ok(None);
                }
                if method == "SetCurrentProgramScene" {
                    state.program_scene = Some(name.to_string());
                } else {
                    state.preview_scene = Some(name.to_string());
                }
                Ok(Some(json!({})))
            }
            "CreateSourceFilter" => state.create_filter(&req),
            "SetSourceFilterSettings" => {
                let patch = req.object("filterSettings")?;
                state.with_filter(&req, |filter| {
                    filter.settings.extend(patch);
                    Ok(json!({}))
                })
            }
            "SetSourceFilterEnabled" => {
                let enabled = req.bool("filterEnabled")?;
                state.with_filter(&req, |filter| {
                    filter.enabled = enabled;
                    Ok(json!({}))
                })
            }
            _ => Err(BackendError::request(
                method,
                status::UNKNOWN_REQUEST_TYPE,
                "unknown request type",
            )),
        }
    }
}

impl Backend for MemoryBackend {
    async fn call(&self, method: &str, params: Value) -> Result<Option<Value>, BackendError> {
        lock(&self.calls).push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
        });
        self.dispatch(method, &params)
    }
}

fn volume_response(mul: f64) -> Value {
    let db = if mul > 0.0 {
        20.0 * mul.log10()
    } else {
        f64::NEG_INFINITY
    };
    // JSON has no infinity; the compositor reports silence as -100 dB.
    let db = if db.is_finite() { db.max(-100.0) } else { -100.0 };
    json!({ "inputVolumeMul": mul, "inputVolumeDb": db })
}

struct Request<'a> {
    method: &'a str,
    params: &'a Value,
}

impl Request<'_> {
    fn missing(&self, key: &str) -> BackendError {
        BackendError::request(
            self.method,
            status::MISSING_REQUEST_FIELD,
            format!("missing field '{key}'"),
        )
    }

    fn invalid(&self, key: &str) -> BackendError {
        BackendError::request(
            self.method,
            status::INVALID_REQUEST_FIELD,
            format!("invalid field '{key}'"),
        )
    }

    fn field(&self, key: &str) -> Result<&Value, BackendError> {
        self.params.get(key).ok_or_else(|| self.missing(key))
    }

    fn str(&self, key: &str) -> Result<&str, BackendError> {
        self.field(key)?.as_str().ok_or_else(|| self.invalid(key))
    }

    fn bool(&self, key: &str) -> Result<bool, BackendError> {
        self.field(key)?.as_bool().ok_or_else(|| self.invalid(key))
    }

    fn i64(&self, key: &str) -> Result<i64, BackendError> {
        self.field(key)?.as_i64().ok_or_else(|| self.invalid(key))
    }

    fn object(&self, key: &str) -> Result<Map<String, Value>, BackendError> {
        self.field(key)?
            .as_object()
            .cloned()
            .ok_or_else(|| self.invalid(key))
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, BackendError> {
        serde_json::from_value(self.field(key)?.clone()).map_err(|_| self.invalid(key))
    }

    fn exists(&self, what: &str) -> BackendError {
        BackendError::request(
            self.method,
            status::RESOURCE_ALREADY_EXISTS,
            format!("{what} already exists"),
        )
    }
}

impl MemoryState {
    fn name_taken(&self, name: &str) -> bool {
        self.inputs.contains_key(name) || self.scenes.contains_key(name)
    }

    fn source_size(&self, source_name: &str) -> (f64, f64) {
        if self.scenes.contains_key(source_name) {
            return (CANVAS_WIDTH, CANVAS_HEIGHT);
        }
        let dim = |key: &str| {
            self.inputs
                .get(source_name)
                .and_then(|i| i.settings.get(key))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };
        (dim("width"), dim("height"))
    }

    fn push_item(&mut self, scene_name: &str, source_name: &str) -> Option<i64> {
        let (w, h) = self.source_size(source_name);
        let scene = self.scenes.get_mut(scene_name)?;
        scene.last_item_id += 1;
        let id = scene.last_item_id;

        let mut transform = Transform::default();
        transform.update_size_from_source(Some(w), Some(h));
        scene.items.push(ItemRecord {
            id,
            source_name: source_name.to_string(),
            transform,
            enabled: true,
            locked: false,
        });
        Some(id)
    }

    fn create_scene(&mut self, req: &Request<'_>) -> Result<Option<Value>, BackendError> {
        let name = req.str("sceneName")?;
        if self.name_taken(name) {
            return Err(req.exists("source"));
        }
        self.scenes.insert(name.to_string(), SceneRecord::default());
        Ok(Some(json!({})))
    }

    fn create_input(&mut self, req: &Request<'_>) -> Result<Option<Value>, BackendError> {
        let name = req.str("inputName")?;
        let kind = req.str("inputKind")?;
        let scene_name = req.str("sceneName")?;
        let settings = match req.params.get("inputSettings") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => return Err(req.invalid("inputSettings")),
        };

        if self.name_taken(name) {
            return Err(req.exists("source"));
        }
        if !self.scenes.contains_key(scene_name) {
            return Ok(None);
        }

        self.inputs.insert(
            name.to_string(),
            InputRecord {
                kind: kind.to_string(),
                settings,
                private: Map::new(),
                muted: false,
                volume_mul: 1.0,
                audio_sync_offset: 0,
                monitor_type: MonitorType::default(),
                filters: Vec::new(),
            },
        );
        Ok(self
            .push_item(scene_name, name)
            .map(|id| json!({ "sceneItemId": id })))
    }

    fn create_scene_item(&mut self, req: &Request<'_>) -> Result<Option<Value>, BackendError> {
        let scene_name = req.str("sceneName")?;
        let source_name = req.str("sourceName")?;
        if !self.name_taken(source_name) {
            return Ok(None);
        }
        if scene_name == source_name {
            return Err(req.invalid("sourceName"));
        }
        Ok(self
            .push_item(scene_name, source_name)
            .map(|id| json!({ "sceneItemId": id })))
    }

    fn remove_scene_item(&mut self, req: &Request<'_>) -> Result<Option<Value>, BackendError> {
        let scene_name = req.str("sceneName")?;
        let id = req.i64("sceneItemId")?;
        let Some(scene) = self.scenes.get_mut(scene_name) else {
            return Ok(None);
        };
        let before = scene.items.len();
        scene.items.retain(|i| i.id != id);
        Ok((scene.items.len() != before).then(|| json!({})))
    }

    fn scene_item_list(&self, req: &Request<'_>) -> Result<Option<Value>, BackendError> {
        let scene_name = req.str("sceneName")?;
        let Some(scene) = self.scenes.get(scene_name) else {
            return Ok(None);
        };
        let items = scene
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                json!({
                    "sceneItemId": item.id,
                    "sceneItemIndex": index,
                    "sourceName": item.source_name,
                    "sceneItemEnabled": item.enabled,
                    "sceneItemLocked": item.locked,
                    "sceneItemTransform": item.transform,
                    "inputKind": self.inputs.get(&item.source_name).map(|i| i.kind.clone()),
                    "isGroup": false,
                })
            })
            .collect::<Vec<_>>();
        Ok(Some(json!({ "sceneItems": items })))
    }

    fn with_item(
        &mut self,
        req: &Request<'_>,
        f: impl FnOnce(&mut ItemRecord) -> Result<Value, BackendError>,
    ) -> Result<Option<Value>, BackendError> {
        let scene_name = req.str("sceneName")?;
        let id = req.i64("sceneItemId")?;
        match self
            .scenes
            .get_mut(scene_name)
            .and_then(|s| s.items.iter_mut().find(|i| i.id == id))
        {
            Some(item) => f(item).map(Some),
            None => Ok(None),
        }
    }

    fn with_input(
        &mut self,
        req: &Request<'_>,
        f: impl FnOnce(&mut InputRecord) -> Result<Value, BackendError>,
    ) -> Result<Option<Value>, BackendError> {
        let name = req.str("inputName")?;
        match self.inputs.get_mut(name) {
            Some(input) => f(input).map(Some),
            None => Ok(None),
        }
    }

    fn private_settings(&self, name: &str) -> Option<&Map<String, Value>> {
        self.inputs
            .get(name)
            .map(|i| &i.private)
            .or_else(|| self.scenes.get(name).map(|s| &s.private))
    }

    fn private_settings_mut(&mut self, name: &str) -> Option<&mut Map<String, Value>> {
        if let Some(input) = self.inputs.get_mut(name) {
            return Some(&mut input.private);
        }
        self.scenes.get_mut(name).map(|s| &mut s.private)
    }

    fn filters_mut(&mut self, name: &str) -> Option<&mut Vec<FilterRecord>> {
        if let Some(input) = self.inputs.get_mut(name) {
            return Some(&mut input.filters);
        }
        self.scenes.get_mut(name).map(|s| &mut s.filters)
    }

    fn create_filter(&mut self, req: &Request<'_>) -> Result<Option<Value>, BackendError> {
        let source_name = req.str("sourceName")?;
        let name = req.str("filterName")?;
        let kind = req.str("filterKind")?;
        let settings = match req.params.get("filterSettings") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let Some(filters) = self.filters_mut(source_name) else {
            return Ok(None);
        };
        if filters.iter().any(|f| f.name == name) {
            return Err(req.exists("filter"));
        }
        filters.push(FilterRecord {
            name: name.to_string(),
            kind: kind.to_string(),
            settings,
            enabled: true,
        });
        Ok(Some(json!({})))
    }

    fn with_filter(
        &mut self,
        req: &Request<'_>,
        f: impl FnOnce(&mut FilterRecord) -> Result<Value, BackendError>,
    ) -> Result<Option<Value>, BackendError> {
        let source_name = req.str("sourceName")?;
        let name = req.str("filterName")?;
        match self
            .filters_mut(source_name)
            .and_then(|filters| filters.iter_mut().find(|f| f.name == name))
        {
            Some(filter) => f(filter).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backend/memory.rs"]
mod tests;
