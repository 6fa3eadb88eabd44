use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::backend::Backend;
use crate::compositor::{Compositor, field, lock};
use crate::foundation::error::{SceneifyError, SceneifyResult};
use crate::scene::Scene;
use crate::source::{FilterDef, SourceCore};

/// Audio monitoring routing of an input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorType {
    #[default]
    #[serde(rename = "OBS_MONITORING_TYPE_NONE")]
    None,
    #[serde(rename = "OBS_MONITORING_TYPE_MONITOR_ONLY")]
    MonitorOnly,
    #[serde(rename = "OBS_MONITORING_TYPE_MONITOR_AND_OUTPUT")]
    MonitorAndOutput,
}

/// Volume as reported by the compositor; both scales always describe the same level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Volume {
    pub db: f64,
    pub mul: f64,
}

impl Default for Volume {
    fn default() -> Self {
        Self { db: 0.0, mul: 1.0 }
    }
}

/// Requested volume, on either scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VolumeLevel {
    Db(f64),
    Mul(f64),
}

/// Cached audio attributes of an input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioState {
    pub muted: bool,
    pub volume: Volume,
    /// Milliseconds.
    pub audio_sync_offset: i64,
    pub monitor_type: MonitorType,
}

/// Leaf source: a compositor input such as a capture device, media file or color.
///
/// Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct Input(Arc<InputInner>);

#[derive(Debug)]
pub struct InputInner {
    core: SourceCore,
    settings: Mutex<Map<String, Value>>,
    audio: Mutex<AudioState>,
}

impl Input {
    pub fn builder(name: impl Into<String>, kind: impl Into<String>) -> InputBuilder {
        InputBuilder::new(name, kind)
    }

    pub fn core(&self) -> &SourceCore {
        &self.0.core
    }

    pub fn name(&self) -> &str {
        self.0.core.name()
    }

    pub fn kind(&self) -> &str {
        self.0.core.kind()
    }

    /// Cached settings: the declared ones merged with every successful write or fetch.
    pub fn settings(&self) -> Map<String, Value> {
        lock(&self.0.settings).clone()
    }

    pub fn audio(&self) -> AudioState {
        lock(&self.0.audio).clone()
    }

    fn args(&self) -> Value {
        json!({ "inputName": self.name() })
    }

    fn args_with(&self, key: &str, value: Value) -> Value {
        let mut args = self.args();
        args[key] = value;
        args
    }

    /// Merge `settings` into the remote and cached settings.
    pub async fn set_settings<B: Backend>(
        &self,
        obs: &Compositor<B>,
        settings: Map<String, Value>,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetInputSettings",
            self.args_with("inputSettings", Value::Object(settings.clone())),
        )
        .await?;

        lock(&self.0.settings).extend(settings);
        Ok(())
    }

    /// Pull the remote settings into the cache.
    pub async fn fetch_settings<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let resp = obs.call_required("GetInputSettings", self.args()).await?;
        let settings: Map<String, Value> = field(&resp, "GetInputSettings", "inputSettings")?;
        lock(&self.0.settings).extend(settings);
        Ok(())
    }

    /// Pull mute, volume, sync offset and monitor type; the four requests run concurrently.
    pub async fn fetch_properties<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        let (muted, volume, sync, monitor) = tokio::try_join!(
            obs.call_required("GetInputMute", self.args()),
            obs.call_required("GetInputVolume", self.args()),
            obs.call_required("GetInputAudioSyncOffset", self.args()),
            obs.call_required("GetInputAudioMonitorType", self.args()),
        )?;

        let audio = AudioState {
            muted: field(&muted, "GetInputMute", "inputMuted")?,
            volume: parse_volume(&volume)?,
            audio_sync_offset: field(&sync, "GetInputAudioSyncOffset", "inputAudioSyncOffset")?,
            monitor_type: field(&monitor, "GetInputAudioMonitorType", "monitorType")?,
        };
        *lock(&self.0.audio) = audio;
        Ok(())
    }

    pub async fn set_muted<B: Backend>(&self, obs: &Compositor<B>, muted: bool) -> SceneifyResult<()> {
        obs.call_required("SetInputMute", self.args_with("inputMuted", json!(muted)))
            .await?;
        lock(&self.0.audio).muted = muted;
        Ok(())
    }

    /// Flip the mute state remotely; returns the new state.
    pub async fn toggle_muted<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<bool> {
        let resp = obs.call_required("ToggleInputMute", self.args()).await?;
        let muted: bool = field(&resp, "ToggleInputMute", "inputMuted")?;
        lock(&self.0.audio).muted = muted;
        Ok(muted)
    }

    /// Write the volume on one scale, then read both scales back.
    pub async fn set_volume<B: Backend>(
        &self,
        obs: &Compositor<B>,
        level: VolumeLevel,
    ) -> SceneifyResult<Volume> {
        let args = match level {
            VolumeLevel::Db(db) => self.args_with("inputVolumeDb", json!(db)),
            VolumeLevel::Mul(mul) => self.args_with("inputVolumeMul", json!(mul)),
        };
        obs.call_required("SetInputVolume", args).await?;

        let resp = obs.call_required("GetInputVolume", self.args()).await?;
        let volume = parse_volume(&resp)?;
        lock(&self.0.audio).volume = volume;
        Ok(volume)
    }

    pub async fn set_audio_sync_offset<B: Backend>(
        &self,
        obs: &Compositor<B>,
        offset_ms: i64,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetInputAudioSyncOffset",
            self.args_with("inputAudioSyncOffset", json!(offset_ms)),
        )
        .await?;
        lock(&self.0.audio).audio_sync_offset = offset_ms;
        Ok(())
    }

    pub async fn set_audio_monitor_type<B: Backend>(
        &self,
        obs: &Compositor<B>,
        monitor_type: MonitorType,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetInputAudioMonitorType",
            self.args_with("monitorType", json!(monitor_type)),
        )
        .await?;
        lock(&self.0.audio).monitor_type = monitor_type;
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

        let Some(remote) = obs.call("GetInputSettings", self.args()).await? else {
            return Err(SceneifyError::name_conflict(
                self.name(),
                "a scene with this name already exists",
            ));
        };
        if let Some(kind) = remote.get("inputKind").and_then(Value::as_str) {
            if kind != self.kind() {
                tracing::warn!(
                    input = self.name(),
                    declared = self.kind(),
                    remote = kind,
                    "existing input has a different kind"
                );
            }
        }
        Ok(true)
    }

    /// Create the input itself together with its first placement in `scene`.
    pub(crate) async fn create_first_scene_item<B: Backend>(
        &self,
        obs: &Compositor<B>,
        scene: &Scene,
    ) -> SceneifyResult<i64> {
        let resp = obs
            .call_required(
                "CreateInput",
                json!({
                    "inputName": self.name(),
                    "inputKind": self.kind(),
                    "sceneName": scene.name(),
                    "inputSettings": self.settings(),
                }),
            )
            .await?;
        let id = field(&resp, "CreateInput", "sceneItemId")?;
        self.core().create_filters(obs).await?;
        obs.register_input(self);
        Ok(id)
    }
}

fn parse_volume(resp: &Value) -> SceneifyResult<Volume> {
    Ok(Volume {
        db: field(resp, "GetInputVolume", "inputVolumeDb")?,
        mul: field(resp, "GetInputVolume", "inputVolumeMul")?,
    })
}

/// Builder for [`Input`] values.
#[derive(Debug)]
pub struct InputBuilder {
    name: String,
    kind: String,
    settings: Map<String, Value>,
    filters: Vec<FilterDef>,
}

impl InputBuilder {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            settings: Map::new(),
            filters: Vec::new(),
        }
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings.extend(settings);
        self
    }

    pub fn filter(mut self, filter: FilterDef) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn build(self) -> SceneifyResult<Input> {
        if self.name.trim().is_empty() {
            return Err(SceneifyError::validation("input name must be non-empty"));
        }
        if self.kind.trim().is_empty() {
            return Err(SceneifyError::validation(format!(
                "input '{}': kind must be non-empty",
                self.name
            )));
        }
        let mut filter_names = BTreeSet::new();
        for filter in &self.filters {
            if !filter_names.insert(filter.name.as_str()) {
                return Err(SceneifyError::validation(format!(
                    "input '{}': duplicate filter '{}'",
                    self.name, filter.name
                )));
            }
        }

        Ok(Input(Arc::new(InputInner {
            core: SourceCore::new(self.name, self.kind, self.filters),
            settings: Mutex::new(self.settings),
            audio: Mutex::new(AudioState::default()),
        })))
    }
}
