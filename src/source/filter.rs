use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::backend::Backend;
use crate::compositor::{Compositor, lock};
use crate::foundation::error::SceneifyResult;

/// Declared effect attached to a source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl FilterDef {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            settings: Map::new(),
        }
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// A filter bound to its owning source.
#[derive(Debug)]
pub struct Filter {
    source_name: String,
    def: FilterDef,
    state: Mutex<FilterState>,
}

#[derive(Debug)]
struct FilterState {
    settings: Map<String, Value>,
    enabled: bool,
}

impl Filter {
    pub(crate) fn new(source_name: &str, def: FilterDef) -> Self {
        let settings = def.settings.clone();
        Self {
            source_name: source_name.to_string(),
            def,
            state: Mutex::new(FilterState {
                settings,
                enabled: true,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn kind(&self) -> &str {
        &self.def.kind
    }

    pub fn settings(&self) -> Map<String, Value> {
        lock(&self.state).settings.clone()
    }

    pub fn enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    /// Instantiate the filter on its source with the declared settings.
    pub(crate) async fn create<B: Backend>(&self, obs: &Compositor<B>) -> SceneifyResult<()> {
        obs.call_required(
            "CreateSourceFilter",
            json!({
                "sourceName": self.source_name,
                "filterName": self.def.name,
                "filterKind": self.def.kind,
                "filterSettings": self.def.settings,
            }),
        )
        .await?;

        let mut state = lock(&self.state);
        state.settings = self.def.settings.clone();
        state.enabled = true;
        Ok(())
    }

    /// Merge `settings` into the filter's remote and cached settings.
    pub async fn set_settings<B: Backend>(
        &self,
        obs: &Compositor<B>,
        settings: Map<String, Value>,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetSourceFilterSettings",
            json!({
                "sourceName": self.source_name,
                "filterName": self.def.name,
                "filterSettings": settings,
                "overlay": true,
            }),
        )
        .await?;

        lock(&self.state).settings.extend(settings);
        Ok(())
    }

    pub async fn set_enabled<B: Backend>(
        &self,
        obs: &Compositor<B>,
        enabled: bool,
    ) -> SceneifyResult<()> {
        obs.call_required(
            "SetSourceFilterEnabled",
            json!({
                "sourceName": self.source_name,
                "filterName": self.def.name,
                "filterEnabled": enabled,
            }),
        )
        .await?;

        lock(&self.state).enabled = enabled;
        Ok(())
    }
}
