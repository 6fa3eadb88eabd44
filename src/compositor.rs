use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::Backend;
use crate::foundation::error::{SceneifyError, SceneifyResult};
use crate::input::Input;
use crate::scene::Scene;

/// One connection to a remote compositor.
///
/// Owns the registries of every scene and input this process provisioned or linked through the
/// connection; they live exactly as long as the connection value.
#[derive(Debug)]
pub struct Compositor<B> {
    backend: B,
    scenes: Mutex<BTreeMap<String, Scene>>,
    inputs: Mutex<BTreeMap<String, Input>>,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: Backend> Compositor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            scenes: Mutex::new(BTreeMap::new()),
            inputs: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Scene registered under `name`, if this connection created or linked it.
    pub fn scene(&self, name: &str) -> Option<Scene> {
        lock(&self.scenes).get(name).cloned()
    }

    /// Input registered under `name`, if this connection provisioned it.
    pub fn input(&self, name: &str) -> Option<Input> {
        lock(&self.inputs).get(name).cloned()
    }

    pub fn scene_names(&self) -> Vec<String> {
        lock(&self.scenes).keys().cloned().collect()
    }

    pub(crate) fn register_scene(&self, scene: &Scene) {
        lock(&self.scenes).insert(scene.name().to_string(), scene.clone());
    }

    pub(crate) fn register_input(&self, input: &Input) {
        lock(&self.inputs).insert(input.name().to_string(), input.clone());
    }

    /// Raw request. `Ok(None)` is the backend's "not found" answer.
    pub async fn call(&self, method: &str, params: Value) -> SceneifyResult<Option<Value>> {
        tracing::trace!(method, %params, "rpc request");
        let resp = self.backend.call(method, params).await?;
        if resp.is_none() {
            tracing::debug!(method, "rpc answered not found");
        }
        Ok(resp)
    }

    /// Request whose target must exist.
    pub(crate) async fn call_required(&self, method: &str, params: Value) -> SceneifyResult<Value> {
        self.call(method, params)
            .await?
            .ok_or_else(|| SceneifyError::protocol(format!("{method} returned no data")))
    }
}

/// Extract and deserialize `key` from a response object.
pub(crate) fn field<T: DeserializeOwned>(resp: &Value, method: &str, key: &str) -> SceneifyResult<T> {
    let value = resp
        .get(key)
        .ok_or_else(|| SceneifyError::protocol(format!("{method} response is missing '{key}'")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| SceneifyError::protocol(format!("{method} response field '{key}': {e}")))
}
