//! JSON description of a scene graph.
//!
//! ```json
//! {
//!   "inputs": {
//!     "Color": { "kind": "color_source_v3", "settings": { "width": 200, "height": 500 } }
//!   },
//!   "scenes": [
//!     { "name": "Main", "items": [ { "ref": "bg", "source": "Color", "transform": { "positionX": 200 } } ] }
//!   ]
//! }
//! ```
//!
//! Item sources name either an input or another scene of the same document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::{SceneifyError, SceneifyResult};
use crate::foundation::geometry::TransformPatch;
use crate::input::Input;
use crate::scene::Scene;
use crate::source::{FilterDef, Source};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub inputs: BTreeMap<String, InputDef>,
    #[serde(default)]
    pub scenes: Vec<SceneDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    pub kind: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneDef {
    pub name: String,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    #[serde(rename = "ref")]
    pub item_ref: String,
    pub source: String,
    #[serde(default)]
    pub transform: TransformPatch,
}

/// Sources built from a [`SceneDocument`], sharing one instance per name.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    pub inputs: BTreeMap<String, Input>,
    /// In document order.
    pub scenes: Vec<Scene>,
}

impl SceneGraph {
    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name() == name)
    }

    /// Every scene after all the scenes it nests, otherwise in document order.
    ///
    /// Linking a parent adopts its nested scenes as placed sources, so children have to be
    /// linked first.
    pub fn children_first(&self) -> Vec<Scene> {
        fn visit(scene: &Scene, seen: &mut BTreeSet<String>, out: &mut Vec<Scene>) {
            if !seen.insert(scene.name().to_string()) {
                return;
            }
            for (_, schema) in scene.schema() {
                if let Some(child) = schema.source.as_scene() {
                    visit(child, seen, out);
                }
            }
            out.push(scene.clone());
        }

        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            visit(scene, &mut seen, &mut out);
        }
        out
    }
}

impl SceneDocument {
    pub fn from_json(s: &str) -> SceneifyResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| SceneifyError::validation(format!("invalid scene document: {e}")))
    }

    /// Build every input and scene, resolving item sources by name.
    pub fn build(&self) -> SceneifyResult<SceneGraph> {
        let mut defs = BTreeMap::new();
        for def in &self.scenes {
            if self.inputs.contains_key(&def.name) {
                return Err(SceneifyError::validation(format!(
                    "'{}' is declared both as an input and as a scene",
                    def.name
                )));
            }
            if defs.insert(def.name.as_str(), def).is_some() {
                return Err(SceneifyError::validation(format!(
                    "duplicate scene '{}'",
                    def.name
                )));
            }
        }

        let mut inputs = BTreeMap::new();
        for (name, def) in &self.inputs {
            let input = def
                .filters
                .iter()
                .cloned()
                .fold(
                    Input::builder(name.clone(), def.kind.clone()).settings(def.settings.clone()),
                    |b, f| b.filter(f),
                )
                .build()?;
            inputs.insert(name.clone(), input);
        }

        let mut builder = GraphBuilder {
            defs: &defs,
            inputs: &inputs,
            built: BTreeMap::new(),
            visiting: BTreeSet::new(),
        };
        let scenes = self
            .scenes
            .iter()
            .map(|def| builder.scene(&def.name))
            .collect::<SceneifyResult<Vec<_>>>()?;

        Ok(SceneGraph { inputs, scenes })
    }
}

struct GraphBuilder<'a> {
    defs: &'a BTreeMap<&'a str, &'a SceneDef>,
    inputs: &'a BTreeMap<String, Input>,
    built: BTreeMap<String, Scene>,
    visiting: BTreeSet<String>,
}

impl GraphBuilder<'_> {
    fn scene(&mut self, name: &str) -> SceneifyResult<Scene> {
        if let Some(scene) = self.built.get(name) {
            return Ok(scene.clone());
        }
        let def = self
            .defs
            .get(name)
            .copied()
            .ok_or_else(|| SceneifyError::validation(format!("unknown source '{name}'")))?;
        if !self.visiting.insert(name.to_string()) {
            return Err(SceneifyError::validation(format!(
                "scene '{name}' contains itself"
            )));
        }

        let mut builder = Scene::builder(def.name.clone());
        for filter in &def.filters {
            builder = builder.filter(filter.clone());
        }
        for item in &def.items {
            let source: Source = match self.inputs.get(&item.source) {
                Some(input) => input.clone().into(),
                None => self.scene(&item.source)?.into(),
            };
            builder = builder.item_with(item.item_ref.clone(), source, item.transform.clone())?;
        }
        let scene = builder.build()?;

        self.visiting.remove(name);
        self.built.insert(name.to_string(), scene.clone());
        Ok(scene)
    }
}

#[cfg(test)]
#[path = "../tests/unit/document.rs"]
mod tests;
