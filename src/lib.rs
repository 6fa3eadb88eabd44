//! Sceneify reconciles declarative scene graphs against a remote compositor.
//!
//! Describe inputs and scenes locally, then either:
//!
//! - [`Scene::create`] the graph, adopting placements remembered from earlier runs, or
//! - [`Scene::link`] to a scene that already exists remotely.
//!
//! Identity across runs is kept in a [`RefMap`] stored in the compositor's private storage of
//! each source, so no local database is needed.
#![forbid(unsafe_code)]

mod foundation;

pub mod backend;
pub mod compositor;
pub mod document;
pub mod input;
pub mod scene;
pub mod scene_item;
pub mod source;

pub use crate::backend::memory::{MemoryBackend, MemoryState};
pub use crate::backend::{Backend, BackendError};
pub use crate::compositor::Compositor;
pub use crate::document::{SceneDocument, SceneGraph};
pub use crate::foundation::error::{SceneifyError, SceneifyResult};
pub use crate::foundation::geometry::{BOUNDS_NONE, Transform, TransformPatch};
pub use crate::input::{AudioState, Input, InputBuilder, MonitorType, Volume, VolumeLevel};
pub use crate::scene::{ItemSchema, LinkOptions, Scene, SceneBuilder};
pub use crate::scene_item::SceneItem;
pub use crate::source::{Filter, FilterDef, RefMap, Source, SourceCore};
