use crate::backend::BackendError;

pub type SceneifyResult<T> = Result<T, SceneifyError>;

#[derive(thiserror::Error, Debug)]
pub enum SceneifyError {
    /// A same-named remote object of an incompatible kind already exists.
    #[error("name conflict for '{name}': {reason}")]
    NameConflict { name: String, reason: String },

    #[error("source '{0}' is not initialized")]
    NotInitialized(String),

    #[error("scene '{0}' is already initialized")]
    AlreadyInitialized(String),

    #[error("scene '{0}' does not exist")]
    SceneNotFound(String),

    /// Every declared source that matched zero or several live placements during link.
    #[error("failed to link scene '{scene}':{}", ambiguity_report(.multiple, .missing))]
    AmbiguousLink {
        scene: String,
        multiple: Vec<String>,
        missing: Vec<String>,
    },

    /// A remembered placement id no longer resolves remotely.
    #[error("stale placement {id} for ref '{item_ref}' in scene '{scene}'")]
    StalePlacement {
        scene: String,
        item_ref: String,
        id: i64,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SceneifyError {
    pub fn name_conflict(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NameConflict {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

fn ambiguity_report(multiple: &[String], missing: &[String]) -> String {
    let quoted = |names: &[String]| {
        names
            .iter()
            .map(|n| format!("'{n}'"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::new();
    if !multiple.is_empty() {
        out.push_str(&format!(
            " scene contains multiple items of sources {}.",
            quoted(multiple)
        ));
    }
    if !missing.is_empty() {
        out.push_str(&format!(
            " scene contains no items of sources {}.",
            quoted(missing)
        ));
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
