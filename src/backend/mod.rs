//! RPC seam between the reconciliation engine and a remote compositor.

pub mod memory;

use std::future::Future;

use serde_json::Value;

/// Request-level status codes used by [`BackendError::Request`].
pub mod status {
    pub const MISSING_REQUEST_FIELD: u16 = 300;
    pub const INVALID_REQUEST_FIELD: u16 = 400;
    pub const RESOURCE_ALREADY_EXISTS: u16 = 601;
    pub const UNKNOWN_REQUEST_TYPE: u16 = 204;
}

/// Hard failure of a single RPC call.
///
/// "Not found" is not an error: backends report it as `Ok(None)`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("request {method} failed with status {code}: {comment}")]
    Request {
        method: String,
        code: u16,
        comment: String,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn request(method: impl Into<String>, code: u16, comment: impl Into<String>) -> Self {
        Self::Request {
            method: method.into(),
            code,
            comment: comment.into(),
        }
    }
}

/// Asynchronous `call(method, params)` primitive of a compositor connection.
///
/// Implementations must tolerate several calls being in flight at once; the engine issues
/// independent requests concurrently and never relies on their completion order.
pub trait Backend {
    /// Issue one request. `Ok(None)` means the addressed object does not exist.
    fn call(
        &self,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Option<Value>, BackendError>>;
}
