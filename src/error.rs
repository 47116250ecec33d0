//! Error type shared by asset loading, the move client and the page glue.

use thiserror::Error;
use wasm_bindgen::JsValue;

use crate::assets::AssetKind;

pub type Result<T, E = RaceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RaceError {
    #[error("failed to load {asset}: {reason}")]
    AssetLoad { asset: AssetKind, reason: String },
    #[error("loading {asset} timed out after {timeout_ms}ms")]
    AssetTimeout { asset: AssetKind, timeout_ms: u32 },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0}ms")]
    Timeout(u32),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("malformed server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("dom: {0}")]
    Dom(String),
    #[error("this race was replaced by a newer one")]
    SessionEnded,
}

impl RaceError {
    /// Wraps a raw JS exception thrown by a DOM call.
    pub fn dom(value: impl Into<JsValue>) -> Self {
        RaceError::Dom(describe_js(&value.into()))
    }

    /// True for failures where the request may not have reached the server,
    /// or the server reported a transient gateway problem.
    pub fn is_retryable(&self) -> bool {
        match self {
            RaceError::Network(_) => true,
            RaceError::Status(code) => matches!(code, 502..=504),
            _ => false,
        }
    }
}

impl From<RaceError> for JsValue {
    fn from(err: RaceError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

pub(crate) fn describe_js(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
