//! core-proto: newline-delimited JSON protocol between the orchestrator and
//! the privileged helper.
//!
//! Each request is one JSON object per line dispatching on its `action`
//! field; each response is one JSON object per line carrying `ok` plus
//! action-specific fields. Parsing is tolerant of unknown extra fields but
//! strict about the action name, so an unrecognized action is reported as
//! such rather than as a generic deserialization failure. Encoding then
//! re-parsing any command or response yields an identical value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted length of one request line.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("missing action")]
    MissingAction,
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid parameters for {action}: {message}")]
    InvalidParams { action: String, message: String },
    #[error("request line exceeds {MAX_LINE_BYTES} bytes")]
    LineTooLong,
}

/// Cursor behavior around a pointer action: restore the saved position
/// afterwards, or leave the cursor at the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    #[default]
    Sync,
    Leave,
}

/// One helper request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Click {
        x: f64,
        y: f64,
        #[serde(default)]
        cursor_mode: CursorMode,
    },
    LongPress {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default)]
        cursor_mode: CursorMode,
    },
    DoubleTap {
        x: f64,
        y: f64,
        #[serde(default)]
        cursor_mode: CursorMode,
    },
    Drag {
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default)]
        cursor_mode: CursorMode,
    },
    Swipe {
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    Type {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focus_x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focus_y: Option<f64>,
    },
    PressKey {
        key: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        modifiers: Vec<String>,
    },
    Move {
        dx: i8,
        dy: i8,
    },
    Shake,
    Status,
}

const ACTIONS: &[&str] = &[
    "click",
    "long_press",
    "double_tap",
    "drag",
    "swipe",
    "type",
    "press_key",
    "move",
    "shake",
    "status",
];

impl Command {
    /// Parse one request line.
    pub fn parse_line(line: &str) -> Result<Self, ProtoError> {
        if line.len() > MAX_LINE_BYTES {
            return Err(ProtoError::LineTooLong);
        }
        let value: serde_json::Value = serde_json::from_str(line.trim())
            .map_err(|e| ProtoError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(ProtoError::Malformed("request is not an object".into()));
        }
        let action = value
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or(ProtoError::MissingAction)?
            .to_string();
        if !ACTIONS.contains(&action.as_str()) {
            return Err(ProtoError::UnknownAction(action));
        }
        serde_json::from_value(value).map_err(|e| ProtoError::InvalidParams {
            action,
            message: e.to_string(),
        })
    }

    /// Serialize to one newline-terminated line.
    pub fn encode_line(&self) -> String {
        let mut line =
            serde_json::to_string(self).expect("command serialization is infallible");
        line.push('\n');
        line
    }
}

/// One helper response. `ok: true` plus optional action fields, or
/// `ok: false` plus a human-readable error naming the cause.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard_ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointing_ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<Vec<u32>>,
}

impl Response {
    pub fn success() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn status(keyboard_ready: bool, pointing_ready: bool) -> Self {
        Self {
            ok: true,
            keyboard_ready: Some(keyboard_ready),
            pointing_ready: Some(pointing_ready),
            ..Self::default()
        }
    }

    /// `type` response; the skipped array is always present, possibly empty.
    pub fn typed(skipped: Vec<u32>) -> Self {
        Self {
            ok: true,
            skipped: Some(skipped),
            ..Self::default()
        }
    }

    pub fn parse_line(line: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(line.trim()).map_err(|e| ProtoError::Malformed(e.to_string()))
    }

    pub fn encode_line(&self) -> String {
        let mut line =
            serde_json::to_string(self).expect("response serialization is infallible");
        line.push('\n');
        line
    }
}
