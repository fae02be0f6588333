//! Control message definitions for the terminal wire protocol.
//!
//! Client → server frames are a small JSON envelope with a `type` field of
//! `"input"` or `"resize"`. Server → client frames carry no envelope at all:
//! shell output is latency-sensitive and high-volume, so it is sent as raw
//! text chunks.
//!
//! Decoding is deliberately permissive: any frame that does not parse as a
//! recognized envelope is treated as literal keystroke input. Pasting
//! arbitrary text (including text that happens to look like JSON) must never
//! break the session, so [`decode`](ControlMessage::decode) is total.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Rows applied when a resize frame omits or mangles the value.
pub const DEFAULT_ROWS: u16 = 24;

/// Columns applied when a resize frame omits or mangles the value.
pub const DEFAULT_COLS: u16 = 80;

/// A decoded client → server instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Raw keystroke input for the shell, control bytes included.
    Input {
        /// The character payload, written to the shell verbatim.
        data: String,
    },
    /// Terminal geometry change.
    Resize {
        /// New terminal rows.
        rows: u16,
        /// New terminal columns.
        cols: u16,
    },
}

impl ControlMessage {
    /// Builds an input message.
    pub fn input(data: impl Into<String>) -> Self {
        ControlMessage::Input { data: data.into() }
    }

    /// Builds a resize message.
    pub fn resize(rows: u16, cols: u16) -> Self {
        ControlMessage::Resize { rows, cols }
    }

    /// Decodes one client frame.
    ///
    /// Never fails: frames that are not a JSON object with a recognized
    /// `type` come back as [`ControlMessage::Input`] carrying the whole raw
    /// frame. A resize with missing or invalid dimensions falls back to
    /// [`DEFAULT_ROWS`] × [`DEFAULT_COLS`].
    pub fn decode(frame: &str) -> ControlMessage {
        let Ok(value) = serde_json::from_str::<Value>(frame) else {
            return ControlMessage::input(frame);
        };

        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return ControlMessage::input(frame);
        };

        match kind {
            "input" => ControlMessage::Input {
                data: value
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "resize" => ControlMessage::Resize {
                rows: dimension(value.get("rows"), DEFAULT_ROWS),
                cols: dimension(value.get("cols"), DEFAULT_COLS),
            },
            _ => ControlMessage::input(frame),
        }
    }

    /// Serializes the message to its JSON wire form.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Extracts one resize dimension. Zero is treated as absent: no terminal has
/// a zero-sized axis, and xterm.js sends 0×0 before its first layout pass.
fn dimension(value: Option<&Value>, default: u16) -> u16 {
    match value.and_then(Value::as_u64) {
        None | Some(0) => default,
        Some(n) => u16::try_from(n).unwrap_or(default),
    }
}
