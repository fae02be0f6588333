//! # TermBridge Protocol Library
//!
//! This crate defines the wire protocol between a terminal client (typically
//! a browser running xterm.js) and the TermBridge daemon.
//!
//! ## Overview
//!
//! The protocol is asymmetric by design:
//!
//! - **Client → server**: each frame is attempted as a JSON control envelope
//!   (`{"type":"input",...}` or `{"type":"resize",...}`). Anything that does
//!   not decode is forwarded verbatim as keystroke input, so a framing bug
//!   can never swallow what the user typed.
//! - **Server → client**: raw text chunks (lossy-UTF-8 shell output, ANSI
//!   escapes included). Output volume and latency sensitivity make an
//!   envelope undesirable, so none is applied.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::ControlMessage;
//!
//! // A well-formed envelope decodes to its message...
//! let msg = ControlMessage::decode(r#"{"type":"input","data":"ls\n"}"#);
//! assert_eq!(msg, ControlMessage::input("ls\n"));
//!
//! // ...and anything else becomes literal keystrokes.
//! let msg = ControlMessage::decode("plain pasted text");
//! assert_eq!(msg, ControlMessage::input("plain pasted text"));
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Control message definitions and the permissive codec
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{ControlMessage, DEFAULT_COLS, DEFAULT_ROWS};
