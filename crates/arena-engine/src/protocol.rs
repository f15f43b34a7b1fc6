//! Wire codec for actions and transport frames.
//!
//! Actions travel as JSON objects `{"kind": string, "data": object}`.
//! Decoding is forward compatible: a message whose `kind` is not in
//! [`Action::KINDS`] decodes to `Ok(None)` and is dropped by the caller. A
//! known kind with a payload that does not match its shape is a
//! [`ProtocolError::MalformedPayload`].
//!
//! Transport frames wrap actions with an event name, after the connection
//! events the transport exposes: a client sends one `join` frame and then any
//! number of `dispatch` frames; the server answers with one `welcome` frame
//! naming the connection's id and then only `dispatch` frames.

use arena_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::Action;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message is not valid JSON or not an object with a `kind` string.
    #[error("malformed message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    /// The kind is known but the payload does not match its shape.
    #[error("malformed payload for {kind}: {source}")]
    MalformedPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failed (should not happen for well-formed actions).
    #[error("failed to encode action: {0}")]
    Encode(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Action codec
// ---------------------------------------------------------------------------

/// Untyped view of an action message, used to inspect the kind first.
#[derive(Debug, Deserialize)]
struct RawAction {
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Encode an action as a JSON string.
pub fn encode(action: &Action) -> Result<String, ProtocolError> {
    serde_json::to_string(action).map_err(ProtocolError::Encode)
}

/// Decode an action from a JSON string.
///
/// Returns `Ok(None)` for unknown kinds.
pub fn decode(text: &str) -> Result<Option<Action>, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(ProtocolError::MalformedMessage)?;
    decode_value(value)
}

/// Decode an action from an already-parsed JSON value.
pub fn decode_value(value: serde_json::Value) -> Result<Option<Action>, ProtocolError> {
    let raw: RawAction = serde_json::from_value(value).map_err(ProtocolError::MalformedMessage)?;

    if !Action::KINDS.contains(&raw.kind.as_str()) {
        debug!(kind = %raw.kind, "ignoring action of unknown kind");
        return Ok(None);
    }

    // Every kind carries an object payload; a missing one means "all defaults".
    let data = if raw.data.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        raw.data
    };
    let tagged = serde_json::json!({ "kind": raw.kind, "data": data });
    serde_json::from_value(tagged)
        .map(Some)
        .map_err(|source| ProtocolError::MalformedPayload {
            kind: raw.kind,
            source,
        })
}

// ---------------------------------------------------------------------------
// Transport frames
// ---------------------------------------------------------------------------

/// A frame sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on a connection: the display name to join with.
    Join { name: String },
    /// An action the client wants the authority to dispatch. Kept untyped so
    /// unknown kinds survive frame parsing and are dropped by [`decode_value`].
    Dispatch(serde_json::Value),
}

/// A frame sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerFrame {
    /// First frame on a connection: the id the authority assigned.
    Welcome { id: EntityId },
    Dispatch(Action),
}

impl ClientFrame {
    /// Parse a client frame from JSON text.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedMessage)
    }

    /// Wrap an action for sending.
    pub fn dispatch(action: &Action) -> Result<Self, ProtocolError> {
        serde_json::to_value(action)
            .map(ClientFrame::Dispatch)
            .map_err(ProtocolError::Encode)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

impl ServerFrame {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedMessage)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
