//! Streaming chat wire protocol.
//!
//! One [`Frame`] is one record on the response stream: `content` plus a
//! [`FrameType`] discriminant. The wire encoding is `data:{json}\n\n`, with
//! `message_type` as the JSON key for the discriminant (see `/api/chat/stream`).

use serde::{Deserialize, Serialize};

/// Phase of the response a frame belongs to.
///
/// Ordering across a single request: `Think` frames (if any) come first,
/// `Data` frames carry the user-facing answer, `Knowledge` frames (if any)
/// come last. `Error` terminates the stream and is never followed by
/// anything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Think = 1,
    Data = 2,
    Knowledge = 3,
    Error = 4,
}

/// One record on the streaming response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    pub content: String,
    pub message_type: FrameType,
}

impl Frame {
    pub fn think(content: impl Into<String>) -> Self {
        Self { content: content.into(), message_type: FrameType::Think }
    }

    pub fn data(content: impl Into<String>) -> Self {
        Self { content: content.into(), message_type: FrameType::Data }
    }

    pub fn knowledge(content: impl Into<String>) -> Self {
        Self { content: content.into(), message_type: FrameType::Knowledge }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), message_type: FrameType::Error }
    }

    pub fn is_think(&self) -> bool {
        self.message_type == FrameType::Think
    }

    pub fn is_data(&self) -> bool {
        self.message_type == FrameType::Data
    }

    pub fn is_knowledge(&self) -> bool {
        self.message_type == FrameType::Knowledge
    }

    pub fn is_error(&self) -> bool {
        self.message_type == FrameType::Error
    }

    /// Encodes this frame as one `data:{json}\n\n` wire record.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("data:{}\n\n", json))
    }

    /// Parses one decoded JSON payload (without the `data:`/`\n\n` framing) back into a `Frame`.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// Hand-rolled Serialize/Deserialize: FrameType is a 4-variant integer enum,
// not worth a derive-macro dependency.
use serde::de::{self, Deserializer, Unexpected};
use serde::ser::Serializer;

impl Serialize for FrameType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for FrameType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        match v {
            1 => Ok(FrameType::Think),
            2 => Ok(FrameType::Data),
            3 => Ok(FrameType::Knowledge),
            4 => Ok(FrameType::Error),
            other => Err(de::Error::invalid_value(
                Unexpected::Unsigned(other as u64),
                &"1, 2, 3, or 4",
            )),
        }
    }
}
