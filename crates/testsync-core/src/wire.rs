//! WebSocket message envelope and the payloads carried inside it.
//!
//! Every frame is a JSON object `{ "command": ..., "content": ... }`. The
//! `content` value is kept as raw JSON text and only decoded by the command
//! handler that needs it, so `update_data` can store it byte-for-byte.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::errors::SyncError;

/// Commands understood by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ReadData,
    UpdateData,
    GetConnectionCount,
    WaitCheckpoint,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadData => "read_data",
            Self::UpdateData => "update_data",
            Self::GetConnectionCount => "get_connection_count",
            Self::WaitCheckpoint => "wait_checkpoint",
        }
    }

    pub fn parse(s: &str) -> Result<Self, SyncError> {
        match s {
            "read_data" => Ok(Self::ReadData),
            "update_data" => Ok(Self::UpdateData),
            "get_connection_count" => Ok(Self::GetConnectionCount),
            "wait_checkpoint" => Ok(Self::WaitCheckpoint),
            other => Err(SyncError::UnknownCommand(other.to_string())),
        }
    }
}

/// Inbound envelope.
///
/// `content` is `None` only when the key is absent. An explicit `null` is kept
/// as the raw text `null`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default, deserialize_with = "present_raw")]
    pub content: Option<Box<RawValue>>,
}

fn present_raw<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

impl Envelope {
    pub fn decode(raw: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(raw)
            .map_err(|e| SyncError::Decode(format!("could not unmarshal message: {e}")))
    }

    /// Raw JSON text of `content`, exactly as the client sent it.
    pub fn content_bytes(&self) -> Option<&[u8]> {
        self.content.as_deref().map(|raw| raw.get().as_bytes())
    }

    /// Decode `content` into a command-specific type.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        let raw = self
            .content
            .as_deref()
            .ok_or_else(|| SyncError::Decode(format!("{} requires content", self.command)))?;
        serde_json::from_str(raw.get()).map_err(|e| {
            SyncError::Decode(format!("could not unmarshal {} content: {e}", self.command))
        })
    }
}

#[derive(Serialize)]
struct Outbound<'a, T> {
    command: &'a str,
    content: &'a T,
}

/// Encode an outbound envelope for `command`.
pub fn encode<T: Serialize>(command: Command, content: &T) -> Result<String, SyncError> {
    serde_json::to_string(&Outbound {
        command: command.as_str(),
        content,
    })
    .map_err(|e| {
        SyncError::Decode(format!("could not marshal {} message: {e}", command.as_str()))
    })
}

/// `wait_checkpoint` request content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointArrival {
    #[serde(alias = "name")]
    pub identifier: String,
    #[serde(alias = "targetCount")]
    pub target_count: u32,
}

/// Finished notification pushed to every connection released by a checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointStatus {
    pub identifier: String,
    pub finished: bool,
    /// Unix epoch milliseconds at which released workers should resume.
    pub start_at: i64,
}

/// `get_connection_count` reply content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCount {
    pub count: usize,
}

/// A single outbound frame, independent of the transport that carries it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    /// Wrap a stored payload, as text when it is valid UTF-8.
    pub fn from_payload(payload: Bytes) -> Self {
        match std::str::from_utf8(&payload) {
            Ok(text) => Frame::Text(text.to_owned()),
            Err(_) => Frame::Binary(payload),
        }
    }
}
