//! Wire format for IPC messages.
//!
//! Every message is a JSON object tagged by `type`. Requests carry raw
//! transport input (the order class is a string) so the handler can answer a
//! bad value with an error response instead of a decode failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{EngineEvent, EngineSnapshot, Order, StatusReport, Worker};

/// Error code for malformed or invalid client input.
pub const CODE_BAD_REQUEST: u32 = 400;
/// Error code for oversized responses.
pub const CODE_TOO_LARGE: u32 = 413;
/// Error code while the server is shutting down or at capacity.
pub const CODE_UNAVAILABLE: u32 = 503;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// All possible IPC message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcMessage {
    #[serde(rename = "create_order")]
    CreateOrder { class: String },

    #[serde(rename = "add_worker")]
    AddWorker,

    #[serde(rename = "remove_worker")]
    RemoveWorker,

    #[serde(rename = "list_workers")]
    ListWorkers,

    #[serde(rename = "status")]
    Status,

    #[serde(rename = "snapshot")]
    Snapshot,

    #[serde(rename = "reset")]
    Reset,

    /// Subscribe this connection to engine events until it closes.
    #[serde(rename = "watch")]
    Watch,

    #[serde(rename = "order_created")]
    OrderCreated { order: Order },

    #[serde(rename = "worker_added")]
    WorkerAdded { worker: Worker },

    #[serde(rename = "worker_removed")]
    WorkerRemoved {
        removed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worker: Option<Worker>,
    },

    #[serde(rename = "workers")]
    Workers { workers: Vec<Worker> },

    #[serde(rename = "status_report")]
    StatusReport(StatusReport),

    #[serde(rename = "snapshot_report")]
    SnapshotReport(EngineSnapshot),

    #[serde(rename = "reset_ack")]
    ResetAck,

    #[serde(rename = "event")]
    Event { event: EngineEvent },

    #[serde(rename = "error")]
    Error { code: u32, message: String },
}

impl IpcMessage {
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// True for messages a client may send.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Self::CreateOrder { .. }
                | Self::AddWorker
                | Self::RemoveWorker
                | Self::ListWorkers
                | Self::Status
                | Self::Snapshot
                | Self::Reset
                | Self::Watch
        )
    }
}

/// Encode message to JSON bytes with size limit enforcement.
pub fn encode_message(message: &IpcMessage, max: usize) -> Result<Vec<u8>, ProtocolError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > max {
        return Err(ProtocolError::MessageTooLarge {
            size: bytes.len(),
            max,
        });
    }
    Ok(bytes)
}

/// Encode a response, replacing an oversized one with a 413 error.
pub fn encode_response(message: &IpcMessage, max: usize) -> Result<Vec<u8>, ProtocolError> {
    match encode_message(message, max) {
        Err(ProtocolError::MessageTooLarge { size, max }) => encode_message(
            &IpcMessage::error(
                CODE_TOO_LARGE,
                format!("Response too large: {size} bytes (max {max})"),
            ),
            max,
        ),
        other => other,
    }
}

/// Decode message from JSON bytes. The size check runs before parsing.
pub fn decode_message(bytes: &[u8], max: usize) -> Result<IpcMessage, ProtocolError> {
    if bytes.len() > max {
        return Err(ProtocolError::MessageTooLarge {
            size: bytes.len(),
            max,
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}
