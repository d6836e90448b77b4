//! Request/response handling for IPC connections.
//!
//! Maps each request onto one engine operation. Engine failures become
//! `error` responses; only undecodable input is a [`HandlerError`].

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use super::protocol::{
    decode_message, encode_response, IpcMessage, ProtocolError, CODE_BAD_REQUEST, CODE_UNAVAILABLE,
};
use crate::engine::{DispatchEngine, DispatchError, EngineEvent};
use crate::scheduler::PriorityClass;
use crate::shutdown::ShutdownCoordinator;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Configuration for IPC handler.
#[derive(Debug, Clone)]
pub struct IpcHandlerConfig {
    pub max_frame_size: usize,
}

impl Default for IpcHandlerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
        }
    }
}

/// What the connection should do with a handled request.
#[derive(Debug)]
pub enum Reply {
    /// Send this message back.
    Message(IpcMessage),
    /// Forward engine events to the client until it goes away.
    Watch(broadcast::Receiver<EngineEvent>),
}

/// Handles IPC message processing against one engine.
pub struct IpcHandler {
    engine: DispatchEngine,
    shutdown: Arc<ShutdownCoordinator>,
    config: IpcHandlerConfig,
}

impl IpcHandler {
    pub fn new(
        engine: DispatchEngine,
        shutdown: Arc<ShutdownCoordinator>,
        config: IpcHandlerConfig,
    ) -> Self {
        Self {
            engine,
            shutdown,
            config,
        }
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn max_frame_size(&self) -> usize {
        self.config.max_frame_size
    }

    /// Decode a request frame and run it.
    ///
    /// Undecodable JSON is answered with a 400; only an oversized frame is
    /// an error.
    pub fn dispatch(&self, bytes: &[u8]) -> Result<Reply, HandlerError> {
        match decode_message(bytes, self.config.max_frame_size) {
            Ok(message) => Ok(self.handle(message)),
            Err(ProtocolError::Serialization(e)) => Ok(Reply::Message(IpcMessage::error(
                CODE_BAD_REQUEST,
                format!("Malformed request: {e}"),
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode a request frame, run it, and encode a single-message reply.
    ///
    /// A `watch` request cannot be answered this way and gets a 400; the
    /// server routes it through [`dispatch`](Self::dispatch) instead.
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let response = match self.dispatch(bytes)? {
            Reply::Message(reply) => reply,
            Reply::Watch(_) => {
                IpcMessage::error(CODE_BAD_REQUEST, "watch requires a streaming connection")
            }
        };
        Ok(encode_response(&response, self.config.max_frame_size)?)
    }

    /// Run one decoded request.
    pub fn handle(&self, message: IpcMessage) -> Reply {
        let Some(_guard) = self.shutdown.track() else {
            return Reply::Message(IpcMessage::error(CODE_UNAVAILABLE, "Server is shutting down"));
        };

        let reply = match message {
            IpcMessage::CreateOrder { class } => match class.parse::<PriorityClass>() {
                Ok(class) => IpcMessage::OrderCreated {
                    order: self.engine.create_order(class),
                },
                Err(e) => error_reply(&e),
            },

            IpcMessage::AddWorker => IpcMessage::WorkerAdded {
                worker: self.engine.add_worker(),
            },

            IpcMessage::RemoveWorker => match self.engine.remove_worker() {
                Ok(worker) => IpcMessage::WorkerRemoved {
                    removed: true,
                    worker: Some(worker),
                },
                Err(DispatchError::EmptyPool) => IpcMessage::WorkerRemoved {
                    removed: false,
                    worker: None,
                },
                Err(e) => error_reply(&e),
            },

            IpcMessage::ListWorkers => IpcMessage::Workers {
                workers: self.engine.workers(),
            },

            IpcMessage::Status => IpcMessage::StatusReport(self.engine.status()),

            IpcMessage::Snapshot => IpcMessage::SnapshotReport(self.engine.snapshot()),

            IpcMessage::Reset => {
                self.engine.reset();
                IpcMessage::ResetAck
            }

            IpcMessage::Watch => return Reply::Watch(self.engine.events()),

            other => {
                debug!(message = ?other, "Rejecting non-request message");
                IpcMessage::error(CODE_BAD_REQUEST, "Unexpected message type")
            }
        };
        Reply::Message(reply)
    }
}

fn error_reply(err: &DispatchError) -> IpcMessage {
    let code = if err.is_client_error() {
        CODE_BAD_REQUEST
    } else {
        CODE_UNAVAILABLE
    };
    IpcMessage::error(code, err.to_string())
}
