//! Unix socket client for the CLI and tests.

use std::io;
use std::path::Path;

use thiserror::Error;
use tokio::net::UnixStream;

use super::frame::{read_frame, write_frame};
use super::protocol::{decode_message, encode_message, IpcMessage, ProtocolError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to connect to {path}: {source}")]
    Connect { path: String, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server closed the connection")]
    Closed,

    #[error("Server error {code}: {message}")]
    Server { code: u32, message: String },
}

/// One connection to a running server.
pub struct IpcClient {
    stream: UnixStream,
    max_frame_size: usize,
}

impl IpcClient {
    pub async fn connect(path: impl AsRef<Path>, max_frame_size: usize) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            stream,
            max_frame_size,
        })
    }

    pub async fn send(&mut self, message: &IpcMessage) -> Result<(), ClientError> {
        let bytes = encode_message(message, self.max_frame_size)?;
        write_frame(&mut self.stream, &bytes).await?;
        Ok(())
    }

    /// Next message from the server; `None` once it hangs up.
    pub async fn next_message(&mut self) -> Result<Option<IpcMessage>, ClientError> {
        match read_frame(&mut self.stream, self.max_frame_size).await? {
            Some(bytes) => Ok(Some(decode_message(&bytes, self.max_frame_size)?)),
            None => Ok(None),
        }
    }

    /// Send a request and wait for its reply. `error` replies become
    /// [`ClientError::Server`].
    pub async fn request(&mut self, message: &IpcMessage) -> Result<IpcMessage, ClientError> {
        self.send(message).await?;
        match self.next_message().await? {
            Some(IpcMessage::Error { code, message }) => Err(ClientError::Server { code, message }),
            Some(reply) => Ok(reply),
            None => Err(ClientError::Closed),
        }
    }
}
