//! Unix socket server.
//!
//! One task per connection. Each frame is handled to completion before the
//! next is read; a `watch` request turns the connection into an event stream
//! that ends when the client disconnects or the server drains.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connections::{ConnectionConfig, ConnectionPool};
use super::frame::{read_frame, write_frame, IpcServerConfig};
use super::handler::{IpcHandler, Reply};
use super::protocol::{encode_response, IpcMessage, CODE_BAD_REQUEST, CODE_UNAVAILABLE};
use crate::engine::EngineEvent;

pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
    handler: Arc<IpcHandler>,
    pool: Arc<ConnectionPool>,
    config: IpcServerConfig,
}

impl IpcServer {
    /// Bind at `path`, replacing a stale socket file left by a previous run.
    pub fn bind(
        path: impl AsRef<Path>,
        handler: Arc<IpcHandler>,
        config: IpcServerConfig,
        connections: ConnectionConfig,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "IPC server listening");
        Ok(Self {
            listener,
            path,
            handler,
            pool: Arc::new(ConnectionPool::new(connections)),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> io::Result<()> {
        loop {
            let stream = tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            let Some(slot) = self.pool.try_acquire() else {
                warn!(max = self.pool.max_connections(), "Connection limit reached");
                let max = self.config.max_frame_size;
                tokio::spawn(async move {
                    let mut stream = stream;
                    let _ = send(&mut stream, &IpcMessage::error(CODE_UNAVAILABLE, "Too many connections"), max).await;
                });
                continue;
            };

            let handler = Arc::clone(&self.handler);
            let max = self.config.max_frame_size;
            let token = shutdown.clone();
            tokio::spawn(async move {
                let _slot = slot;
                if let Err(e) = serve_connection(stream, handler, max, token).await {
                    debug!(error = %e, "Connection closed with error");
                }
            });
        }

        drop(self.listener);
        let _ = std::fs::remove_file(&self.path);
        info!("IPC server stopped accepting");
        Ok(())
    }
}

async fn send(stream: &mut UnixStream, message: &IpcMessage, max: usize) -> io::Result<()> {
    let bytes = encode_response(message, max).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_frame(stream, &bytes).await
}

async fn serve_connection(
    mut stream: UnixStream,
    handler: Arc<IpcHandler>,
    max: usize,
    shutdown: CancellationToken,
) -> io::Result<()> {
    loop {
        let frame = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            frame = read_frame(&mut stream, max) => frame?,
        };
        let Some(bytes) = frame else {
            return Ok(());
        };

        match handler.dispatch(&bytes) {
            Ok(Reply::Message(reply)) => send(&mut stream, &reply, max).await?,
            Ok(Reply::Watch(events)) => return stream_events(stream, events, max, shutdown).await,
            Err(e) => {
                send(&mut stream, &IpcMessage::error(CODE_BAD_REQUEST, format!("Malformed request: {e}")), max).await?
            }
        }
    }
}

async fn stream_events(
    mut stream: UnixStream,
    mut events: tokio::sync::broadcast::Receiver<EngineEvent>,
    max: usize,
    shutdown: CancellationToken,
) -> io::Result<()> {
    debug!("Client subscribed to events");
    loop {
        let received = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            received = events.recv() => received,
        };
        match received {
            Ok(event) => send(&mut stream, &IpcMessage::Event { event }, max).await?,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event watcher lagged");
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}
