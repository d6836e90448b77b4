//! IPC front end for the dispatch engine.
//!
//! Length-prefixed JSON over a Unix domain socket. No HTTP, no network.

mod connections;
mod frame;
mod handler;
pub mod protocol;

#[cfg(unix)]
mod client;
#[cfg(unix)]
mod server;

#[cfg(unix)]
pub use client::{ClientError, IpcClient};
pub use connections::{ConnectionConfig, ConnectionGuard, ConnectionPool};
pub use frame::{read_frame, write_frame, IpcServerConfig};
pub use handler::{HandlerError, IpcHandler, IpcHandlerConfig, Reply};
pub use protocol::{decode_message, encode_message, encode_response, IpcMessage, ProtocolError};
#[cfg(unix)]
pub use server::IpcServer;
