//! CLI subcommands that talk to a running floor-core server.
//!
//! ## Usage
//!
//! ```bash
//! floor-core order vip     # Submit a VIP order
//! floor-core bot add       # Add a worker
//! floor-core status        # Show queue and workers
//! floor-core watch         # Stream engine events
//! ```
//!
//! Exit codes: 0 success, 1 failure, 2 invalid input, 3 connection error.

pub mod config_cmd;
#[cfg(unix)]
pub mod floor_cmd;
#[cfg(unix)]
pub mod status;

#[cfg(unix)]
pub use floor_cmd::{run_bot, run_order, run_reset, run_watch};
#[cfg(unix)]
pub use status::{run_snapshot, run_status};

/// Default socket path for IPC communication.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/floor-core.sock";

/// Get socket path from environment or use default.
pub fn get_socket_path() -> String {
    std::env::var("FLOOR_SOCKET_PATH").unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string())
}

#[cfg(unix)]
async fn connect(socket_path: &str) -> Result<crate::ipc::IpcClient, crate::ipc::ClientError> {
    let max_frame = crate::config::load().ipc_server.max_frame_size;
    crate::ipc::IpcClient::connect(socket_path, max_frame).await
}

/// Print a client error and pick the exit code for it.
#[cfg(unix)]
fn report_error(err: &crate::ipc::ClientError) -> i32 {
    use crate::ipc::ClientError;

    match err {
        ClientError::Connect { .. } => {
            eprintln!("Error connecting to floor-core server: {}", err);
            eprintln!("Is the server running? Check FLOOR_SOCKET_PATH.");
            3
        }
        ClientError::Server { code: 400, message } => {
            eprintln!("Rejected: {}", message);
            2
        }
        _ => {
            eprintln!("Error: {}", err);
            1
        }
    }
}
