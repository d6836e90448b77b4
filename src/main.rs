//! floor-core entry point.
//!
//! ## CLI Subcommands
//!
//! - `floor-core` or `floor-core serve` - Run the engine behind the IPC socket (default)
//! - `floor-core order <normal|vip>` - Submit an order
//! - `floor-core bot <add|remove|list>` - Manage workers
//! - `floor-core status` - Show queue and workers

use std::process::ExitCode;
#[cfg(unix)]
use std::sync::Arc;

use floor_core::cli::{config_cmd, get_socket_path};
#[cfg(unix)]
use floor_core::cli::{run_bot, run_order, run_reset, run_snapshot, run_status, run_watch};
#[cfg(unix)]
use floor_core::config::{self as floor_config, EnvConfig};
#[cfg(unix)]
use floor_core::ipc::IpcServer;
#[cfg(unix)]
use floor_core::shutdown::ShutdownResult;
#[cfg(unix)]
use floor_core::telemetry;
#[cfg(unix)]
use floor_core::{Floor, RuntimeConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("floor-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        #[cfg(unix)]
        other => run_unix_command(other, &args).await,
        #[cfg(not(unix))]
        other => {
            eprintln!("'{}' needs Unix domain sockets, unavailable on this platform", other);
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
async fn run_unix_command(command: &str, args: &[String]) -> ExitCode {
    let socket_path = get_socket_path();

    let code = match command {
        "serve" | "" => {
            let env = floor_config::load();
            if let Err(e) = telemetry::init_logging(&env.log) {
                eprintln!("Logging setup failed: {}", e);
                return ExitCode::from(2u8);
            }
            telemetry::init_metrics();

            return match run_ipc_server(&env, &socket_path).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Server error: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
        "order" => match args.get(2) {
            Some(class) => run_order(&socket_path, class).await,
            None => {
                print_command_help("order");
                2
            }
        },
        "bot" => {
            let action = args.get(2).map(|s| s.as_str()).unwrap_or("list");
            run_bot(&socket_path, action).await
        }
        "status" => {
            let json_output = args.get(2).map(|s| s.as_str()) == Some("--json");
            run_status(&socket_path, json_output).await
        }
        "snapshot" => run_snapshot(&socket_path).await,
        "reset" => run_reset(&socket_path).await,
        "watch" => run_watch(&socket_path).await,
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            1
        }
    };
    ExitCode::from(code as u8)
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "floor-core - Order dispatch engine v{}

USAGE:
    floor-core [COMMAND] [OPTIONS]

COMMANDS:
    serve        Run the engine and IPC server (default when no command given)
    order        Submit an order (normal or vip)
    bot          Manage workers (add, remove, list)
    status       Show pending, processing and complete orders
    snapshot     Print the full engine state as JSON
    reset        Cancel all timers and clear orders and workers
    watch        Stream engine events as JSON lines
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    floor-core                       # Run the server (default)
    floor-core order vip             # Submit a VIP order
    floor-core bot add               # Add a worker
    floor-core bot remove            # Remove the newest worker
    floor-core status --json         # Status as JSON
    floor-core watch                 # Follow events

ENVIRONMENT:
    FLOOR_SOCKET_PATH  IPC socket path (default: /tmp/floor-core.sock)
    FLOOR_LOG          Log filter (default: info)
    FLOOR_LOG_FORMAT   json or pretty (default: pretty)
    See 'floor-core config defaults' for the full list.

EXIT CODES:
    0  Success
    1  Failure
    2  Invalid input or configuration error
    3  Connection error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "serve" => {
            eprintln!(
                "floor-core serve - Run the engine

USAGE:
    floor-core serve

DESCRIPTION:
    Starts the dispatch engine and listens on FLOOR_SOCKET_PATH. A stale
    socket file from a previous run is replaced. Ctrl-C stops accepting
    requests and drains in-flight ones within FLOOR_SHUTDOWN_TIMEOUT.
"
            );
        }
        "order" => {
            eprintln!(
                "floor-core order - Submit an order

USAGE:
    floor-core order <normal|vip>

DESCRIPTION:
    Creates an order of the given class. VIP orders are served before
    every NORMAL order. If a worker is idle the order starts at once.

EXIT CODES:
    0  Order created
    2  Unrecognized class
    3  Connection error
"
            );
        }
        "bot" => {
            eprintln!(
                "floor-core bot - Manage workers

USAGE:
    floor-core bot <SUBCOMMAND>

SUBCOMMANDS:
    add     Add a worker; it picks up the next pending order
    remove  Remove the newest worker; its order goes back to pending
    list    List workers (default)

EXIT CODES:
    0  Success
    1  No workers to remove
    3  Connection error
"
            );
        }
        "status" => {
            eprintln!(
                "floor-core status - Show engine status

USAGE:
    floor-core status [--json]

OPTIONS:
    --json  Output in JSON format
"
            );
        }
        "watch" => {
            eprintln!(
                "floor-core watch - Stream engine events

USAGE:
    floor-core watch

DESCRIPTION:
    Prints one JSON object per event until the server shuts down.
"
            );
        }
        "config" => {
            eprintln!(
                "floor-core config - Inspect configuration

USAGE:
    floor-core config <SUBCOMMAND>

SUBCOMMANDS:
    show      Show effective configuration (default)
    defaults  Show default configuration
    validate  Check for misconfigurations (exit 1 on warnings)
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'floor-core help' for general usage.",
                command
            );
        }
    }
}

#[cfg(unix)]
async fn run_ipc_server(env: &EnvConfig, socket_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let floor = Floor::new(RuntimeConfig::from(env));
    floor.engine.start();

    let server = IpcServer::bind(
        socket_path,
        Arc::clone(&floor.ipc_handler),
        env.ipc_server.clone(),
        env.connections.clone(),
    )?;
    let server_handle = tokio::spawn(server.run(floor.shutdown.token()));

    // Wait for Ctrl+C, then initiate graceful shutdown
    tokio::signal::ctrl_c().await?;
    eprintln!("Shutdown signal received, draining...");

    match floor.shutdown.initiate(env.shutdown_timeout).await {
        ShutdownResult::Complete => eprintln!("Shutdown complete"),
        ShutdownResult::Timeout { remaining } => {
            eprintln!("Shutdown timeout, {} requests remaining", remaining);
        }
    }

    if let Err(e) = server_handle.await? {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
