//! Status and snapshot subcommands.

use crate::engine::{Order, StatusReport, WorkerStatus};
use crate::ipc::IpcMessage;

use super::{connect, report_error};

/// Run `status`, printing a table or, with `json`, the raw report.
///
/// Returns exit code: 0 on success, 1 on failure, 3 on connection failure.
pub async fn run_status(socket_path: &str, json: bool) -> i32 {
    let reply = match connect(socket_path).await {
        Ok(mut client) => client.request(&IpcMessage::Status).await,
        Err(e) => Err(e),
    };
    match reply {
        Ok(IpcMessage::StatusReport(report)) => {
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return 1;
                    }
                }
            } else {
                print_status(&report);
            }
            0
        }
        Ok(other) => {
            eprintln!("Unexpected response: {:?}", other);
            1
        }
        Err(e) => report_error(&e),
    }
}

/// Run `snapshot`, printing the engine state as JSON.
pub async fn run_snapshot(socket_path: &str) -> i32 {
    let reply = match connect(socket_path).await {
        Ok(mut client) => client.request(&IpcMessage::Snapshot).await,
        Err(e) => Err(e),
    };
    match reply {
        Ok(IpcMessage::SnapshotReport(snapshot)) => match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Ok(other) => {
            eprintln!("Unexpected response: {:?}", other);
            1
        }
        Err(e) => report_error(&e),
    }
}

/// Format and print a `StatusReport` to stdout.
pub fn print_status(report: &StatusReport) {
    println!(
        "Orders: {} pending, {} processing, {} complete ({} total, next #{})",
        report.pending.len(),
        report.processing.len(),
        report.complete.len(),
        report.total_orders,
        report.next_sequence
    );
    println!(
        "Workers: {} ({} idle)",
        report.workers.len(),
        report.idle_workers()
    );

    print_orders("PENDING", &report.pending);
    print_orders("PROCESSING", &report.processing);
    print_orders("COMPLETE", &report.complete);

    if !report.workers.is_empty() {
        println!();
        println!("{:<12} {:<12} {:<14}", "WORKER", "STATUS", "ORDER");
        println!("{}", "-".repeat(38));
        for w in &report.workers {
            let status = match w.status {
                WorkerStatus::Idle => "IDLE",
                WorkerStatus::Processing => "PROCESSING",
            };
            let order = w.current_order.as_ref().map(|o| o.as_str()).unwrap_or("-");
            println!("{:<12} {:<12} {:<14}", w.id, status, order);
        }
    }
}

fn print_orders(title: &str, orders: &[Order]) {
    if orders.is_empty() {
        return;
    }
    println!();
    println!("{} ({})", title, orders.len());
    for o in orders {
        let worker = o.assigned_worker.as_ref().map(|w| w.as_str()).unwrap_or("");
        println!("  {:<12} {:<7} {}", o.id, o.class, worker);
    }
}
