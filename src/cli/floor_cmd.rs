//! Order, bot, reset and watch subcommands.
//!
//! Each connects to a running server via IPC, sends one request, and prints
//! the result.

use crate::engine::{EngineEvent, Worker};
use crate::ipc::IpcMessage;

use super::{connect, report_error};

async fn request(socket_path: &str, message: IpcMessage) -> Result<IpcMessage, crate::ipc::ClientError> {
    let mut client = connect(socket_path).await?;
    client.request(&message).await
}

/// Run `order <normal|vip>`.
///
/// The class is validated by the server; a bad value exits with 2.
pub async fn run_order(socket_path: &str, class: &str) -> i32 {
    let message = IpcMessage::CreateOrder {
        class: class.to_string(),
    };
    match request(socket_path, message).await {
        Ok(IpcMessage::OrderCreated { order }) => {
            match &order.assigned_worker {
                Some(worker) => println!("{} created, assigned to {}", order.id, worker),
                None => println!("{} created, waiting", order.id),
            }
            0
        }
        Ok(other) => unexpected(&other),
        Err(e) => report_error(&e),
    }
}

/// Run `bot <add|remove|list>`.
pub async fn run_bot(socket_path: &str, action: &str) -> i32 {
    let message = match action {
        "add" => IpcMessage::AddWorker,
        "remove" => IpcMessage::RemoveWorker,
        "list" => IpcMessage::ListWorkers,
        other => {
            eprintln!("Unknown bot subcommand: {}", other);
            return 2;
        }
    };

    match request(socket_path, message).await {
        Ok(IpcMessage::WorkerAdded { worker }) => {
            println!("{} added ({})", worker.id, describe(&worker));
            0
        }
        Ok(IpcMessage::WorkerRemoved { removed: true, worker }) => {
            match worker {
                Some(Worker {
                    id,
                    current_order: Some(order),
                    ..
                }) => println!("{} removed, {} back to pending", id, order),
                Some(w) => println!("{} removed", w.id),
                None => println!("Worker removed"),
            }
            0
        }
        Ok(IpcMessage::WorkerRemoved { removed: false, .. }) => {
            println!("No workers to remove");
            1
        }
        Ok(IpcMessage::Workers { workers }) => {
            if workers.is_empty() {
                println!("No workers.");
            }
            for w in &workers {
                println!("{:<12} {}", w.id, describe(w));
            }
            0
        }
        Ok(other) => unexpected(&other),
        Err(e) => report_error(&e),
    }
}

/// Run `reset`.
pub async fn run_reset(socket_path: &str) -> i32 {
    match request(socket_path, IpcMessage::Reset).await {
        Ok(IpcMessage::ResetAck) => {
            println!("Engine reset");
            0
        }
        Ok(other) => unexpected(&other),
        Err(e) => report_error(&e),
    }
}

/// Run `watch`: print one JSON line per engine event until the server closes.
pub async fn run_watch(socket_path: &str) -> i32 {
    let mut client = match connect(socket_path).await {
        Ok(client) => client,
        Err(e) => return report_error(&e),
    };
    if let Err(e) = client.send(&IpcMessage::Watch).await {
        return report_error(&e);
    }

    loop {
        match client.next_message().await {
            Ok(Some(IpcMessage::Event { event })) => print_event(&event),
            Ok(Some(IpcMessage::Error { code, message })) => {
                eprintln!("Server error {}: {}", code, message);
                return 1;
            }
            Ok(Some(other)) => return unexpected(&other),
            Ok(None) => return 0,
            Err(e) => return report_error(&e),
        }
    }
}

fn print_event(event: &EngineEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("Unprintable event: {}", e),
    }
}

fn describe(worker: &Worker) -> String {
    match &worker.current_order {
        Some(order) => format!("processing {}", order),
        None => "idle".to_string(),
    }
}

fn unexpected(message: &IpcMessage) -> i32 {
    eprintln!("Unexpected response: {:?}", message);
    1
}
