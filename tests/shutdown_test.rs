//! Draining the floor: in-flight requests finish, new ones are refused, the
//! server and `watch` streams stop with the shared token.

use std::sync::{Arc, Barrier};
use std::time::Duration;

use floor_core::engine::{DispatchConfig, DispatchEngine, EngineEvent};
use floor_core::ipc::{IpcHandlerConfig, IpcMessage, Reply};
use floor_core::scheduler::ManualClock;
use floor_core::shutdown::{ShutdownCoordinator, ShutdownResult, ShutdownState};
use floor_core::Floor;

fn manual_floor() -> Floor {
    let clock = Arc::new(ManualClock::new());
    let engine = DispatchEngine::new(DispatchConfig::default(), clock.clone(), clock);
    Floor::with_engine(engine, IpcHandlerConfig::default())
}

/// Parks the thread delivering `OrderCreated` until released.
struct Gate {
    entered: Barrier,
    release: Barrier,
}

fn hold_order_creation(floor: &Floor) -> Arc<Gate> {
    let gate = Arc::new(Gate {
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let held = Arc::clone(&gate);
    floor.engine.subscribe(move |event| {
        if matches!(event, EngineEvent::OrderCreated { .. }) {
            held.entered.wait();
            held.release.wait();
        }
    });
    gate
}

async fn wait_entered(gate: &Arc<Gate>) {
    let gate = Arc::clone(gate);
    tokio::task::spawn_blocking(move || {
        gate.entered.wait();
    })
    .await
    .unwrap();
}

async fn release(gate: &Arc<Gate>) {
    let gate = Arc::clone(gate);
    tokio::task::spawn_blocking(move || {
        gate.release.wait();
    })
    .await
    .unwrap();
}

fn create_vip(floor: &Floor) -> tokio::task::JoinHandle<Reply> {
    let handler = Arc::clone(&floor.ipc_handler);
    tokio::task::spawn_blocking(move || {
        handler.handle(IpcMessage::CreateOrder {
            class: "vip".into(),
        })
    })
}

#[tokio::test]
async fn drain_cancels_token_and_refuses_new_requests() {
    let coordinator = ShutdownCoordinator::new();
    let token = coordinator.token();
    assert!(coordinator.is_accepting());
    assert!(!token.is_cancelled());

    let result = coordinator.initiate(Duration::from_millis(10)).await;
    assert_eq!(result, ShutdownResult::Complete);
    assert!(token.is_cancelled());
    assert!(coordinator.token().is_cancelled());
    assert!(!coordinator.is_accepting());
    assert!(coordinator.track().is_none());
    assert_eq!(coordinator.state().await, ShutdownState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn in_flight_create_order_finishes_before_drain_completes() {
    let floor = manual_floor();
    let gate = hold_order_creation(&floor);

    let request = create_vip(&floor);
    wait_entered(&gate).await;
    assert_eq!(floor.shutdown.in_flight_count(), 1);

    let shutdown = Arc::clone(&floor.shutdown);
    let drain = tokio::spawn(async move { shutdown.initiate(Duration::from_secs(5)).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!drain.is_finished(), "drain must wait for the order");
    assert_eq!(floor.shutdown.state().await, ShutdownState::Draining);
    assert!(floor.shutdown.token().is_cancelled());

    release(&gate).await;
    assert_eq!(drain.await.unwrap(), ShutdownResult::Complete);
    match request.await.unwrap() {
        Reply::Message(IpcMessage::OrderCreated { order }) => assert_eq!(order.id, "VIP-001"),
        other => panic!("unexpected reply: {:?}", other),
    }
    assert_eq!(floor.engine.pending_orders().len(), 1);
    assert_eq!(floor.shutdown.in_flight_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drain_times_out_on_a_stuck_request() {
    let floor = manual_floor();
    let gate = hold_order_creation(&floor);

    let request = create_vip(&floor);
    wait_entered(&gate).await;

    let result = floor.shutdown.initiate(Duration::from_millis(50)).await;
    assert_eq!(result, ShutdownResult::Timeout { remaining: 1 });
    assert_eq!(floor.shutdown.state().await, ShutdownState::Stopped);

    release(&gate).await;
    assert!(matches!(
        request.await.unwrap(),
        Reply::Message(IpcMessage::OrderCreated { .. })
    ));
}

#[tokio::test]
async fn handler_rejects_requests_after_shutdown() {
    let floor = manual_floor();

    let _ = floor.shutdown.initiate(Duration::from_millis(10)).await;
    match floor.ipc_handler.handle(IpcMessage::AddWorker) {
        Reply::Message(IpcMessage::Error { code, .. }) => assert_eq!(code, 503),
        other => panic!("unexpected reply: {:?}", other),
    }
    assert!(floor.engine.workers().is_empty());
}

#[cfg(unix)]
mod server {
    use super::*;

    use floor_core::ipc::{ConnectionConfig, IpcClient, IpcServer, IpcServerConfig};
    use floor_core::RuntimeConfig;
    use tokio::net::UnixStream;

    const MAX: usize = 1024 * 1024;

    #[tokio::test]
    async fn server_stops_accepting_once_draining() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floor.sock");
        let floor = Floor::new(RuntimeConfig::default());
        let server = IpcServer::bind(
            &path,
            Arc::clone(&floor.ipc_handler),
            IpcServerConfig::default(),
            ConnectionConfig::default(),
        )
        .unwrap();
        let running = tokio::spawn(server.run(floor.shutdown.token()));

        let mut client = IpcClient::connect(&path, MAX).await.unwrap();
        client.request(&IpcMessage::AddWorker).await.unwrap();

        assert_eq!(
            floor.shutdown.initiate(Duration::from_secs(1)).await,
            ShutdownResult::Complete
        );
        running.await.unwrap().unwrap();

        assert!(!path.exists(), "socket file should be removed");
        assert!(UnixStream::connect(&path).await.is_err());
        assert_eq!(floor.engine.workers().len(), 1);
    }

    #[tokio::test]
    async fn watch_stream_ends_on_drain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floor.sock");
        let floor = Floor::new(RuntimeConfig::default());
        let server = IpcServer::bind(
            &path,
            Arc::clone(&floor.ipc_handler),
            IpcServerConfig::default(),
            ConnectionConfig::default(),
        )
        .unwrap();
        let running = tokio::spawn(server.run(floor.shutdown.token()));

        let mut watcher = IpcClient::connect(&path, MAX).await.unwrap();
        watcher.send(&IpcMessage::Watch).await.unwrap();
        // Let the server register the subscription.
        tokio::time::sleep(Duration::from_millis(100)).await;

        // An open watch is not an in-flight request.
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            floor.shutdown.initiate(Duration::from_secs(5)),
        )
        .await
        .expect("drain does not wait on watchers");
        assert_eq!(result, ShutdownResult::Complete);

        let ended = tokio::time::timeout(Duration::from_secs(5), watcher.next_message())
            .await
            .expect("stream closes");
        assert!(matches!(ended, Ok(None)), "got {ended:?}");
        running.await.unwrap().unwrap();
    }
}
