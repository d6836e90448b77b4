//! Tests for connection pool management.

use std::sync::Arc;

use floor_core::ipc::{ConnectionConfig, ConnectionPool};

fn pool(max_connections: usize) -> Arc<ConnectionPool> {
    Arc::new(ConnectionPool::new(ConnectionConfig { max_connections }))
}

#[test]
fn test_acquire_within_limit() {
    let pool = pool(2);

    let guard1 = pool.try_acquire();
    assert!(guard1.is_some());
    assert_eq!(pool.active_count(), 1);

    let guard2 = pool.try_acquire();
    assert!(guard2.is_some());
    assert_eq!(pool.active_count(), 2);
}

#[test]
fn test_acquire_at_limit() {
    let pool = pool(1);

    let _guard = pool.try_acquire();
    assert!(pool.try_acquire().is_none());
    assert_eq!(pool.active_count(), 1);
}

#[test]
fn test_guard_outlives_scope_it_moves_into() {
    let pool = pool(1);
    let guard = pool.try_acquire().unwrap();

    let handle = std::thread::spawn(move || {
        let _slot = guard;
    });
    handle.join().unwrap();

    assert_eq!(pool.active_count(), 0);
    assert!(pool.try_acquire().is_some());
}

#[test]
fn test_concurrent_acquire() {
    use std::thread;

    let pool = pool(100);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                (0..20)
                    .filter_map(|_| pool.try_acquire())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    // Guards stay alive until every thread has joined.
    let held: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let total: usize = held.iter().map(Vec::len).sum();
    assert_eq!(total, 100);
    assert_eq!(pool.active_count(), 100);
}
