//! Integration tests for the runtime facade.

use core_async::{sync, task, time};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn test_spawn_blocking_returns_listing() {
    let handle = task::spawn_blocking(|| {
        let mut names = vec!["b.jpg", "a.jpg"];
        names.sort();
        names
    });
    assert_eq!(handle.await.unwrap(), vec!["a.jpg", "b.jpg"]);
}

#[core_async::test]
async fn test_sleep_zero_returns_immediately() {
    let start = time::Instant::now();
    time::sleep(time::Duration::ZERO).await;
    assert!(start.elapsed() < time::Duration::from_millis(100));
}

#[core_async::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test]
async fn test_cancellation_token_is_idempotent() {
    let token = sync::CancellationToken::new();
    assert!(!token.is_cancelled());

    token.cancel();
    token.cancel();

    assert!(token.is_cancelled());
    token.cancelled().await;
}

#[core_async::test]
async fn test_cancellation_token_clone_observes_cancel() {
    let token = sync::CancellationToken::new();
    let observer = token.clone();

    let handle = task::spawn(async move {
        observer.cancelled().await;
        "stopped"
    });

    token.cancel();
    assert_eq!(handle.await.unwrap(), "stopped");
}

#[core_async::test]
async fn test_watch_channel_keeps_latest_value() {
    let (tx, mut rx) = sync::watch::channel(0u64);

    task::spawn(async move {
        for i in 1..=5 {
            tx.send(i).unwrap();
            task::yield_now().await;
        }
    });

    let mut last_value = 0;
    while rx.changed().await.is_ok() {
        let value = *rx.borrow();
        assert!(value >= last_value);
        last_value = value;
        if last_value >= 5 {
            break;
        }
    }

    assert_eq!(last_value, 5);
}

#[core_async::test]
async fn test_broadcast_channel() {
    let (tx, mut rx1) = sync::broadcast::channel(10);
    let mut rx2 = tx.subscribe();

    for i in 0..3 {
        tx.send(i).unwrap();
    }

    for expected in 0..3 {
        assert_eq!(rx1.recv().await.unwrap(), expected);
        assert_eq!(rx2.recv().await.unwrap(), expected);
    }
}

#[core_async::test]
async fn test_mutex_shared_between_tasks() {
    let counter = Arc::new(sync::Mutex::new(0));
    let mut handles = vec![];

    for _ in 0..10 {
        let counter = counter.clone();
        handles.push(task::spawn(async move {
            *counter.lock().await += 1;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*counter.lock().await, 10);
}

#[core_async::test]
async fn test_time_utilities() {
    let now_millis = time::now_millis();
    let now_secs = time::now_secs();

    assert!(now_millis > 0);
    assert!(now_millis / 1000 >= now_secs - 1);
}
