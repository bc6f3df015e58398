mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeFactory;
use video_id_scrape::error::PoolError;
use video_id_scrape::infrastructure::{LeaseKind, PoolSettings, SessionPool};

fn settings(capacity: usize) -> PoolSettings {
    PoolSettings {
        capacity,
        acquire_timeout: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_pool_hands_out_exactly_one_throwaway() {
    let factory = Arc::new(FakeFactory::default());
    let pool = SessionPool::initialize(factory.clone(), settings(2))
        .await
        .unwrap();

    let (a, b, c) = tokio::join!(pool.acquire(), pool.acquire(), pool.acquire());
    let leases = vec![a.unwrap(), b.unwrap(), c.unwrap()];
    let throwaways = leases.iter().filter(|l| l.is_throwaway()).count();
    assert_eq!(throwaways, 1);

    for lease in leases {
        pool.release(lease).await;
    }

    let stats = pool.stats();
    assert_eq!(stats.throwaway, 1);
    assert_eq!(stats.created, 3);
    // 只有临时会话被销毁，池内会话全部回到空闲队列
    assert_eq!(stats.destroyed, 1);
    assert_eq!(factory.destroyed(), 1);
    assert_eq!(pool.idle(), 2);
    assert_eq!(stats.acquired, stats.settled);
}

#[tokio::test]
async fn released_session_is_reused() {
    let factory = Arc::new(FakeFactory::default());
    let pool = SessionPool::initialize(factory.clone(), settings(1))
        .await
        .unwrap();

    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.kind(), LeaseKind::Pooled);
    pool.release(lease).await;

    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.kind(), LeaseKind::Pooled);
    pool.release(lease).await;

    assert_eq!(factory.created(), 1);
    assert_eq!(factory.destroyed(), 0);
}

#[tokio::test]
async fn discard_refills_the_slot() {
    let factory = Arc::new(FakeFactory::default());
    let pool = SessionPool::initialize(factory.clone(), settings(2))
        .await
        .unwrap();

    let lease = pool.acquire().await.unwrap();
    pool.discard(lease).await;

    assert_eq!(pool.idle(), 2);
    assert_eq!(factory.created(), 3);
    assert_eq!(factory.destroyed(), 1);
}

#[tokio::test]
async fn discard_degrades_when_replacement_fails() {
    let factory = Arc::new(FakeFactory::default());
    let pool = SessionPool::initialize(factory.clone(), settings(2))
        .await
        .unwrap();

    let lease = pool.acquire().await.unwrap();
    factory.fail_next_creates(1);
    pool.discard(lease).await;

    assert_eq!(pool.idle(), 1);
}

#[tokio::test]
async fn release_after_close_destroys_the_session() {
    let factory = Arc::new(FakeFactory::default());
    let pool = SessionPool::initialize(factory.clone(), settings(2))
        .await
        .unwrap();

    let lease = pool.acquire().await.unwrap();
    pool.close_all().await;
    assert_eq!(factory.destroyed(), 1);

    pool.release(lease).await;
    assert_eq!(factory.destroyed(), 2);
    assert_eq!(pool.idle(), 0);
    assert_eq!(factory.created(), factory.destroyed());
}

#[tokio::test]
async fn no_sessions_at_startup_is_fatal() {
    let factory = Arc::new(FakeFactory::default());
    factory.fail_next_creates(3);

    let result = SessionPool::initialize(factory, settings(3)).await;
    assert!(matches!(result, Err(PoolError::NoSessions { requested: 3 })));
}

#[tokio::test]
async fn partial_startup_runs_degraded() {
    let factory = Arc::new(FakeFactory::default());
    factory.fail_next_creates(1);

    let pool = SessionPool::initialize(factory, settings(3)).await.unwrap();
    assert_eq!(pool.capacity(), 3);
    assert_eq!(pool.idle(), 2);
}

#[tokio::test]
async fn dropped_lease_destroys_in_background() {
    let factory = Arc::new(FakeFactory::default());
    let pool = SessionPool::initialize(factory.clone(), settings(1))
        .await
        .unwrap();

    let lease = pool.acquire().await.unwrap();
    drop(lease);

    for _ in 0..10 {
        if factory.destroyed() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(factory.destroyed(), 1);
    assert_eq!(pool.stats().acquired, pool.stats().settled);
}
