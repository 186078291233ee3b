/*!
 * Scheduler Integration Tests
 *
 * Handlers on the tokio blocking pool, inline execution and shutdown
 */

mod common;

use common::{config, fixture, Fixture};
use std::sync::Arc;
use std::time::Duration;
use vol_async::{
    CompletionMode, Connector, GroupGet, GroupSpecific, Location, MemoryBackend, ObjectStatus,
    SchedulerKind, TokioScheduler, VolError,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_scheduler_runs_handlers() {
    let fx = Arc::new(fixture(SchedulerKind::Tokio));
    assert_eq!(fx.connector.scheduler_name(), "tokio");

    let worker = Arc::clone(&fx);
    let status = tokio::task::spawn_blocking(move || {
        let fx = worker;
        let (g, done) = fx
            .connector
            .group_create(&fx.root, fx.create_args("g"), fx.dxpl(), CompletionMode::Wait)
            .unwrap();
        fx.connector.wait(done).unwrap();

        let done = fx
            .connector
            .group_close(&g, fx.dxpl(), CompletionMode::Detach)
            .unwrap();
        fx.connector.wait(done).unwrap();
        g.status()
    })
    .await
    .unwrap();

    assert_eq!(status, ObjectStatus::Closed);
    assert_eq!(fx.connector.ledger().outstanding(), 0);
}

#[test]
fn test_inline_detached_settles_before_return() {
    let fx = fixture(SchedulerKind::Inline);
    let (g, done) = fx
        .connector
        .group_create(&fx.root, fx.create_args("g"), fx.dxpl(), CompletionMode::Detach)
        .unwrap();

    assert_eq!(g.status(), ObjectStatus::Ready);
    assert_eq!(fx.connector.wait(done), Ok(None));
    assert_eq!(fx.connector.ledger().freed_by_handler(), 1);
}

#[test]
fn test_queued_tasks_drain_on_shutdown() {
    let fx = fixture(SchedulerKind::ThreadPool);
    fx.backend.set_call_delay(Duration::from_millis(5));

    let groups: Vec<_> = (0..5)
        .map(|i| {
            fx.connector
                .group_create(
                    &fx.root,
                    fx.create_args(&format!("g{}", i)),
                    fx.dxpl(),
                    CompletionMode::Detach,
                )
                .unwrap()
                .0
        })
        .collect();

    fx.connector.shutdown();
    for g in &groups {
        assert_eq!(g.status(), ObjectStatus::Ready);
    }
    assert_eq!(fx.root.refcount(), 1);
}

#[test]
fn test_submission_after_shutdown_is_undone() {
    let fx = fixture(SchedulerKind::ThreadPool);
    let (g, done) = fx
        .connector
        .group_create(&fx.root, fx.create_args("g"), fx.dxpl(), CompletionMode::Wait)
        .unwrap();
    fx.connector.wait(done).unwrap();
    fx.connector.shutdown();

    let live = fx.connector.registry().live();
    let created = fx.connector.registry().created_count();

    let refused = fx
        .connector
        .group_create(&fx.root, fx.create_args("h"), fx.dxpl(), CompletionMode::Wait);
    assert_eq!(refused.err(), Some(VolError::SchedulerShutdown));
    assert_eq!(fx.root.refcount(), 1);
    // The object allocated for the refused create is already gone
    assert_eq!(fx.connector.registry().live(), live);
    assert_eq!(fx.connector.registry().created_count(), created + 1);
    assert_eq!(fx.connector.registry().destroyed_count(), 1);

    let get = fx.connector.group_get(
        &g,
        GroupGet::Info(Location::SelfObject),
        fx.dxpl(),
        CompletionMode::Detach,
    );
    assert_eq!(get.err(), Some(VolError::SchedulerShutdown));
    let specific = fx
        .connector
        .group_specific(&g, GroupSpecific::Refresh, fx.dxpl(), CompletionMode::Wait);
    assert_eq!(specific.err(), Some(VolError::SchedulerShutdown));
    let close = fx.connector.group_close(&g, fx.dxpl(), CompletionMode::Wait);
    assert_eq!(close.err(), Some(VolError::SchedulerShutdown));

    assert_eq!(g.refcount(), 1);
    assert_eq!(g.status(), ObjectStatus::Ready);
    assert_eq!(fx.connector.plists().open_count(), 0);
    assert_eq!(fx.connector.ledger().outstanding(), 0);
    assert_eq!(fx.connector.stats().tasks_rejected, 4);
}

#[test]
fn test_tokio_runtime_gone_refuses_and_undoes() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .build()
        .unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let connector = Connector::builder()
        .with_config(config(SchedulerKind::Tokio))
        .with_backend(backend.clone())
        .with_scheduler(Arc::new(TokioScheduler::new(rt.handle().clone())))
        .build()
        .unwrap();
    let root = connector.attach_root(backend.open_root(), backend.id(), "/");
    let fx = Fixture {
        connector,
        backend,
        root,
    };

    let (g, done) = fx
        .connector
        .group_create(&fx.root, fx.create_args("before"), fx.dxpl(), CompletionMode::Wait)
        .unwrap();
    fx.connector.wait(done).unwrap();

    rt.shutdown_timeout(Duration::from_millis(100));

    let created = fx
        .connector
        .group_create(&fx.root, fx.create_args("after"), fx.dxpl(), CompletionMode::Wait);
    assert_eq!(created.err(), Some(VolError::SchedulerShutdown));
    assert_eq!(fx.root.refcount(), 1);
    assert_eq!(fx.connector.registry().live(), 2);
    assert_eq!(fx.connector.registry().destroyed_count(), 1);

    let get = fx.connector.group_get(
        &g,
        GroupGet::Info(Location::SelfObject),
        fx.dxpl(),
        CompletionMode::Detach,
    );
    assert_eq!(get.err(), Some(VolError::SchedulerShutdown));
    assert_eq!(g.refcount(), 1);
    assert_eq!(g.status(), ObjectStatus::Ready);
    assert!(!g.has_pending_task());

    assert_eq!(fx.connector.ledger().outstanding(), 0);
    assert_eq!(fx.connector.plists().open_count(), 0);
    assert_eq!(fx.connector.stats().tasks_rejected, 2);
}
