/*!
 * Configuration Integration Tests
 *
 * Environment overrides feeding the builder, and the bounds the config
 * puts on waiting
 */

mod common;

use common::{config, fixture_with};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;
use std::thread;
use std::time::Duration;
use vol_async::connector::{
    GATE_TIMEOUT_ENV, SCHEDULER_ENV, SLOW_TASK_ENV, WAIT_TIMEOUT_ENV, WORKERS_ENV,
};
use vol_async::{CompletionMode, Connector, ConnectorConfig, ObjectStatus, SchedulerKind, VolError};

const ALL_ENV: [&str; 5] = [
    WORKERS_ENV,
    SCHEDULER_ENV,
    GATE_TIMEOUT_ENV,
    WAIT_TIMEOUT_ENV,
    SLOW_TASK_ENV,
];

fn clear_env() {
    for key in ALL_ENV {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = ConnectorConfig::from_env().unwrap();
    assert_eq!(config, ConnectorConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides_feed_builder() {
    clear_env();
    env::set_var(SCHEDULER_ENV, "inline");
    env::set_var(WORKERS_ENV, "2");
    env::set_var(GATE_TIMEOUT_ENV, "0");
    env::set_var(SLOW_TASK_ENV, "5");

    let config = ConnectorConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.scheduler, SchedulerKind::Inline);
    assert_eq!(config.workers, 2);
    assert_eq!(config.gate_timeout(), None);
    assert_eq!(config.slow_task(), Duration::from_millis(5));

    let connector = Connector::builder().with_config(config).build().unwrap();
    assert_eq!(connector.scheduler_name(), "inline");
    assert_eq!(connector.config().workers, 2);
}

#[test]
#[serial]
fn test_from_env_rejects_garbage() {
    clear_env();
    env::set_var(WAIT_TIMEOUT_ENV, "soon");
    let result = ConnectorConfig::from_env();
    clear_env();

    assert!(matches!(result, Err(VolError::Config(_))));
}

#[test]
fn test_invalid_config_fails_build() {
    let result = Connector::builder()
        .with_config(ConnectorConfig {
            workers: 0,
            ..ConnectorConfig::default()
        })
        .build();
    assert!(matches!(result, Err(VolError::Config(_))));
}

#[test]
fn test_wait_bound_expires() {
    let fx = fixture_with(
        ConnectorConfig {
            workers: 1,
            wait_timeout_ms: 20,
            ..config(SchedulerKind::ThreadPool)
        },
        None,
    );
    fx.backend.set_call_delay(Duration::from_millis(200));

    let (group, done) = fx
        .connector
        .group_create(&fx.root, fx.create_args("slow"), fx.dxpl(), CompletionMode::Wait)
        .unwrap();
    let result = fx.connector.wait(done);
    assert!(matches!(result, Err(VolError::Timeout { .. })));

    // The abandoned waiter freed the task; the handler still settles the object
    assert_eq!(group.wait_settled(Some(Duration::from_secs(5))), ObjectStatus::Ready);
    while fx.connector.stats().tasks_completed < 1 {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(fx.connector.ledger().freed_by_caller(), 1);
    assert_eq!(fx.connector.ledger().outstanding(), 0);
}
