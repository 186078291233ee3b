/*!
 * Task Tracing
 * Structured tracing for deferred handlers using the tracing crate
 *
 * Features:
 * - Trace id per task for correlating submission, handler and completion
 * - JSON-formatted logs for structured parsing
 * - Slow-handler warnings with the measured duration
 */

use crate::core::types::{ObjectId, OpKind, TaskId};
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Environment variable switching log output to JSON
pub const TRACE_JSON_ENV: &str = "VOL_ASYNC_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - VOL_ASYNC_TRACE_JSON: Enable JSON output (default: false)
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "structured tracing initialized");
    }
}

/// Generate a unique trace id
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one handler run
pub struct TaskSpan {
    span: Span,
    start: Instant,
    slow_threshold: Duration,
    trace_id: String,
}

impl TaskSpan {
    pub fn new(task: TaskId, op: OpKind, object: ObjectId, slow_threshold: Duration) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "task",
            trace_id = %trace_id,
            task_id = %task,
            op = %op,
            object = %object,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            slow_threshold,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record the task outcome
    pub fn record_outcome<T, E: std::fmt::Display>(&self, outcome: &Result<T, E>) {
        match outcome {
            Ok(_) => {
                self.span.record("result", "success");
            }
            Err(e) => {
                self.span.record("result", "error");
                self.span.record("error", tracing::field::display(e));
            }
        }
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TaskSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > self.slow_threshold {
            warn!(
                trace_id = %self.trace_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow task detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                duration_us = duration.as_micros() as u64,
                "task completed"
            );
        }
    }
}
