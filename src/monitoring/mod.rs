/*!
 * Monitoring
 * Structured tracing for deferred handlers
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, TaskSpan, TRACE_JSON_ENV};
