//! Tracing utilities for query and self-heal observability.
//!
//! Enable the `tracing` feature to emit spans and events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// trawl_trace_query!(&sql_str, params.len());
/// ```
#[macro_export]
macro_rules! trawl_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "trawl.query");
        #[cfg(not(feature = "tracing"))]
        let _ = (&$sql, $param_count);
    };
}

/// Emit a warn-level tracing event when a missing schema artifact triggers a
/// definition resync.
///
/// ```ignore
/// trawl_trace_heal!(&artifact, attempt);
/// ```
#[macro_export]
macro_rules! trawl_trace_heal {
    ($artifact:expr, $attempt:expr) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(artifact = %$artifact, attempt = $attempt, "trawl.resync");
        #[cfg(not(feature = "tracing"))]
        let _ = (&$artifact, $attempt);
    };
}
