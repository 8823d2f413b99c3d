//! Tracing utilities for query compilation observability.
//!
//! Enable the `tracing` feature to emit spans and events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// quarry_trace_query!("select", &sql, params.len());
/// ```
#[macro_export]
macro_rules! quarry_trace_query {
    ($kind:literal, $sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(kind = $kind, sql = %$sql, params = $param_count, "quarry.compile");
    };
}

/// Emit a trace-level event while merging two joins for the same association key.
///
/// ```ignore
/// quarry_trace_merge!(key, merged.is_some());
/// ```
#[macro_export]
macro_rules! quarry_trace_merge {
    ($key:expr, $merged:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!(key = %$key, merged = $merged, "quarry.join.merge");
    };
}

/// Emit a debug-level event when a best-effort computation falls back.
///
/// ```ignore
/// quarry_trace_fallback!("region", "primary key is not the row id");
/// ```
#[macro_export]
macro_rules! quarry_trace_fallback {
    ($what:literal, $reason:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(what = $what, reason = %$reason, "quarry.fallback");
    };
}
