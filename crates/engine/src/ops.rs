use std::future::Future;

use tracing::{debug_span, error, warn, Instrument};

use common::Result;

/// Run one named step of an iteration inside a span and log its failure.
///
/// Transient failures log at `warn`, everything else at `error`. The error is
/// returned unchanged so callers can short-circuit with `?`.
pub async fn logged<T, F>(op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = fut.instrument(debug_span!("op", name = op)).await;
    if let Err(e) = &result {
        if e.is_transient() {
            warn!(op, error = %e, "Operation failed");
        } else {
            error!(op, error = %e, "Operation failed");
        }
    }
    result
}
