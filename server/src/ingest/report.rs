//! Error reporting for work nobody is waiting on.

use std::fmt::Debug;

use crate::error::ServerError;

/// A sink for errors that cannot be returned to a caller.
///
/// Background completions and asset probes report here. Implementations
/// must not block and must not fail.
pub trait Reporter: Send + Sync + Debug {
    fn report(&self, error: &ServerError, context: &str);
}

/// Reports errors as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, error: &ServerError, context: &str) {
        if error.is_internal() {
            tracing::error!(error = error.name(), context, "{}", error);
        } else {
            tracing::warn!(error = error.name(), context, "{}", error);
        }
    }
}
