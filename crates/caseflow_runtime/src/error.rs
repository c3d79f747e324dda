use caseflow_core::error::{CoreError, Severity};

/// Log a rejected trigger at the level matching its severity.
pub fn log_core_error(case: &str, err: &CoreError) {
    match err.severity {
        Severity::Trace => tracing::trace!("case={case} {err}"),
        Severity::Debug => tracing::debug!("case={case} {err}"),
        Severity::Info => tracing::info!("case={case} {err}"),
        Severity::Warn => tracing::warn!("case={case} {err}"),
        Severity::Error | Severity::Fatal => tracing::error!("case={case} {err}"),
    }
}
