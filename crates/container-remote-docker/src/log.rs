//! Quiet-mode aware logging. With CONTAINER_REMOTE_QUIET=1 info output is
//! suppressed; warnings and errors always pass through `tracing`.

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::log::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    container_remote_core::config::ObservabilityConfig::from_env().quiet
}
