//! Tracing subscriber setup.
//!
//! Logs go to stderr, filtered by `RUST_LOG` when set. The filter sits in a
//! reload layer so early boot can raise verbosity once it has read the
//! kernel command line, after logging is already running.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Handle to the installed filter.
///
/// Holds nothing when another subscriber was already installed; level
/// changes are then ignored.
#[derive(Clone, Default)]
pub struct LogHandle {
    filter: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogHandle {
    /// Replace the filter so everything at `debug` and above is emitted.
    pub fn raise_to_debug(&self) {
        let Some(handle) = &self.filter else {
            return;
        };
        if let Err(e) = handle.reload(EnvFilter::new("debug")) {
            eprintln!("[WARN] Failed to raise log level: {}", e);
        }
    }
}

/// Install the global subscriber.
///
/// `default_level` applies when `RUST_LOG` is unset or invalid.
pub fn init_logging(default_level: &str) -> LogHandle {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (filter, handle) = reload::Layer::new(env_filter);

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init();

    match result {
        Ok(()) => LogHandle {
            filter: Some(handle),
        },
        Err(e) => {
            // Logging failure shouldn't stop the caller
            eprintln!("[ERROR] Failed to initialize tracing: {}", e);
            LogHandle::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_handle_ignores_level_changes() {
        let handle = LogHandle::default();
        handle.raise_to_debug();
        assert!(handle.filter.is_none());
    }
}
