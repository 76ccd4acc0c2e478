use std::sync::{Arc, OnceLock};

/// Sink for the crate's log output, implemented by the host application.
///
/// With the `ffi` feature it is exported via `UniFFI` so foreign code can supply it.
///
/// # Examples
///
/// ```rust
/// use fxaccounts_core::logger::{Logger, LogLevel};
///
/// struct MyLogger;
///
/// impl Logger for MyLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{:?}] {}", level, message);
///     }
/// }
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Receives one formatted record.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the application.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the application to continue running.
    Error,
}

static HOST_LOGGER: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// `log` backend handing records to the host logger.
struct HostBridge;

impl log::Log for HostBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        should_forward(metadata.target(), metadata.level())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(logger) = HOST_LOGGER.get() {
            logger.log(
                log_level(record.level()),
                format!("{}: {}", record.target(), record.args()),
            );
        }
    }

    fn flush(&self) {}
}

/// Debug and trace records of dependencies (HTTP and TLS stack) are dropped.
fn should_forward(target: &str, level: log::Level) -> bool {
    level <= log::Level::Info || target.starts_with("fxaccounts")
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

/// Routes the crate's log output to `logger`.
///
/// Only the first call takes effect; the `log` facade accepts a single backend per
/// process.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    static BRIDGE: HostBridge = HostBridge;

    if HOST_LOGGER.set(logger).is_err() {
        log::warn!("host logger already installed, ignoring");
        return;
    }
    if log::set_logger(&BRIDGE).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    } else {
        eprintln!("fxaccounts: another log backend is already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarding_filter() {
        assert!(should_forward("fxaccounts_core::session", log::Level::Debug));
        assert!(should_forward("hyper::proto", log::Level::Warn));
        assert!(!should_forward("hyper::proto", log::Level::Trace));
        assert!(!should_forward("rustls::client", log::Level::Debug));
    }

    struct Capture(std::sync::Mutex<Vec<(LogLevel, String)>>);

    impl Logger for Capture {
        fn log(&self, level: LogLevel, message: String) {
            self.0.lock().unwrap().push((level, message));
        }
    }

    #[test]
    fn test_records_reach_the_host_logger() {
        let capture = Arc::new(Capture(std::sync::Mutex::new(Vec::new())));
        set_logger(capture.clone());
        log::info!(target: "fxaccounts_core::logger", "hello host");
        log::debug!(target: "hyper::proto", "chatty");

        let records = capture.0.lock().unwrap();
        assert!(records.contains(&(
            LogLevel::Info,
            "fxaccounts_core::logger: hello host".to_string()
        )));
        assert!(!records.iter().any(|(_, message)| message.contains("chatty")));
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(log_level(log::Level::Error), LogLevel::Error);
        assert_eq!(log_level(log::Level::Trace), LogLevel::Trace);
    }
}
