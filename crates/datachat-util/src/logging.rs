use chrono::Local;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the non-blocking file writer alive. Dropping it flushes and stops
/// file logging, so the binary holds it until exit.
pub struct LoggingGuard {
    pub log_path: Option<PathBuf>,
    _worker: Option<WorkerGuard>,
}

fn env_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info").to_ascii_lowercase()))
}

pub fn log_file_path(log_dir: Option<PathBuf>) -> PathBuf {
    let log_dir = log_dir.unwrap_or_else(|| PathBuf::from("."));
    let timestamp = Local::now().format("%Y-%m-%dT%H%M%S").to_string();
    log_dir.join(format!("{}.log", timestamp))
}

/// Installs the global subscriber. With `print` the log goes to stderr,
/// otherwise to `<log_dir>/<timestamp>.log`. `RUST_LOG` overrides `level`.
/// A second call is a no-op apart from the returned path.
pub fn init_tracing(level: Option<&str>, log_dir: Option<PathBuf>, print: bool) -> LoggingGuard {
    if print {
        let _ = tracing_subscriber::registry()
            .with(env_filter(level))
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init();
        return LoggingGuard {
            log_path: None,
            _worker: None,
        };
    }

    let log_path = log_file_path(log_dir);
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .ok();

    let Some(file) = file else {
        return LoggingGuard {
            log_path: None,
            _worker: None,
        };
    };

    let (non_blocking, worker) = tracing_appender::non_blocking(file);
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init();

    LoggingGuard {
        log_path: Some(log_path),
        _worker: Some(worker),
    }
}
