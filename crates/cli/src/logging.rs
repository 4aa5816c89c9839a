//! Information and error log files
//!
//! Everything at or above the configured level goes to the information log;
//! warnings and errors are also written to the error log.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Where and how much to log
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub dir: PathBuf,
    pub info_file: String,
    pub error_file: String,
    pub level: String,
    pub remove_existing: bool,
}

/// Keeps the background writers alive; dropping it flushes both logs
pub struct LogGuards {
    _info: WorkerGuard,
    _error: WorkerGuard,
}

/// Parse a `--log-level` value
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warning" | "warn" => Some(LevelFilter::WARN),
        "error" | "critical" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Reduce a log file argument to its base name
fn file_name(name: &str) -> Result<String> {
    match Path::new(name).file_name().and_then(|n| n.to_str()) {
        Some(base) => Ok(base.to_string()),
        None => bail!("Invalid log file name {:?}", name),
    }
}

/// Create the log directory and resolve both log file names
///
/// With `remove_existing` any previous log files are deleted first.
fn prepare(options: &LogOptions) -> Result<(String, String)> {
    std::fs::create_dir_all(&options.dir).with_context(|| {
        format!("Failed to create log directory {}", options.dir.display())
    })?;

    let info_name = file_name(&options.info_file)?;
    let error_name = file_name(&options.error_file)?;

    if options.remove_existing {
        for name in [&info_name, &error_name] {
            let path = options.dir.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove log file {}", path.display()))
                }
            }
        }
    }

    Ok((info_name, error_name))
}

/// Install the global subscriber
pub fn init(options: &LogOptions) -> Result<LogGuards> {
    let (info_name, error_name) = prepare(options)?;

    let parsed = parse_level(&options.level);
    let level = parsed.unwrap_or(LevelFilter::TRACE);

    let (info_writer, info_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&options.dir, info_name));
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&options.dir, error_name));

    let info_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(info_writer)
                .with_ansi(false)
                .with_filter(info_filter),
        )
        .with(
            fmt::layer()
                .with_writer(error_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::WARN),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    if parsed.is_none() {
        tracing::warn!(level = %options.level, "Unknown log level; logging everything");
    }

    Ok(LogGuards {
        _info: info_guard,
        _error: error_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dir: &Path) -> LogOptions {
        LogOptions {
            dir: dir.join("logs"),
            info_file: "log.info".to_string(),
            error_file: "/var/tmp/log.error".to_string(),
            level: "info".to_string(),
            remove_existing: false,
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Some(LevelFilter::TRACE));
        assert_eq!(parse_level("debug"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level("info"), Some(LevelFilter::INFO));
        assert_eq!(parse_level("WARNING"), Some(LevelFilter::WARN));
        assert_eq!(parse_level("critical"), Some(LevelFilter::ERROR));
        assert_eq!(parse_level("off"), Some(LevelFilter::OFF));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_file_names_keep_base_name_only() {
        assert_eq!(file_name("log.info").unwrap(), "log.info");
        assert_eq!(file_name("../elsewhere/log.error").unwrap(), "log.error");
        assert!(file_name("..").is_err());
    }

    #[test]
    fn test_prepare_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let options = options(tmp.path());

        let (info, error) = prepare(&options).unwrap();
        assert!(options.dir.is_dir());
        assert_eq!(info, "log.info");
        assert_eq!(error, "log.error");
    }

    #[test]
    fn test_prepare_removes_previous_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = options(tmp.path());

        let (name, _) = prepare(&options).unwrap();
        let info = options.dir.join(name);
        std::fs::write(&info, "old run\n").unwrap();

        prepare(&options).unwrap();
        assert!(info.exists());

        options.remove_existing = true;
        prepare(&options).unwrap();
        assert!(!info.exists());
    }
}
