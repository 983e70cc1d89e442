//! Unified logging module for VoltageEMS PV services
//!
//! Every service writes a daily file `{YYYYMMDD}_{service}.log` under its log
//! directory. A console layer is added only when the terminal is not owned
//! by a full-screen dashboard.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Connected to 10.88.45.1:6607`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking writer alive for the process lifetime
static GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();

// ============================================================================
// Log Root Directory Configuration
// ============================================================================

/// Global log root directory (initialized once from config or env)
static LOG_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Initialize log root directory from config or environment
///
/// Priority:
/// 1. `VOLTAGE_LOG_DIR` environment variable (highest)
/// 2. `config_dir` parameter
/// 3. Default value "logs" (lowest)
pub fn init_log_root(config_dir: Option<&str>) {
    LOG_ROOT.get_or_init(|| resolve_log_root(std::env::var("VOLTAGE_LOG_DIR").ok(), config_dir));
}

fn resolve_log_root(env_dir: Option<String>, config_dir: Option<&str>) -> PathBuf {
    env_dir
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| config_dir.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Get log root directory
///
/// Falls back to the environment variable or "logs" if
/// [`init_log_root`] was never called.
pub fn get_log_root() -> PathBuf {
    LOG_ROOT
        .get()
        .cloned()
        .unwrap_or_else(|| resolve_log_root(std::env::var("VOLTAGE_LOG_DIR").ok(), None))
}

// ============================================================================
// Daily rolling file writer
// ============================================================================

fn log_file_name(date: &str, service_name: &str) -> String {
    format!("{}_{}.log", date, service_name)
}

/// Daily rolling file writer with naming format `{YYYYMMDD}_{service}.log`
///
/// The file is reopened when the date changes or when it was deleted
/// underneath the process (e.g. by logrotate).
struct DailyRollingWriter {
    service_name: String,
    log_dir: PathBuf,
    state: Arc<Mutex<RollingState>>,
}

struct RollingState {
    date: String,
    file: File,
}

impl DailyRollingWriter {
    fn new(service_name: String, log_dir: PathBuf) -> std::io::Result<Self> {
        let date = chrono::Local::now().format("%Y%m%d").to_string();
        let file = open_append(&log_dir, &log_file_name(&date, &service_name))?;

        Ok(Self {
            service_name,
            log_dir,
            state: Arc::new(Mutex::new(RollingState { date, file })),
        })
    }

    fn with_current_file<T>(
        &self,
        op: impl FnOnce(&mut File) -> std::io::Result<T>,
    ) -> std::io::Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))?;

        let today = chrono::Local::now().format("%Y%m%d").to_string();
        let current_path = self
            .log_dir
            .join(log_file_name(&state.date, &self.service_name));

        if state.date != today || !current_path.exists() {
            state.file = open_append(&self.log_dir, &log_file_name(&today, &self.service_name))?;
            state.date = today;
        }

        op(&mut state.file)
    }
}

fn open_append(dir: &Path, name: &str) -> std::io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))
}

impl Write for DailyRollingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.with_current_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.with_current_file(|file| file.flush())
    }
}

// ============================================================================
// Initialisation
// ============================================================================

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name (e.g., "pvsrv")
    pub service_name: String,
    /// Directory for this service's log files
    pub log_dir: PathBuf,
    /// Default level when `RUST_LOG` is not set
    pub level: Level,
    /// Also log to stderr
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_dir: get_log_root(),
            level: Level::INFO,
            console: true,
        }
    }
}

/// Build the filter directive used when `RUST_LOG` is absent
fn default_filter(config: &LogConfig) -> String {
    let service_level = if config.level > Level::DEBUG {
        config.level
    } else {
        Level::DEBUG
    };
    format!(
        "{},{}={}",
        config.level.as_str().to_lowercase(),
        config.service_name,
        service_level.as_str().to_lowercase()
    )
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let writer = DailyRollingWriter::new(config.service_name.clone(), config.log_dir.clone())?;
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    let guards = GUARDS.get_or_init(|| Mutex::new(Vec::new()));
    match guards.lock() {
        Ok(mut guards) => guards.push(guard),
        Err(poisoned) => poisoned.into_inner().push(guard),
    }

    // RUST_LOG wins over the configured level
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.is_empty() => EnvFilter::new(env_str),
        _ => EnvFilter::new(default_filter(&config)),
    };

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(BracketedLevelFormat)
        .boxed();

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .event_format(BracketedLevelFormat)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!("Logging: {} @ {:?}", config.service_name, config.log_dir);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_resolve_log_root_priority() {
        assert_eq!(
            resolve_log_root(Some("/var/log/voltage".into()), Some("cfg")),
            PathBuf::from("/var/log/voltage")
        );
        assert_eq!(resolve_log_root(None, Some("cfg")), PathBuf::from("cfg"));
        assert_eq!(resolve_log_root(Some(String::new()), None), PathBuf::from("logs"));
    }

    #[test]
    fn test_default_filter_keeps_service_at_debug() {
        let config = LogConfig {
            service_name: "pvsrv".into(),
            level: Level::INFO,
            ..Default::default()
        };
        assert_eq!(default_filter(&config), "info,pvsrv=debug");

        let config = LogConfig {
            service_name: "pvsrv".into(),
            level: Level::TRACE,
            ..Default::default()
        };
        assert_eq!(default_filter(&config), "trace,pvsrv=trace");
    }

    #[test]
    fn test_daily_writer_creates_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            DailyRollingWriter::new("pvsrv".into(), dir.path().join("pvsrv")).unwrap();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        let date = chrono::Local::now().format("%Y%m%d").to_string();
        let path = dir.path().join("pvsrv").join(log_file_name(&date, "pvsrv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "hello\n");
    }

    #[test]
    fn test_daily_writer_recreates_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DailyRollingWriter::new("pvsrv".into(), dir.path().to_path_buf()).unwrap();
        let date = chrono::Local::now().format("%Y%m%d").to_string();
        let path = dir.path().join(log_file_name(&date, "pvsrv"));

        fs::remove_file(&path).unwrap();
        writer.write_all(b"again\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "again\n");
    }
}
