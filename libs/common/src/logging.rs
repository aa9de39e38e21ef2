//! Unified logging module for the pulse counter service
//!
//! Console output plus a size-rotated log file, both using the same
//! `timestamp [LEVEL] message` line format.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

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

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] serving at 0.0.0.0:8000`
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
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

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

// Keeps the non-blocking file writer alive for the process lifetime
static GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();

/// Default max log file size before rotation: 1 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Default number of rotated backups kept next to the live log file
pub const DEFAULT_MAX_BACKUPS: usize = 3;

/// Size-rotating file writer.
///
/// The live file is `path`; on overflow it becomes `path.1`, the previous
/// `path.1` becomes `path.2`, and so on up to `max_backups`. The oldest
/// backup is overwritten.
struct RotatingFileWriter {
    path: PathBuf,
    file: File,
    size: u64,
    max_file_size: u64,
    max_backups: usize,
}

impl RotatingFileWriter {
    fn new(path: PathBuf, max_file_size: u64, max_backups: usize) -> std::io::Result<Self> {
        let file = open_append(&path)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            file,
            size,
            max_file_size,
            max_backups,
        })
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.file.flush()?;

        if self.max_backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            for index in (1..self.max_backups).rev() {
                let from = backup_path(&self.path, index);
                if from.exists() {
                    fs::rename(&from, backup_path(&self.path, index + 1))?;
                }
            }
            if self.path.exists() {
                fs::rename(&self.path, backup_path(&self.path, 1))?;
            }
            self.file = open_append(&self.path)?;
        }

        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_file_size {
            self.rotate()?;
        }

        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// `pulse_counter.log` -> `pulse_counter.log.<index>`
fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name (e.g., "pulsesrv")
    pub service_name: String,
    /// Log file path; backups are written next to it
    pub log_file: PathBuf,
    /// Console log level
    pub console_level: Level,
    /// File log level
    pub file_level: Level,
    /// Size in bytes at which the log file is rotated
    pub max_file_size: u64,
    /// Number of rotated files to keep
    pub max_backups: usize,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_file: PathBuf::from("service.log"),
            console_level: Level::INFO,
            file_level: Level::INFO,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_backups: DEFAULT_MAX_BACKUPS,
            ansi: true,
        }
    }
}

/// Parse log level string to `tracing::Level`, falling back to INFO
pub fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging system with configuration
///
/// `RUST_LOG`, when set, replaces the global filter; the per-output levels
/// from `config` still apply on top of it.
pub fn init_with_config(config: LogConfig) -> Result<()> {
    if let Some(dir) = config
        .log_file
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
    {
        fs::create_dir_all(dir)?;
    }

    let file_writer = RotatingFileWriter::new(
        config.log_file.clone(),
        config.max_file_size,
        config.max_backups,
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_writer);

    let guards = GUARDS.get_or_init(|| Mutex::new(Vec::new()));
    match guards.lock() {
        Ok(mut guards) => guards.push(guard),
        Err(poisoned) => poisoned.into_inner().push(guard),
    }

    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() && EnvFilter::try_new(&directives).is_ok() => {
            EnvFilter::new(directives)
        },
        _ => {
            let widest = config.console_level.max(config.file_level);
            EnvFilter::new(widest.as_str().to_lowercase())
        },
    };

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .with_filter(LevelFilter::from_level(config.console_level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(BracketedLevelFormat)
        .with_filter(LevelFilter::from_level(config.file_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!("Logging: {} @ {:?}", config.service_name, config.log_file);
    Ok(())
}

// ============================================================================
// HTTP API Request Logging Middleware
// ============================================================================

/// HTTP API request logger middleware
///
/// Logs every request under the `api_access` target: method, path, status
/// and duration. Reads are logged at DEBUG, server errors at WARN.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn(common::logging::http_request_logger));
/// ```
#[cfg(feature = "axum")]
pub async fn http_request_logger(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use std::time::Instant;
    use tracing::{debug, warn};

    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(
            target: "api_access",
            method = %method,
            path = %uri.path(),
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "HTTP request failed"
        );
    } else {
        debug!(
            target: "api_access",
            method = %method,
            path = %uri.path(),
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "HTTP request"
        );
    }

    response
}
