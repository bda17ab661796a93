//! Logging setup that writes every event to a dated file and the console,
//! and mirrors the latest severity into a status row of the database.
//!
//! ```no_run
//! use rowkit::logging::StatusLogger;
//!
//! let logger = StatusLogger::builder()
//!     .app_name("gerador")
//!     .status_config("config.json")
//!     .build()?;
//! logger.init()?;
//! tracing::info!("system running");
//! # Ok::<(), rowkit::AccessError>(())
//! ```

use crate::accessor::TableAccessor;
use crate::error::{AccessError, Result};
use crate::models::Value;
use crate::request::UpdateRequest;
use chrono::Local;
use std::cell::Cell;
use std::fmt::{self, Write as _};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Table holding the status row
pub const STATUS_TABLE: &str = "status_gerador_sinais";

/// Id of the status row
pub const STATUS_ROW_ID: i64 = 1;

/// Longest message stored in the `obs` column
pub const MAX_STATUS_MESSAGE_CHARS: usize = 500;

pub const DEFAULT_LOG_DIR: &str = "logger";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Events of this crate (the accessor logging its own work) never feed the
// status row; the status update would log again and recurse.
const INTERNAL_TARGET_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

thread_local! {
    static WRITING_STATUS: Cell<bool> = const { Cell::new(false) };
}

/// Status stored for an event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Online,
    Offline,
    Error,
}

impl StatusLabel {
    /// INFO → Online, WARN → Offline, ERROR → Error; DEBUG and TRACE map to nothing
    pub fn from_level(level: &Level) -> Option<Self> {
        match *level {
            Level::INFO => Some(StatusLabel::Online),
            Level::WARN => Some(StatusLabel::Offline),
            Level::ERROR => Some(StatusLabel::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Online => "Online",
            StatusLabel::Offline => "Offline",
            StatusLabel::Error => "Error",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of status updates
pub trait StatusSink: Send + Sync + 'static {
    fn record(&self, status: StatusLabel, message: &str) -> Result<()>;
}

/// Writes `status` and `obs` of row [`STATUS_ROW_ID`] in [`STATUS_TABLE`]
#[derive(Debug, Clone)]
pub struct DbStatusSink {
    accessor: TableAccessor,
}

impl DbStatusSink {
    pub fn new<P: Into<PathBuf>>(config_path: P) -> Self {
        Self {
            accessor: TableAccessor::new(config_path),
        }
    }
}

impl StatusSink for DbStatusSink {
    fn record(&self, status: StatusLabel, message: &str) -> Result<()> {
        let update = UpdateRequest::by_id(
            STATUS_ROW_ID,
            [
                ("status", Value::from(status.as_str())),
                ("obs", Value::from(message)),
            ],
        )?;
        self.accessor.run(STATUS_TABLE, &update.into()).map(|_| ())
    }
}

/// Tracing layer that forwards each event's status to a [`StatusSink`].
///
/// A failing sink is reported on stderr and otherwise ignored, so the other
/// layers keep receiving every event.
pub struct StatusLayer {
    sink: Arc<dyn StatusSink>,
}

impl StatusLayer {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for StatusLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(INTERNAL_TARGET_PREFIX) {
            return;
        }
        let Some(status) = StatusLabel::from_level(meta.level()) else {
            return;
        };
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let line = format!(
            "{} {} {}: {}",
            Local::now().format(TIMESTAMP_FORMAT),
            meta.level(),
            meta.target(),
            visitor.finish()
        );

        if let Err(e) = self.sink.record(status, &truncate_chars(&line, MAX_STATUS_MESSAGE_CHARS)) {
            eprintln!("Failed to update status in database: {e}");
        }
    }
}

struct ReentryGuard;

impl ReentryGuard {
    fn enter() -> Option<Self> {
        WRITING_STATUS.with(|flag| (!flag.replace(true)).then_some(ReentryGuard))
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        WRITING_STATUS.with(|flag| flag.set(false));
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Settings for [`StatusLogger`]
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for the daily log files (default: "logger")
    pub log_dir: PathBuf,
    /// Used in the log file name `log_<app_name>_<YYYY-MM-DD>.txt`
    pub app_name: String,
    /// Lowest level recorded (default: INFO)
    pub level: Level,
    /// Also write to stderr (default: true)
    pub console: bool,
    /// Let `RUST_LOG` override `level` (default: true)
    pub respect_env: bool,
    /// Config file whose database receives the status row (default: none)
    pub status_config_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            app_name: "app".to_string(),
            level: Level::INFO,
            console: true,
            respect_env: true,
            status_config_path: None,
        }
    }
}

impl LoggingConfig {
    /// Today's log file
    pub fn log_file_path(&self) -> PathBuf {
        let today = Local::now().format("%Y-%m-%d");
        self.log_dir
            .join(format!("log_{}_{}.txt", self.app_name, today))
    }
}

/// A composed subscriber: file sink, optional console sink, optional status
/// sink. Dropping it closes the log file once no dispatcher refers to it.
pub struct StatusLogger {
    dispatch: Dispatch,
    log_file: PathBuf,
}

impl StatusLogger {
    pub fn builder() -> StatusLoggerBuilder {
        StatusLoggerBuilder::default()
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this logger as the current thread's default
    pub fn with_default<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Install as the process-wide default. Fails if one is already set.
    pub fn init(self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch)
            .map_err(|e| AccessError::Logging(e.to_string()))
    }
}

#[derive(Default)]
pub struct StatusLoggerBuilder {
    config: LoggingConfig,
    sink: Option<Arc<dyn StatusSink>>,
}

impl StatusLoggerBuilder {
    pub fn config(mut self, config: LoggingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.config.level = level;
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    pub fn respect_env(mut self, enabled: bool) -> Self {
        self.config.respect_env = enabled;
        self
    }

    /// Mirror status into the database named by the config file at `path`.
    /// Replaces any sink set before.
    pub fn status_config<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.status_config_path = Some(path.into());
        self.sink = None;
        self
    }

    pub fn status_sink<S: StatusSink>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn shared_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<StatusLogger> {
        let config = self.config;
        fs::create_dir_all(&config.log_dir)?;
        let log_file = config.log_file_path();
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;

        let timer = ChronoLocal::new(TIMESTAMP_FORMAT.to_string());
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_timer(timer.clone());
        let console_layer = config.console.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(timer)
        });
        let sink = self.sink.or_else(|| {
            config
                .status_config_path
                .clone()
                .map(|path| Arc::new(DbStatusSink::new(path)) as Arc<dyn StatusSink>)
        });
        let status_layer = sink.map(StatusLayer::new);

        let default_level = LevelFilter::from_level(config.level);
        let builder = EnvFilter::builder().with_default_directive(default_level.into());
        let filter = if config.respect_env {
            builder.from_env_lossy()
        } else {
            builder.parse_lossy("")
        };

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .with(status_layer);

        Ok(StatusLogger {
            dispatch: Dispatch::new(subscriber),
            log_file,
        })
    }
}
