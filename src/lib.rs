//! # LogSpool
//!
//! LogSpool is a log file writer for long-running services. Producers on any
//! thread hand it formatted log lines; a single background worker appends them
//! to one active file and rotates that file when it grows past a size
//! threshold or when the calendar day changes. Rotated files can be gzip
//! compressed in the background.
//!
//! Appending never fails and never waits on the disk. Lines go into a bounded
//! queue of [`QUEUE_CAPACITY`] messages; the call only blocks when that queue
//! is full, which throttles producers when the disk cannot keep up instead of
//! buffering without limit. Failures on the worker side are reported through
//! `tracing` and otherwise swallowed.
//!
//! File layout:
//!
//! ```text
//! <directory>/<file>                      active file
//! <directory>/<file>.<YYYYMMDD><index>    rotated file
//! <directory>/<file>.<YYYYMMDD><index>.gz rotated file, compressed
//! ```
//!
//! ## Example
//!
//! ```rust
//! use {
//!    logspool::{LogSpoolBuilder, RotationSize},
//!    tracing_subscriber::util::SubscriberInitExt,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!    let spool = LogSpoolBuilder::new()
//!        .directory("./logs")
//!        .file_name("tracing.log")
//!        .size_threshold(RotationSize::MB(100)) // Rotate at 100 MB
//!        .daily_rotation(true) // ...and at local midnight
//!        .compress(true) // Gzip rotated files
//!        .build()?;
//!    tracing_subscriber::fmt()
//!        .with_writer(spool)
//!        .with_ansi(false)
//!        .finish()
//!        .try_init()?;
//!
//!    tracing::info!("This is an info message");
//!    tracing::warn!("This is a warning message");
//!
//!    Ok(())
//! }
//! ```
use {
    crate::{
        meta::SpoolMeta,
        worker::{Message, Worker},
    },
    chrono::{FixedOffset, Local, NaiveDate, Utc},
    crossbeam_channel::Sender,
    std::{
        io,
        path::{Path, PathBuf},
        sync::Arc,
        thread::{self, JoinHandle, ThreadId},
    },
    tracing::{error, warn},
    tracing_subscriber::fmt::MakeWriter,
};

mod config;
mod error;
mod meta;
mod worker;

pub use {config::LogSpoolConfig, error::LogSpoolError};

/// Number of messages the queue holds before [`LogSpool::append`] blocks.
pub const QUEUE_CAPACITY: usize = 1000;

/// Size threshold for rotating the active file.
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `GB` - Gigabytes (1 GB = 1024 MB)
///
/// A threshold of zero bytes disables size-based rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// The threshold in bytes.
    pub fn bytes(&self) -> u64 {
        match *self {
            RotationSize::Bytes(b) => b,
            RotationSize::KB(kb) => kb.saturating_mul(1024),
            RotationSize::MB(mb) => mb.saturating_mul(1024 * 1024),
            RotationSize::GB(gb) => gb.saturating_mul(1024 * 1024 * 1024),
        }
    }
}

/// Compression applied to rotated files in the background.
///
/// The compressed file is written next to the rotated one with the codec's
/// extension appended, and the uncompressed file is removed once compression
/// succeeds. If compression fails the uncompressed file is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Gzip, `.gz`. The gzip header records the rotated file's name and
    /// modification time.
    Gzip,
    /// XZ, `.xz`. Smaller output, slower, no name or time metadata.
    XZ,
}

impl Compression {
    /// Get the extension for the compressed log file.
    fn get_extension(&self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::XZ => "xz",
        }
    }
}

/// Source of the calendar date that drives daily rotation and archive names.
///
/// [`TimeZone`] implements it; tests and embedders can supply their own to
/// control when a day ends.
pub trait Clock: Send + Sync + 'static {
    /// The current date.
    fn today(&self) -> NaiveDate;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

/// Time zone deciding where one day ends and the next begins.
///
/// # Examples
/// ```
/// use logspool::TimeZone;
/// use chrono::FixedOffset;
///
/// // Process-local calendar (the default)
/// let local = TimeZone::Local;
///
/// // Same day boundaries on every host
/// let utc = TimeZone::UTC;
///
/// // A fixed region, e.g. UTC+8
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZone {
    UTC,
    /// The system's local time zone, re-read on every check so daylight
    /// saving changes are followed.
    Local,
    Fix(FixedOffset),
}

impl Clock for TimeZone {
    fn today(&self) -> NaiveDate {
        match self {
            TimeZone::UTC => Utc::now().date_naive(),
            TimeZone::Local => Local::now().date_naive(),
            TimeZone::Fix(offset) => Utc::now().with_timezone(offset).date_naive(),
        }
    }
}

/// Fluent configuration for a [`LogSpool`].
///
/// # Default Configuration
///
/// * Directory: `log/` next to the running executable
/// * File name: the executable's name plus `.log`
/// * No size-based rotation
/// * No daily rotation
/// * No compression
/// * Keep all rotated files
/// * Process-local calendar
///
/// # Examples
///
/// ```rust
/// use logspool::{LogSpoolBuilder, RotationSize};
///
/// let spool = LogSpoolBuilder::new()
///     .directory("./logs")
///     .file_name("orders.log")
///     .size_threshold(RotationSize::MB(64))
///     .daily_rotation(true)
///     .compress(true)
///     .max_keep_files(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct LogSpoolBuilder {
    directory: Option<PathBuf>,
    filename: Option<PathBuf>,
    size_threshold: Option<RotationSize>,
    daily_rotation: bool,
    compression: Option<Compression>,
    max_keep_files: Option<u64>,
    file_mode: Option<u32>,
    clock: Arc<dyn Clock>,
}

impl Default for LogSpoolBuilder {
    fn default() -> Self {
        Self {
            directory: None,
            filename: None,
            size_threshold: None,
            daily_rotation: false,
            compression: None,
            max_keep_files: None,
            file_mode: None,
            clock: Arc::new(TimeZone::Local),
        }
    }
}

impl LogSpoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a deserialized [`LogSpoolConfig`].
    pub fn from_config(config: &LogSpoolConfig) -> Self {
        let mut builder = Self::new()
            .daily_rotation(config.daily_rotation)
            .compress(config.compress);
        if let Some(path) = &config.path {
            builder = builder.directory(path);
        }
        if let Some(file_name) = &config.file_name {
            builder = builder.file_name(file_name);
        }
        if let Some(size_threshold) = config.size_threshold {
            builder = builder.size_threshold(RotationSize::Bytes(size_threshold));
        }
        if let Some(max_keep_files) = config.max_keep_files {
            builder = builder.max_keep_files(max_keep_files);
        }
        if let Some(file_mode) = config.file_mode {
            builder = builder.file_mode(file_mode);
        }
        builder
    }

    /// Set the directory of the active file. Relative paths are resolved
    /// against the current directory when the spool is built.
    pub fn directory<P: AsRef<Path>>(self, directory: P) -> Self {
        Self {
            directory: Some(directory.as_ref().to_path_buf()),
            ..self
        }
    }

    /// Set the base name of the active file.
    pub fn file_name<P: AsRef<Path>>(self, filename: P) -> Self {
        Self {
            filename: Some(filename.as_ref().to_path_buf()),
            ..self
        }
    }

    /// Rotate once the active file reaches `size`.
    pub fn size_threshold(self, size: RotationSize) -> Self {
        Self {
            size_threshold: Some(size),
            ..self
        }
    }

    /// Rotate when the calendar day changes.
    pub fn daily_rotation(self, daily_rotation: bool) -> Self {
        Self { daily_rotation, ..self }
    }

    /// Set the compression type for rotated files.
    pub fn compression(self, compression: Compression) -> Self {
        Self {
            compression: Some(compression),
            ..self
        }
    }

    /// Gzip rotated files, or turn compression off.
    pub fn compress(self, compress: bool) -> Self {
        Self {
            compression: compress.then_some(Compression::Gzip),
            ..self
        }
    }

    /// Keep at most `max_keep_files` rotated files, deleting the oldest.
    pub fn max_keep_files(self, max_keep_files: u64) -> Self {
        Self {
            max_keep_files: Some(max_keep_files),
            ..self
        }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    /// This sets the file mode bits in octal notation like when using chmod.
    /// For example, 0o644 for rw-r--r-- permissions.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            file_mode: Some(mode),
            ..self
        }
    }

    /// Set the time zone that decides when a day ends.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        self.clock(time_zone)
    }

    /// Replace the date source.
    pub fn clock<C: Clock>(self, clock: C) -> Self {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    /// Open the active file and start the worker.
    ///
    /// A directory or file that cannot be created does not fail the build:
    /// the error is logged and the worker retries on every message, dropping
    /// messages until the file opens. The only error returned is failure to
    /// spawn the worker thread.
    pub fn build(self) -> Result<LogSpool, LogSpoolError> {
        let meta = self.into_meta();
        let file = match meta.open_active() {
            Ok(file) => Some(file),
            Err(err) => {
                error!(error = %err, path = ?meta.active_path(), "failed to open log file");
                None
            }
        };
        let current_date = meta.clock.today();
        let rotation_counter = meta.last_rotation_index();

        let (tx, rx) = crossbeam_channel::bounded(QUEUE_CAPACITY);
        let worker = Worker::new(rx, meta, file, current_date, rotation_counter);
        let handle = thread::Builder::new()
            .name("logspool-worker".into())
            .spawn(move || worker.run())
            .map_err(LogSpoolError::SpawnWorkerFailed)?;

        Ok(LogSpool {
            shared: Arc::new(Shared {
                tx,
                worker_id: handle.thread().id(),
            }),
            worker: Some(handle),
        })
    }

    fn into_meta(self) -> SpoolMeta {
        let (default_directory, default_filename) = default_location();
        let directory = self.directory.unwrap_or(default_directory);
        SpoolMeta {
            directory: std::path::absolute(&directory).unwrap_or(directory),
            filename: self.filename.unwrap_or(default_filename),
            size_threshold: self.size_threshold.map(|size| size.bytes()).filter(|bytes| *bytes > 0),
            daily_rotation: self.daily_rotation,
            compression: self.compression,
            max_keep_files: self.max_keep_files,
            file_mode: self.file_mode,
            clock: self.clock,
        }
    }
}

/// `<executable dir>/log` and `<executable name>.log`.
fn default_location() -> (PathBuf, PathBuf) {
    match std::env::current_exe() {
        Ok(exe) => {
            let directory = exe.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            let name = exe
                .file_name()
                .map_or_else(|| "app".to_string(), |name| name.to_string_lossy().into_owned());
            (directory.join("log"), PathBuf::from(format!("{name}.log")))
        }
        Err(err) => {
            warn!(error = ?err, "cannot locate the running executable, logging to ./log/app.log");
            (PathBuf::from("log"), PathBuf::from("app.log"))
        }
    }
}

/// Producer side of the queue, shared by the spool and its writers.
struct Shared {
    tx: Sender<Message>,
    worker_id: ThreadId,
}

impl Shared {
    fn on_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    fn append(&self, payload: &[u8]) -> usize {
        let message = Message::Payload(payload.to_vec());
        if self.on_worker_thread() {
            // The worker's own diagnostics can land here when the spool is
            // their sink; it must never wait on its own queue.
            self.tx.try_send(message).ok();
        } else {
            self.tx.send(message).ok();
        }
        payload.len()
    }

    fn flush_pending(&self) {
        if self.on_worker_thread() {
            return;
        }
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Message::Flush(ack_tx)).is_ok() {
            ack_rx.recv().ok();
        }
    }
}

/// A log file fed through a bounded queue and rotated by a background worker.
///
/// `LogSpool` is `Send + Sync`; share it behind an `Arc`, or hand out
/// [`SpoolWriter`]s with [`LogSpool::writer`]. It implements
/// [`io::Write`] and `tracing_subscriber`'s `MakeWriter`, so it can be the
/// writer of a `fmt` subscriber or sit behind `tracing_appender::non_blocking`.
///
/// Dropping the spool and every writer lets the worker drain what is queued
/// and exit; [`LogSpool::shutdown`] does the same and waits for it.
pub struct LogSpool {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl LogSpool {
    pub fn builder() -> LogSpoolBuilder {
        LogSpoolBuilder::new()
    }

    /// Queue `payload` for the active file and return its length.
    ///
    /// Blocks only while the queue is full. Whether the bytes reach the disk
    /// is not reported back.
    pub fn append(&self, payload: &[u8]) -> usize {
        self.shared.append(payload)
    }

    /// A cloneable handle that appends to this spool.
    pub fn writer(&self) -> SpoolWriter {
        SpoolWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Wait until every message queued before this call has been written to
    /// the active file. This does not fsync.
    pub fn flush_pending(&self) {
        self.shared.flush_pending();
    }

    /// Stop the worker once everything queued so far is written, and wait for
    /// it. Later appends through remaining writers are dropped.
    pub fn shutdown(mut self) -> Result<(), LogSpoolError> {
        self.shared.tx.send(Message::Shutdown).ok();
        if let Some(handle) = self.worker.take() {
            handle
                .join()
                .map_err(|_| LogSpoolError::InternalError("log worker thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl io::Write for LogSpool {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending();
        Ok(())
    }
}

impl io::Write for &LogSpool {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending();
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogSpool {
    type Writer = SpoolWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer()
    }
}

/// Producer handle for a [`LogSpool`]. Cheap to clone and usable from any
/// thread.
#[derive(Clone)]
pub struct SpoolWriter {
    shared: Arc<Shared>,
}

impl io::Write for SpoolWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.shared.append(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.shared.flush_pending();
        Ok(())
    }
}
