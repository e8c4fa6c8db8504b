use std::{io, path::PathBuf};

/// Errors that can occur inside the log spool.
///
/// Only [`LogSpoolBuilder::build`](crate::LogSpoolBuilder::build) and
/// [`LogSpool::shutdown`](crate::LogSpool::shutdown) hand these back to the
/// caller. Everything that happens on the worker or on an archive thread is
/// reported through `tracing` and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum LogSpoolError {
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError { from: PathBuf, to: PathBuf, error: String },
    #[error("Failed to compress '{path}': {error}")]
    CompressFileError { path: PathBuf, error: String },
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("Failed to spawn log worker thread: {0}")]
    SpawnWorkerFailed(io::Error),
    #[error("File IO error: {0}")]
    FileIOError(#[from] io::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
}
