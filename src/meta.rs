//! Resolved spool configuration and the filesystem work that hangs off it:
//! opening the active file, naming archives, compressing them and pruning old
//! ones.

use {
    crate::{Clock, Compression, LogSpoolError},
    chrono::NaiveDate,
    crossbeam_channel::Sender,
    flate2::GzBuilder,
    regex::Regex,
    std::{
        fs::{self, Permissions},
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::Arc,
        thread,
        time::UNIX_EPOCH,
    },
    tracing::{debug, error, warn},
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Configuration shared by the worker and the archive threads.
/// Every field is final once the spool is built.
#[derive(Clone)]
pub(crate) struct SpoolMeta {
    /// Absolute directory holding the active file and its archives.
    pub(crate) directory: PathBuf,
    /// Base name of the active file.
    pub(crate) filename: PathBuf,
    /// Rotate once the active file reaches this many bytes. Never zero.
    pub(crate) size_threshold: Option<u64>,
    /// Rotate whenever the calendar day reported by `clock` changes.
    pub(crate) daily_rotation: bool,
    /// Codec applied to archives in the background.
    pub(crate) compression: Option<Compression>,
    /// Number of archives to retain, newest first.
    pub(crate) max_keep_files: Option<u64>,
    /// Unix permission bits for the active file and compressed archives.
    pub(crate) file_mode: Option<u32>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl SpoolMeta {
    /// Path of the file currently receiving messages.
    pub(crate) fn active_path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    /// Archive path for a rotation: `<file>.<YYYYMMDD><index>`.
    pub(crate) fn archive_path(&self, date: NaiveDate, index: u64) -> PathBuf {
        self.directory.join(format!(
            "{}.{}{}",
            self.filename.to_string_lossy(),
            date.format("%Y%m%d"),
            index
        ))
    }

    /// Matches archives of this file, compressed or not. Group 2 is the
    /// rotation index.
    fn archive_pattern(&self) -> Result<Regex, LogSpoolError> {
        let filename = regex::escape(&self.filename.to_string_lossy());
        Regex::new(&format!(r"^{filename}\.(\d{{8}})(\d+)(\.gz|\.xz)?$"))
            .map_err(|err| LogSpoolError::InternalError(err.to_string()))
    }

    /// List the archives in the directory, sorted by rotation index.
    /// A compressed archive and its not-yet-removed source share an index.
    fn list_archives(&self) -> Result<Vec<(u64, PathBuf)>, LogSpoolError> {
        let pattern = self.archive_pattern()?;
        let mut archives = Vec::new();
        for file in fs::read_dir(&self.directory)?.flatten() {
            if !file.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let index = file
                .file_name()
                .to_str()
                .and_then(|name| pattern.captures(name))
                .and_then(|captures| captures.get(2))
                .and_then(|index| index.as_str().parse::<u64>().ok());
            if let Some(index) = index {
                archives.push((index, file.path()));
            }
        }
        archives.sort();
        Ok(archives)
    }

    /// The highest rotation index already present on disk, or 0.
    ///
    /// Seeding the rotation counter with this keeps a restarted process from
    /// renaming over the archives of a previous run on the same day.
    pub(crate) fn last_rotation_index(&self) -> u64 {
        if !self.directory.is_dir() {
            return 0;
        }
        match self.list_archives() {
            Ok(archives) => archives.last().map_or(0, |(index, _)| *index),
            Err(err) => {
                warn!(error = %err, directory = ?self.directory, "failed to scan existing log archives");
                0
            }
        }
    }

    /// Open the active file for appending. The directory is only created
    /// when the first attempt finds it missing, so an unusable path keeps
    /// failing cheaply on every retry.
    pub(crate) fn open_active(&self) -> Result<fs::File, LogSpoolError> {
        let path = self.active_path();
        let open = || fs::OpenOptions::new().append(true).create(true).open(&path);

        let file = match open() {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.directory).map_err(|err| {
                    LogSpoolError::CreateDirectoryFailed(self.directory.clone(), err.to_string())
                })?;
                debug!(directory = ?self.directory, "created log directory");
                open().map_err(|err| LogSpoolError::CreateFileFailed(path.clone(), err.to_string()))?
            }
            Err(err) => return Err(LogSpoolError::CreateFileFailed(path.clone(), err.to_string())),
        };

        if let Err(err) = self.set_permissions(&path) {
            warn!(error = %err, "keeping log file with default permissions");
        }
        Ok(file)
    }

    /// Apply the configured file mode. A no-op when none is configured.
    fn set_permissions(&self, path: &Path) -> Result<(), LogSpoolError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|err| {
                    LogSpoolError::SetFilePermissionsError {
                        path: path.to_path_buf(),
                        error: err.to_string(),
                    }
                })?;
            }
            #[cfg(not(unix))]
            {
                let _ = (mode, path);
                warn!("setting file permissions is not supported on non-Unix platforms");
            }
        }
        Ok(())
    }

    /// Compress an archive next to itself and remove the source.
    ///
    /// On failure the partial output is removed and the source is left in
    /// place. Returns the compressed path, or `None` without compression.
    fn compress(&self, log_path: &Path) -> Result<Option<PathBuf>, LogSpoolError> {
        let Some(compression) = &self.compression else {
            return Ok(None);
        };
        let compressed_path = PathBuf::from(format!(
            "{}.{}",
            log_path.to_string_lossy(),
            compression.get_extension()
        ));

        if let Err(err) = encode(compression, log_path, &compressed_path) {
            if compressed_path.is_file() {
                if let Err(remove_err) = fs::remove_file(&compressed_path) {
                    warn!(error = ?remove_err, path = ?compressed_path, "failed to remove partial archive");
                }
            }
            return Err(LogSpoolError::CompressFileError {
                path: log_path.to_path_buf(),
                error: err.to_string(),
            });
        }

        if let Err(err) = self.set_permissions(&compressed_path) {
            warn!(error = %err, "keeping compressed log archive with default permissions");
        }
        fs::remove_file(log_path)?;
        Ok(Some(compressed_path))
    }

    /// Delete the oldest archives beyond `max_keep_files`.
    fn prune_archives(&self) -> Result<(), LogSpoolError> {
        let Some(max_keep_files) = self.max_keep_files else {
            return Ok(());
        };
        let archives = self.list_archives()?;
        let mut indices: Vec<u64> = archives.iter().map(|(index, _)| *index).collect();
        indices.dedup();

        let keep = usize::try_from(max_keep_files).unwrap_or(usize::MAX);
        let stale = &indices[..indices.len().saturating_sub(keep)];
        for (index, path) in &archives {
            if stale.binary_search(index).is_ok() {
                match fs::remove_file(path) {
                    Ok(()) => debug!(path = ?path, "removed old log archive"),
                    Err(err) => warn!(error = ?err, path = ?path, "failed to remove old log archive"),
                }
            }
        }
        Ok(())
    }

    /// Compress and prune after a rotation.
    fn process_archive(&self, archive_path: &Path) {
        match self.compress(archive_path) {
            Ok(Some(compressed_path)) => debug!(path = ?compressed_path, "log archive compressed"),
            Ok(None) => {}
            Err(err) => error!(error = %err, "failed to compress log archive"),
        }
        if let Err(err) = self.prune_archives() {
            error!(error = %err, directory = ?self.directory, "failed to prune log archives");
        }
    }

    /// Start the thread that compresses and prunes archives, one at a time
    /// and in rotation order. Returns `None` when there is nothing to do for
    /// archives or the thread could not be started.
    ///
    /// The thread exits once the returned sender is dropped and its backlog
    /// is done. Nothing joins it, so an in-flight compression is abandoned
    /// if the process exits first.
    pub(crate) fn spawn_archiver(&self) -> Option<Sender<PathBuf>> {
        if self.compression.is_none() && self.max_keep_files.is_none() {
            return None;
        }
        let (tx, rx) = crossbeam_channel::unbounded::<PathBuf>();
        let meta = self.clone();
        let spawned = thread::Builder::new()
            .name("logspool-archive".into())
            .spawn(move || {
                for archive_path in rx {
                    meta.process_archive(&archive_path);
                }
            });
        match spawned {
            Ok(_) => Some(tx),
            Err(err) => {
                error!(error = ?err, "failed to spawn log archive thread");
                None
            }
        }
    }
}

/// Write `source` through `compression` into a new file at `target`.
/// Gzip streams carry the source's file name and modification time.
fn encode(compression: &Compression, source: &Path, target: &Path) -> io::Result<()> {
    let infile = fs::File::open(source)?;
    let metadata = infile.metadata()?;
    let mut reader = io::BufReader::new(infile);
    let mut writer = io::BufWriter::new(fs::File::create(target)?);

    match compression {
        Compression::Gzip => {
            let name = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                .and_then(|since_epoch| u32::try_from(since_epoch.as_secs()).ok())
                .unwrap_or(0);
            let mut encoder = GzBuilder::new()
                .filename(name)
                .mtime(mtime)
                .write(&mut writer, flate2::Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?;
        }
        Compression::XZ => lzma_rs::xz_compress(&mut reader, &mut writer)?,
    }
    writer.flush()
}
