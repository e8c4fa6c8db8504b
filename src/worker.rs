//! The single consumer of the spool queue.
//!
//! ```text
//! ┌──────────────┐   bounded (1000)   ┌──────────────┐   append    ┌──────────────┐
//! │  producers   │ ──── channel ────► │    Worker    │ ──────────► │ active file  │
//! │ (any thread) │                    │  (bg thread) │             └──────┬───────┘
//! └──────────────┘                    └──────┬───────┘                    │ rename
//!                                            │ hand off                   ▼
//!                                     ┌──────▼───────┐  compress  ┌──────────────┐
//!                                     │archive thread│ ◄───────── │   archive    │
//!                                     └──────────────┘            └──────────────┘
//! ```
//!
//! The worker is the only code that touches the active file, so the file needs
//! no lock. Rotation runs inline on the worker; producers keep enqueueing
//! while it happens and only block once the queue is full.

use {
    crate::{meta::SpoolMeta, LogSpoolError},
    chrono::NaiveDate,
    crossbeam_channel::{Receiver, Sender},
    std::{
        fs,
        io::Write as _,
        panic::{self, AssertUnwindSafe},
        path::PathBuf,
    },
    tracing::{debug, error, info, warn},
};

/// Messages carried by the spool queue.
pub(crate) enum Message {
    /// Raw bytes to append to the active file.
    Payload(Vec<u8>),
    /// Acknowledged once everything queued before it has been written.
    Flush(Sender<()>),
    /// Stop after everything queued before it has been written.
    Shutdown,
}

pub(crate) struct Worker {
    rx: Receiver<Message>,
    meta: SpoolMeta,
    /// The active file. `None` while a rotation swaps files, or after the
    /// file could not be opened; payloads arriving then are dropped unless a
    /// reopen succeeds.
    file: Option<fs::File>,
    /// Day the active file was created or last rotated.
    current_date: NaiveDate,
    /// Index of the last rotation. Never reset.
    rotation_counter: u64,
    /// Set while the active file is unavailable, so the condition is logged
    /// once rather than per message.
    degraded: bool,
    /// Feeds the archive thread. Started by the first rotation that has
    /// archive work to do.
    archiver: Option<Sender<PathBuf>>,
}

impl Worker {
    pub(crate) fn new(
        rx: Receiver<Message>,
        meta: SpoolMeta,
        file: Option<fs::File>,
        current_date: NaiveDate,
        rotation_counter: u64,
    ) -> Self {
        Self {
            rx,
            meta,
            degraded: file.is_none(),
            file,
            current_date,
            rotation_counter,
            archiver: None,
        }
    }

    /// Drain the queue until a shutdown marker arrives or every sender is
    /// gone.
    pub(crate) fn run(mut self) {
        debug!(path = ?self.meta.active_path(), "log spool worker started");

        while let Ok(message) = self.rx.recv() {
            match message {
                Message::Payload(payload) => self.write_payload(&payload),
                Message::Flush(ack) => {
                    self.flush();
                    ack.send(()).ok();
                }
                Message::Shutdown => break,
            }
        }

        self.flush();
        debug!(path = ?self.meta.active_path(), "log spool worker stopped");
    }

    fn write_payload(&mut self, payload: &[u8]) {
        // A new day closes the previous day's file before its first message.
        if self.meta.daily_rotation {
            let today = self.meta.clock.today();
            if today != self.current_date {
                let closing_date = self.current_date;
                self.rotate_guarded(closing_date);
            }
        }

        if !self.ensure_file() {
            return;
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };

        if let Err(err) = file.write_all(payload) {
            error!(error = ?err, path = ?self.meta.active_path(), "failed to write log message");
        }

        if let Some(threshold) = self.meta.size_threshold {
            match file.metadata() {
                Ok(metadata) if metadata.len() >= threshold => {
                    let today = self.meta.clock.today();
                    self.rotate_guarded(today);
                }
                Ok(_) => {}
                Err(err) => warn!(error = ?err, path = ?self.meta.active_path(), "failed to stat log file"),
            }
        }
    }

    /// Make sure an active file is open, reopening it if an earlier failure
    /// left none. Returns `false` when the message must be dropped.
    fn ensure_file(&mut self) -> bool {
        if self.file.is_some() {
            return true;
        }
        let was_degraded = self.degraded;
        match self.reopen() {
            Ok(()) => true,
            Err(err) => {
                if !was_degraded {
                    error!(error = %err, "log file unavailable, dropping messages");
                }
                false
            }
        }
    }

    /// Open the active path and track whether the spool is degraded.
    fn reopen(&mut self) -> Result<(), LogSpoolError> {
        match self.meta.open_active() {
            Ok(file) => {
                if self.degraded {
                    info!(path = ?self.meta.active_path(), "log file reopened");
                    self.degraded = false;
                }
                self.file = Some(file);
                Ok(())
            }
            Err(err) => {
                self.degraded = true;
                Err(err)
            }
        }
    }

    /// Queue an archive for compression and pruning, starting the archive
    /// thread on first use.
    fn hand_off(&mut self, archive_path: PathBuf) {
        if self.archiver.is_none() {
            self.archiver = self.meta.spawn_archiver();
        }
        if let Some(archiver) = &self.archiver {
            if archiver.send(archive_path).is_err() {
                warn!("log archive thread is gone");
                self.archiver = None;
            }
        }
    }

    /// Rotate without letting any failure escape the worker loop.
    fn rotate_guarded(&mut self, archive_date: NaiveDate) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.rotate(archive_date))) {
            Ok(Ok(archive_path)) => {
                info!(archive = ?archive_path, "log file rotated");
                self.hand_off(archive_path);
            }
            Ok(Err(err)) => error!(error = %err, "log rotation failed"),
            Err(_) => error!(path = ?self.meta.active_path(), "log rotation panicked"),
        }
    }

    /// Close the active file, move it to its archive name and open a fresh
    /// one at the original path.
    ///
    /// A failed rename still reopens the active path, so writing resumes into
    /// the old file and the next trigger tries again.
    fn rotate(&mut self, archive_date: NaiveDate) -> Result<PathBuf, LogSpoolError> {
        let active_path = self.meta.active_path();

        // Windows cannot rename a file that is still open.
        drop(self.file.take());

        self.rotation_counter += 1;
        let archive_path = self.meta.archive_path(archive_date, self.rotation_counter);
        let renamed = fs::rename(&active_path, &archive_path).map_err(|err| LogSpoolError::RenameFileError {
            from: active_path.clone(),
            to: archive_path.clone(),
            error: err.to_string(),
        });

        self.current_date = self.meta.clock.today();
        self.reopen()?;

        renamed.map(|()| archive_path)
    }

    fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.flush() {
                warn!(error = ?err, path = ?self.meta.active_path(), "failed to flush log file");
            }
        }
    }
}
