#![allow(dead_code)]

use {
    chrono::NaiveDate,
    logspool::Clock,
    std::{
        fs,
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicBool, Ordering},
            Condvar, Mutex,
        },
        thread,
        time::{Duration, Instant},
    },
};

/// A clock whose date only changes when told to.
pub struct ManualClock {
    date: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(date: NaiveDate) -> Self {
        Self { date: Mutex::new(date) }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock().unwrap() = date;
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock().unwrap()
    }
}

/// A clock that, once armed, blocks every caller until opened. Used to stall
/// the worker in the middle of handling a message.
pub struct GateClock {
    date: NaiveDate,
    armed: AtomicBool,
    holding: AtomicBool,
    open: Mutex<bool>,
    opened: Condvar,
}

impl GateClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            armed: AtomicBool::new(false),
            holding: AtomicBool::new(false),
            open: Mutex::new(false),
            opened: Condvar::new(),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Whether a caller is currently blocked at the gate.
    pub fn is_holding(&self) -> bool {
        self.holding.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl Clock for GateClock {
    fn today(&self) -> NaiveDate {
        if self.armed.load(Ordering::SeqCst) {
            let mut open = self.open.lock().unwrap();
            self.holding.store(!*open, Ordering::SeqCst);
            while !*open {
                open = self.opened.wait(open).unwrap();
            }
            self.holding.store(false, Ordering::SeqCst);
        }
        self.date
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Poll `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

pub fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn archive(dir: &Path, file: &str, date: NaiveDate, index: u64) -> PathBuf {
    dir.join(format!("{file}.{}{index}", date.format("%Y%m%d")))
}
