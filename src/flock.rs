use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use fs4::fs_std::FileExt;
use log::debug;
use regex_lite::Regex;
use thiserror::Error;

const LOCK_TIMEOUT_SECS: u64 = 300;

/// Exclusive advisory lock, released when dropped.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] std::io::Error);

impl FileLock {
    pub fn new(path: &Path) -> Result<Self, Error> {
        Self::with_timeout(path, Duration::from_secs(LOCK_TIMEOUT_SECS))
    }

    /// Retries once a second while another process holds the lock, giving up
    /// after `timeout`.
    pub fn with_timeout(path: &Path, timeout: Duration) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(true) => {
                    return Ok(Self { _file: file });
                }
                Ok(false) if start.elapsed() < timeout => {
                    debug!("Failed to acquire a lock on {}, retrying", path.display());
                    std::thread::sleep(Duration::from_secs(1));
                }
                Ok(false) => return Err(fs4::lock_contended_error().into()),
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Locks `target` through a marker file kept in `lock_dir`, so nothing is
    /// written into the target itself.
    ///
    /// The marker file stays in `lock_dir` after release and is reused for the
    /// same target: unlinking it while a waiter holds it open breaks mutual
    /// exclusion. `lock_dir` keeps one empty file per distinct target.
    pub fn for_target(lock_dir: &Path, target: &Path) -> Result<Self, Error> {
        Self::new(&lock_path(lock_dir, target))
    }
}

fn lock_path(lock_dir: &Path, target: &Path) -> PathBuf {
    let target = target
        .canonicalize()
        .unwrap_or_else(|_| target.to_path_buf());
    let re = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
    let target = target.to_string_lossy();
    let name = re.replace_all(&target, "_");
    lock_dir.join(format!("{}.lock", name.trim_matches('_')))
}
