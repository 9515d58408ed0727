//! Single-instance enforcement via an OS-level advisory exclusive lock on
//! a regular file.
//!
//! Acquisition is non-blocking and immediate: on contention this returns
//! `LockError::AlreadyHeld` carrying the conflicting pid rather than
//! waiting or retrying. There is no stale-lock override here — if a prior
//! holder crashed without cleaning up, an operator removes the lock file
//! by hand, the same way the lock is visible to them (a plain file
//! containing a pid).

use camino::Utf8Path;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    pub pid: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock held by pid {pid}")]
    AlreadyHeld { pid: u32 },

    #[error("lock file is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct FileLock {
    lock_path: camino::Utf8PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl FileLock {
    /// Attempt to acquire the lock at `lock_path`. Fails immediately, with
    /// no blocking or retry, if the file already exists.
    pub fn acquire(lock_path: &Utf8Path) -> Result<Self, LockError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = match fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(lock_path.as_std_path())
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Self::already_held_error(lock_path));
            }
            Err(err) => return Err(err.into()),
        };

        let info = LockInfo { pid: std::process::id() };
        let mut rw_lock = Box::new(RwLock::new(file));
        {
            let mut guard = rw_lock
                .try_write()
                .map_err(|_| Self::already_held_error(lock_path))?;
            use std::io::Write;
            let json = serde_json::to_string(&info).expect("LockInfo serialization is infallible");
            guard.write_all(json.as_bytes())?;
            guard.flush()?;
            guard.sync_all()?;
        }

        Ok(FileLock {
            lock_path: lock_path.to_owned(),
            _fd_lock: Some(rw_lock),
            info,
        })
    }

    fn already_held_error(lock_path: &Utf8Path) -> LockError {
        match read_lock_info(lock_path) {
            Ok(Some(info)) => LockError::AlreadyHeld { pid: info.pid },
            Ok(None) => LockError::AlreadyHeld { pid: 0 },
            Err(err) => err,
        }
    }

    pub fn pid(&self) -> u32 {
        self.info.pid
    }

    /// Spawn a background thread polling every 100ms that the lock file
    /// still exists and its recorded pid still matches this process. If
    /// either check fails, it sets `shutdown_flag` and exits.
    pub fn spawn_watcher(&self, shutdown_flag: Arc<AtomicBool>) -> LockWatcher {
        let lock_path = self.lock_path.clone();
        let expected_pid = self.info.pid;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            while !stop_for_thread.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(100));
                if stop_for_thread.load(Ordering::Relaxed) {
                    break;
                }
                let still_valid = match read_lock_info(&lock_path) {
                    Ok(Some(info)) => info.pid == expected_pid,
                    _ => false,
                };
                if !still_valid {
                    tracing::warn!(path = %lock_path, "lock file missing or pid mismatch, requesting shutdown");
                    shutdown_flag.store(true, Ordering::SeqCst);
                    break;
                }
            }
        });

        LockWatcher { stop, handle: Some(handle) }
    }
}

fn read_lock_info(lock_path: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
    match fs::read_to_string(lock_path.as_std_path()) {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| LockError::Corrupted { reason: e.to_string() }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Returns whether a process with the given pid is currently running.
/// Uses `kill(pid, 0)`: a zero return means the process exists and is
/// signalable; `EPERM` means it exists but we lack permission to signal it,
/// which still counts as running.
pub fn is_process_running(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        true
    } else {
        matches!(io::Error::last_os_error().raw_os_error(), Some(code) if code == libc::EPERM)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        let _ = fs::remove_file(self.lock_path.as_std_path());
    }
}

pub struct LockWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LockWatcher {
    /// Signal the watcher to stop and wait up to 2 seconds for it to exit.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = handle.join();
                let _ = tx.send(());
            });
            let _ = rx.recv_timeout(Duration::from_secs(2));
        }
    }
}
