// SPDX-License-Identifier: MPL-2.0

//! Pid file through which commands reach the running daemon.
//!
//! The daemon holds an exclusive lock on the file for as long as it runs, so a
//! file left behind by a crashed daemon is recognised as stale instead of
//! pointing commands at whatever process reused its pid.

use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use eyre::WrapErr;
use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tracing::{debug, warn};

const PID_FILE: &str = "neumowall.pid";

/// Location of the daemon's pid file.
#[must_use]
pub fn path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(PID_FILE)
}

/// The daemon's locked pid file; unlocked and removed when dropped.
pub struct PidFile {
    path: PathBuf,
    _lock: Flock<File>,
}

impl PidFile {
    /// Record the current process as the running daemon.
    pub fn create() -> eyre::Result<Self> {
        Self::create_at(path())
    }

    /// Fails if another live daemon holds the file at `path`.
    pub fn create_at(path: PathBuf) -> eyre::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open pid file {}", path.display()))?;

        let mut lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                eyre::bail!("another daemon is already running ({})", path.display())
            }
            Err((_, errno)) => {
                return Err(errno).wrap_err_with(|| format!("failed to lock {}", path.display()));
            }
        };

        lock.set_len(0)?;
        write!(lock, "{}", std::process::id())
            .wrap_err_with(|| format!("failed to write pid file {}", path.display()))?;

        debug!(path = %path.display(), "wrote pid file");
        Ok(Self { path, _lock: lock })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        // Removed while still locked, so no other daemon can have taken it over.
        if let Err(why) = fs::remove_file(&self.path) {
            warn!(?why, path = %self.path.display(), "failed to remove pid file");
        }
    }
}

/// Pid of the daemon holding the pid file at `path`.
///
/// Fails when the file is missing, or when no process holds its lock.
pub fn daemon_pid_at(path: &Path) -> eyre::Result<Pid> {
    let file = File::open(path)
        .wrap_err_with(|| format!("no running daemon ({} unreadable)", path.display()))?;

    let mut file = match Flock::lock(file, FlockArg::LockSharedNonblock) {
        Ok(_unheld) => eyre::bail!("no running daemon (stale pid file {})", path.display()),
        Err((file, errno)) if errno == Errno::EWOULDBLOCK => file,
        Err((_, errno)) => {
            return Err(errno)
                .wrap_err_with(|| format!("failed to check the lock on {}", path.display()));
        }
    };

    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let pid = contents
        .trim()
        .parse::<i32>()
        .wrap_err_with(|| format!("corrupt pid file {}", path.display()))?;

    Ok(Pid::from_raw(pid))
}

/// Deliver `signal` to the running daemon.
pub fn signal_daemon(signal: Signal) -> eyre::Result<()> {
    let pid = daemon_pid_at(&path())?;
    signal::kill(pid, signal).wrap_err_with(|| format!("failed to signal daemon {pid}"))?;

    debug!(%pid, ?signal, "signalled daemon");
    Ok(())
}
