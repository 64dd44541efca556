//! Process-level preparation that must run before the async runtime exists

use crate::config::Config;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("unsupported platform '{0}': signal delivery and daemonization need a unix host")]
    UnsupportedPlatform(&'static str),

    #[error("cannot create save directory {}: {source}", path.display())]
    SaveDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("daemonization failed at {step}: {source}")]
    Daemonize {
        step: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Validate the host, then detach if configured
///
/// Daemonizing forks, so this has to happen while the process is still
/// single-threaded: call it before building the tokio runtime.
pub fn prepare_process(config: &Config) -> Result<(), EnvError> {
    check_env(config)?;
    if config.pool.daemonize {
        if config.logging.file.is_none() {
            warn!("Daemonizing without logging.file, log output will be discarded");
        }
        daemonize()?;
        info!(pid = std::process::id(), "Running as daemon");
    }
    Ok(())
}

/// Fatal preconditions; none of these are retried
pub fn check_env(config: &Config) -> Result<(), EnvError> {
    if !cfg!(unix) {
        return Err(EnvError::UnsupportedPlatform(std::env::consts::OS));
    }

    std::fs::create_dir_all(&config.storage.save_dir).map_err(|source| EnvError::SaveDir {
        path: config.storage.save_dir.clone(),
        source,
    })?;

    Ok(())
}

/// Detach from the controlling terminal with the double-fork pattern
#[cfg(unix)]
pub fn daemonize() -> Result<(), EnvError> {
    // SAFETY: umask only changes the file creation mask
    unsafe {
        libc::umask(0);
    }

    fork_and_exit_parent("first fork")?;

    // SAFETY: we are the child of a fork and not a process group leader
    if unsafe { libc::setsid() } < 0 {
        return Err(EnvError::Daemonize {
            step: "setsid",
            source: io::Error::last_os_error(),
        });
    }

    // The second child is not a session leader and can never reacquire a terminal
    fork_and_exit_parent("second fork")?;

    redirect_stdio()
}

#[cfg(not(unix))]
pub fn daemonize() -> Result<(), EnvError> {
    Err(EnvError::UnsupportedPlatform(std::env::consts::OS))
}

#[cfg(unix)]
fn fork_and_exit_parent(step: &'static str) -> Result<(), EnvError> {
    // SAFETY: the caller guarantees no other threads exist yet
    match unsafe { libc::fork() } {
        -1 => Err(EnvError::Daemonize {
            step,
            source: io::Error::last_os_error(),
        }),
        0 => Ok(()),
        _ => std::process::exit(0),
    }
}

#[cfg(unix)]
fn redirect_stdio() -> Result<(), EnvError> {
    use std::os::unix::io::AsRawFd;

    let dev_null = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|source| EnvError::Daemonize {
            step: "open /dev/null",
            source,
        })?;

    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: both descriptors are valid for the duration of the call
        if unsafe { libc::dup2(dev_null.as_raw_fd(), fd) } < 0 {
            return Err(EnvError::Daemonize {
                step: "dup2",
                source: io::Error::last_os_error(),
            });
        }
    }
    Ok(())
}
