// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::error::LockError;

/// Name of the lock file placed in the download directory
pub const LOCK_FILE: &str = ".podscribe.lock";

/// Exclusive advisory lock held for the duration of a run
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    /// Take the lock without waiting
    ///
    /// Fails with [`LockError::Held`] when another process (or another
    /// handle in this process) already holds it.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let open_failed = |source| LockError::OpenFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(open_failed)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(open_failed)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "acquired run lock");
                Ok(Self {
                    path: path.to_path_buf(),
                    _file: file,
                })
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(LockError::Held {
                path: path.to_path_buf(),
            }),
            Err(err) => Err(open_failed(err)),
        }
    }

    /// Take the lock file inside `dir`
    pub fn acquire_in(dir: &Path) -> Result<Self, LockError> {
        Self::acquire(&dir.join(LOCK_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
