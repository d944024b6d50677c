//! Single-writer lock file next to the entity document.

use crate::repo::document_repo::{RepoError, RepoResult};
use log::{info, warn};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Held for the duration of a mutating run; the lock file is removed on drop.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    /// Creates `<document>.lock` with create-new semantics.
    ///
    /// # Errors
    /// - `Locked` when another run already holds the lock.
    /// - `Io` for any other filesystem failure.
    pub fn acquire(document: &Path) -> RepoResult<Self> {
        let path = lock_path_for(document);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    "event=writer_lock module=repo status=busy path={}",
                    path.display()
                );
                return Err(RepoError::Locked(path));
            }
            Err(source) => {
                return Err(RepoError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        writeln!(file, "{}", std::process::id()).map_err(|source| RepoError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(
            "event=writer_lock module=repo status=acquired path={}",
            path.display()
        );
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(
                "event=writer_lock module=repo status=release_failed path={} error={err}",
                self.path.display()
            );
        }
    }
}

/// `entities.json` -> `entities.json.lock`.
pub fn lock_path_for(document: &Path) -> PathBuf {
    let mut raw = document.as_os_str().to_owned();
    raw.push(".lock");
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::lock_path_for;
    use std::path::Path;

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/data/characters.json")),
            Path::new("/data/characters.json.lock")
        );
    }
}
