use log::{debug, info};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use super::codec::decode_records;
use crate::modules::error::{AuthError, AuthResult};

/// Serializes every open/read/write of the backing files.
///
/// Lock order: a store's map lock is always taken before this lock, never
/// after. Nothing here calls back into a store.
#[derive(Debug, Default)]
pub struct Persistence {
    lock: Mutex<()>,
}

impl Persistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and decode every record, rejecting any with fewer than `min_fields`
    pub fn read_records(&self, path: &Path, min_fields: usize) -> AuthResult<Vec<Vec<String>>> {
        let text = {
            let _guard = self.lock.lock();
            fs::read_to_string(path).map_err(|e| AuthError::io(path, e))?
        };

        let records = decode_records(&text).map_err(|reason| AuthError::format(path, reason))?;
        if let Some((n, short)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() < min_fields)
        {
            return Err(AuthError::format(
                path,
                format!(
                    "record {} has {} fields, expected {}",
                    n + 1,
                    short.len(),
                    min_fields
                ),
            ));
        }
        debug!("Read {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Replace `path` with `body`.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// renamed over the target, so a crash never leaves a truncated file.
    pub fn replace_contents(&self, path: &Path, body: &str) -> AuthResult<()> {
        let dir = parent_dir(path);

        let _guard = self.lock.lock();
        // Stage the new contents next to the target
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AuthError::io(path, e))?;
        tmp.write_all(body.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AuthError::io(path, e))?;
        // Swap it in with a single rename
        tmp.persist(path).map_err(|e| AuthError::io(path, e.error))?;
        Ok(())
    }

    /// Make sure `path` exists, can be opened for reading and writing, and
    /// sits in a directory [`Persistence::replace_contents`] can write to.
    /// A missing file is created empty with mode 0600.
    pub fn ensure_exists_writably(&self, path: &Path) -> AuthResult<()> {
        let _guard = self.lock.lock();
        match fs::metadata(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("File {} does not exist; creating.", path.display());
                create_private(path).map_err(|e| {
                    AuthError::Config(format!("error creating file {}: {}", path.display(), e))
                })?;
            }
            Err(e) => {
                return Err(AuthError::Config(format!(
                    "unable to stat {}: {}",
                    path.display(),
                    e
                )));
            }
            Ok(meta) if !meta.is_file() => {
                return Err(AuthError::Config(format!(
                    "{} is not a regular file",
                    path.display()
                )));
            }
            Ok(_) => {
                // Ask the OS rather than reading mode bits, so ownership counts
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(|e| {
                        AuthError::Config(format!("{} is not read/writeable: {}", path.display(), e))
                    })?;
            }
        }

        // Flushing renames a temp file into place, so the directory must be writable too
        let dir = parent_dir(path);
        NamedTempFile::new_in(dir).map_err(|e| {
            AuthError::Config(format!(
                "directory {} of {} is not writable: {}",
                dir.display(),
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(0o600)
        .open(path)
        .map(|_| ())
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .map(|_| ())
}
