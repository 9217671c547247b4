use log::{info, warn};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::password::PasswordHasher;
use crate::modules::error::{AuthError, AuthResult};
use crate::modules::storage::{encode_record, Persistence};
use crate::modules::utils::log_auth_event;

// user file format:
//
// name,digest
const USER_FIELDS: usize = 2;

/// Account map plus its dirty flag, always locked together
#[derive(Debug, Default)]
struct UserTable {
    users: HashMap<String, String>,
    dirty: bool,
}

/// Account name to password digest registry backed by the user file
pub struct UserStore {
    path: PathBuf,
    persistence: Arc<Persistence>,
    hasher: Arc<dyn PasswordHasher>,
    table: RwLock<UserTable>,
}

impl UserStore {
    /// Create an empty, clean store. Nothing is read until [`UserStore::load`].
    pub fn new(
        path: impl Into<PathBuf>,
        persistence: Arc<Persistence>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            path: path.into(),
            persistence,
            hasher,
            table: RwLock::new(UserTable::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace every account with the contents of the user file.
    ///
    /// A malformed file fails the whole load and leaves the current accounts
    /// and dirty flag as they were.
    pub fn load(&self) -> AuthResult<usize> {
        info!("Loading users from {}", self.path.display());
        // Parse the whole file before touching the map
        let records = self.persistence.read_records(&self.path, USER_FIELDS)?;
        let users: HashMap<String, String> = records
            .into_iter()
            .map(|mut r| {
                r.truncate(USER_FIELDS);
                let digest = r.swap_remove(1);
                (r.swap_remove(0), digest)
            })
            .collect();

        // Swap in the new accounts and mark clean
        let count = users.len();
        let mut table = self.table.write();
        table.users = users;
        table.dirty = false;
        info!("Loaded {} users.", count);
        Ok(count)
    }

    /// Write every account to the user file and mark the store clean
    pub fn flush(&self) -> AuthResult<usize> {
        let table = self.table.upgradable_read();

        // Serialize in name order
        let mut entries: Vec<(&String, &String)> = table.users.iter().collect();
        entries.sort();
        let body: String = entries
            .iter()
            .map(|(name, digest)| encode_record(&[name.as_str(), digest.as_str()]))
            .collect();
        self.persistence.replace_contents(&self.path, &body)?;

        // Only a successful write clears the dirty flag
        let count = entries.len();
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        table.dirty = false;
        info!("Wrote {} users.", count);
        Ok(count)
    }

    /// Add a new account.
    ///
    /// The password is hashed outside the lock; existence is checked again
    /// under the write lock so a racing add of the same name cannot overwrite
    /// the winner's digest.
    pub fn add_user(&self, name: &str, password: &str) -> AuthResult<()> {
        if self.table.read().users.contains_key(name) {
            log_auth_event("add_user", name, false, Some("already exists"));
            return Err(AuthError::AlreadyExists);
        }

        // Hash outside the lock
        let digest = self
            .hasher
            .hash(password)
            .map_err(|e| AuthError::Hash(e.to_string()))?;

        // Check again now that we hold the write lock
        let mut table = self.table.write();
        if table.users.contains_key(name) {
            drop(table);
            log_auth_event("add_user", name, false, Some("lost race"));
            return Err(AuthError::AlreadyExists);
        }
        table.users.insert(name.to_string(), digest);
        table.dirty = true;
        drop(table);

        log_auth_event("add_user", name, true, None);
        Ok(())
    }

    /// Remove an account. Outstanding session keys are not touched.
    pub fn delete_user(&self, name: &str) -> AuthResult<()> {
        let mut table = self.table.write();
        if table.users.remove(name).is_none() {
            return Err(AuthError::NotFound);
        }
        table.dirty = true;
        drop(table);
        log_auth_event("delete_user", name, true, None);
        Ok(())
    }

    /// Check a password against the stored digest.
    ///
    /// A mismatch and a hashing-engine failure both come back as
    /// `BadCredentials`; only the log tells them apart.
    pub fn verify(&self, name: &str, password: &str) -> AuthResult<()> {
        let digest = self
            .table
            .read()
            .users
            .get(name)
            .cloned()
            .ok_or(AuthError::NotFound)?;

        match self.hasher.verify(&digest, password) {
            Ok(true) => {
                log_auth_event("verify", name, true, None);
                Ok(())
            }
            Ok(false) => {
                log_auth_event("verify", name, false, Some("password mismatch"));
                Err(AuthError::BadCredentials)
            }
            Err(e) => {
                warn!("Password verification engine error: {}", e);
                log_auth_event("verify", name, false, Some("engine error"));
                Err(AuthError::BadCredentials)
            }
        }
    }

    /// True when accounts changed since the last successful load or flush
    pub fn is_dirty(&self) -> bool {
        self.table.read().dirty
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().users.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().users.is_empty()
    }

    #[cfg(test)]
    fn digest_of(&self, name: &str) -> Option<String> {
        self.table.read().users.get(name).cloned()
    }
}
