use log::{debug, info};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::tokens::TokenGenerator;
use crate::modules::error::{AuthError, AuthResult};
use crate::modules::storage::{encode_record, Persistence};
use crate::modules::utils::{log_auth_event, Clock};

// key file format:
//
// owner,expiry_epoch_seconds,token
const KEY_FIELDS: usize = 3;

// a tiny key space can run out of unused tokens
const MAX_ISSUE_ATTEMPTS: usize = 64;

/// One issued session key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub owner: String,
    pub expires_at: u64,
}

impl Session {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct KeyTable {
    sessions: HashMap<String, Session>,
    dirty: bool,
}

/// Session token registry backed by the key file
pub struct KeyStore {
    path: PathBuf,
    persistence: Arc<Persistence>,
    generator: TokenGenerator,
    lifetime: u64,
    clock: Arc<dyn Clock>,
    table: RwLock<KeyTable>,
}

impl KeyStore {
    /// `lifetime` is in seconds and applies to every issue and refresh
    pub fn new(
        path: impl Into<PathBuf>,
        persistence: Arc<Persistence>,
        generator: TokenGenerator,
        lifetime: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            path: path.into(),
            persistence,
            generator,
            lifetime,
            clock,
            table: RwLock::new(KeyTable::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    /// Replace every session with the unexpired contents of the key file.
    ///
    /// Expired records are dropped silently. A short record or a bad expiry
    /// fails the whole load and leaves the current sessions as they were.
    pub fn load(&self) -> AuthResult<usize> {
        info!("Loading keys from {}", self.path.display());
        // Parse the whole file before touching the map
        let records = self.persistence.read_records(&self.path, KEY_FIELDS)?;

        // Get current timestamp to drop expired rows
        let now = self.clock.now();
        let mut sessions = HashMap::with_capacity(records.len());
        let mut expired = 0usize;
        for (n, mut record) in records.into_iter().enumerate() {
            record.truncate(KEY_FIELDS);
            let token = record.swap_remove(2);
            let expires_at: u64 = record[1].parse().map_err(|_| {
                AuthError::format(
                    &self.path,
                    format!("record {} has bad expiry {:?}", n + 1, record[1]),
                )
            })?;
            let session = Session {
                owner: record.swap_remove(0),
                expires_at,
            };
            if session.is_live(now) {
                sessions.insert(token, session);
            } else {
                expired += 1;
            }
        }

        // Swap in the new sessions and mark clean
        let count = sessions.len();
        let mut table = self.table.write();
        table.sessions = sessions;
        table.dirty = false;
        info!("Loaded {} keys ({} expired dropped).", count, expired);
        Ok(count)
    }

    /// Write every unexpired session to the key file and mark the store clean
    pub fn flush(&self) -> AuthResult<usize> {
        let table = self.table.upgradable_read();
        let now = self.clock.now();

        // Keep only live sessions, ordered by owner then expiry
        let mut live: Vec<(&String, &Session)> = table
            .sessions
            .iter()
            .filter(|(_, s)| s.is_live(now))
            .collect();
        live.sort_by(|a, b| {
            (&a.1.owner, a.1.expires_at, a.0).cmp(&(&b.1.owner, b.1.expires_at, b.0))
        });

        let body: String = live
            .iter()
            .map(|(token, s)| {
                let expiry = s.expires_at.to_string();
                encode_record(&[s.owner.as_str(), expiry.as_str(), token.as_str()])
            })
            .collect();
        self.persistence.replace_contents(&self.path, &body)?;

        // Only a successful write clears the dirty flag
        let count = live.len();
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        table.dirty = false;
        info!("Wrote {} keys.", count);
        Ok(count)
    }

    /// Issue a fresh token for `owner`. The caller is responsible for having
    /// authenticated the owner first.
    pub fn issue(&self, owner: &str) -> AuthResult<String> {
        let mut table = self.table.write();
        // Pick a token no held session already uses
        let token = (0..MAX_ISSUE_ATTEMPTS)
            .map(|_| self.generator.generate())
            .find(|candidate| {
                let taken = table.sessions.contains_key(candidate);
                if taken {
                    debug!("Generated key collided with a held key; regenerating");
                }
                !taken
            })
            .ok_or(AuthError::KeySpaceExhausted)?;
        // Lifetime starts now
        let expires_at = self.clock.now().saturating_add(self.lifetime);
        table.sessions.insert(
            token.clone(),
            Session {
                owner: owner.to_string(),
                expires_at,
            },
        );
        table.dirty = true;
        drop(table);

        log_auth_event("issue_key", owner, true, None);
        Ok(token)
    }

    /// Succeeds only if `token` exists, belongs to `owner` and has not expired
    pub fn verify(&self, owner: &str, token: &str) -> AuthResult<()> {
        let now = self.clock.now();
        let table = self.table.read();
        match table.sessions.get(token) {
            Some(s) if s.owner == owner && s.is_live(now) => Ok(()),
            _ => Err(AuthError::InvalidKey),
        }
    }

    /// Verify and, on success, restart the key's lifetime from now
    pub fn refresh(&self, owner: &str, token: &str) -> AuthResult<()> {
        let now = self.clock.now();
        let mut table = self.table.write();
        match table.sessions.get_mut(token) {
            Some(s) if s.owner == owner && s.is_live(now) => {
                s.expires_at = now.saturating_add(self.lifetime);
                table.dirty = true;
                Ok(())
            }
            _ => Err(AuthError::InvalidKey),
        }
    }

    /// Remove every expired session, returning how many were removed
    pub fn cull(&self) -> usize {
        let now = self.clock.now();
        let mut table = self.table.write();
        let before = table.sessions.len();
        table.sessions.retain(|_, s| s.is_live(now));
        let removed = before - table.sessions.len();
        if removed > 0 {
            table.dirty = true;
        }
        drop(table);

        if removed > 0 {
            info!("Culled {} expired keys.", removed);
        }
        removed
    }

    /// Remove every session owned by `owner`, returning how many were removed
    pub fn revoke_owner(&self, owner: &str) -> usize {
        let mut table = self.table.write();
        let before = table.sessions.len();
        table.sessions.retain(|_, s| s.owner != owner);
        let removed = before - table.sessions.len();
        if removed > 0 {
            table.dirty = true;
        }
        drop(table);

        let details = format!("{} removed", removed);
        log_auth_event("revoke_keys", owner, true, Some(details.as_str()));
        removed
    }

    /// Expiry of a token regardless of whether it is still live
    pub fn expires_at(&self, token: &str) -> Option<u64> {
        self.table.read().sessions.get(token).map(|s| s.expires_at)
    }

    /// True when sessions changed since the last successful load or flush
    pub fn is_dirty(&self) -> bool {
        self.table.read().dirty
    }

    /// Number of held sessions, including expired ones not yet culled
    pub fn len(&self) -> usize {
        self.table.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().sessions.is_empty()
    }
}
