use log::info;
use std::path::Path;
use std::sync::Arc;

use super::config::Config;
use crate::modules::auth::{KeyStore, UserStore};
use crate::modules::error::AuthResult;
use crate::modules::storage::Persistence;
use crate::modules::utils::{Clock, SystemClock};

/// Owns the user and key stores and the file lock they share.
///
/// Build it once with [`Registry::configure`] before any concurrent use;
/// configuration itself is not safe to race against store operations.
/// Afterwards the registry can be shared by reference across threads.
pub struct Registry {
    config: Config,
    users: UserStore,
    keys: KeyStore,
}

impl Registry {
    /// Prepare both backing files and load both stores
    pub fn configure(config: Config) -> AuthResult<Self> {
        Self::configure_with_clock(config, Arc::new(SystemClock))
    }

    /// Read the configuration file at `path`, then [`Registry::configure`]
    pub fn from_config_file(path: &Path) -> AuthResult<Self> {
        info!("Configuring from {}", path.display());
        Self::configure(Config::load(path)?)
    }

    pub fn configure_with_clock(config: Config, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        config.validate()?;

        let persistence = Arc::new(Persistence::new());
        persistence.ensure_exists_writably(&config.user_file)?;
        persistence.ensure_exists_writably(&config.key_file)?;

        let users = UserStore::new(
            config.user_file.clone(),
            persistence.clone(),
            Arc::new(config.hasher()?),
        );
        let keys = KeyStore::new(
            config.key_file.clone(),
            persistence,
            config.token_generator()?,
            config.key_lifetime,
            clock,
        );

        users.load()?;
        keys.load()?;

        Ok(Self {
            config,
            users,
            keys,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn users_dirty(&self) -> bool {
        self.users.is_dirty()
    }

    pub fn keys_dirty(&self) -> bool {
        self.keys.is_dirty()
    }

    /// Check a password and, only if it matches, issue a session key
    pub fn verify_and_issue(&self, name: &str, password: &str) -> AuthResult<String> {
        self.users.verify(name, password)?;
        self.keys.issue(name)
    }

    /// Delete an account and every key it still holds.
    ///
    /// [`UserStore::delete_user`] alone leaves the keys in place.
    pub fn delete_user_and_revoke(&self, name: &str) -> AuthResult<usize> {
        self.users.delete_user(name)?;
        Ok(self.keys.revoke_owner(name))
    }

    /// Flush whichever stores have unpersisted changes
    pub fn flush_dirty(&self) -> AuthResult<()> {
        if self.users.is_dirty() {
            self.users.flush()?;
        }
        if self.keys.is_dirty() {
            self.keys.flush()?;
        }
        Ok(())
    }

    /// One periodic maintenance pass: cull expired keys, then flush.
    /// Returns the number of keys culled.
    pub fn maintain(&self) -> AuthResult<usize> {
        let culled = self.keys.cull();
        self.flush_dirty()?;
        Ok(culled)
    }
}
