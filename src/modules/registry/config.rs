use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::modules::auth::password::{Pbkdf2Hasher, MAX_COST, MIN_COST};
use crate::modules::auth::tokens::{TokenGenerator, DEFAULT_KEY_CHARS, DEFAULT_KEY_LENGTH};
use crate::modules::error::{AuthError, AuthResult};

pub const DEFAULT_HASH_COST: u32 = 10;
pub const DEFAULT_KEY_LIFETIME: u64 = 600;

/// Settings for both stores, normally read from a JSON file.
///
/// Only `user_file` and `key_file` are required; everything else falls back
/// to its default.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub user_file: PathBuf,
    pub key_file: PathBuf,
    pub key_length: usize,
    pub key_chars: String,
    pub hash_cost: u32,
    /// Seconds a key stays valid after issue or refresh
    pub key_lifetime: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_file: PathBuf::new(),
            key_file: PathBuf::new(),
            key_length: DEFAULT_KEY_LENGTH,
            key_chars: DEFAULT_KEY_CHARS.to_string(),
            hash_cost: DEFAULT_HASH_COST,
            key_lifetime: DEFAULT_KEY_LIFETIME,
        }
    }
}

impl Config {
    /// Default settings for the given backing files
    pub fn new(user_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            user_file: user_file.into(),
            key_file: key_file.into(),
            ..Self::default()
        }
    }

    /// Read a configuration file
    pub fn load(path: &Path) -> AuthResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| AuthError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| AuthError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reject settings the stores cannot work with
    pub fn validate(&self) -> AuthResult<()> {
        if self.user_file.as_os_str().is_empty() {
            return Err(AuthError::Config("you must configure a user_file".to_string()));
        }
        if self.key_file.as_os_str().is_empty() {
            return Err(AuthError::Config("you must configure a key_file".to_string()));
        }
        if self.user_file == self.key_file {
            return Err(AuthError::Config(format!(
                "user_file and key_file are both {}",
                self.user_file.display()
            )));
        }
        if self.key_length == 0 {
            return Err(AuthError::Config("key_length must be positive".to_string()));
        }
        if self.key_chars.is_empty() {
            return Err(AuthError::Config("key_chars must not be empty".to_string()));
        }
        if !(MIN_COST..=MAX_COST).contains(&self.hash_cost) {
            return Err(AuthError::Config(format!(
                "hash_cost must be between {} and {}, got {}",
                MIN_COST, MAX_COST, self.hash_cost
            )));
        }
        if self.key_lifetime == 0 {
            return Err(AuthError::Config("key_lifetime must be positive".to_string()));
        }
        Ok(())
    }

    pub(crate) fn token_generator(&self) -> AuthResult<TokenGenerator> {
        TokenGenerator::new(&self.key_chars, self.key_length)
            .ok_or_else(|| AuthError::Config("key_chars and key_length must be non-empty".to_string()))
    }

    pub(crate) fn hasher(&self) -> AuthResult<Pbkdf2Hasher> {
        Pbkdf2Hasher::new(self.hash_cost).map_err(|e| AuthError::Config(e.to_string()))
    }
}
