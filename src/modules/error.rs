use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned by every public registry operation
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no such account")]
    NotFound,

    #[error("a user with that username already exists")]
    AlreadyExists,

    // Wrong password and hashing-engine failures are deliberately the same error
    #[error("bad username/password combination")]
    BadCredentials,

    // Missing token, wrong owner and expiry are deliberately the same error
    #[error("nonexistent or expired key")]
    InvalidKey,

    #[error("{} has unreadable format: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unable to hash password: {0}")]
    Hash(String),

    #[error("unable to generate an unused key")]
    KeySpaceExhausted,
}

impl AuthError {
    /// Wrap an io::Error with the path it happened on
    pub fn io(path: &Path, source: io::Error) -> Self {
        AuthError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn format(path: &Path, reason: impl Into<String>) -> Self {
        AuthError::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_path() {
        let err = AuthError::io(
            Path::new("/tmp/users.csv"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/users.csv"));
        assert!(msg.contains("denied"));

        let err = AuthError::format(Path::new("keys.csv"), "line 3 has 2 fields, expected 3");
        assert!(err.to_string().contains("keys.csv"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_conflated_errors_do_not_leak_detail() {
        assert_eq!(
            AuthError::BadCredentials.to_string(),
            "bad username/password combination"
        );
        assert_eq!(AuthError::InvalidKey.to_string(), "nonexistent or expired key");
    }
}
