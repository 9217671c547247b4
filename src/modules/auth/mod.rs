pub mod keys;
pub mod password;
pub mod store;
pub mod tokens;

// Re-export the main types and functions
pub use keys::{KeyStore, Session};
pub use password::{read_password, HashError, PasswordHasher, Pbkdf2Hasher};
pub use store::UserStore;
pub use tokens::TokenGenerator;
