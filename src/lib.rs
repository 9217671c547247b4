// First, declare the modules folder itself
mod modules;

// Re-export everything from modules for easier access
pub use modules::{auth, error, registry, storage, utils};

// Re-export commonly used types
pub use modules::auth::{KeyStore, PasswordHasher, Pbkdf2Hasher, TokenGenerator, UserStore};
pub use modules::error::{AuthError, AuthResult};
pub use modules::registry::{Config, Registry};
pub use modules::utils::{Clock, SystemClock};

// Constants
pub const DEFAULT_CONFIG_FILE: &str = "authkeep.json";
