// Declare all modules
pub mod auth;
pub mod error;
pub mod registry;
pub mod storage;
pub mod utils;

// No re-exports here as they're handled in lib.rs
