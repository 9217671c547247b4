pub mod config;
mod setup;

pub use config::Config;
pub use setup::Registry;
