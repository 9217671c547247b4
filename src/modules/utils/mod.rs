pub mod logging;
pub mod time;

pub use logging::{initialize_logging, log_auth_event};
pub use time::{format_duration, format_timestamp, get_current_timestamp, Clock, SystemClock};
