pub mod codec;
mod files;

pub use codec::{decode_records, encode_record};
pub use files::Persistence;
