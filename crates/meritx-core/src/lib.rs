pub mod error;
pub mod luhn;
pub mod types;

pub use error::MeritxError;
pub use luhn::valid_luhn;
pub use types::*;
