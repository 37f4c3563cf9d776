pub mod config;
pub mod error;
pub mod recipient;

pub use error::{Error, Result};
