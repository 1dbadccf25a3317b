pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod oracle;
pub mod orchestration;
pub mod util;

pub use error::{Error, Result};
