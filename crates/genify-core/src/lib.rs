pub mod config;
pub mod error;
pub mod types;

pub use config::GenifyConfig;
pub use error::{GenifyError, Result};
pub use types::*;
