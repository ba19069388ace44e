pub mod types;
pub mod config;
pub mod error;

pub use types::*;
pub use config::{Config, PageRankConfig};
pub use error::{Result, VidGraphError};
