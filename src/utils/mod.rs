pub mod config;
pub mod ingestor_toml;
pub mod logger;
pub mod settings;

pub use config::*;
pub use logger::setup_logging;
pub use settings::{FetchMode, Settings};
