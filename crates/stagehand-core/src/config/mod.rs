//! Project configuration (`stagehand.toml`).

pub mod parser;
pub mod schema;

pub use parser::{load_config, parse_config_str, to_toml};
pub use schema::{SourceConfig, StagehandConfig};
