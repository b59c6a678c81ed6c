pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::http::{create_router, AppState};
pub use adapters::storage::LocalStorage;
pub use config::{CliConfig, TomlConfig};
pub use core::{enrichment::AttributeClient, etl::ExportEngine};
pub use utils::error::{ExportError, Result};
