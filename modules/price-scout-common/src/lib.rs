pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use config::AppConfig;
pub use error::{PriceScoutError, Result};
pub use file_config::{
    load_config, DiscoveryStrategy, ExtractionConfig, FallbackConfig, ModelsConfig, RefineConfig,
    ScoutConfig, SearchConfig,
};
pub use types::*;
