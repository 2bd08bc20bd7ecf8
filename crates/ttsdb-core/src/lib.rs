pub mod app_config;
pub mod collections;
pub mod config;
pub mod products;
pub mod snapshot;
pub mod stock;

pub use app_config::{AppConfig, Environment};
pub use collections::{load_collections, CollectionConfig, CollectionsFile, ALL_COLLECTION};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{ProductSnapshot, SizeMap, SizeStock};
pub use snapshot::{flatten_snapshot, SnapshotRow};
pub use stock::{plan_stock_update, StockChange, StockChangeEvent, StockEntry, StockPlan};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read collections file {path}: {source}")]
    CollectionsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse collections file: {0}")]
    CollectionsFileParse(#[from] serde_yaml::Error),

    #[error("collections config validation failed: {0}")]
    Validation(String),
}
