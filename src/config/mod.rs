mod settings;

pub use settings::{LimitsConfig, LoggingConfig, Settings, StorageConfig};
