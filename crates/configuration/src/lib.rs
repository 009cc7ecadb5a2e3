use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    ApiConfig, Config, IndexConfig, LoggingConfig, RunConfig, ServerConfig, StorageConfig, UniverseConfig,
};

/// Prefix for environment overrides, e.g. `INDEX__API__TWELVE_DATA_KEY`.
pub const ENV_PREFIX: &str = "INDEX";

/// Loads the application configuration.
///
/// The TOML file at `path` is optional; every section falls back to its defaults.
/// Environment variables prefixed with `INDEX__` are layered on top, so secrets such
/// as the Twelve Data key never need to live in the file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
