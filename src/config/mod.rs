//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize, defaults for missing fields)
//!     → loader.rs (environment overrides, including the stress gate)
//!     → validation.rs (semantic checks)
//!     → StressConfig (validated, immutable, read once at scenario entry)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty file (or no file) is valid
//! - The stress gate is plain configuration; nothing watches it after startup
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, load_config_with, load_from_env, ConfigError};
pub use schema::{
    ClientConfig, DriverConfig, FaultConfig, LeakConfig, LogFormat, MassConfig,
    ObservabilityConfig, ServerConfig, StressConfig,
};
pub use validation::{validate_config, ValidationError};
