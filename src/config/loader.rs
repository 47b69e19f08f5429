//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::StressConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Stress gate. Truthy values: `1`, `true`, `yes`, `on`.
pub const ENV_ENABLED: &str = "HTTP_STRESS_ENABLED";
/// Overrides `driver.dop`.
pub const ENV_DOP: &str = "HTTP_STRESS_DOP";
/// Overrides `driver.requests`.
pub const ENV_REQUESTS: &str = "HTTP_STRESS_REQUESTS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { key: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_count(key: &'static str, value: String) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}

/// Apply environment overrides through `lookup` (usually `std::env::var`).
pub fn apply_env_overrides<F>(config: &mut StressConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_ENABLED) {
        config.enabled = is_truthy(&value);
    }
    if let Some(value) = lookup(ENV_DOP) {
        config.driver.dop = parse_count(ENV_DOP, value)?;
    }
    if let Some(value) = lookup(ENV_REQUESTS) {
        config.driver.requests = parse_count(ENV_REQUESTS, value)?;
    }
    Ok(())
}

/// Load and validate configuration from a TOML file, then apply the environment.
pub fn load_config(path: &Path) -> Result<StressConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: &Path, lookup: F) -> Result<StressConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: StressConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated.
pub fn load_from_env() -> Result<StressConfig, ConfigError> {
    let mut config = StressConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn gate_accepts_common_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", " on "] {
            let mut config = StressConfig::default();
            apply_env_overrides(&mut config, env(&[(ENV_ENABLED, value)])).unwrap();
            assert!(config.enabled, "{value:?} should enable stress mode");
        }

        let mut config = StressConfig {
            enabled: true,
            ..Default::default()
        };
        apply_env_overrides(&mut config, env(&[(ENV_ENABLED, "0")])).unwrap();
        assert!(!config.enabled);
    }

    #[test]
    fn unset_gate_leaves_config_alone() {
        let mut config = StressConfig::default();
        apply_env_overrides(&mut config, env(&[])).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.driver.dop, 32);
    }

    #[test]
    fn numeric_overrides_apply() {
        let mut config = StressConfig::default();
        apply_env_overrides(&mut config, env(&[(ENV_DOP, "8"), (ENV_REQUESTS, "250")])).unwrap();
        assert_eq!(config.driver.dop, 8);
        assert_eq!(config.driver.requests, 250);
    }

    #[test]
    fn bad_numeric_override_is_reported() {
        let mut config = StressConfig::default();
        let err = apply_env_overrides(&mut config, env(&[(ENV_DOP, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: ENV_DOP, .. }));
        assert!(err.to_string().contains("HTTP_STRESS_DOP"));
    }

    #[test]
    fn load_config_reads_and_validates_file() {
        let dir = std::env::temp_dir().join(format!("http-stress-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let good = dir.join("good.toml");
        fs::write(&good, "[driver]\ndop = 3\nrequests = 9\n").unwrap();
        let config = load_config_with(&good, env(&[])).unwrap();
        assert_eq!(config.driver.dop, 3);

        let config = load_config_with(&good, env(&[(ENV_DOP, "5")])).unwrap();
        assert_eq!(config.driver.dop, 5);

        let bad = dir.join("bad.toml");
        fs::write(&bad, "[driver]\ndop = 0\n").unwrap();
        assert!(matches!(load_config_with(&bad, env(&[])), Err(ConfigError::Validation(_))));

        let broken = dir.join("broken.toml");
        fs::write(&broken, "[driver\n").unwrap();
        assert!(matches!(load_config_with(&broken, env(&[])), Err(ConfigError::Parse(_))));

        assert!(matches!(
            load_config(&dir.join("missing.toml")),
            Err(ConfigError::Io(_))
        ));

        fs::remove_dir_all(&dir).unwrap();
    }
}
