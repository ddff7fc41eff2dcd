//! Pluggable config validation strategies
//!
//! Separates filesystem validation (for CLI use) from schema validation (for library use).

use std::path::Path;

use crate::config::Configuration;
use crate::error::{ConfigError, Result};
use crate::template::validate_template;

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    fn validate(&self, config: &Configuration) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use tote_config::{Configuration, ConfigValidator, SchemaValidator};
///
/// let mut config = Configuration::default();
/// config.entry.insert("app".into(), "src/app.js".into());
///
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &Configuration) -> Result<()> {
        if config.entry.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        for (name, path) in &config.entry {
            if name.trim().is_empty() || path.as_os_str().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("entry `{name}` has an empty name or path"),
                    hint: Some("Each entry maps a logical name to a source file".to_string()),
                });
            }
        }

        validate_template(&config.output.path)?;
        validate_template(&config.output.assets)?;
        for rule in &config.rules {
            if let Some(template) = &rule.output {
                validate_template(template)?;
            }
            for stage in &rule.stages {
                if stage.name.trim().is_empty() {
                    return Err(ConfigError::SchemaValidation {
                        message: format!("rule `{}` has a stage without a name", rule.test.as_str()),
                        hint: None,
                    });
                }
            }
        }

        for plugin in &config.plugins {
            if plugin.name.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "plugin name cannot be empty".to_string(),
                    hint: Some("Remove empty entries from the 'plugins' array".to_string()),
                });
            }
        }

        if config.output.dir.as_os_str().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "output.dir cannot be empty".to_string(),
                hint: None,
            });
        }

        if config.settings.jobs == Some(0) {
            return Err(ConfigError::SchemaValidation {
                message: "settings.jobs must be at least 1".to_string(),
                hint: Some("Omit `jobs` to use one worker per CPU".to_string()),
            });
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use)
///
/// Runs the schema checks, then verifies that every entry exists below `root`.
pub struct FsValidator {
    root: std::path::PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &Configuration) -> Result<()> {
        SchemaValidator.validate(config)?;

        for (name, entry) in &config.entry {
            let path = self.root.join(entry);
            if !path.is_file() {
                return Err(ConfigError::EntryNotFound {
                    name: name.clone(),
                    path,
                });
            }
        }

        Ok(())
    }
}

/// Schema validation (convenience function)
pub fn validate_schema(config: &Configuration) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Filesystem validation (convenience function)
pub fn validate_fs(config: &Configuration, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
