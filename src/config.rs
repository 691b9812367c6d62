// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration management for barman-keyfacts

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{KeyFactsError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instance name
    pub name: String,

    /// Passwd-format account database
    #[serde(default = "default_passwd_file")]
    pub passwd_file: PathBuf,

    /// Upper bound for a single fact evaluation, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_timeout_secs: Option<u64>,

    /// Key generation settings
    #[serde(default)]
    pub keygen: KeygenConfig,

    /// Key facts to publish, one per account
    #[serde(default = "default_facts")]
    pub facts: Vec<FactConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the key generator is invoked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenConfig {
    /// Key generation program
    #[serde(default = "default_keygen_program")]
    pub program: String,

    /// Run the generator as the target account
    #[serde(default = "default_true")]
    pub impersonate: bool,

    /// Account-switch program, invoked as `<program> -u <user> -- ...`
    #[serde(default = "default_switch_program")]
    pub switch_program: String,
}

/// A single key fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactConfig {
    /// Fact name, e.g. `barman_key`
    pub name: String,

    /// Account whose public key the fact resolves to
    pub user: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            program: default_keygen_program(),
            impersonate: true,
            switch_program: default_switch_program(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "barman-keyfacts".to_string(),
            passwd_file: default_passwd_file(),
            fact_timeout_secs: None,
            keygen: KeygenConfig::default(),
            facts: default_facts(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(KeyFactsError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(invalid("name cannot be empty"));
        }

        if self.keygen.program.trim().is_empty() {
            return Err(invalid("keygen.program cannot be empty"));
        }

        if self.keygen.impersonate && self.keygen.switch_program.trim().is_empty() {
            return Err(invalid(
                "keygen.switch_program cannot be empty when impersonate is enabled",
            ));
        }

        if self.fact_timeout_secs == Some(0) {
            return Err(invalid("fact_timeout_secs must be greater than zero"));
        }

        let mut seen = HashSet::new();
        for fact in &self.facts {
            if fact.name.is_empty() {
                return Err(invalid("fact name cannot be empty"));
            }
            if fact.user.is_empty() {
                return Err(invalid(&format!("fact '{}' has an empty user", fact.name)));
            }
            if !seen.insert(fact.name.as_str()) {
                return Err(invalid(&format!("fact '{}' is declared twice", fact.name)));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> KeyFactsError {
    KeyFactsError::InvalidConfig {
        message: message.to_string(),
    }
}

// Default value functions

fn default_passwd_file() -> PathBuf {
    PathBuf::from("/etc/passwd")
}

fn default_keygen_program() -> String {
    "ssh-keygen".to_string()
}

fn default_switch_program() -> String {
    "runuser".to_string()
}

fn default_facts() -> Vec<FactConfig> {
    vec![
        FactConfig {
            name: "barman_key".to_string(),
            user: "barman".to_string(),
        },
        FactConfig {
            name: "postgres_key".to_string(),
            user: "postgres".to_string(),
        },
    ]
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.name, "barman-keyfacts");
        assert_eq!(config.passwd_file, PathBuf::from("/etc/passwd"));
        assert!(config.keygen.impersonate);
        assert_eq!(config.facts.len(), 2);
        assert_eq!(config.facts[0].name, "barman_key");
        assert_eq!(config.facts[1].user, "postgres");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_name() {
        let mut config = Config::default();
        config.name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_duplicate_fact() {
        let mut config = Config::default();
        config.facts.push(FactConfig {
            name: "barman_key".to_string(),
            user: "someone".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_switch_program() {
        let mut config = Config::default();
        config.keygen.switch_program = String::new();
        assert!(config.validate().is_err());

        // Not needed when the generator runs as the current user
        config.keygen.impersonate = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.fact_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_content = r#"
            name = "backup-host"
            passwd_file = "/tmp/passwd"
            fact_timeout_secs = 15

            [keygen]
            program = "/usr/bin/ssh-keygen"
            impersonate = false

            [[facts]]
            name = "barman_key"
            user = "barman"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.name, "backup-host");
        assert_eq!(config.fact_timeout_secs, Some(15));
        assert!(!config.keygen.impersonate);
        assert_eq!(config.keygen.switch_program, "runuser");
        assert_eq!(config.facts.len(), 1);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::from_file("/nonexistent/keyfacts.toml");
        assert!(matches!(result, Err(KeyFactsError::ConfigNotFound { .. })));
    }
}
