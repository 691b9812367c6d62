// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for barman-keyfacts

use thiserror::Error;

/// Result type alias for barman-keyfacts operations
pub type Result<T> = std::result::Result<T, KeyFactsError>;

/// Errors that can occur while configuring or gathering facts.
///
/// Key provisioning itself never surfaces these to fact consumers; see
/// [`crate::provision::Provisioned`].
#[derive(Error, Debug)]
pub enum KeyFactsError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A fact with this name is already registered
    #[error("Fact already registered: {name}")]
    DuplicateFact { name: String },

    /// No fact with this name is registered
    #[error("Unknown fact: {name}")]
    UnknownFact { name: String },

    /// The account database could not be read
    #[error("Failed to read account database '{path}': {message}")]
    AccountDatabase { path: String, message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
