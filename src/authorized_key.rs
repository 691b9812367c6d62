// SPDX-License-Identifier: AGPL-3.0-or-later
//! Authorized-keys entries from key facts
//!
//! Consumers of `barman_key`/`postgres_key` declare an authorized key on the
//! peer host from the fact's type and key fields. This only formats the
//! string; nothing is written anywhere.

use serde::Serialize;
use std::fmt;

/// A public key split into its authorized_keys fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedKey {
    /// Key type, e.g. `ssh-rsa`
    #[serde(rename = "type")]
    pub key_type: String,
    /// Base64 key body
    pub key: String,
    /// Trailing comment, usually `user@host`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl AuthorizedKey {
    /// Split `material` on whitespace.
    ///
    /// Returns `None` for an empty fact (no key yet) or a lone token.
    pub fn parse(material: &str) -> Option<Self> {
        let mut parts = material.split_whitespace();
        let key_type = parts.next()?;
        let key = parts.next()?;
        let comment = parts.collect::<Vec<_>>().join(" ");

        Some(Self {
            key_type: key_type.to_string(),
            key: key.to_string(),
            comment: (!comment.is_empty()).then_some(comment),
        })
    }

    /// Replace the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// `type key [comment]`
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AuthorizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key_type, self.key)?;
        if let Some(comment) = &self.comment {
            write!(f, " {}", comment)?;
        }
        Ok(())
    }
}
