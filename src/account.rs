// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local account lookup
//!
//! Accounts are read fresh on every call; nothing is cached between
//! provisioning runs.

use std::path::PathBuf;
use tracing::debug;

use crate::error::{KeyFactsError, Result};

/// An operating-system user account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Login name
    pub name: String,
    /// Home directory
    pub home: PathBuf,
}

impl Account {
    pub fn new(name: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            home: home.into(),
        }
    }
}

/// Source of local user accounts
pub trait AccountDatabase {
    /// List every account, in database order
    fn accounts(&self) -> Result<Vec<Account>>;

    /// First account whose name matches exactly
    fn find(&self, name: &str) -> Result<Option<Account>> {
        Ok(self.accounts()?.into_iter().find(|a| a.name == name))
    }
}

/// Passwd-format account database (`/etc/passwd` by default).
///
/// Only accounts present in the file are seen. Accounts served through NSS
/// modules (LDAP, sssd, NIS) resolve to no account here and their key facts
/// stay empty.
#[derive(Debug, Clone)]
pub struct PasswdFile {
    path: PathBuf,
}

impl PasswdFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AccountDatabase for PasswdFile {
    fn accounts(&self) -> Result<Vec<Account>> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| KeyFactsError::AccountDatabase {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(parse_passwd(&contents))
    }
}

/// In-memory account list
impl AccountDatabase for Vec<Account> {
    fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.clone())
    }
}

/// Parse passwd(5) content into accounts.
///
/// Comments, blank lines, NIS compat entries and lines without seven fields
/// are skipped.
pub fn parse_passwd(contents: &str) -> Vec<Account> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            if line.starts_with('+') || line.starts_with('-') {
                return None;
            }

            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 7 || fields[0].is_empty() {
                debug!(line = index + 1, "Skipping malformed passwd entry");
                return None;
            }

            Some(Account::new(fields[0], fields[5]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
# service accounts
barman:x:998:998:Backup and Recovery Manager:/var/lib/barman:/bin/bash

postgres:x:26:26:PostgreSQL Server:/var/lib/pgsql:/bin/bash
broken:line
+@netgroup::::::
";

    #[test]
    fn test_parse_passwd() {
        let accounts = parse_passwd(PASSWD);
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[1], Account::new("barman", "/var/lib/barman"));
        assert_eq!(accounts[2].home, PathBuf::from("/var/lib/pgsql"));
    }

    #[test]
    fn test_parse_passwd_crlf() {
        let accounts = parse_passwd("barman:x:1:1::/var/lib/barman:/bin/sh\r\n");
        assert_eq!(accounts, vec![Account::new("barman", "/var/lib/barman")]);
    }

    #[test]
    fn test_find_is_exact_and_first_match() {
        let db = vec![
            Account::new("Barman", "/home/upper"),
            Account::new("barman", "/var/lib/barman"),
            Account::new("barman", "/srv/barman"),
        ];
        let found = db.find("barman").unwrap().unwrap();
        assert_eq!(found.home, PathBuf::from("/var/lib/barman"));
        assert!(db.find("barma").unwrap().is_none());
    }

    #[test]
    fn test_passwd_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("passwd");
        std::fs::write(&path, PASSWD).unwrap();

        let db = PasswdFile::new(&path);
        let postgres = db.find("postgres").unwrap().unwrap();
        assert_eq!(postgres.home, PathBuf::from("/var/lib/pgsql"));
    }

    #[test]
    fn test_passwd_file_missing() {
        let db = PasswdFile::new("/nonexistent/passwd");
        assert!(matches!(
            db.accounts(),
            Err(KeyFactsError::AccountDatabase { .. })
        ));
    }
}
