// SPDX-License-Identifier: AGPL-3.0-or-later
//! Idempotent SSH key provisioning
//!
//! Given an account name, return that account's RSA public key, generating
//! the key pair first when `~/.ssh/id_rsa.pub` does not exist yet.
//!
//! Provisioning is best effort. A missing account, a failed generator or an
//! unreadable key all end in an empty key string, which callers treat as
//! "not available yet" and retry on their next run. The [`Provisioned`]
//! value keeps the distinction for logs and tests.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::account::{AccountDatabase, PasswdFile};
use crate::config::Config;
use crate::keygen::{CommandRunner, KeyPair, KeygenCommand, SystemRunner};

/// Outcome of a provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    /// Key already existed
    Found(String),
    /// Key was generated during this run
    Generated(String),
    /// Generator ran but no public key appeared
    GenerationFailed,
    /// Public key exists but could not be read
    Unreadable,
    /// No account with that name
    NoSuchAccount,
}

impl Provisioned {
    /// Public key material, or an empty string
    pub fn into_material(self) -> String {
        match self {
            Provisioned::Found(key) | Provisioned::Generated(key) => key,
            _ => String::new(),
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Provisioned::Found(_) => "found",
            Provisioned::Generated(_) => "generated",
            Provisioned::GenerationFailed => "generation-failed",
            Provisioned::Unreadable => "unreadable",
            Provisioned::NoSuchAccount => "no-such-account",
        }
    }
}

/// Looks up or generates an account's SSH key
#[derive(Debug, Clone)]
pub struct KeyProvisioner<A, R> {
    accounts: A,
    runner: R,
    keygen: KeygenCommand,
}

impl KeyProvisioner<PasswdFile, SystemRunner> {
    /// Provisioner backed by the configured passwd file and real processes
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            PasswdFile::new(&config.passwd_file),
            SystemRunner,
            KeygenCommand::new(&config.keygen),
        )
    }
}

impl<A: AccountDatabase, R: CommandRunner> KeyProvisioner<A, R> {
    pub fn new(accounts: A, runner: R, keygen: KeygenCommand) -> Self {
        Self {
            accounts,
            runner,
            keygen,
        }
    }

    /// Public key for `username`, or an empty string
    pub fn provision_and_fetch_key(&self, username: &str) -> String {
        self.provision(username).into_material()
    }

    /// Provision `username` and report what happened
    pub fn provision(&self, username: &str) -> Provisioned {
        let account = match self.accounts.find(username) {
            Ok(Some(account)) => account,
            Ok(None) => {
                debug!(user = %username, "No such account");
                return Provisioned::NoSuchAccount;
            }
            Err(e) => {
                warn!(user = %username, error = %e, "Account lookup failed");
                return Provisioned::NoSuchAccount;
            }
        };

        let key_pair = KeyPair::for_home(&account.home);

        if key_pair.is_present() {
            debug!(
                user = %username,
                path = %key_pair.public_key_path.display(),
                "Key already present"
            );
            return match read_public_key(&key_pair.public_key_path) {
                Some(key) => Provisioned::Found(key),
                None => Provisioned::Unreadable,
            };
        }

        let invocation = self.keygen.invocation(&account, &key_pair);
        info!(user = %username, command = %invocation.display(), "Generating SSH key pair");

        // Exit status is informational; the key file decides success.
        match self.runner.run(&invocation) {
            Ok(output) if !output.status.success() => {
                warn!(
                    user = %username,
                    status = %output.status,
                    stderr = %stderr_excerpt(&output.stderr),
                    "Key generator exited unsuccessfully"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(user = %username, error = %e, "Failed to run key generator");
            }
        }

        if !key_pair.is_present() {
            warn!(
                user = %username,
                path = %key_pair.public_key_path.display(),
                "Public key still missing after generation"
            );
            return Provisioned::GenerationFailed;
        }

        match read_public_key(&key_pair.public_key_path) {
            Some(key) => Provisioned::Generated(key),
            None => Provisioned::Unreadable,
        }
    }
}

fn read_public_key(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Some(chomp(&contents).to_string()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read public key");
            None
        }
    }
}

/// Last non-empty stderr line, capped for log fields
fn stderr_excerpt(stderr: &[u8]) -> String {
    const MAX_CHARS: usize = 200;

    let text = String::from_utf8_lossy(stderr);
    let line = text
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.chars().take(MAX_CHARS).collect()
}

/// Strip one trailing line terminator (`\r\n`, `\n` or `\r`)
pub fn chomp(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .or_else(|| s.strip_suffix('\r'))
        .unwrap_or(s)
}
