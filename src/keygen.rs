// SPDX-License-Identifier: AGPL-3.0-or-later
//! Key generator invocation
//!
//! Commands are built as argument vectors and never passed through a shell,
//! so account names and paths cannot inject extra commands.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

use crate::account::Account;
use crate::config::KeygenConfig;
use crate::error::Result;

/// Private key file name, relative to `~/.ssh`
pub const PRIVATE_KEY_FILE: &str = "id_rsa";

/// Public key file name, relative to `~/.ssh`
pub const PUBLIC_KEY_FILE: &str = "id_rsa.pub";

/// On-disk location of an account's RSA key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

impl KeyPair {
    /// Key pair paths under `home/.ssh`.
    ///
    /// A relative or empty home is taken from `/`, never from the current
    /// directory.
    pub fn for_home(home: &Path) -> Self {
        let ssh_dir = Path::new("/").join(home).join(".ssh");
        Self {
            private_key_path: ssh_dir.join(PRIVATE_KEY_FILE),
            public_key_path: ssh_dir.join(PUBLIC_KEY_FILE),
        }
    }

    /// A key pair is present when its public key file exists
    pub fn is_present(&self) -> bool {
        self.public_key_path.exists()
    }
}

/// A fully resolved external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Render for logs
    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() {
                out.push_str("''");
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

/// Builds the key generation command for an account
#[derive(Debug, Clone)]
pub struct KeygenCommand {
    program: String,
    switch_program: Option<String>,
}

impl KeygenCommand {
    pub fn new(config: &KeygenConfig) -> Self {
        Self {
            program: config.program.clone(),
            switch_program: config
                .impersonate
                .then(|| config.switch_program.clone()),
        }
    }

    /// RSA, empty passphrase, quiet, explicit output path; run as `account`
    /// when impersonation is enabled.
    pub fn invocation(&self, account: &Account, key_pair: &KeyPair) -> Invocation {
        let keygen_args = [
            "-t".to_string(),
            "rsa".to_string(),
            "-N".to_string(),
            String::new(),
            "-q".to_string(),
            "-f".to_string(),
            key_pair.private_key_path.display().to_string(),
        ];

        match &self.switch_program {
            Some(switch) => {
                let mut args = vec![
                    "-u".to_string(),
                    account.name.clone(),
                    "--".to_string(),
                    self.program.clone(),
                ];
                args.extend(keygen_args);
                Invocation {
                    program: switch.clone(),
                    args,
                }
            }
            None => Invocation {
                program: self.program.clone(),
                args: keygen_args.to_vec(),
            },
        }
    }
}

impl Default for KeygenCommand {
    fn default() -> Self {
        Self::new(&KeygenConfig::default())
    }
}

/// Runs an external command to completion
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<Output>;
}

/// Spawns real processes, blocking until they exit
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        debug!(command = %invocation.display(), "Spawning command");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(output)
    }
}
