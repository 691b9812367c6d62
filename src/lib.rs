// SPDX-License-Identifier: AGPL-3.0-or-later
//! barman-keyfacts: SSH key facts for barman and its PostgreSQL servers
//!
//! barman pulls WAL and base backups over SSH, so the backup host and every
//! database server need each other's public keys. This crate publishes those
//! keys as named facts for a configuration run.
//!
//! # Features
//!
//! * **Key provisioning:** look up `~/.ssh/id_rsa.pub` for an account and
//!   generate the pair when it is missing ([`provision::KeyProvisioner`])
//! * **Facts:** `barman_key` and `postgres_key`, confined to Linux, gathered
//!   through an explicit [`facts::FactRegistry`]
//! * **Authorized keys:** split a key fact into the fields a peer's
//!   authorized_keys entry needs

pub mod account;
pub mod authorized_key;
pub mod config;
pub mod error;
pub mod facts;
pub mod keygen;
pub mod provision;

pub use config::Config;
pub use error::{KeyFactsError, Result};
pub use provision::{KeyProvisioner, Provisioned};
