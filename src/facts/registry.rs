// SPDX-License-Identifier: AGPL-3.0-or-later
//! Named fact registration

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{KeyFactsError, Result};
use crate::provision::KeyProvisioner;

/// Zero-argument fact evaluator
pub type Evaluator = Arc<dyn Fn() -> String + Send + Sync>;

/// Where a fact may be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confine {
    /// Any platform
    Any,
    /// Only on the named kernel (compared case-insensitively)
    Kernel(String),
}

impl Confine {
    pub fn linux() -> Self {
        Confine::Kernel("Linux".to_string())
    }

    /// Whether the fact is suitable on `kernel`
    pub fn allows(&self, kernel: &str) -> bool {
        match self {
            Confine::Any => true,
            Confine::Kernel(name) => name.eq_ignore_ascii_case(kernel),
        }
    }
}

/// Kernel name of the running system
pub fn current_kernel() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "freebsd" => "FreeBSD",
        "windows" => "windows",
        other => other,
    }
}

/// A registered fact
#[derive(Clone)]
pub struct Fact {
    pub name: String,
    pub confine: Confine,
    evaluator: Evaluator,
}

impl Fact {
    pub fn evaluator(&self) -> Evaluator {
        Arc::clone(&self.evaluator)
    }

    pub fn evaluate(&self) -> String {
        (self.evaluator)()
    }
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fact")
            .field("name", &self.name)
            .field("confine", &self.confine)
            .finish_non_exhaustive()
    }
}

/// Fact name to evaluator table, in registration order
#[derive(Debug, Clone, Default)]
pub struct FactRegistry {
    facts: Vec<Fact>,
}

impl FactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fact; names must be unique
    pub fn register<F>(&mut self, name: &str, confine: Confine, evaluator: F) -> Result<()>
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        if self.get(name).is_some() {
            return Err(KeyFactsError::DuplicateFact {
                name: name.to_string(),
            });
        }

        self.facts.push(Fact {
            name: name.to_string(),
            confine,
            evaluator: Arc::new(evaluator),
        });
        Ok(())
    }

    /// One Linux-confined key fact per configured account
    pub fn from_config(config: &Config) -> Result<Self> {
        let provisioner = Arc::new(KeyProvisioner::from_config(config));
        let mut registry = Self::new();

        for fact in &config.facts {
            let provisioner = Arc::clone(&provisioner);
            let user = fact.user.clone();
            registry.register(&fact.name, Confine::linux(), move || {
                provisioner.provision_and_fetch_key(&user)
            })?;
        }

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.facts.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_evaluate() {
        let mut registry = FactRegistry::new();
        registry
            .register("answer", Confine::Any, || "42".to_string())
            .unwrap();

        let fact = registry.get("answer").unwrap();
        assert_eq!(fact.evaluate(), "42");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = FactRegistry::new();
        registry.register("a", Confine::Any, String::new).unwrap();
        let result = registry.register("a", Confine::Any, String::new);
        assert!(matches!(result, Err(KeyFactsError::DuplicateFact { .. })));
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = FactRegistry::new();
        for name in ["postgres_key", "barman_key", "other"] {
            registry.register(name, Confine::Any, String::new).unwrap();
        }
        assert_eq!(registry.names(), vec!["postgres_key", "barman_key", "other"]);
    }

    #[test]
    fn test_confine() {
        assert!(Confine::Any.allows("Darwin"));
        assert!(Confine::linux().allows("Linux"));
        assert!(Confine::linux().allows("linux"));
        assert!(!Confine::linux().allows("Darwin"));
    }

    #[test]
    fn test_from_config_registers_key_facts() {
        let registry = FactRegistry::from_config(&Config::default()).unwrap();
        assert_eq!(registry.names(), vec!["barman_key", "postgres_key"]);
        assert!(registry.iter().all(|f| f.confine == Confine::linux()));
    }
}
