// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fact gathering
//!
//! Evaluators block (they may spawn a key generator), so each one runs on
//! tokio's blocking pool. An optional per-fact timeout bounds the wait; a
//! fact that overruns is left out of the result and its evaluator is not
//! cancelled.

use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::registry::{current_kernel, Fact, FactRegistry};
use super::FactSet;
use crate::error::{KeyFactsError, Result};

/// Evaluates registered facts for one run
pub struct FactGatherer {
    registry: FactRegistry,
    kernel: String,
    timeout: Option<Duration>,
}

impl FactGatherer {
    /// Gatherer for the running kernel with no timeout
    pub fn new(registry: FactRegistry) -> Self {
        Self {
            registry,
            kernel: current_kernel().to_string(),
            timeout: None,
        }
    }

    /// Bound each evaluation
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pretend to run on a different kernel
    pub fn with_kernel(mut self, kernel: &str) -> Self {
        self.kernel = kernel.to_string();
        self
    }

    /// Evaluate every suitable fact, in registration order
    pub async fn gather(&self) -> FactSet {
        let start_time = Instant::now();
        let mut facts = FactSet::new();

        for fact in self.registry.iter() {
            if let Some(value) = self.evaluate(fact).await {
                facts.insert(fact.name.clone(), value);
            }
        }

        info!(
            gathered = facts.len(),
            registered = self.registry.len(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Fact gathering completed"
        );

        facts
    }

    /// Evaluate a single fact by name.
    ///
    /// `Ok(None)` means the fact exists but is not suitable here or did not
    /// finish in time.
    pub async fn resolve(&self, name: &str) -> Result<Option<String>> {
        let fact = self
            .registry
            .get(name)
            .ok_or_else(|| KeyFactsError::UnknownFact {
                name: name.to_string(),
            })?;

        Ok(self.evaluate(fact).await)
    }

    async fn evaluate(&self, fact: &Fact) -> Option<String> {
        if !fact.confine.allows(&self.kernel) {
            debug!(fact = %fact.name, kernel = %self.kernel, "Fact not suitable on this kernel");
            return None;
        }

        let evaluator = fact.evaluator();
        let task = tokio::task::spawn_blocking(move || evaluator());

        let joined = match self.timeout {
            Some(duration) => match timeout(duration, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        fact = %fact.name,
                        timeout_secs = duration.as_secs(),
                        "Fact evaluation timed out"
                    );
                    return None;
                }
            },
            None => task.await,
        };

        match joined {
            Ok(value) => {
                debug!(fact = %fact.name, empty = value.is_empty(), "Fact resolved");
                Some(value)
            }
            Err(e) => {
                error!(fact = %fact.name, error = %e, "Fact evaluator panicked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Confine;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn registry() -> FactRegistry {
        let mut registry = FactRegistry::new();
        registry
            .register("barman_key", Confine::linux(), || "ssh-rsa AAAA".to_string())
            .unwrap();
        registry
            .register("postgres_key", Confine::linux(), String::new)
            .unwrap();
        registry
            .register("anywhere", Confine::Any, || "yes".to_string())
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_gather_on_linux() {
        let gatherer = FactGatherer::new(registry()).with_kernel("Linux");
        let facts = gatherer.gather().await;

        assert_eq!(facts.len(), 3);
        assert_eq!(facts.get("barman_key"), Some("ssh-rsa AAAA"));
        assert_eq!(facts.get("postgres_key"), Some(""));
        let names: Vec<&str> = facts.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["barman_key", "postgres_key", "anywhere"]);
    }

    #[tokio::test]
    async fn test_gather_confined_elsewhere() {
        let gatherer = FactGatherer::new(registry()).with_kernel("Darwin");
        let facts = gatherer.gather().await;

        assert_eq!(facts.len(), 1);
        assert!(facts.get("barman_key").is_none());
        assert_eq!(facts.get("anywhere"), Some("yes"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_fact() {
        let gatherer = FactGatherer::new(registry());
        let result = gatherer.resolve("missing").await;
        assert!(matches!(result, Err(KeyFactsError::UnknownFact { .. })));
    }

    #[tokio::test]
    async fn test_resolve_evaluates_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = FactRegistry::new();
        registry
            .register("counted", Confine::Any, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "v".to_string()
            })
            .unwrap();

        let gatherer = FactGatherer::new(registry);
        assert_eq!(gatherer.resolve("counted").await.unwrap(), Some("v".to_string()));
        assert_eq!(gatherer.resolve("counted").await.unwrap(), Some("v".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_drops_fact() {
        let mut registry = FactRegistry::new();
        registry
            .register("slow", Confine::Any, || {
                std::thread::sleep(Duration::from_millis(500));
                "late".to_string()
            })
            .unwrap();
        registry
            .register("fast", Confine::Any, || "ok".to_string())
            .unwrap();

        let gatherer =
            FactGatherer::new(registry).with_timeout(Some(Duration::from_millis(50)));
        let facts = gatherer.gather().await;

        assert!(facts.get("slow").is_none());
        assert_eq!(facts.get("fast"), Some("ok"));
    }

    #[tokio::test]
    async fn test_panicking_evaluator_is_dropped() {
        let mut registry = FactRegistry::new();
        registry
            .register("boom", Confine::Any, || panic!("evaluator failure"))
            .unwrap();

        let gatherer = FactGatherer::new(registry);
        assert_eq!(gatherer.resolve("boom").await.unwrap(), None);
    }
}
