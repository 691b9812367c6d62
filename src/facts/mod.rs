// SPDX-License-Identifier: AGPL-3.0-or-later
//! Named system facts
//!
//! A [`FactRegistry`] maps fact names to evaluators. A [`FactGatherer`]
//! evaluates the registry once per configuration run and hands the
//! resulting [`FactSet`] to whatever consumes it.

mod gatherer;
mod registry;

pub use gatherer::FactGatherer;
pub use registry::{current_kernel, Confine, Evaluator, Fact, FactRegistry};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Gathered fact values, in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSet {
    entries: Vec<(String, String)>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FactSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
