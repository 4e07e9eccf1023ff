//! Ordered list of caffeine sources with case-insensitive unique names.
//!
//! New sources go to the front. Duplicate adds and out-of-range inserts are
//! silent no-ops reported through the `bool` return value.

use serde::{Deserialize, Serialize};

use super::source::{names_match, CaffeineSource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryStore {
    sources: Vec<CaffeineSource>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a persisted list, dropping later case-insensitive
    /// duplicates so the uniqueness invariant holds from the start.
    pub fn from_sources(sources: Vec<CaffeineSource>) -> Self {
        let mut store = Self::new();
        for source in sources {
            if !store.contains(&source.name) {
                store.sources.push(source);
            }
        }
        store
    }

    pub fn sources(&self) -> &[CaffeineSource] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<CaffeineSource> {
        self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.same_name(name))
    }

    pub fn get(&self, name: &str) -> Option<&CaffeineSource> {
        self.sources.iter().find(|s| s.same_name(name))
    }

    /// Prepend `source` unless its name is taken.
    pub fn add(&mut self, source: CaffeineSource) -> bool {
        self.insert(0, source)
    }

    /// Insert at `index` (`0..=len`) unless the name is taken.
    pub fn insert(&mut self, index: usize, source: CaffeineSource) -> bool {
        if self.contains(&source.name) || index > self.sources.len() {
            return false;
        }
        self.sources.insert(index, source);
        true
    }

    /// Remove every source whose name matches. Returns how many went.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.sources.len();
        self.sources.retain(|s| !s.same_name(name));
        before - self.sources.len()
    }

    /// Rename and re-amount the source currently named exactly `old_name`.
    ///
    /// Fails without changes when `new_name` belongs to another source, or
    /// when no source is named `old_name`. Position is preserved.
    pub fn update(&mut self, old_name: &str, new_name: &str, new_amount_mg: u32) -> bool {
        let collides = self
            .sources
            .iter()
            .any(|s| names_match(&s.name, new_name) && s.name != old_name);
        if collides {
            return false;
        }
        match self.sources.iter_mut().find(|s| s.name == old_name) {
            Some(entry) => {
                entry.name = new_name.to_string();
                entry.amount_mg = new_amount_mg;
                true
            }
            None => false,
        }
    }
}
