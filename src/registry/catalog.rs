//! Locator to implementation table.
//!
//! Registrations in the store name their implementation by a locator
//! string. The catalog maps those locators to live implementations in this
//! process. It is populated by explicit calls only.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::process::Process;

/// Capability table mapping locators to process implementations.
#[derive(Default)]
pub struct Catalog {
    entries: DashMap<String, Arc<dyn Process>>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut locators: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        locators.sort();
        f.debug_struct("Catalog").field("locators", &locators).finish()
    }
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the implementation behind `locator`.
    pub fn insert(&self, locator: impl Into<String>, process: Arc<dyn Process>) {
        self.entries.insert(locator.into(), process);
    }

    /// Looks up the implementation behind `locator`.
    pub fn get(&self, locator: &str) -> Option<Arc<dyn Process>> {
        self.entries.get(locator).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if `locator` is known.
    pub fn contains(&self, locator: &str) -> bool {
        self.entries.contains_key(locator)
    }

    /// Number of known locators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no locator is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
