//! The ordered filter chain.
//!
//! A chain maps entry names to filter instances and keeps them in
//! application order. Filters do not commute, so the order is part of the
//! chain's meaning:
//! - a new entry is appended at the end
//! - an updated entry keeps its index
//! - a removed entry leaves the relative order of the rest unchanged

use crate::core::buffer::PixelBuffer;
use crate::core::error::ValidationReport;
use crate::core::filter::{same_filter, Filter};
use indexmap::IndexMap;
use log::{debug, trace};
use std::fmt;

/// What [`FilterChain::update_or_insert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainChange {
    /// A new entry was appended.
    Inserted,
    /// An existing entry was replaced at its index.
    Replaced,
    /// An existing entry was removed.
    Removed,
    /// Nothing changed (removal of an absent entry).
    Unchanged,
}

/// Ordered collection of named filter instances.
#[derive(Clone, Default)]
pub struct FilterChain {
    entries: IndexMap<String, Box<dyn Filter>>,
}

impl FilterChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replace in place, or remove the entry called `name`.
    ///
    /// With `should_apply` false an existing entry is removed. With
    /// `should_apply` true an existing entry is replaced at the same index,
    /// otherwise `instance` is appended. Calling this twice with the same
    /// arguments leaves the chain as calling it once.
    pub fn update_or_insert(
        &mut self,
        name: &str,
        instance: Box<dyn Filter>,
        should_apply: bool,
    ) -> ChainChange {
        if !should_apply {
            return match self.entries.shift_remove(name) {
                Some(_) => {
                    debug!("Removed chain entry '{}'", name);
                    ChainChange::Removed
                }
                None => ChainChange::Unchanged,
            };
        }

        match self.entries.get_mut(name) {
            Some(existing) => {
                trace!(
                    "Replacing chain entry '{}' with {}",
                    name,
                    instance.metadata().id
                );
                *existing = instance;
                ChainChange::Replaced
            }
            None => {
                debug!(
                    "Appending chain entry '{}' ({}) at position {}",
                    name,
                    instance.metadata().id,
                    self.entries.len()
                );
                self.entries.insert(name.to_string(), instance);
                ChainChange::Inserted
            }
        }
    }

    /// Append or replace, ignoring neutrality.
    pub fn set(&mut self, name: &str, instance: Box<dyn Filter>) -> ChainChange {
        self.update_or_insert(name, instance, true)
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, instance: impl Filter + 'static) -> Self {
        self.set(name, Box::new(instance));
        self
    }

    /// Remove an entry, preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Filter>> {
        let removed = self.entries.shift_remove(name);
        if removed.is_some() {
            debug!("Removed chain entry '{}'", name);
        }
        removed
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.entries.get(name).map(|f| f.as_ref())
    }

    /// Index of an entry in application order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.get_index_of(name)
    }

    /// Whether an entry exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in application order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    /// `(name, filter)` pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Filter)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// The chain flattened to its instances, in application order.
    pub fn instances(&self) -> Vec<&dyn Filter> {
        self.entries.values().map(|f| f.as_ref()).collect()
    }

    /// Instances that would change the image.
    pub fn active(&self) -> Vec<&dyn Filter> {
        self.entries
            .values()
            .filter(|f| !f.is_neutral())
            .map(|f| f.as_ref())
            .collect()
    }

    /// Validate every entry.
    ///
    /// Entries whose parameters are not well formed are errors. Entries that
    /// are currently neutral are reported as warnings.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        for (name, filter) in &self.entries {
            if let Err(e) = filter.validate() {
                report.add_error(name.clone(), e);
            } else if filter.is_neutral() {
                report.add_warning(format!("'{}' is neutral and will be skipped", name));
            }
        }
        report
    }

    /// Apply every non-neutral entry left to right on the CPU.
    ///
    /// Returns the number of filters that ran.
    pub fn apply_cpu(&self, buffer: &mut PixelBuffer) -> usize {
        let mut applied = 0;
        for (name, filter) in &self.entries {
            if filter.is_neutral() {
                trace!("Skipping neutral entry '{}'", name);
                continue;
            }
            trace!("Applying '{}' ({})", name, filter.metadata().id);
            filter.process(buffer);
            applied += 1;
        }
        applied
    }
}

impl PartialEq for FilterChain {
    /// Same names in the same order, each with the same filter type and
    /// parameters.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((na, fa), (nb, fb))| na == nb && same_filter(fa.as_ref(), fb.as_ref()))
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v.metadata().id)))
            .finish()
    }
}
