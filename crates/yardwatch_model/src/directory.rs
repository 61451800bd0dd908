//! The yard directory loaded before a run.

use crate::error::{Error, Result};
use crate::message::YardId;
use crate::yard::{Yard, YardSpec};
use std::collections::HashMap;

/// Ordered, read-only collection of yard descriptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YardDirectory {
    yards: Vec<YardSpec>,
    index: HashMap<YardId, usize>,
}

impl YardDirectory {
    /// Builds a directory, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDirectory`] when no yards are given and
    /// [`Error::DuplicateYard`] when an id repeats.
    pub fn new(yards: Vec<YardSpec>) -> Result<Self> {
        if yards.is_empty() {
            return Err(Error::EmptyDirectory);
        }

        let mut index = HashMap::with_capacity(yards.len());
        for (position, spec) in yards.iter().enumerate() {
            if index.insert(spec.id, position).is_some() {
                return Err(Error::DuplicateYard(spec.id));
            }
        }

        Ok(Self { yards, index })
    }

    /// Looks up a yard by id.
    #[must_use]
    pub fn get(&self, id: YardId) -> Option<&YardSpec> {
        self.index.get(&id).map(|&i| &self.yards[i])
    }

    /// Returns true if the id is listed.
    #[must_use]
    pub fn contains(&self, id: YardId) -> bool {
        self.index.contains_key(&id)
    }

    /// Iterates yards in directory order.
    pub fn iter(&self) -> impl Iterator<Item = &YardSpec> {
        self.yards.iter()
    }

    /// Number of yards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.yards.len()
    }

    /// Returns true if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.yards.is_empty()
    }

    /// Creates fresh progress state for every yard, in directory order.
    #[must_use]
    pub fn fresh_yards(&self) -> Vec<Yard> {
        self.yards.iter().copied().map(Yard::new).collect()
    }
}
