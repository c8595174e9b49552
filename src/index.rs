//!
//! src/index.rs  Oct 16th, 2026
//!
//! Lookup of target catalog items by normalized path. Built once from a
//! fully drained enumeration; a path owned by more than one item is never
//! resolvable and is parked in the collision set instead.
//!

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::path::{self, NormalizedPath};
use crate::types::TargetItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a TargetItem),
    Collision(&'a [TargetItem]),
    NotFound,
}

#[derive(Debug, Default)]
pub struct PathIndex {
    entries: HashMap<NormalizedPath, TargetItem>,
    collisions: BTreeMap<NormalizedPath, Vec<TargetItem>>,
    skipped: Vec<TargetItem>,
}

impl PathIndex {
    pub fn build<I>(items: I) -> Self
    where
        I: IntoIterator<Item = TargetItem>,
    {
        let mut index = PathIndex::default();
        for item in items {
            index.insert(item);
        }
        debug!(
            entries = index.entries.len(),
            collisions = index.collisions.len(),
            skipped = index.skipped.len(),
            "index.built"
        );
        index
    }

    fn insert(&mut self, item: TargetItem) {
        let key = match path::normalize(&item.absolute_path) {
            Ok(key) => key,
            Err(e) => {
                debug!(id = %item.id, path = %item.absolute_path, error = %e, "index.skip");
                self.skipped.push(item);
                return;
            }
        };

        if let Some(candidates) = self.collisions.get_mut(&key) {
            if !candidates.iter().any(|c| c.id == item.id) {
                candidates.push(item);
            }
            return;
        }

        match self.entries.get(&key) {
            // same item reported twice, e.g. overlapping pages
            Some(existing) if existing.id == item.id => {}
            Some(_) => {
                let existing = self.entries.remove(&key).into_iter();
                warn!(path = %key, "index.collision");
                self.collisions.insert(key, existing.chain([item]).collect());
            }
            None => {
                self.entries.insert(key, item);
            }
        }
    }

    pub fn lookup(&self, key: &NormalizedPath) -> Lookup<'_> {
        if let Some(item) = self.entries.get(key) {
            return Lookup::Found(item);
        }
        match self.collisions.get(key) {
            Some(candidates) => Lookup::Collision(candidates),
            None => Lookup::NotFound,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.collisions.is_empty()
    }

    /// Paths shared by two or more target items, in path order
    pub fn collisions(&self) -> impl Iterator<Item = (&NormalizedPath, &[TargetItem])> {
        self.collisions.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn collision_count(&self) -> usize {
        self.collisions.len()
    }

    /// Target items whose paths could not be normalized
    pub fn skipped(&self) -> &[TargetItem] {
        &self.skipped
    }
}
