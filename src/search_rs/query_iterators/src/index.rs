/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Index identities.
//!
//! Every posting source belongs to exactly one index; composite iterators carry
//! the set of indices reachable below them, which decides whether single-index
//! operators accept them and which interval streams they expose.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Identity of an index, compared by value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IndexId(pub u32);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A sorted set of distinct [`IndexId`]s. Most iterators span a single index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet(SmallVec<[IndexId; 2]>);

impl IndexSet {
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// A set holding only `index`.
    pub fn single(index: IndexId) -> Self {
        let mut set = Self::new();
        set.insert(index);
        set
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, index: IndexId) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    /// Insert `index`, returning `false` if it was already present.
    pub fn insert(&mut self, index: IndexId) -> bool {
        match self.0.binary_search(&index) {
            Ok(_) => false,
            Err(at) => {
                self.0.insert(at, index);
                true
            }
        }
    }

    /// Remove `index`, returning `false` if it was absent.
    pub fn remove(&mut self, index: IndexId) -> bool {
        match self.0.binary_search(&index) {
            Ok(at) => {
                self.0.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// The only index of the set, if it has exactly one.
    pub fn sole(&self) -> Option<IndexId> {
        match self.0.as_slice() {
            [index] => Some(*index),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = IndexId> + '_ {
        self.0.iter().copied()
    }

    /// Add every index of `other`.
    pub fn extend_from(&mut self, other: &IndexSet) {
        for index in other.iter() {
            self.insert(index);
        }
    }
}

impl FromIterator<IndexId> for IndexSet {
    fn from_iter<T: IntoIterator<Item = IndexId>>(iter: T) -> Self {
        Self(iter.into_iter().sorted().dedup().collect())
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.iter().join(", "))
    }
}

/// Description of an index, as reported by the source that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub id: IndexId,
    pub name: String,
    /// Whether postings carry positions. Without them, every match is `TRUE`.
    pub has_positions: bool,
    /// Whether postings carry a payload.
    pub has_payloads: bool,
}

impl IndexInfo {
    pub fn new(id: IndexId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            has_positions: true,
            has_payloads: false,
        }
    }
}
