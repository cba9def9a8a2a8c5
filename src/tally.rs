//! Key/count aggregation
//!
//! A [`Tally`] maps keys to occurrence counts. Tallies produced by independent
//! partitions are combined with [`Tally::merge`], which is a per-key sum and
//! therefore associative and commutative: partials can be merged in any order
//! and with any intermediate grouping without changing the final result.

use std::collections::btree_map::{self, BTreeMap};

/// Occurrence counter. `u64` is wide enough for any realistic corpus.
pub type Count = u64;

/// Output ordering for a final tally
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Byte-wise ascending key order
    #[default]
    Key,
    /// Descending count, ties broken by key
    Count,
}

/// Mapping from key to count, iterated in byte-wise key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<String, Count>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine raw `(key, 1)` emissions into a tally
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut tally = Self::new();
        for key in keys {
            tally.increment(key.as_ref());
        }
        tally
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Add `n` occurrences of `key`. Adding zero leaves the tally unchanged.
    pub fn add(&mut self, key: &str, n: Count) {
        if n == 0 {
            return;
        }
        // Avoid allocating a new key string on the hot path
        if let Some(count) = self.counts.get_mut(key) {
            *count += n;
        } else {
            self.counts.insert(key.to_string(), n);
        }
    }

    /// Fold another tally into this one
    pub fn merge(&mut self, other: Tally) {
        if self.counts.is_empty() {
            self.counts = other.counts;
            return;
        }
        for (key, n) in other.counts {
            match self.counts.entry(key) {
                btree_map::Entry::Occupied(mut entry) => *entry.get_mut() += n,
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(n);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Count> {
        self.counts.get(key).copied()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> Count {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Count)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Consume the tally into `(key, count)` pairs in the requested order,
    /// keeping at most `top` entries
    pub fn into_sorted(self, order: SortOrder, top: Option<usize>) -> Vec<(String, Count)> {
        let mut entries: Vec<(String, Count)> = self.counts.into_iter().collect();
        if order == SortOrder::Count {
            // Stable sort keeps the key order for equal counts
            entries.sort_by(|a, b| b.1.cmp(&a.1));
        }
        if let Some(limit) = top {
            entries.truncate(limit);
        }
        entries
    }
}

impl<'a> IntoIterator for &'a Tally {
    type Item = (&'a String, &'a Count);
    type IntoIter = btree_map::Iter<'a, String, Count>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}

/// Result of mapping one partition, handed to the merge stage
#[derive(Debug, Clone)]
pub enum Partial {
    /// Pre-aggregated by the worker-local combiner
    Combined(Tally),
    /// Every emitted key, one entry per `(key, 1)` pair
    Raw(Vec<String>),
}

impl Partial {
    /// An empty partial, combining locally when `combine` is set
    pub fn empty(combine: bool) -> Self {
        if combine {
            Partial::Combined(Tally::new())
        } else {
            Partial::Raw(Vec::new())
        }
    }

    /// Record one `(key, 1)` emission
    pub fn push(&mut self, key: &str) {
        match self {
            Partial::Combined(tally) => tally.increment(key),
            Partial::Raw(keys) => keys.push(key.to_string()),
        }
    }

    /// Number of `(key, 1)` emissions this partial stands for
    pub fn emissions(&self) -> Count {
        match self {
            Partial::Combined(tally) => tally.total(),
            Partial::Raw(keys) => keys.len() as Count,
        }
    }

    pub fn into_tally(self) -> Tally {
        match self {
            Partial::Combined(tally) => tally,
            Partial::Raw(keys) => Tally::from_keys(keys),
        }
    }

    /// Merge this partial into an accumulated tally
    pub fn merge_into(self, target: &mut Tally) {
        match self {
            Partial::Combined(tally) => target.merge(tally),
            Partial::Raw(keys) => {
                for key in keys {
                    target.increment(&key);
                }
            }
        }
    }
}
