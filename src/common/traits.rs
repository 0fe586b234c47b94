//! Core capability traits for all filter implementations
//!
//! The capability set is split into three narrow surfaces so that each
//! filter type only exposes the operations it actually supports:
//! read-only querying, adding, and removing. Immutable filters (Xor,
//! Binary Fuse, GCS, MPHF) implement only [`Filter`]; Bloom variants add
//! [`MutableFilter`]; counting and cuckoo variants add
//! [`RemovableFilter`].

use super::error::Result;

/// Read-only approximate membership.
///
/// The fundamental contract: a key that was inserted (or present in the
/// construction set) and never removed is always reported as present.
/// False positives occur with a rate governed by the configured bits per
/// key; false negatives never occur.
pub trait Filter {
    /// Returns `true` if the key is probably in the set, `false` if it is
    /// definitely not.
    fn may_contain(&self, key: u64) -> bool;

    /// Total memory footprint of the filter data, in bits.
    fn bit_count(&self) -> u64;

    /// Set-bit or live-key count, depending on the variant; `-1` when the
    /// variant does not define a cardinality.
    fn cardinality(&self) -> i64 {
        -1
    }
}

/// A filter that supports inserting keys after construction.
pub trait MutableFilter: Filter {
    /// Inserts a key.
    ///
    /// # Errors
    /// Counting variants return [`FilterError::CounterOverflow`] when a
    /// counter would exceed its maximum; cuckoo variants return
    /// [`FilterError::TableFull`] when the eviction budget is exhausted.
    ///
    /// [`FilterError::CounterOverflow`]: super::FilterError::CounterOverflow
    /// [`FilterError::TableFull`]: super::FilterError::TableFull
    fn add(&mut self, key: u64) -> Result<()>;
}

/// A filter that also supports removing keys.
pub trait RemovableFilter: MutableFilter {
    /// Removes a key, returning `true` if a matching entry was found.
    ///
    /// Removing a key that was never inserted can introduce false
    /// negatives for other keys; callers must only remove keys they
    /// know to be present.
    fn remove(&mut self, key: u64) -> bool;
}
