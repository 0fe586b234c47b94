//! filter_oxide: approximate membership filters
//!
//! Compact set representations that answer "is this key probably in the
//! set?" with zero false negatives and a configurable false-positive
//! rate, at a few bits per key. Storage engines use them to skip disk
//! reads, caches to avoid useless lookups, deduplication pipelines to
//! pre-screen candidates.
//!
//! All filters consume 64-bit keys (hash byte strings through
//! [`common::hash::key_for_bytes`] first). Immutable families (xor,
//! binary fuse, Golomb-compressed sets, the minimal-perfect-hash
//! filter) are built once from a key list; Bloom, counting Bloom, and
//! cuckoo families also support `add`, with removal where the layout
//! allows it.
//!
//! ```
//! use filter_oxide::{FilterBuilder, common::Filter};
//!
//! let keys: Vec<u64> = (0..10_000).collect();
//! let filter = FilterBuilder::binary_fuse(8).build(&keys).unwrap();
//! assert!(filter.may_contain(1234));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bits;
mod builder;
pub mod common;
pub mod membership;

// Re-export core types for convenience
pub use builder::{
    BinaryFuseBuilder, BlockedBloomBuilder, BloomBuilder, BuiltBinaryFuse, BuiltCuckoo,
    BuiltCuckooPlus, BuiltXor, CountingBlockedBloomBuilder, CountingBloomBuilder, CuckooBuilder,
    CuckooPlusBuilder, FilterBuilder, SuccinctCountingBlockedBloomBuilder,
    SuccinctCountingBlockedBloomRankedBuilder, SuccinctCountingBloomBuilder,
    SuccinctCountingBloomRankedBuilder, XorBuilder, XorPlusBuilder,
};
pub use common::{Filter, FilterError, MutableFilter, RemovableFilter, Result};
pub use membership::{
    BinaryFuse16, BinaryFuse8, BlockedBloom, Bloom, CountingBlockedBloom, CountingBloom, Cuckoo16,
    Cuckoo8, CuckooPlus16, CuckooPlus8, Gcs, Mphf, SuccinctCountingBlockedBloom,
    SuccinctCountingBlockedBloomRanked, SuccinctCountingBloom, SuccinctCountingBloomRanked, Xor16,
    Xor8, XorPlus8,
};

/// Error types and result aliases for filter operations
pub mod error {
    pub use crate::common::{FilterError, Result};
}
