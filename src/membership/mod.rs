//! Approximate membership filters
//!
//! One file per filter family. Immutable, construction-time filters
//! (Xor, Binary Fuse, GCS, MPHF) answer queries with a few memory
//! probes; mutable families (Bloom, counting Bloom, cuckoo) support
//! `add` and, where counters or fingerprints allow, `remove`.

mod binary_fuse;
mod blocked_bloom;
mod bloom;
mod counting_blocked_bloom;
mod counting_bloom;
mod cuckoo;
mod cuckoo_plus;
mod gcs;
mod mphf;
mod succinct_counting;
mod xor;
mod xor_plus;

pub use binary_fuse::{BinaryFuse, BinaryFuse16, BinaryFuse8};
pub use blocked_bloom::BlockedBloom;
pub use bloom::Bloom;
pub use counting_blocked_bloom::CountingBlockedBloom;
pub use counting_bloom::CountingBloom;
pub use cuckoo::{Cuckoo, Cuckoo16, Cuckoo8, CuckooFingerprint};
pub use cuckoo_plus::{CuckooPlus, CuckooPlus16, CuckooPlus8};
pub use gcs::Gcs;
pub use mphf::Mphf;
pub use succinct_counting::{
    SuccinctCountingBlockedBloom, SuccinctCountingBlockedBloomRanked, SuccinctCountingBloom,
    SuccinctCountingBloomRanked,
};
pub use xor::{Xor, Xor16, Xor8};
pub use xor_plus::XorPlus8;

/// Fixed-width fingerprint storage used by the fingerprint-table
/// filters. Implemented for `u8`, `u16`, and `u32`.
pub trait FingerprintBits: Copy + PartialEq + std::fmt::Debug {
    /// Stored width in bits.
    const BITS: u32;

    /// Truncating conversion from hash bits.
    fn from_u64(x: u64) -> Self;

    /// Widening conversion for packing and mixing.
    fn to_u64(self) -> u64;
}

impl FingerprintBits for u8 {
    const BITS: u32 = 8;

    #[inline]
    fn from_u64(x: u64) -> Self {
        x as u8
    }

    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl FingerprintBits for u16 {
    const BITS: u32 = 16;

    #[inline]
    fn from_u64(x: u64) -> Self {
        x as u16
    }

    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl FingerprintBits for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn from_u64(x: u64) -> Self {
        x as u32
    }

    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}
