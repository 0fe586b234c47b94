//! Staged filter builders
//!
//! Fluent entry points that pick a variant from `bits_per_key` and a
//! chain of layout flags. Each stage is its own type, so combinations
//! the layouts cannot support do not exist as code paths: `ranked()` is
//! only reachable after `succinct()`, `plus()` only on the xor and
//! cuckoo families, and so on.
//!
//! # Example
//! ```
//! use filter_oxide::FilterBuilder;
//! use filter_oxide::common::Filter;
//!
//! let keys: Vec<u64> = (0..1000).collect();
//! let bloom = FilterBuilder::bloom(10).build(&keys).unwrap();
//! assert!(bloom.may_contain(5));
//!
//! let counting = FilterBuilder::bloom(10).counting().succinct().build(&keys).unwrap();
//! assert!(counting.may_contain(5));
//! ```

use crate::common::{Filter, FilterError, Result};
use crate::membership::{
    BinaryFuse16, BinaryFuse8, BlockedBloom, Bloom, CountingBlockedBloom, CountingBloom, Cuckoo16,
    Cuckoo8, CuckooPlus16, CuckooPlus8, SuccinctCountingBlockedBloom,
    SuccinctCountingBlockedBloomRanked, SuccinctCountingBloom, SuccinctCountingBloomRanked, Xor16,
    Xor8, XorPlus8,
};

/// Entry point for the fluent builders.
pub struct FilterBuilder;

impl FilterBuilder {
    /// Configures a Bloom-family filter.
    pub fn bloom(bits_per_key: u32) -> BloomBuilder {
        BloomBuilder { bits_per_key }
    }

    /// Configures an xor filter; widths up to 16 bits per key build the
    /// 8-bit variant, up to 32 the 16-bit one.
    pub fn xor(bits_per_key: u32) -> XorBuilder {
        XorBuilder { bits_per_key }
    }

    /// Configures a cuckoo filter; widths up to 16 bits per key build
    /// the 8-bit variant, anything larger the 16-bit one.
    pub fn cuckoo(bits_per_key: u32) -> CuckooBuilder {
        CuckooBuilder { bits_per_key }
    }

    /// Configures a binary fuse filter; widths up to 8 bits per key
    /// build the 8-bit variant, anything larger the 16-bit one.
    pub fn binary_fuse(bits_per_key: u32) -> BinaryFuseBuilder {
        BinaryFuseBuilder { bits_per_key }
    }
}

/// Bloom family configuration.
pub struct BloomBuilder {
    bits_per_key: u32,
}

impl BloomBuilder {
    /// Builds a plain [`Bloom`].
    pub fn build(self, keys: &[u64]) -> Result<Bloom> {
        Bloom::from_keys(keys, self.bits_per_key)
    }

    /// Switches to the cache-local blocked layout.
    pub fn blocked(self) -> BlockedBloomBuilder {
        BlockedBloomBuilder {
            bits_per_key: self.bits_per_key,
        }
    }

    /// Switches to 4-bit counters with removal support.
    pub fn counting(self) -> CountingBloomBuilder {
        CountingBloomBuilder {
            bits_per_key: self.bits_per_key,
        }
    }
}

/// Blocked Bloom configuration.
pub struct BlockedBloomBuilder {
    bits_per_key: u32,
}

impl BlockedBloomBuilder {
    /// Builds a [`BlockedBloom`].
    pub fn build(self, keys: &[u64]) -> Result<BlockedBloom> {
        BlockedBloom::from_keys(keys, self.bits_per_key)
    }
}

/// Counting Bloom configuration.
pub struct CountingBloomBuilder {
    bits_per_key: u32,
}

impl CountingBloomBuilder {
    /// Builds a [`CountingBloom`].
    pub fn build(self, keys: &[u64]) -> Result<CountingBloom> {
        CountingBloom::from_keys(keys, self.bits_per_key)
    }

    /// Counts over the blocked addressing.
    pub fn blocked(self) -> CountingBlockedBloomBuilder {
        CountingBlockedBloomBuilder {
            bits_per_key: self.bits_per_key,
        }
    }

    /// Switches to the succinct counter packing.
    pub fn succinct(self) -> SuccinctCountingBloomBuilder {
        SuccinctCountingBloomBuilder {
            bits_per_key: self.bits_per_key,
        }
    }
}

/// Blocked counting configuration.
pub struct CountingBlockedBloomBuilder {
    bits_per_key: u32,
}

impl CountingBlockedBloomBuilder {
    /// Builds a [`CountingBlockedBloom`].
    pub fn build(self, keys: &[u64]) -> Result<CountingBlockedBloom> {
        CountingBlockedBloom::from_keys(keys, self.bits_per_key)
    }

    /// Switches to the succinct counter packing over the blocked
    /// addressing.
    pub fn succinct(self) -> SuccinctCountingBlockedBloomBuilder {
        SuccinctCountingBlockedBloomBuilder {
            bits_per_key: self.bits_per_key,
        }
    }
}

/// Succinct counting configuration.
pub struct SuccinctCountingBloomBuilder {
    bits_per_key: u32,
}

impl SuccinctCountingBloomBuilder {
    /// Builds a [`SuccinctCountingBloom`].
    pub fn build(self, keys: &[u64]) -> Result<SuccinctCountingBloom> {
        SuccinctCountingBloom::from_keys(keys, self.bits_per_key)
    }

    /// Routes lookups through the partial-rank word path.
    pub fn ranked(self) -> SuccinctCountingBloomRankedBuilder {
        SuccinctCountingBloomRankedBuilder {
            bits_per_key: self.bits_per_key,
        }
    }
}

/// Ranked succinct counting configuration.
pub struct SuccinctCountingBloomRankedBuilder {
    bits_per_key: u32,
}

impl SuccinctCountingBloomRankedBuilder {
    /// Builds a [`SuccinctCountingBloomRanked`].
    pub fn build(self, keys: &[u64]) -> Result<SuccinctCountingBloomRanked> {
        SuccinctCountingBloomRanked::from_keys(keys, self.bits_per_key)
    }
}

/// Succinct blocked counting configuration.
pub struct SuccinctCountingBlockedBloomBuilder {
    bits_per_key: u32,
}

impl SuccinctCountingBlockedBloomBuilder {
    /// Builds a [`SuccinctCountingBlockedBloom`].
    pub fn build(self, keys: &[u64]) -> Result<SuccinctCountingBlockedBloom> {
        SuccinctCountingBlockedBloom::from_keys(keys, self.bits_per_key)
    }

    /// Routes lookups through the partial-rank word path.
    pub fn ranked(self) -> SuccinctCountingBlockedBloomRankedBuilder {
        SuccinctCountingBlockedBloomRankedBuilder {
            bits_per_key: self.bits_per_key,
        }
    }
}

/// Ranked succinct blocked counting configuration.
pub struct SuccinctCountingBlockedBloomRankedBuilder {
    bits_per_key: u32,
}

impl SuccinctCountingBlockedBloomRankedBuilder {
    /// Builds a [`SuccinctCountingBlockedBloomRanked`].
    pub fn build(self, keys: &[u64]) -> Result<SuccinctCountingBlockedBloomRanked> {
        SuccinctCountingBlockedBloomRanked::from_keys(keys, self.bits_per_key)
    }
}

/// Xor family configuration.
pub struct XorBuilder {
    bits_per_key: u32,
}

/// Either width of the immutable xor filter.
#[derive(Clone, Debug)]
pub enum BuiltXor {
    /// 8-bit fingerprints, chosen for `bits_per_key` up to 16.
    Eight(Xor8),
    /// 16-bit fingerprints, chosen for `bits_per_key` 17 to 32.
    Sixteen(Xor16),
}

impl XorBuilder {
    /// Builds the xor variant matching the configured width.
    ///
    /// # Errors
    /// [`FilterError::InvalidParameter`] for `bits_per_key` outside
    /// `[1, 32]`, plus the construction errors of [`Xor8`]/[`Xor16`].
    pub fn build(self, keys: &[u64]) -> Result<BuiltXor> {
        match self.bits_per_key {
            1..=16 => Ok(BuiltXor::Eight(Xor8::from_keys(keys)?)),
            17..=32 => Ok(BuiltXor::Sixteen(Xor16::from_keys(keys)?)),
            other => Err(FilterError::InvalidParameter {
                param: "bits_per_key".to_string(),
                value: other.to_string(),
                constraint: "must be in range [1, 32]".to_string(),
            }),
        }
    }

    /// Switches to the rank-compressed layout.
    pub fn plus(self) -> XorPlusBuilder {
        XorPlusBuilder
    }
}

/// Compressed xor configuration.
pub struct XorPlusBuilder;

impl XorPlusBuilder {
    /// Builds a [`XorPlus8`].
    pub fn build(self, keys: &[u64]) -> Result<XorPlus8> {
        XorPlus8::from_keys(keys)
    }
}

/// Cuckoo family configuration.
pub struct CuckooBuilder {
    bits_per_key: u32,
}

/// Either width of the cuckoo filter.
#[derive(Clone, Debug)]
pub enum BuiltCuckoo {
    /// 8-bit fingerprints, chosen for `bits_per_key` up to 16.
    Eight(Cuckoo8),
    /// 16-bit fingerprints, chosen for larger widths.
    Sixteen(Cuckoo16),
}

/// Either width of the flagged cuckoo filter.
#[derive(Clone, Debug)]
pub enum BuiltCuckooPlus {
    /// 8-bit slots, chosen for `bits_per_key` up to 16.
    Eight(CuckooPlus8),
    /// 16-bit slots, chosen for larger widths.
    Sixteen(CuckooPlus16),
}

impl CuckooBuilder {
    /// Builds the cuckoo variant matching the configured width.
    ///
    /// # Errors
    /// [`FilterError::InvalidParameter`] for `bits_per_key == 0`, plus
    /// the construction errors of [`Cuckoo8`]/[`Cuckoo16`].
    pub fn build(self, keys: &[u64]) -> Result<BuiltCuckoo> {
        match self.bits_per_key {
            0 => Err(FilterError::InvalidParameter {
                param: "bits_per_key".to_string(),
                value: "0".to_string(),
                constraint: "must be at least 1".to_string(),
            }),
            1..=16 => Ok(BuiltCuckoo::Eight(Cuckoo8::from_keys(keys)?)),
            _ => Ok(BuiltCuckoo::Sixteen(Cuckoo16::from_keys(keys)?)),
        }
    }

    /// Switches to the flagged, higher-load layout.
    pub fn plus(self) -> CuckooPlusBuilder {
        CuckooPlusBuilder {
            bits_per_key: self.bits_per_key,
        }
    }
}

/// Flagged cuckoo configuration.
pub struct CuckooPlusBuilder {
    bits_per_key: u32,
}

impl CuckooPlusBuilder {
    /// Builds the flagged cuckoo variant matching the configured width.
    pub fn build(self, keys: &[u64]) -> Result<BuiltCuckooPlus> {
        match self.bits_per_key {
            0 => Err(FilterError::InvalidParameter {
                param: "bits_per_key".to_string(),
                value: "0".to_string(),
                constraint: "must be at least 1".to_string(),
            }),
            1..=16 => Ok(BuiltCuckooPlus::Eight(CuckooPlus8::from_keys(keys)?)),
            _ => Ok(BuiltCuckooPlus::Sixteen(CuckooPlus16::from_keys(keys)?)),
        }
    }
}

/// Binary fuse configuration.
pub struct BinaryFuseBuilder {
    bits_per_key: u32,
}

/// Either width of the binary fuse filter.
#[derive(Clone, Debug)]
pub enum BuiltBinaryFuse {
    /// 8-bit fingerprints, chosen for `bits_per_key` up to 8.
    Eight(BinaryFuse8),
    /// 16-bit fingerprints, chosen for larger widths.
    Sixteen(BinaryFuse16),
}

impl BinaryFuseBuilder {
    /// Builds the fuse variant matching the configured width.
    pub fn build(self, keys: &[u64]) -> Result<BuiltBinaryFuse> {
        match self.bits_per_key {
            0 => Err(FilterError::InvalidParameter {
                param: "bits_per_key".to_string(),
                value: "0".to_string(),
                constraint: "must be at least 1".to_string(),
            }),
            1..=8 => Ok(BuiltBinaryFuse::Eight(BinaryFuse8::from_keys(keys)?)),
            _ => Ok(BuiltBinaryFuse::Sixteen(BinaryFuse16::from_keys(keys)?)),
        }
    }
}

macro_rules! delegate_filter {
    ($name:ident { $($variant:ident),+ }) => {
        impl crate::common::Filter for $name {
            fn may_contain(&self, key: u64) -> bool {
                match self {
                    $($name::$variant(f) => f.may_contain(key),)+
                }
            }

            fn bit_count(&self) -> u64 {
                match self {
                    $($name::$variant(f) => f.bit_count(),)+
                }
            }

            fn cardinality(&self) -> i64 {
                match self {
                    $($name::$variant(f) => f.cardinality(),)+
                }
            }
        }
    };
}

delegate_filter!(BuiltXor { Eight, Sixteen });
delegate_filter!(BuiltCuckoo { Eight, Sixteen });
delegate_filter!(BuiltCuckooPlus { Eight, Sixteen });
delegate_filter!(BuiltBinaryFuse { Eight, Sixteen });

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Filter;

    #[test]
    fn test_bloom_chains() {
        let keys: Vec<u64> = (0..500).collect();
        assert!(FilterBuilder::bloom(10).build(&keys).unwrap().may_contain(5));
        assert!(FilterBuilder::bloom(10)
            .blocked()
            .build(&keys)
            .unwrap()
            .may_contain(5));
        assert!(FilterBuilder::bloom(10)
            .counting()
            .build(&keys)
            .unwrap()
            .may_contain(5));
        assert!(FilterBuilder::bloom(10)
            .counting()
            .blocked()
            .build(&keys)
            .unwrap()
            .may_contain(5));
        assert!(FilterBuilder::bloom(10)
            .counting()
            .succinct()
            .build(&keys)
            .unwrap()
            .may_contain(5));
        assert!(FilterBuilder::bloom(10)
            .counting()
            .succinct()
            .ranked()
            .build(&keys)
            .unwrap()
            .may_contain(5));
        assert!(FilterBuilder::bloom(10)
            .counting()
            .blocked()
            .succinct()
            .ranked()
            .build(&keys)
            .unwrap()
            .may_contain(5));
    }

    #[test]
    fn test_xor_width_selection() {
        let keys: Vec<u64> = (0..500).collect();
        assert!(matches!(
            FilterBuilder::xor(9).build(&keys).unwrap(),
            BuiltXor::Eight(_)
        ));
        assert!(matches!(
            FilterBuilder::xor(20).build(&keys).unwrap(),
            BuiltXor::Sixteen(_)
        ));
        assert!(FilterBuilder::xor(33).build(&keys).is_err());
        assert!(FilterBuilder::xor(0).build(&keys).is_err());
    }

    #[test]
    fn test_cuckoo_and_fuse_selection() {
        let keys: Vec<u64> = (0..500).collect();
        assert!(matches!(
            FilterBuilder::cuckoo(10).build(&keys).unwrap(),
            BuiltCuckoo::Eight(_)
        ));
        assert!(matches!(
            FilterBuilder::cuckoo(20).build(&keys).unwrap(),
            BuiltCuckoo::Sixteen(_)
        ));
        assert!(matches!(
            FilterBuilder::cuckoo(10).plus().build(&keys).unwrap(),
            BuiltCuckooPlus::Eight(_)
        ));
        assert!(matches!(
            FilterBuilder::binary_fuse(8).build(&keys).unwrap(),
            BuiltBinaryFuse::Eight(_)
        ));
        assert!(matches!(
            FilterBuilder::binary_fuse(16).build(&keys).unwrap(),
            BuiltBinaryFuse::Sixteen(_)
        ));
    }

    #[test]
    fn test_plus_builds() {
        let keys: Vec<u64> = (0..500).collect();
        let plus = FilterBuilder::xor(8).plus().build(&keys).unwrap();
        assert!(plus.may_contain(5));
    }
}
