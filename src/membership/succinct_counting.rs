//! Succinct counting Bloom filters
//!
//! A counting filter whose per-slot overhead stays near one extra bit
//! instead of the plain counting filter's four. Slots are handled in
//! groups of 64: a `data` word marks which slots are non-zero (it is
//! bit-identical to the plain Bloom array, so queries cost the same),
//! and a parallel `counts` word packs the counters of the set slots as
//! zero-terminated runs of ones, located with in-word select.
//!
//! A group whose packed counters no longer fit inline switches to an
//! overflow record: an 8-word side-table entry holding 64 plain 8-bit
//! counters, addressed through the top bits of the counts word. Freed
//! records are kept on a free list threaded through the first word of
//! each free record.
//!
//! Four variants share the engine: plain and blocked addressing, each
//! with a "ranked" flavor whose lookups go through the combined
//! bit-plus-partial-rank word path instead of independent popcounts.

use crate::bits::select_in_long;
use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, MutableFilter, RemovableFilter, Result};

/// Top two bits of a counts word flag an overflow group.
const OVERFLOW_MARKER: u64 = 0xC000_0000_0000_0000;
/// Marker value written when a group converts to overflow mode.
const OVERFLOW_MODE: u64 = 0x8000_0000_0000_0000;
/// Inline encoding capacity: the marker bits must stay clear.
const INLINE_CAPACITY: u32 = 62;
/// Words per overflow record: 64 counters of 8 bits.
const RECORD_WORDS: usize = 8;
/// Records allocated per side-table growth step.
const RECORD_GROW: usize = 16;
/// End-of-free-list sentinel.
const NO_FREE_RECORD: u64 = u64::MAX;

/// The shared 64-slot group engine.
#[derive(Clone, Debug)]
struct CountingGroups {
    data: Vec<u64>,
    counts: Vec<u64>,
    overflow: Vec<u64>,
    next_free: u64,
}

impl CountingGroups {
    fn new(group_count: usize) -> Self {
        CountingGroups {
            data: vec![0u64; group_count],
            counts: vec![0u64; group_count],
            overflow: Vec::new(),
            next_free: NO_FREE_RECORD,
        }
    }

    /// Start bit of the j-th counter field inside an inline counts word.
    /// Field j begins right after the (j-1)-th zero terminator.
    #[inline]
    fn field_start(counts: u64, j: u32) -> u32 {
        if j == 0 {
            0
        } else {
            select_in_long(!counts, j - 1) + 1
        }
    }

    /// Bits used by the inline encoding of a group.
    #[inline]
    fn used_bits(data: u64, counts: u64) -> u32 {
        let fields = data.count_ones();
        if fields == 0 {
            0
        } else {
            select_in_long(!counts, fields - 1) + 1
        }
    }

    #[inline]
    fn slot_bit(&self, group: usize, slot: u32) -> bool {
        (self.data[group] >> slot) & 1 == 1
    }

    /// Combined `(in-word rank << 1) | bit` for a slot, the rank9 word
    /// path used by the ranked variants.
    #[inline]
    fn slot_bit_and_rank(&self, group: usize, slot: u32) -> u64 {
        let word = self.data[group];
        let partial = u64::from((word & ((1u64 << slot) - 1)).count_ones());
        (partial << 1) | ((word >> slot) & 1)
    }

    /// Current counter value of a slot.
    fn read_count(&self, group: usize, slot: u32) -> u64 {
        let m = self.data[group];
        if (m >> slot) & 1 == 0 {
            return 0;
        }
        let c = self.counts[group];
        if c & OVERFLOW_MARKER != 0 {
            let record = (c & 0xffff_ffff) as usize;
            return self.read_record(record, slot);
        }
        let j = (m & ((1u64 << slot) - 1)).count_ones();
        let start = Self::field_start(c, j);
        u64::from((c >> start).trailing_ones()) + 1
    }

    fn read_record(&self, record: usize, slot: u32) -> u64 {
        (self.overflow[record + (slot / 8) as usize] >> ((slot % 8) * 8)) & 0xff
    }

    fn write_record(&mut self, record: usize, slot: u32, value: u64) {
        debug_assert!(value <= 0xff);
        let word = record + (slot / 8) as usize;
        let shift = (slot % 8) * 8;
        self.overflow[word] = (self.overflow[word] & !(0xffu64 << shift)) | (value << shift);
    }

    fn increment(&mut self, group: usize, slot: u32) -> Result<()> {
        let c = self.counts[group];
        if c & OVERFLOW_MARKER != 0 {
            return self.increment_overflow(group, slot);
        }
        let m = self.data[group];
        if Self::used_bits(m, c) + 1 > INLINE_CAPACITY {
            self.convert_to_overflow(group);
            return self.increment_overflow(group, slot);
        }
        let j = (m & ((1u64 << slot) - 1)).count_ones();
        let insert_at = Self::field_start(c, j);
        let bit = u64::from((m >> slot) & 1); // extend the run, or open a new field
        let low = c & ((1u64 << insert_at) - 1);
        let high = (c >> insert_at) << (insert_at + 1);
        self.counts[group] = high | (bit << insert_at) | low;
        self.data[group] |= 1u64 << slot;
        Ok(())
    }

    fn increment_overflow(&mut self, group: usize, slot: u32) -> Result<()> {
        let record = (self.counts[group] & 0xffff_ffff) as usize;
        let value = self.read_record(record, slot);
        if value == 0xff {
            return Err(FilterError::CounterOverflow {
                index: group * 64 + slot as usize,
            });
        }
        self.write_record(record, slot, value + 1);
        self.counts[group] += 1u64 << 32; // group total
        self.data[group] |= 1u64 << slot;
        Ok(())
    }

    fn decrement(&mut self, group: usize, slot: u32) {
        if !self.slot_bit(group, slot) {
            return;
        }
        let c = self.counts[group];
        if c & OVERFLOW_MARKER != 0 {
            let record = (c & 0xffff_ffff) as usize;
            let value = self.read_record(record, slot);
            self.write_record(record, slot, value - 1);
            if value == 1 {
                self.data[group] &= !(1u64 << slot);
            }
            self.counts[group] -= 1u64 << 32;
            let total = (self.counts[group] >> 32) & 0x3fff_ffff;
            if total < u64::from(INLINE_CAPACITY) {
                self.convert_to_inline(group, record);
            }
            return;
        }
        let m = self.data[group];
        let j = (m & ((1u64 << slot) - 1)).count_ones();
        let start = Self::field_start(c, j);
        let run = (c >> start).trailing_ones();
        // delete one bit at the field start; a run of zero length means
        // the counter was 1 and the slot empties
        let low = c & ((1u64 << start) - 1);
        let high = (c >> (start + 1)) << start;
        self.counts[group] = high | low;
        if run == 0 {
            self.data[group] &= !(1u64 << slot);
        }
    }

    /// Moves a group's counters into a fresh overflow record.
    fn convert_to_overflow(&mut self, group: usize) {
        let record = self.allocate_record();
        let m = self.data[group];
        let c = self.counts[group];
        let mut total = 0u64;
        let mut pos = 0u32;
        for slot in 0..64u32 {
            if (m >> slot) & 1 == 1 {
                let run = (c >> pos).trailing_ones();
                let value = u64::from(run) + 1;
                self.write_record(record, slot, value);
                total += value;
                pos += run + 1;
            }
        }
        self.counts[group] = OVERFLOW_MODE | (total << 32) | record as u64;
    }

    /// Repacks an overflow group inline and frees its record.
    fn convert_to_inline(&mut self, group: usize, record: usize) {
        let m = self.data[group];
        let mut c = 0u64;
        let mut pos = 0u32;
        for slot in 0..64u32 {
            if (m >> slot) & 1 == 1 {
                let value = self.read_record(record, slot) as u32;
                c |= ((1u64 << (value - 1)) - 1) << pos;
                pos += value; // run of ones plus the zero terminator
            }
        }
        debug_assert!(pos <= INLINE_CAPACITY);
        self.counts[group] = c;
        self.free_record(record);
    }

    fn allocate_record(&mut self) -> usize {
        if self.next_free == NO_FREE_RECORD {
            let base = self.overflow.len();
            self.overflow.resize(base + RECORD_GROW * RECORD_WORDS, 0);
            for r in 0..RECORD_GROW - 1 {
                self.overflow[base + r * RECORD_WORDS] = (base + (r + 1) * RECORD_WORDS) as u64;
            }
            self.overflow[base + (RECORD_GROW - 1) * RECORD_WORDS] = NO_FREE_RECORD;
            self.next_free = base as u64;
        }
        let record = self.next_free as usize;
        self.next_free = self.overflow[record];
        for w in 0..RECORD_WORDS {
            self.overflow[record + w] = 0;
        }
        record
    }

    fn free_record(&mut self, record: usize) {
        self.overflow[record] = self.next_free;
        self.next_free = record as u64;
    }

    fn cardinality(&self) -> i64 {
        self.data.iter().map(|w| i64::from(w.count_ones())).sum()
    }

    fn bit_count(&self) -> u64 {
        ((self.data.len() + self.counts.len() + self.overflow.len()) * 64) as u64
    }
}

/// The k (group, slot) probes shared with the plain Bloom layout.
#[inline]
fn bloom_probes(key: u64, seed: u64, word_count: u32, k: u32) -> impl Iterator<Item = (usize, u32)> {
    let h = mix64(key, seed);
    let b = h as u32;
    let mut a = (h >> 32) as u32;
    (0..k).map(move |_| {
        let probe = (reduce(a, word_count) as usize, a & 63);
        a = a.wrapping_add(b);
        probe
    })
}

/// The four (group, slot) probes shared with the blocked Bloom layout.
#[inline]
fn blocked_probes(key: u64, seed: u64, buckets: u32) -> [(usize, u32); 4] {
    let h = mix64(key, seed);
    let start = reduce(h as u32, buckets) as usize;
    let spread = h ^ h.rotate_left(32);
    let second = start + 1 + ((h >> 60) as usize);
    [
        (start, (spread & 63) as u32),
        (start, ((spread >> 6) & 63) as u32),
        (second, ((spread >> 12) & 63) as u32),
        (second, ((spread >> 18) & 63) as u32),
    ]
}

fn validate_bits_per_key(bits_per_key: u32) -> Result<()> {
    if bits_per_key == 0 || bits_per_key > 64 {
        return Err(FilterError::InvalidParameter {
            param: "bits_per_key".to_string(),
            value: bits_per_key.to_string(),
            constraint: "must be in range [1, 64]".to_string(),
        });
    }
    Ok(())
}

macro_rules! succinct_bloom_variant {
    ($(#[$doc:meta])* $name:ident, ranked: $ranked:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            groups: CountingGroups,
            word_count: u32,
            k: u32,
            seed: u64,
        }

        impl $name {
            /// Creates an empty filter sized for `capacity` keys at
            /// `bits_per_key` logical bits each, with a random seed.
            ///
            /// # Errors
            /// Returns [`FilterError::InvalidParameter`] if
            /// `bits_per_key` is 0 or greater than 64.
            pub fn with_capacity(capacity: usize, bits_per_key: u32) -> Result<Self> {
                Self::with_capacity_and_seed(capacity, bits_per_key, random_seed())
            }

            /// Creates an empty filter with an explicit seed.
            pub fn with_capacity_and_seed(
                capacity: usize,
                bits_per_key: u32,
                seed: u64,
            ) -> Result<Self> {
                validate_bits_per_key(bits_per_key)?;
                let bits = (capacity as u64).saturating_mul(u64::from(bits_per_key));
                let word_count = bits.div_ceil(64).max(1) as u32;
                let k =
                    ((f64::from(bits_per_key) * std::f64::consts::LN_2).round() as u32).max(1);
                Ok($name {
                    groups: CountingGroups::new(word_count as usize),
                    word_count,
                    k,
                    seed,
                })
            }

            /// Builds a filter containing `keys`.
            pub fn from_keys(keys: &[u64], bits_per_key: u32) -> Result<Self> {
                Self::from_keys_with_seed(keys, bits_per_key, random_seed())
            }

            /// Builds a filter containing `keys` with an explicit seed.
            pub fn from_keys_with_seed(
                keys: &[u64],
                bits_per_key: u32,
                seed: u64,
            ) -> Result<Self> {
                let mut filter = Self::with_capacity_and_seed(keys.len(), bits_per_key, seed)?;
                for &key in keys {
                    filter.add(key)?;
                }
                Ok(filter)
            }
        }

        impl Filter for $name {
            fn may_contain(&self, key: u64) -> bool {
                if $ranked {
                    bloom_probes(key, self.seed, self.word_count, self.k)
                        .all(|(g, x)| self.groups.slot_bit_and_rank(g, x) & 1 == 1)
                } else {
                    bloom_probes(key, self.seed, self.word_count, self.k)
                        .all(|(g, x)| self.groups.slot_bit(g, x))
                }
            }

            fn bit_count(&self) -> u64 {
                self.groups.bit_count()
            }

            fn cardinality(&self) -> i64 {
                self.groups.cardinality()
            }
        }

        impl MutableFilter for $name {
            fn add(&mut self, key: u64) -> Result<()> {
                let probes: Vec<(usize, u32)> =
                    bloom_probes(key, self.seed, self.word_count, self.k).collect();
                for (g, x) in probes {
                    self.groups.increment(g, x)?;
                }
                Ok(())
            }
        }

        impl RemovableFilter for $name {
            fn remove(&mut self, key: u64) -> bool {
                if !self.may_contain(key) {
                    return false;
                }
                let probes: Vec<(usize, u32)> =
                    bloom_probes(key, self.seed, self.word_count, self.k).collect();
                for (g, x) in probes {
                    self.groups.decrement(g, x);
                }
                true
            }
        }
    };
}

macro_rules! succinct_blocked_variant {
    ($(#[$doc:meta])* $name:ident, ranked: $ranked:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            groups: CountingGroups,
            buckets: u32,
            seed: u64,
        }

        impl $name {
            /// Creates an empty filter sized for `capacity` keys at
            /// `bits_per_key` logical bits each, with a random seed.
            ///
            /// # Errors
            /// Returns [`FilterError::InvalidParameter`] if
            /// `bits_per_key` is 0 or greater than 64.
            pub fn with_capacity(capacity: usize, bits_per_key: u32) -> Result<Self> {
                Self::with_capacity_and_seed(capacity, bits_per_key, random_seed())
            }

            /// Creates an empty filter with an explicit seed.
            pub fn with_capacity_and_seed(
                capacity: usize,
                bits_per_key: u32,
                seed: u64,
            ) -> Result<Self> {
                validate_bits_per_key(bits_per_key)?;
                let buckets =
                    ((capacity as u64 * u64::from(bits_per_key)) / 64).max(1) as u32;
                Ok($name {
                    groups: CountingGroups::new(buckets as usize + 16),
                    buckets,
                    seed,
                })
            }

            /// Builds a filter containing `keys`.
            pub fn from_keys(keys: &[u64], bits_per_key: u32) -> Result<Self> {
                Self::from_keys_with_seed(keys, bits_per_key, random_seed())
            }

            /// Builds a filter containing `keys` with an explicit seed.
            pub fn from_keys_with_seed(
                keys: &[u64],
                bits_per_key: u32,
                seed: u64,
            ) -> Result<Self> {
                let mut filter = Self::with_capacity_and_seed(keys.len(), bits_per_key, seed)?;
                for &key in keys {
                    filter.add(key)?;
                }
                Ok(filter)
            }
        }

        impl Filter for $name {
            fn may_contain(&self, key: u64) -> bool {
                if $ranked {
                    blocked_probes(key, self.seed, self.buckets)
                        .iter()
                        .all(|&(g, x)| self.groups.slot_bit_and_rank(g, x) & 1 == 1)
                } else {
                    blocked_probes(key, self.seed, self.buckets)
                        .iter()
                        .all(|&(g, x)| self.groups.slot_bit(g, x))
                }
            }

            fn bit_count(&self) -> u64 {
                self.groups.bit_count()
            }

            fn cardinality(&self) -> i64 {
                self.groups.cardinality()
            }
        }

        impl MutableFilter for $name {
            fn add(&mut self, key: u64) -> Result<()> {
                for (g, x) in blocked_probes(key, self.seed, self.buckets) {
                    self.groups.increment(g, x)?;
                }
                Ok(())
            }
        }

        impl RemovableFilter for $name {
            fn remove(&mut self, key: u64) -> bool {
                if !self.may_contain(key) {
                    return false;
                }
                for (g, x) in blocked_probes(key, self.seed, self.buckets) {
                    self.groups.decrement(g, x);
                }
                true
            }
        }
    };
}

succinct_bloom_variant!(
    /// Succinct counting Bloom filter over 64-bit keys.
    ///
    /// # Example
    /// ```
    /// use filter_oxide::membership::SuccinctCountingBloom;
    /// use filter_oxide::common::{Filter, MutableFilter, RemovableFilter};
    ///
    /// let mut filter = SuccinctCountingBloom::with_capacity(100, 10).unwrap();
    /// filter.add(7).unwrap();
    /// assert!(filter.may_contain(7));
    /// filter.remove(7);
    /// assert!(!filter.may_contain(7));
    /// ```
    SuccinctCountingBloom, ranked: false
);

succinct_bloom_variant!(
    /// [`SuccinctCountingBloom`] whose lookups run through the combined
    /// bit-plus-partial-rank word path.
    SuccinctCountingBloomRanked, ranked: true
);

succinct_blocked_variant!(
    /// Succinct counting filter over the blocked-Bloom addressing.
    SuccinctCountingBlockedBloom, ranked: false
);

succinct_blocked_variant!(
    /// [`SuccinctCountingBlockedBloom`] whose lookups run through the
    /// combined bit-plus-partial-rank word path.
    SuccinctCountingBlockedBloomRanked, ranked: true
);
