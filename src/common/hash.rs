//! Hash primitives shared by all filters
//!
//! Every filter works on 64-bit keys. A single mixing function
//! ([`mix64`]) combines a key with a per-filter seed and produces all the
//! bits a filter derives indices and fingerprints from; [`reduce`] maps
//! hash bits into an index range without division.

use xxhash_rust::xxh64::xxh64;

/// Mixes a 64-bit key with a seed.
///
/// This is the finalization avalanche of a splitmix-style generator: two
/// xor-shift-multiply rounds and a final xor-shift. For a fixed seed it
/// is a bijection on `u64`, so distinct keys never collide before index
/// derivation.
///
/// # Examples
/// ```
/// use filter_oxide::common::hash::mix64;
///
/// let h = mix64(42, 0x9E3779B97F4A7C15);
/// assert_ne!(h, mix64(43, 0x9E3779B97F4A7C15));
/// ```
#[inline]
pub fn mix64(key: u64, seed: u64) -> u64 {
    let mut x = key.wrapping_add(seed);
    x = (x ^ (x >> 33)).wrapping_mul(0xff51afd7ed558ccd);
    x = (x ^ (x >> 33)).wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^ (x >> 33)
}

/// Maps a 32-bit hash into `[0, n)` without a modulo.
///
/// Multiply-and-shift range reduction: `(hash * n) >> 32`. Equivalent in
/// distribution to `hash % n` for uniform input, but a single
/// multiplication.
#[inline]
pub fn reduce(hash: u32, n: u32) -> u32 {
    ((u64::from(hash) * u64::from(n)) >> 32) as u32
}

/// Returns the high 64 bits of the 128-bit product `a * b`.
#[inline]
pub fn multiply_high_unsigned(a: u64, b: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) >> 64) as u64
}

/// Samples a fresh 64-bit filter seed from the process-wide source.
///
/// Constructors that need reproducible layouts take an explicit seed via
/// their `*_with_seed` twin instead of calling this.
pub fn random_seed() -> u64 {
    rand::random()
}

/// Maps an arbitrary byte string into the 64-bit key space.
///
/// Filters consume `u64` keys; callers with string or binary keys hash
/// them through xxh64 first.
///
/// # Examples
/// ```
/// use filter_oxide::common::hash::key_for_bytes;
///
/// let k = key_for_bytes(b"hello world");
/// assert_ne!(k, key_for_bytes(b"hello worle"));
/// ```
#[inline]
pub fn key_for_bytes(data: &[u8]) -> u64 {
    xxh64(data, 0)
}
