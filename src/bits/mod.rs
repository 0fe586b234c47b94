//! Bit-level building blocks
//!
//! Primitives shared by the filter implementations: a bit buffer with
//! Golomb-Rice and Elias-delta codings, a constant-time rank directory,
//! in-word select, a radix sort, and a compact monotone offset list.

mod buffer;
mod monotone;
mod rank9;
mod select;
mod sort;

pub use buffer::{fold, unfold, BitBuffer};
pub use monotone::MonotoneList;
pub use rank9::Rank9;
pub use select::select_in_long;
pub use sort::{sort_unsigned, sort_unsigned_range};
