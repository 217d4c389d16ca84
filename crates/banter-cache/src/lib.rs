//! Content-addressed response cache for generated lines.
//!
//! Entries are stored one JSON record per key under a cache directory. Keys
//! are derived from a parameter set whose order does not matter, and every
//! record expires after its TTL.

pub mod clock;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{CacheParams, CacheStats, ResponseCache};
