/// Deduplication: content digests and the time-windowed caches that gate
/// file and row processing.
pub mod cache;
pub mod digest;

pub use cache::{Admission, CacheStats, HashCache};
pub use digest::{compute_digest, compute_row_digest, Digest, IdentityColumns};
