//! Time-bounded caching over pluggable key/value stores.
//!
//! [`TtlCache`] keeps a serialized [`CacheEntry`] per key together with the
//! time it was written and refuses to serve it once the entry is older than
//! the configured TTL. The clock is injected so freshness can be tested
//! without sleeping.

mod clock;
mod error;
mod store;
mod ttl;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use error::CacheError;
pub use error::Result;
pub use store::FileStore;
pub use store::KeyValueStore;
pub use store::MemoryStore;
pub use ttl::CacheEntry;
pub use ttl::DEFAULT_TTL;
pub use ttl::TtlCache;
pub use ttl::is_fresh;
