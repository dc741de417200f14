//! Request deduplicating, time windowed cache for chain reads.
//!
//! Every key owns a slot holding the last published [`QueryState`], the fetch
//! currently in flight (shared by every caller asking for the key meanwhile)
//! and a generation counter used to reject results that complete out of
//! order. Subscribed slots are re-fetched on a fixed interval; failures keep
//! the previous value and wait for the next tick. A new block marks slots
//! with a fetch in flight for at most one follow-up fetch.

pub mod query;
pub mod store;

pub use query::{CacheConfig, Fetcher, QueryKey, QueryState};
pub use store::{QueryCache, Subscription};
