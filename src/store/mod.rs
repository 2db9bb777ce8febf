//! Watchlist store
//!
//! Durable, insertion-ordered mapping from a composite (name, cert number)
//! key to a watched entry. All mutations are serialized behind one lock and
//! persisted atomically before they return.

pub mod persist;
pub mod watchlist;

pub use watchlist::WatchlistStore;
