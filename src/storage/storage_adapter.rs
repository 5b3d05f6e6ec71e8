//! Storage adapters.
//!
//! An adapter wraps another store. [`PrefixStorageAdapter`] presents the keys of a store below a prefix as if the
//! prefix were the root.

mod prefix;

pub use self::prefix::PrefixStorageAdapter;
