//! Persistence seam
//!
//! All coordination between the background loops goes through durable state
//! behind the `Store` trait: the generator appends events, the finalizer
//! re-derives aggregates and claims cycle dates, the distributor mutates the
//! ledger. No loop holds authoritative state in memory.

mod repo;

pub use repo::Store;
