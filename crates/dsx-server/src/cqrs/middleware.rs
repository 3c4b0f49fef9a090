//! Marker traits separating writes from reads
//!
//! Commands mutate dataset documents and may emit sharing events; queries
//! never do.

/// A request that changes state
pub trait Command {}

/// A read-only request
pub trait Query {}
