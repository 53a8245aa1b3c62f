//! Runtime side of the instrumentation.
//!
//! Rewritten methods report to a [`HitRegistry`]: a process-wide map from class name to a
//! [`HitArray`] of counters, fronted by an [`IdentityCache`] for the hot path. With tracking
//! enabled, line probes also set bits in per-class [`TraceMask`]s that a [`TestTracker`] reads
//! out at test boundaries. A [`CoverageSession`] owns the registry together with the records
//! of every instrumented class and turns both into snapshots.
//!
//! The registry is an explicit value. Hosts create one per process and hand it to the
//! instrumenter and to whatever serves the static entry points of the rewritten code.

mod cache;
mod hits;
pub mod registry;
mod session;
mod trace;

pub use cache::{IdentityCache, IDENTITY_CACHE_SIZE};
pub use hits::HitArray;
pub use registry::HitRegistry;
pub use session::CoverageSession;
pub use trace::{TestTrace, TestTracker, TraceMask};
