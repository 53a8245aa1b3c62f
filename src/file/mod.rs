//! Bounds-checked binary buffer access used by the snapshot codec.
//!
//! Coverage snapshots are handed to persistence collaborators as plain byte buffers. This module
//! holds the low-level pieces that produce and consume those buffers:
//!
//! - [`io`] - the [`io::CovIO`] trait and free functions for little-endian primitive access
//! - [`parser`] - [`Parser`], a cursor over an immutable byte slice
//! - [`writer`] - [`Writer`], a growable output buffer with fallible reservation
//!
//! Every read is bounds-checked and reports [`crate::Error::OutOfBounds`] instead of panicking,
//! so arbitrary (fuzzed) input can be decoded safely.

pub mod io;
pub mod parser;
pub mod writer;

pub use parser::Parser;
pub use writer::Writer;
