// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # covscope
//!
//! Line and branch coverage instrumentation for stack-machine bytecode.
//!
//! `covscope` rewrites the method bodies of compiled classes so that running them records which
//! source lines executed, which outcome each conditional jump took and which arm each switch
//! dispatched to. Class-file decoding and encoding stay with the host: the crate works on an
//! already decoded class model and hands back a rewritten one, plus a record of what every
//! counter slot means.
//!
//! ## Features
//!
//! - **Two-pass rewriting** - a single scan registers lines, jumps and switches; a second pass
//!   splits branch outcomes into private windows and inserts probes
//! - **Noise filters** - compiler-generated null checks, assertion toggles, string switch
//!   dispatch, default argument stubs and similar lowering artifacts are not counted
//! - **Three counter strategies** - static field, per-invocation registry call or dynamic
//!   constant, all sharing one array per class
//! - **Counting or flag hits** - exact execution counts or cheap executed/not-executed flags
//! - **Per-test traces** - optional line traces read out at test boundaries
//! - **Mergeable snapshots** - commutative merging of per-process results and a compact binary
//!   snapshot encoding
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use covscope::prelude::*;
//!
//! let mut asm = BodyAssembler::new();
//! let positive = asm.new_label();
//! asm.locals(1)
//!     .line(10)
//!     .iload(0)
//!     .jump(Opcode::Ifgt, positive)
//!     .line(11)
//!     .iconst(-1)
//!     .ireturn()
//!     .place(positive)
//!     .line(12)
//!     .iconst(1)
//!     .ireturn();
//!
//! let mut class = ClassInfo::new("pkg/Sign", 52);
//! class
//!     .methods
//!     .push(MethodInfo::new("sign", "(I)I", AccessFlags::STATIC, asm.finish()?));
//!
//! let session = Arc::new(CoverageSession::new("branches=true".parse()?));
//! let instrumenter = Instrumenter::new(Arc::clone(&session));
//! assert!(matches!(instrumenter.instrument(&class), Instrumented::Rewritten(_)));
//!
//! // Three lines and one jump with two outcomes
//! assert_eq!(session.registry().slot_count("pkg/Sign"), Some(5));
//! # Ok::<(), covscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - instruction stream model and body assembler
//! - [`class`] - decoded class, field and method model
//! - [`instrument`] - scan, filters, slot layout, branch splitting and probe insertion
//! - [`runtime`] - counter registry, trace masks and the coverage session
//! - [`coverage`] - class records, line status, merging and the snapshot codec
//! - [`file`] - bounds-checked byte buffer access used by the codec
//!
//! ## Thread Safety
//!
//! An [`instrument::Instrumenter`] can be shared across loader threads; every class is
//! processed independently and the session's maps are concurrent. Probes update counters with
//! relaxed atomics and never block.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use covscope::prelude::*;
///
/// let options: InstrumentationOptions = "hits=flag,strategy=local".parse()?;
/// assert_eq!(options.hits, HitMode::Flag);
/// # Ok::<(), covscope::Error>(())
/// ```
pub mod prelude;

pub mod assembly;
pub mod class;
pub mod coverage;
pub mod file;
pub mod instrument;
pub mod runtime;

/// `covscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `covscope` Error type
///
/// Returned by option parsing, body validation and the snapshot codec.
pub use error::Error;
