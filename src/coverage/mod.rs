//! Coverage records, snapshots and their merge and binary encoding.
//!
//! The record model has three granularities below the class: [`LineRecord`] for a source line,
//! [`JumpRecord`] for both outcomes of a conditional jump and [`SwitchRecord`] for every
//! outcome of a multi-way branch. Each line and each outcome owns one [`SlotId`], an index into
//! the class's counter array that rewritten code increments.
//!
//! Records are created by the instrumenter, receive counter values when a snapshot is taken,
//! and are read-only afterwards.

mod class;
pub mod codec;
mod jump;
mod line;
mod mapping;
mod merge;
mod project;
mod status;
mod switch;

pub use class::{ClassRecord, CoverageSummary};
pub use codec::{decode, encode, save};
pub use jump::JumpRecord;
pub use line::LineRecord;
pub use mapping::{LineMapping, LineRange, MappedFile};
pub use merge::{merge, merge_class};
pub use project::{ProjectSnapshot, SnapshotMode};
pub use status::LineStatus;
pub use switch::SwitchRecord;

/// Index into a class's counter array.
pub type SlotId = u32;
