//! Binary encoding of [`ProjectSnapshot`].
//!
//! Every record is written together with its slot ids, so a decoded snapshot is equal to the
//! encoded one record for record without re-running the instrumenter. Where the bytes end up
//! (file naming, locking, atomic replacement) is the caller's business.
//!
//! # Layout
//!
//! ```text
//! magic        "CVSN"
//! version      u8 (1)
//! mode         u8: bit 0 branches, bit 1 instruction counts, bit 2 counting hits
//! classes      count, then per class:
//!   name, source file (optional), fully analyzed (bool), slot count
//!   hits       count, values
//!   trace      optional: count, one byte per slot
//!   methods    count, signatures (referenced by index from lines)
//!   lines      count, then per line:
//!     line, method index, slot, hits, instructions (optional)
//!     jumps    count, (true slot, false slot, true hits, false hits)
//!     switches count, then keys (count, i32 LE each), key slots, key hits,
//!              default slot (optional), default hits
//!   mapping    optional: generated, stratum, files, ranges
//! ```
//!
//! Unsigned integers and counts use the 7-bit variable length encoding of
//! [`crate::file::Writer::write_7bit_encoded_int`]; booleans are single bytes.

use std::{collections::HashMap, io::Write};

use crate::{
    coverage::{
        ClassRecord, JumpRecord, LineMapping, LineRange, LineRecord, MappedFile,
        ProjectSnapshot, SlotId, SnapshotMode, SwitchRecord,
    },
    file::{Parser, Writer},
    Error, Result,
};

/// File magic.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"CVSN";
/// Current layout version.
pub const SNAPSHOT_VERSION: u8 = 1;

const MODE_BRANCHES: u8 = 0x01;
const MODE_INSTRUCTIONS: u8 = 0x02;
const MODE_COUNTS: u8 = 0x04;

/// Encodes a snapshot into a new buffer.
///
/// # Errors
///
/// Returns [`Error::ResourceExhausted`] if the buffer cannot grow; nothing is returned in that
/// case, so no truncated encoding can escape.
pub fn encode(snapshot: &ProjectSnapshot) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    writer.write_bytes(SNAPSHOT_MAGIC)?;
    writer.write_le::<u8>(SNAPSHOT_VERSION)?;

    let mut mode = 0;
    if snapshot.mode.branch_coverage {
        mode |= MODE_BRANCHES;
    }
    if snapshot.mode.instruction_counting {
        mode |= MODE_INSTRUCTIONS;
    }
    if snapshot.mode.count_hits {
        mode |= MODE_COUNTS;
    }
    writer.write_le::<u8>(mode)?;

    writer.write_count(snapshot.classes.len())?;
    for class in snapshot.classes.values() {
        encode_class(&mut writer, class)?;
    }

    Ok(writer.into_inner())
}

/// Encodes a snapshot and writes it to `sink` in one piece.
///
/// The snapshot is encoded completely before the first byte is written.
///
/// # Errors
///
/// Returns [`Error::ResourceExhausted`] if encoding runs out of memory, or [`Error::Io`] if
/// the sink fails.
pub fn save<W: Write>(snapshot: &ProjectSnapshot, sink: &mut W) -> Result<()> {
    let bytes = match encode(snapshot) {
        Ok(bytes) => bytes,
        Err(error) => {
            log::error!(
                "Discarding snapshot of {} classes: {}",
                snapshot.len(),
                error
            );
            return Err(error);
        }
    };
    sink.write_all(&bytes)?;
    sink.flush()?;
    Ok(())
}

fn write_u32(writer: &mut Writer, value: u32) -> Result<()> {
    writer.write_7bit_encoded_int(value)
}

fn encode_class(writer: &mut Writer, class: &ClassRecord) -> Result<()> {
    writer.write_prefixed_string_utf8(&class.name)?;
    writer.write_optional_string(class.source_file.as_deref())?;
    writer.write_bool(class.fully_analyzed)?;
    write_u32(writer, class.slot_count)?;

    writer.write_count(class.hits.len())?;
    for hits in &class.hits {
        write_u32(writer, *hits)?;
    }

    writer.write_bool(class.trace.is_some())?;
    if let Some(trace) = &class.trace {
        writer.write_count(trace.len())?;
        for hit in trace {
            writer.write_bool(*hit)?;
        }
    }

    let mut methods: Vec<&str> = Vec::new();
    let mut method_index: HashMap<&str, usize> = HashMap::new();
    for line in class.lines() {
        method_index
            .entry(line.method.as_str())
            .or_insert_with(|| {
            methods.push(&line.method);
            methods.len() - 1
        });
    }
    writer.write_count(methods.len())?;
    for method in &methods {
        writer.write_prefixed_string_utf8(method)?;
    }

    writer.write_count(class.line_count())?;
    for line in class.lines() {
        write_u32(writer, line.line)?;
        writer.write_count(method_index.get(line.method.as_str()).copied().unwrap_or(0))?;
        write_u32(writer, line.slot)?;
        write_u32(writer, line.hits)?;
        writer.write_bool(line.instructions.is_some())?;
        if let Some(count) = line.instructions {
            write_u32(writer, count)?;
        }

        writer.write_count(line.jumps.len())?;
        for jump in &line.jumps {
            write_u32(writer, jump.true_slot)?;
            write_u32(writer, jump.false_slot)?;
            write_u32(writer, jump.true_hits)?;
            write_u32(writer, jump.false_hits)?;
        }

        writer.write_count(line.switches.len())?;
        for switch in &line.switches {
            writer.write_count(switch.keys.len())?;
            for key in &switch.keys {
                writer.write_le::<i32>(*key)?;
            }
            for slot in &switch.key_slots {
                write_u32(writer, *slot)?;
            }
            for hits in &switch.key_hits {
                write_u32(writer, *hits)?;
            }
            writer.write_bool(switch.default_slot.is_some())?;
            if let Some(slot) = switch.default_slot {
                write_u32(writer, slot)?;
            }
            write_u32(writer, switch.default_hits)?;
        }
    }

    writer.write_bool(class.mapping.is_some())?;
    if let Some(mapping) = &class.mapping {
        writer.write_prefixed_string_utf8(&mapping.generated)?;
        writer.write_prefixed_string_utf8(&mapping.stratum)?;
        writer.write_count(mapping.files.len())?;
        for file in &mapping.files {
            write_u32(writer, file.id)?;
            writer.write_prefixed_string_utf8(&file.name)?;
            writer.write_optional_string(file.path.as_deref())?;
        }
        writer.write_count(mapping.ranges.len())?;
        for range in &mapping.ranges {
            write_u32(writer, range.file)?;
            write_u32(writer, range.input_start)?;
            write_u32(writer, range.repeat)?;
            write_u32(writer, range.output_start)?;
            write_u32(writer, range.increment)?;
        }
    }

    Ok(())
}

/// Decodes a snapshot produced by [`encode`].
///
/// # Errors
///
/// - [`Error::Empty`] for empty input
/// - [`Error::NotSupported`] for an unknown version
/// - [`Error::Malformed`] or [`Error::OutOfBounds`] for damaged bytes, including slot ids
///   outside the class's slot range and trailing data
pub fn decode(data: &[u8]) -> Result<ProjectSnapshot> {
    if data.is_empty() {
        return Err(Error::Empty);
    }

    let mut parser = Parser::new(data);
    for expected in SNAPSHOT_MAGIC {
        if parser.read_le::<u8>()? != *expected {
            return Err(malformed_error!("Invalid snapshot magic"));
        }
    }

    let version = parser.read_le::<u8>()?;
    if version != SNAPSHOT_VERSION {
        return Err(Error::NotSupported(format!(
            "snapshot version {version}, expected {SNAPSHOT_VERSION}"
        )));
    }

    let mode = parser.read_le::<u8>()?;
    if mode & !(MODE_BRANCHES | MODE_INSTRUCTIONS | MODE_COUNTS) != 0 {
        return Err(malformed_error!("Unknown mode bits 0x{:02X}", mode));
    }
    let mut snapshot = ProjectSnapshot::new(SnapshotMode {
        branch_coverage: mode & MODE_BRANCHES != 0,
        instruction_counting: mode & MODE_INSTRUCTIONS != 0,
        count_hits: mode & MODE_COUNTS != 0,
    });

    let class_count = parser.read_count()?;
    for _ in 0..class_count {
        let class = decode_class(&mut parser)?;
        if snapshot.classes.contains_key(&class.name) {
            return Err(malformed_error!("Duplicate class '{}'", class.name));
        }
        snapshot.insert(class);
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes after snapshot",
            parser.len() - parser.pos()
        ));
    }

    Ok(snapshot)
}

fn decode_class(parser: &mut Parser<'_>) -> Result<ClassRecord> {
    let mut class = ClassRecord::new(&parser.read_prefixed_string_utf8()?);
    class.source_file = parser.read_optional_string()?;
    class.fully_analyzed = parser.read_bool()?;
    class.slot_count = parser.read_7bit_encoded_int()?;

    let hit_count = parser.read_count()?;
    let mut hits = Vec::with_capacity(hit_count);
    for _ in 0..hit_count {
        hits.push(parser.read_7bit_encoded_int()?);
    }
    class.hits = hits;

    if parser.read_bool()? {
        let trace_count = parser.read_count()?;
        let mut trace = Vec::with_capacity(trace_count);
        for _ in 0..trace_count {
            trace.push(parser.read_bool()?);
        }
        class.trace = Some(trace);
    }

    let method_count = parser.read_count()?;
    let mut methods = Vec::with_capacity(method_count);
    for _ in 0..method_count {
        methods.push(parser.read_prefixed_string_utf8()?);
    }

    let slot_count = class.slot_count;
    let check_slot = |slot: SlotId| -> Result<SlotId> {
        if slot < slot_count {
            Ok(slot)
        } else {
            Err(malformed_error!(
                "Slot {} outside of {} allocated slots",
                slot,
                slot_count
            ))
        }
    };

    let line_count = parser.read_count()?;
    for _ in 0..line_count {
        let number = parser.read_7bit_encoded_int()?;
        let method_index = parser.read_count()?;
        let method = methods
            .get(method_index)
            .ok_or_else(|| malformed_error!("Method index {} out of range", method_index))?;
        let slot = check_slot(parser.read_7bit_encoded_int()?)?;

        let mut line = LineRecord::new(number, method, slot);
        line.hits = parser.read_7bit_encoded_int()?;
        if parser.read_bool()? {
            line.instructions = Some(parser.read_7bit_encoded_int()?);
        }

        let jump_count = parser.read_count()?;
        for _ in 0..jump_count {
            let mut jump = JumpRecord::new(
                check_slot(parser.read_7bit_encoded_int()?)?,
                check_slot(parser.read_7bit_encoded_int()?)?,
            );
            jump.true_hits = parser.read_7bit_encoded_int()?;
            jump.false_hits = parser.read_7bit_encoded_int()?;
            line.jumps.push(jump);
        }

        let switch_count = parser.read_count()?;
        for _ in 0..switch_count {
            let key_count = parser.read_count()?;
            let mut keys = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                keys.push(parser.read_le::<i32>()?);
            }
            let mut key_slots = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                key_slots.push(check_slot(parser.read_7bit_encoded_int()?)?);
            }
            let mut key_hits = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                key_hits.push(parser.read_7bit_encoded_int()?);
            }
            let default_slot = if parser.read_bool()? {
                Some(check_slot(parser.read_7bit_encoded_int()?)?)
            } else {
                None
            };
            let mut switch = SwitchRecord::new(keys, key_slots, default_slot);
            switch.key_hits = key_hits;
            switch.default_hits = parser.read_7bit_encoded_int()?;
            line.switches.push(switch);
        }

        if class.line(number).is_some() {
            return Err(malformed_error!(
                "Line {} of '{}' encoded twice",
                number,
                class.name
            ));
        }
        class.insert_line(line);
    }

    if parser.read_bool()? {
        let generated = parser.read_prefixed_string_utf8()?;
        let stratum = parser.read_prefixed_string_utf8()?;
        let file_count = parser.read_count()?;
        let mut files = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            files.push(MappedFile {
                id: parser.read_7bit_encoded_int()?,
                name: parser.read_prefixed_string_utf8()?,
                path: parser.read_optional_string()?,
            });
        }
        let range_count = parser.read_count()?;
        let mut ranges = Vec::with_capacity(range_count);
        for _ in 0..range_count {
            ranges.push(LineRange {
                file: parser.read_7bit_encoded_int()?,
                input_start: parser.read_7bit_encoded_int()?,
                repeat: parser.read_7bit_encoded_int()?,
                output_start: parser.read_7bit_encoded_int()?,
                increment: parser.read_7bit_encoded_int()?,
            });
        }
        class.mapping = Some(LineMapping {
            generated,
            stratum,
            files,
            ranges,
        });
    }

    Ok(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProjectSnapshot {
        let mut snapshot = ProjectSnapshot::new(SnapshotMode {
            branch_coverage: true,
            instruction_counting: true,
            count_hits: true,
        });
        let class = snapshot.class_or_insert("com/example/Foo");
        class.source_file = Some("Foo.java".to_string());
        class.fully_analyzed = true;
        class.line_or_insert(3, "run(I)V");
        let t = class.allocate_slot();
        let f = class.allocate_slot();
        let k0 = class.allocate_slot();
        let k1 = class.allocate_slot();
        let line = class.line_mut(3).unwrap();
        line.instructions = Some(7);
        line.jumps.push(JumpRecord::new(t, f));
        line.switches
            .push(SwitchRecord::new(vec![-5, 300], vec![k0, k1], None));
        class.line_or_insert(4, "other()V");
        class.apply_hits(&[4, 1, 3, 0, 2, 4]);
        class.trace = Some(vec![true, false, false, false, false, true]);
        snapshot
    }

    #[test]
    fn round_trip() {
        let snapshot = sample();
        let bytes = encode(&snapshot).unwrap();
        assert_eq!(&bytes[..4], SNAPSHOT_MAGIC);
        assert_eq!(decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn save_writes_everything() {
        let snapshot = sample();
        let mut sink = Vec::new();
        save(&snapshot, &mut sink).unwrap();
        assert_eq!(sink, encode(&snapshot).unwrap());
    }

    #[test]
    fn rejects_damage() {
        let bytes = encode(&sample()).unwrap();
        assert!(matches!(decode(&[]), Err(Error::Empty)));
        assert!(matches!(decode(b"XXXX\x01\x05\x00"), Err(Error::Malformed { .. })));

        let mut version = bytes.clone();
        version[4] = 9;
        assert!(matches!(decode(&version), Err(Error::NotSupported(_))));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(decode(&trailing).is_err());

        for cut in 0..bytes.len() {
            assert!(decode(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn rejects_slot_outside_range() {
        let mut snapshot = ProjectSnapshot::default();
        let class = snapshot.class_or_insert("A");
        class.line_or_insert(1, "f()V");
        class.slot_count = 0;
        let bytes = encode(&snapshot).unwrap();
        assert!(matches!(decode(&bytes), Err(Error::Malformed { .. })));
    }

    #[test]
    fn far_line_numbers_decode() {
        let mut snapshot = ProjectSnapshot::default();
        let class = snapshot.class_or_insert("A");
        class.line_or_insert(u32::MAX, "f()V");
        class.apply_hits(&[1]);
        let bytes = encode(&snapshot).unwrap();
        assert_eq!(decode(&bytes).unwrap(), snapshot);
        for cut in 0..bytes.len() {
            assert!(decode(&bytes[..cut]).is_err());
        }
    }
}
