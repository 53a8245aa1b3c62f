//! Secondary line mapping for code generated from another source artifact.
//!
//! Compilers that inline code across files (or generate code from templates) record where each
//! output line came from in the class's source-debug extension. The table uses the
//! stratified source map layout:
//!
//! ```text
//! SMAP
//! Foo.kt
//! Kotlin
//! *S Kotlin
//! *F
//! + 1 Foo.kt
//! com/example/Foo.kt
//! + 2 Strings.kt
//! kotlin/text/Strings.kt
//! *L
//! 1#1,20:1
//! 40#2,3:100,2
//! *E
//! ```
//!
//! A line entry `in#file,repeat:out,incr` maps `repeat` input lines starting at `in` of file
//! `file` onto output lines starting at `out`, each input line covering `incr` output lines.
//! The file id and repeat/increment counts are optional; the file id defaults to the one of
//! the previous entry. Only the first stratum is read.

use std::collections::HashMap;

use crate::Result;

/// One file of the `*F` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFile {
    /// File id used by line entries
    pub id: u32,
    /// Short file name
    pub name: String,
    /// Path relative to the source root, when given
    pub path: Option<String>,
}

/// One entry of the `*L` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    /// File id of the input lines
    pub file: u32,
    /// First input line
    pub input_start: u32,
    /// Number of consecutive input lines
    pub repeat: u32,
    /// First output line
    pub output_start: u32,
    /// Output lines produced per input line
    pub increment: u32,
}

impl LineRange {
    fn output_end(&self) -> u64 {
        u64::from(self.output_start) + u64::from(self.repeat) * u64::from(self.increment)
    }

    fn map(&self, output: u32) -> Option<u32> {
        if self.increment == 0
            || output < self.output_start
            || u64::from(output) >= self.output_end()
        {
            return None;
        }
        Some(
            self.input_start
                .saturating_add((output - self.output_start) / self.increment),
        )
    }
}

/// Parsed source-debug line mapping of one class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineMapping {
    /// Name of the generated file
    pub generated: String,
    /// Default stratum name
    pub stratum: String,
    /// Files indexed by id
    pub files: Vec<MappedFile>,
    /// Line entries in declaration order
    pub ranges: Vec<LineRange>,
}

impl LineMapping {
    /// Parses a source-debug extension.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the header is missing or an entry cannot be read,
    /// [`crate::Error::Empty`] for empty input.
    pub fn parse(text: &str) -> Result<LineMapping> {
        let mut lines = text.lines().map(str::trim_end);

        match lines.next() {
            None => return Err(crate::Error::Empty),
            Some("SMAP") => {}
            Some(other) => return Err(malformed_error!("Expected SMAP header, got '{}'", other)),
        }
        let generated = lines
            .next()
            .ok_or_else(|| malformed_error!("Missing generated file name"))?
            .to_string();
        let stratum = lines
            .next()
            .ok_or_else(|| malformed_error!("Missing default stratum"))?
            .to_string();

        let mut mapping = LineMapping {
            generated,
            stratum,
            files: Vec::new(),
            ranges: Vec::new(),
        };

        let mut section = Section::None;
        let mut strata = 0;
        let mut last_file = 0;
        let mut expect_path = false;

        for line in lines {
            if let Some(marker) = line.strip_prefix('*') {
                expect_path = false;
                section = match marker.chars().next() {
                    Some('S') => {
                        strata += 1;
                        if strata > 1 {
                            break;
                        }
                        Section::None
                    }
                    Some('F') => Section::Files,
                    Some('L') => Section::Lines,
                    Some('E') => break,
                    _ => Section::None,
                };
                continue;
            }
            if line.is_empty() {
                continue;
            }

            match section {
                Section::Files => {
                    if let Some(entry) = line.strip_prefix("+ ") {
                        let (id, name) = split_file_entry(entry)?;
                        mapping.files.push(MappedFile {
                            id,
                            name,
                            path: None,
                        });
                        expect_path = true;
                    } else if expect_path {
                        if let Some(previous) = mapping.files.last_mut() {
                            previous.path = Some(line.to_string());
                        }
                        expect_path = false;
                    } else {
                        let (id, name) = split_file_entry(line)?;
                        mapping.files.push(MappedFile {
                            id,
                            name,
                            path: None,
                        });
                    }
                }
                Section::Lines => {
                    let range = parse_line_entry(line, last_file)?;
                    last_file = range.file;
                    mapping.ranges.push(range);
                }
                Section::None => {}
            }
        }

        Ok(mapping)
    }

    /// Maps a line of the generated class back to its origin.
    ///
    /// Returns the originating file and line, or `None` when no entry covers `output`.
    #[must_use]
    pub fn map_line(&self, output: u32) -> Option<(&MappedFile, u32)> {
        self.ranges.iter().find_map(|range| {
            let input = range.map(output)?;
            let file = self.files.iter().find(|file| file.id == range.file)?;
            Some((file, input))
        })
    }

    /// Returns every output line mapped to each file id.
    #[must_use]
    pub fn output_lines_by_file(&self) -> HashMap<u32, Vec<u32>> {
        let mut result: HashMap<u32, Vec<u32>> = HashMap::new();
        for range in &self.ranges {
            let end = u32::try_from(range.output_end()).unwrap_or(u32::MAX);
            result
                .entry(range.file)
                .or_default()
                .extend(range.output_start..end);
        }
        result
    }
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Files,
    Lines,
}

fn split_file_entry(entry: &str) -> Result<(u32, String)> {
    let entry = entry.trim();
    let (id, name) = entry
        .split_once(' ')
        .ok_or_else(|| malformed_error!("Invalid file entry '{}'", entry))?;
    let id = parse_number(id)?;
    Ok((id, name.trim().to_string()))
}

fn parse_line_entry(entry: &str, last_file: u32) -> Result<LineRange> {
    let (input, output) = entry
        .split_once(':')
        .ok_or_else(|| malformed_error!("Line entry '{}' has no ':'", entry))?;

    let (input, repeat) = match input.split_once(',') {
        Some((input, repeat)) => (input, parse_number(repeat)?),
        None => (input, 1),
    };
    let (input_start, file) = match input.split_once('#') {
        Some((start, file)) => (parse_number(start)?, parse_number(file)?),
        None => (parse_number(input)?, last_file),
    };
    let (output_start, increment) = match output.split_once(',') {
        Some((start, increment)) => (parse_number(start)?, parse_number(increment)?),
        None => (parse_number(output)?, 1),
    };

    Ok(LineRange {
        file,
        input_start,
        repeat,
        output_start,
        increment,
    })
}

fn parse_number(text: &str) -> Result<u32> {
    text.trim()
        .parse()
        .map_err(|_| malformed_error!("Invalid number '{}' in source map", text))
}
