//! Growable output buffer, the writing counterpart of [`crate::file::Parser`].
//!
//! All growth goes through [`Vec::try_reserve`], so running out of memory while encoding a
//! large snapshot is reported as [`crate::Error::ResourceExhausted`] instead of aborting the
//! process. Callers drop the writer on error, which discards the partial output.

use crate::{file::io::CovIO, Error, Result};

/// Little-endian byte sink with fallible growth.
#[derive(Debug, Default)]
pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Writer { buffer: Vec::new() }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the writer and returns the encoded bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        self.buffer.try_reserve(additional).map_err(|e| {
            Error::ResourceExhausted(format!(
                "could not grow snapshot buffer of {} bytes by {}: {}",
                self.buffer.len(),
                additional,
                e
            ))
        })
    }

    /// Append raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResourceExhausted`] if the buffer cannot grow.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a value in little-endian byte order.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResourceExhausted`] if the buffer cannot grow.
    pub fn write_le<T: CovIO>(&mut self, value: T) -> Result<()> {
        self.write_bytes(value.to_le_bytes().as_ref())
    }

    /// Append a boolean as a single 0/1 byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResourceExhausted`] if the buffer cannot grow.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_le(u8::from(value))
    }

    /// Append a 7-bit encoded unsigned integer.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResourceExhausted`] if the buffer cannot grow.
    pub fn write_7bit_encoded_int(&mut self, mut value: u32) -> Result<()> {
        let mut encoded = [0u8; 5];
        let mut len = 0;

        loop {
            #[allow(clippy::cast_possible_truncation)]
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                encoded[len] = byte;
                len += 1;
                break;
            }
            encoded[len] = byte | 0x80;
            len += 1;
        }

        self.write_bytes(&encoded[..len])
    }

    /// Append an element count.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResourceExhausted`] if the count does not fit the encoding or the
    /// buffer cannot grow.
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        let count = u32::try_from(count).map_err(|_| {
            Error::ResourceExhausted(format!("element count {count} exceeds the encoding range"))
        })?;
        self.write_7bit_encoded_int(count)
    }

    /// Append a length-prefixed UTF-8 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResourceExhausted`] if the buffer cannot grow.
    pub fn write_prefixed_string_utf8(&mut self, value: &str) -> Result<()> {
        self.write_count(value.len())?;
        self.write_bytes(value.as_bytes())
    }

    /// Append an optional string preceded by a presence byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::ResourceExhausted`] if the buffer cannot grow.
    pub fn write_optional_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_prefixed_string_utf8(value)
            }
            None => self.write_bool(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Parser;

    #[test]
    fn write_7bit_matches_parser() {
        for value in [0, 1, 127, 128, 300, 16_384, 0x0FFF_FFFF, u32::MAX] {
            let mut writer = Writer::new();
            writer.write_7bit_encoded_int(value).unwrap();
            let bytes = writer.into_inner();
            assert_eq!(Parser::new(&bytes).read_7bit_encoded_int().unwrap(), value);
        }
    }

    #[test]
    fn write_7bit_sizes() {
        let mut writer = Writer::new();
        writer.write_7bit_encoded_int(127).unwrap();
        assert_eq!(writer.len(), 1);
        writer.write_7bit_encoded_int(128).unwrap();
        assert_eq!(writer.len(), 3);
    }

    #[test]
    fn write_strings() {
        let mut writer = Writer::new();
        writer.write_prefixed_string_utf8("pkg/Foo").unwrap();
        writer.write_optional_string(None).unwrap();

        let bytes = writer.into_inner();
        assert_eq!(bytes[0], 7);
        assert_eq!(&bytes[1..8], b"pkg/Foo");
        assert_eq!(bytes[8], 0);
    }
}
