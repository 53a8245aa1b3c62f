//! Cursor-based parser over an immutable byte slice.
//!
//! [`Parser`] keeps a position within the data and offers bounds-checked reads of fixed-size
//! little-endian primitives, 7-bit encoded integers and length-prefixed UTF-8 strings; the
//! exact inverse of [`crate::file::Writer`].
//!
//! # Examples
//!
//! ```rust
//! use covscope::file::Parser;
//!
//! let data = [0x80, 0x01, 3, b'a', b'b', b'c'];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_7bit_encoded_int()?, 128);
//! assert_eq!(parser.read_prefixed_string_utf8()?, "abc");
//! assert!(!parser.has_more_data());
//! # Ok::<(), covscope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CovIO},
    Result,
};

/// A generic binary data parser for reading snapshot structures.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Read a type `T` from the current position in little-endian format.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: CovIO>(&mut self) -> Result<T> {
        read_le_at(self.data, &mut self.position)
    }

    /// Read a single byte and interpret it as a boolean.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data and
    /// [`crate::Error::Malformed`] for values other than 0 and 1.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_le::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(malformed_error!(
                "Invalid boolean byte 0x{:02X} at offset {}",
                other,
                self.position - 1
            )),
        }
    }

    /// Read a 7-bit encoded unsigned integer.
    ///
    /// Each byte carries seven value bits, least significant group first; the high bit marks
    /// a continuation.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for invalid encoding (overflow).
    pub fn read_7bit_encoded_int(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            if self.position >= self.data.len() {
                return Err(out_of_bounds_error!());
            }

            let byte = self.data[self.position];
            self.position += 1;

            if shift == 28 && (byte & 0x70) != 0 {
                return Err(malformed_error!(
                    "7-bit encoded integer overflow at offset {}",
                    self.position - 1
                ));
            }

            value |= u32::from(byte & 0x7F) << shift;
            shift += 7;

            if (byte & 0x80) == 0 {
                break;
            }

            // A u32 can hold at most 32 bits; after 4 bytes we've read 28 bits.
            // A 5th continuation byte would push past 32 bits, causing overflow.
            if shift >= 32 {
                return Err(malformed_error!(
                    "7-bit encoded integer overflow: value exceeds u32 capacity after {} bits",
                    shift
                ));
            }
        }

        Ok(value)
    }

    /// Read a 7-bit encoded element count and check it against the remaining data.
    ///
    /// Every counted element occupies at least one byte, so a count larger than the remaining
    /// input is rejected before any allocation is sized from it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the count cannot possibly be satisfied.
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_7bit_encoded_int()? as usize;
        if count > self.data.len() - self.position {
            return Err(malformed_error!(
                "Element count {} exceeds remaining {} bytes at offset {}",
                count,
                self.data.len() - self.position,
                self.position
            ));
        }
        Ok(count)
    }

    /// Read a length-prefixed UTF-8 string.
    ///
    /// The string length is encoded as a 7-bit encoded integer, followed by that many
    /// UTF-8 bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for invalid UTF-8 encoding.
    pub fn read_prefixed_string_utf8(&mut self) -> Result<String> {
        let length = self.read_7bit_encoded_int()? as usize;

        if length > self.data.len() - self.position {
            return Err(out_of_bounds_error!());
        }

        let string_data = &self.data[self.position..self.position + length];
        self.position += length;

        String::from_utf8(string_data.to_vec()).map_err(|e| {
            malformed_error!(
                "Invalid UTF-8 string at offset {}-{}: {}",
                self.position - length,
                self.position,
                e.utf8_error()
            )
        })
    }

    /// Read an optional length-prefixed string preceded by a presence byte.
    ///
    /// # Errors
    /// Propagates the errors of [`Parser::read_bool`] and [`Parser::read_prefixed_string_utf8`].
    pub fn read_optional_string(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            Ok(Some(self.read_prefixed_string_utf8()?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_7bit_boundaries() {
        let data = [0x7F];
        assert_eq!(Parser::new(&data).read_7bit_encoded_int().unwrap(), 127);

        let data = [0x80, 0x01];
        assert_eq!(Parser::new(&data).read_7bit_encoded_int().unwrap(), 128);

        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x0F];
        assert_eq!(
            Parser::new(&data).read_7bit_encoded_int().unwrap(),
            u32::MAX
        );
    }

    #[test]
    fn read_7bit_overflow() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        assert!(Parser::new(&data).read_7bit_encoded_int().is_err());

        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x8F, 0x01];
        assert!(Parser::new(&data).read_7bit_encoded_int().is_err());
    }

    #[test]
    fn read_7bit_truncated() {
        let data = [0x80];
        assert!(matches!(
            Parser::new(&data).read_7bit_encoded_int(),
            Err(crate::Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn read_strings() {
        let data = [5, b'H', b'e', b'l', b'l', b'o', 0, 1, 1, b'x'];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_prefixed_string_utf8().unwrap(), "Hello");
        assert_eq!(parser.read_optional_string().unwrap(), None);
        assert_eq!(parser.read_optional_string().unwrap(), Some("x".to_string()));
        assert!(!parser.has_more_data());
    }

    #[test]
    fn read_string_too_long() {
        let data = [10, b'a'];
        assert!(Parser::new(&data).read_prefixed_string_utf8().is_err());
    }

    #[test]
    fn read_invalid_bool() {
        let data = [2];
        assert!(Parser::new(&data).read_bool().is_err());
    }

    #[test]
    fn read_count_rejects_impossible() {
        let data = [0x64, 0x00];
        assert!(Parser::new(&data).read_count().is_err());

        let data = [0x01, 0x00];
        assert_eq!(Parser::new(&data).read_count().unwrap(), 1);
    }
}
