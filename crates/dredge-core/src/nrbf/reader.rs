//! Sequential cursor over a byte buffer.
//!
//! All multi-byte integers are little-endian. Text is UTF-8 prefixed with its
//! byte length, encoded as a 7-bit varint of at most five bytes:
//!
//! ```text
//! 0x06 'N' 'S' '.' 'F' 'o' 'o'      -> "NS.Foo"
//! 0x80 0x01 <128 bytes>             -> 128-byte string
//! ```
//!
//! A failed read leaves the cursor where it was. There is no retry logic here;
//! callers relocate the cursor with [`Reader::set_position`] and try again.

use super::enums::{Tag, WireEnum};
use crate::error::{Error, Result};
use bytes::Buf;

/// Maximum number of bytes in a length prefix
const MAX_PREFIX_BYTES: usize = 5;

/// Cursor over a borrowed byte buffer offering typed primitive reads
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Returns the current cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor to an arbitrary position
    ///
    /// Positions past the end are allowed; the next read fails with
    /// [`Error::UnexpectedEof`].
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Returns the number of bytes between the cursor and the end
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Returns the whole underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the unread part of the buffer, checking that `needed` bytes exist
    fn ensure(&self, needed: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if available < needed {
            return Err(Error::unexpected_eof(self.position, needed, available));
        }
        Ok(&self.data[self.position..])
    }

    /// Reads one byte
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = self.ensure(1)?;
        let value = buf.get_u8();
        self.position += 1;
        Ok(value)
    }

    /// Reads a little-endian 32-bit signed integer
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = self.ensure(4)?;
        let value = buf.get_i32_le();
        self.position += 4;
        Ok(value)
    }

    /// Reads a 7-bit encoded length prefix
    ///
    /// Returns the decoded length and the number of prefix bytes consumed.
    pub fn read_length_prefix(&mut self) -> Result<(usize, usize)> {
        let start = self.position;
        let mut value: u64 = 0;

        for i in 0..MAX_PREFIX_BYTES {
            let byte = match self.read_byte() {
                Ok(byte) => byte,
                Err(e) => {
                    self.position = start;
                    return Err(e);
                }
            };
            value |= u64::from(byte & 0x7F) << (7 * i);

            if byte & 0x80 == 0 {
                if value > i32::MAX as u64 {
                    self.position = start;
                    return Err(Error::invalid_structure(
                        start,
                        format!("length prefix {} exceeds the int32 range", value),
                    ));
                }
                return Ok((value as usize, i + 1));
            }
        }

        self.position = start;
        Err(Error::invalid_structure(
            start,
            format!("length prefix longer than {} bytes", MAX_PREFIX_BYTES),
        ))
    }

    /// Reads a length-prefixed UTF-8 string
    pub fn read_text(&mut self) -> Result<String> {
        let start = self.position;
        let (length, _) = self.read_length_prefix()?;

        let bytes = match self.ensure(length) {
            Ok(rest) => &rest[..length],
            Err(e) => {
                self.position = start;
                return Err(e);
            }
        };

        match std::str::from_utf8(bytes) {
            Ok(text) => {
                self.position += length;
                Ok(text.to_owned())
            }
            Err(e) => {
                let offset = self.position + e.valid_up_to();
                self.position = start;
                Err(Error::invalid_structure(offset, "text is not valid UTF-8"))
            }
        }
    }

    /// Reads one byte as an enumeration tag
    ///
    /// Bytes with no matching member come back as [`Tag::Unrecognized`]
    /// rather than an error, so callers decide the policy.
    pub fn read_enum<E: WireEnum>(&mut self) -> Result<Tag<E>> {
        self.read_byte().map(Tag::from_byte)
    }

    /// Reads one byte as an enumeration tag without moving the cursor
    pub fn peek_enum<E: WireEnum>(&mut self) -> Result<Tag<E>> {
        let tag = self.read_enum()?;
        self.position -= 1;
        Ok(tag)
    }

    /// Reads an enumeration tag and requires it to be a known member
    pub fn read_known_enum<E: WireEnum>(&mut self) -> Result<E> {
        let offset = self.position;
        match self.read_enum::<E>()? {
            Tag::Known(value) => Ok(value),
            Tag::Unrecognized(byte) => Err(Error::invalid_structure(
                offset,
                format!("invalid {} 0x{:02x}", E::NAME, byte),
            )),
        }
    }
}
