//! Random-access byte stream over an in-memory buffer
//!
//! All multi-byte reads are endian-aware reinterpretations of the next bytes;
//! nothing here assumes host endianness.  The cursor only moves through
//! explicit reads or seeks.  [`ByteStream::at_end`] reserves the final two
//! bytes of the buffer for the file's trailing CRC, so a well-behaved caller
//! never consumes the trailer as message data.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

/// An error raised by the byte stream layer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("read of {wanted} bytes at offset {position} overruns buffer of {len} bytes")]
    Overrun {
        position: usize,
        wanted: usize,
        len: usize,
    },
    #[error("seek target {target} is outside buffer of {len} bytes")]
    SeekOutOfBounds { target: usize, len: usize },
    #[error("slice [{start}, {start}+{len}) is outside buffer of {buf_len} bytes")]
    SliceOutOfBounds {
        start: usize,
        len: usize,
        buf_len: usize,
    },
}

type Result<T> = std::result::Result<T, StreamError>;

/// Byte order of a multi-byte value on the wire.
///
/// FIT definition messages declare this per message via the architecture
/// byte; the file header is always little endian.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Endianness {
    Little,
    Big,
}

/// A cursor over a borrowed byte buffer.
///
/// Positions are byte offsets from the start of the buffer, in `[0, len]`.
#[derive(Debug)]
pub struct ByteStream<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteStream<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Total buffer length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the cursor has reached the message data's end.
    ///
    /// The last two bytes of the buffer hold the file CRC, so this reports
    /// true as soon as only the trailer (or less) remains.
    pub fn at_end(&self) -> bool {
        self.pos >= self.buf.len().saturating_sub(2)
    }

    /// Move the cursor to an absolute position in `[0, len]`.
    pub fn seek(&mut self, target: usize) -> Result<()> {
        if target > self.buf.len() {
            return Err(StreamError::SeekOutOfBounds {
                target,
                len: self.buf.len(),
            });
        }
        self.pos = target;
        Ok(())
    }

    /// Rewind the cursor to the start of the buffer.
    pub fn seek_start(&mut self) {
        self.pos = 0;
    }

    fn check(&self, wanted: usize) -> Result<()> {
        if self.pos + wanted > self.buf.len() {
            return Err(StreamError::Overrun {
                position: self.pos,
                wanted,
                len: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Read the byte at the cursor without advancing.
    pub fn peek_byte(&self) -> Result<u8> {
        self.check(1)?;
        Ok(self.buf[self.pos])
    }

    /// Read `n` bytes at the cursor without advancing.
    pub fn peek_bytes(&self, n: usize) -> Result<&'a [u8]> {
        self.check(n)?;
        Ok(&self.buf[self.pos..self.pos + n])
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = self.peek_byte()?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(n)?;
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u16(&mut self, endianness: Endianness) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_u32(&mut self, endianness: Endianness) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        })
    }

    /// Read an `n`-byte string field, returning the bytes before the first
    /// NUL terminator.
    ///
    /// The cursor always advances by the full declared width `n`.  UTF-8
    /// validation is the caller's concern.
    pub fn read_string(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.read_bytes(n)?;
        match bytes.iter().position(|&b| b == 0) {
            Some(idx) => Ok(&bytes[..idx]),
            None => Ok(bytes),
        }
    }

    /// Borrow an arbitrary range of the buffer without moving the cursor.
    pub fn slice(&self, start: usize, len: usize) -> Result<&'a [u8]> {
        if start + len > self.buf.len() {
            return Err(StreamError::SliceOutOfBounds {
                start,
                len,
                buf_len: self.buf.len(),
            });
        }
        Ok(&self.buf[start..start + len])
    }
}
