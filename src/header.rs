//! FIT file header reader
//!
//! The header is 12 bytes, or 14 when it carries its own CRC over the first
//! twelve.  All header fields are little endian regardless of the
//! architecture later declared by definition messages.

use tracing::debug;

use crate::stream::{ByteStream, Endianness};
use crate::{DecoderError, crc};

/// The four-byte magic every FIT file carries at header offset 8.
pub const SIGNATURE: [u8; 4] = *b".FIT";

const HEADER_SIZE_PLAIN: u8 = 12;
const HEADER_SIZE_WITH_CRC: u8 = 14;

/// A parsed FIT file header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FileHeader {
    /// Header size on the wire, 12 or 14.
    pub header_size: u8,
    /// Protocol version byte (major in the high nibble).
    pub protocol_version: u8,
    /// Global profile version the file was written against.
    pub profile_version: u16,
    /// Number of message-record bytes between the header and the trailing
    /// CRC.
    pub data_size: u32,
    /// The header's own CRC, present only in 14-byte headers.
    pub crc: Option<u16>,
}

impl FileHeader {
    /// Reads and validates a header at the stream's current position,
    /// leaving the cursor on the first message record.
    pub fn read(stream: &mut ByteStream<'_>) -> Result<Self, DecoderError> {
        Self::read_with(stream, true)
    }

    /// Reads a header, optionally skipping the header-CRC comparison.
    ///
    /// The signature and size checks always run; only the checksum of a
    /// 14-byte header is subject to `validate_crc`.
    pub fn read_with(
        stream: &mut ByteStream<'_>,
        validate_crc: bool,
    ) -> Result<Self, DecoderError> {
        let start = stream.position();

        let header_size = stream.read_byte()?;
        if header_size != HEADER_SIZE_PLAIN && header_size != HEADER_SIZE_WITH_CRC {
            return Err(DecoderError::HeaderSize { size: header_size });
        }

        let protocol_version = stream.read_byte()?;
        let profile_version = stream.read_u16(Endianness::Little)?;
        let data_size = stream.read_u32(Endianness::Little)?;

        let signature: [u8; 4] = stream
            .read_bytes(4)?
            .try_into()
            .expect("read_bytes(4) yields four bytes");
        if signature != SIGNATURE {
            return Err(DecoderError::Signature { signature });
        }

        let crc = if header_size == HEADER_SIZE_WITH_CRC {
            let stored = stream.read_u16(Endianness::Little)?;
            if validate_crc {
                let computed = crc::calculate(stream.slice(start, 12)?);
                if computed != stored {
                    return Err(DecoderError::HeaderCrc { computed, stored });
                }
            }
            Some(stored)
        } else {
            None
        };

        debug!(
            header_size,
            protocol_version, profile_version, data_size, "Read file header"
        );

        Ok(Self {
            header_size,
            protocol_version,
            profile_version,
            data_size,
            crc,
        })
    }

    /// Inspects the header without consuming it.
    ///
    /// The cursor is restored to its pre-call position whether or not the
    /// parse succeeds.
    pub fn peek(stream: &mut ByteStream<'_>) -> Result<Self, DecoderError> {
        let saved = stream.position();
        let result = Self::read_with(stream, true);
        stream
            .seek(saved)
            .expect("restoring a previously valid position");
        result
    }

    /// Offset of the first byte past the message records, i.e. of the
    /// trailing CRC.
    pub fn data_end(&self) -> usize {
        self.header_size as usize + self.data_size as usize
    }
}
