//! A decoder for Garmin FIT activity files.
//!
//! A FIT file is an ordered stream of self-describing records: a short file
//! header, alternating definition and data messages, and a trailing
//! checksum.  Data messages are meaningless on their own; each conforms to
//! the most recent definition bound to its four-bit local message type, and
//! field semantics (names, units, scale, enumerations) come from the global
//! profile published with the FIT SDK.
//!
//! Open a file with [`FitFile::open`], walk its records lazily with
//! [`FitFile::messages`], or decode everything against a [`Profile`] in one
//! call with [`FitFile::decode`] / [`decode_fit`].
//!
//! # Feature flags
//!
//! - `serde` derives `Serialize`/`Deserialize` on the profile model and
//!   `Serialize` on decoded output
//! - `cli` enables the additional dependencies needed by the CLI

pub mod basetype;
pub mod crc;
pub mod decode;
pub mod decoded;
pub mod header;
pub mod message;
pub mod profile;
pub mod reader;
pub mod stream;
pub mod value;

use std::path::Path;

use thiserror::Error;

pub use crate::basetype::BaseType;
pub use crate::decode::{DecodeOptions, MessageDecoder, fit_epoch};
pub use crate::decoded::{DecodedField, DecodedFitFile, DecodedMessage};
pub use crate::header::FileHeader;
pub use crate::message::{DataMessage, DefinitionMessage, FieldDefinition, RawValue};
pub use crate::profile::{FieldInfo, MessageInfo, Profile, SubField};
pub use crate::reader::{FitMessage, MessageReader};
pub use crate::stream::{ByteStream, Endianness, StreamError};
pub use crate::value::Value;

/// An error while decoding a FIT file.
///
/// Byte positions, where present, are 0-based offsets into the file.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecoderError {
    #[error("byte stream error")]
    Stream(#[from] StreamError),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("unexpected header size {size}, expected 12 or 14")]
    HeaderSize { size: u8 },
    #[error("bad signature {signature:?}, expected \".FIT\"")]
    Signature { signature: [u8; 4] },
    #[error("header CRC mismatch: computed {computed:#06x}, header says {stored:#06x}")]
    HeaderCrc { computed: u16, stored: u16 },
    #[error("trailer CRC mismatch: computed {computed:#06x}, trailer says {stored:#06x}")]
    TrailerCrc { computed: u16, stored: u16 },
    #[error("file of {len} bytes is too short to carry a checksum trailer")]
    Truncated { len: usize },
    #[error("unexpected record header byte {header:#04x} at offset {position}")]
    RecordType { header: u8, position: usize },
    #[error("non-zero reserved byte {reserved:#04x} in definition at offset {position}")]
    ReservedByte { reserved: u8, position: usize },
    #[error("invalid architecture byte {architecture} at offset {position}")]
    Architecture { architecture: u8, position: usize },
    #[error("invalid UTF-8 in string field at offset {position}")]
    Utf8 {
        position: usize,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("compressed timestamp message at offset {position} is not supported")]
    CompressedTimestamp { position: usize },
    #[error("data message at offset {position} references local type {local} with no definition")]
    DataBeforeDefinition { local: u8, position: usize },
    #[error("field {field} of message {message} has zero scale")]
    ZeroScale { message: String, field: String },
    #[error("field {field} of message {message} has a non-uniform scale vector")]
    NonUniformScale { message: String, field: String },
    #[error("field {field} of message {message} has a non-uniform offset vector")]
    NonUniformOffset { message: String, field: String },
}

pub type Result<T> = std::result::Result<T, DecoderError>;

/// An opened FIT file: the raw bytes plus a validated header.
///
/// Opening validates the header only (signature, size, header CRC when
/// present), so a file with a corrupt trailer can still be walked with
/// [`FitFile::messages`]; [`FitFile::decode`] verifies the trailer first.
pub struct FitFile {
    bytes: Vec<u8>,
    header: FileHeader,
}

impl FitFile {
    /// Reads a FIT file into memory and validates its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Wraps an in-memory buffer, validating its header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let header = {
            let mut stream = ByteStream::new(&bytes);
            FileHeader::read(&mut stream)?
        };
        Ok(Self { bytes, header })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Validates the file's trailing CRC over everything before it.
    pub fn verify_checksum(&self) -> Result<()> {
        crc::validate(&self.bytes)
    }

    /// Lazily iterates the file's definition and data messages in file
    /// order.
    pub fn messages(&self) -> MessageReader<'_> {
        let mut stream = ByteStream::new(&self.bytes);
        stream
            .seek(self.header.header_size as usize)
            .expect("header parse consumed these bytes");
        MessageReader::new(stream, self.header)
    }

    /// Decodes every data message against a profile and groups the results
    /// by message name.
    pub fn decode(&self, profile: &Profile, options: DecodeOptions) -> Result<DecodedFitFile> {
        self.verify_checksum()?;
        let decoder = MessageDecoder::new(profile, options);
        let mut decoded = DecodedFitFile::new();
        for message in self.messages() {
            if let FitMessage::Data(data) = message? {
                decoded.push(decoder.decode(&data)?);
            }
        }
        Ok(decoded)
    }
}

/// Opens and fully decodes a FIT file with default options.
pub fn decode_fit<P: AsRef<Path>>(path: P, profile: &Profile) -> Result<DecodedFitFile> {
    FitFile::open(path)?.decode(profile, DecodeOptions::default())
}
