//! Definition and data message records
//!
//! Message records follow the file header: a one-byte record header, then a
//! payload whose shape depends on the record kind.  Definition messages
//! describe the wire layout of the data messages that follow under the same
//! local message type; data messages are meaningless without the definition
//! currently bound to their slot.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::warn;

use crate::DecoderError;
use crate::basetype::BaseType;
use crate::stream::{ByteStream, Endianness};

const COMPRESSED_FLAG: u8 = 1 << 7;
const DEFINITION_FLAG: u8 = 1 << 6;
const DEV_FIELDS_FLAG: u8 = 1 << 5;
const LOCAL_TYPE_MASK: u8 = 0x0F;

/// The one-byte header that starts every message record.
///
/// ```text
/// Bit idx    7 6 5 4 3 2 1 0
/// Header   | x x x x x x x x |
///            | | | ╰-┴-┴-┴-┴- local message type (0..15)
///            | | ╰----------- 1 = definition carries developer fields
///            | ╰------------- 0 = data, 1 = definition
///            ╰--------------- 1 = compressed timestamp header
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RecordHeader(u8);

/// Classification of a record header byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RecordKind {
    Definition { dev_fields: bool },
    Data,
    /// Recognized but unsupported; decoding one is an error.
    CompressedTimestamp,
}

impl RecordHeader {
    pub fn new(byte: u8) -> Self {
        Self(byte)
    }

    pub fn byte(self) -> u8 {
        self.0
    }

    pub fn kind(self) -> RecordKind {
        if self.0 & COMPRESSED_FLAG != 0 {
            RecordKind::CompressedTimestamp
        } else if self.0 & DEFINITION_FLAG != 0 {
            RecordKind::Definition {
                dev_fields: self.0 & DEV_FIELDS_FLAG != 0,
            }
        } else {
            RecordKind::Data
        }
    }

    /// The local message type linking data messages to their definition.
    pub fn local_type(self) -> u8 {
        self.0 & LOCAL_TYPE_MASK
    }
}

/// One field of a definition message: which profile field it is, how many
/// bytes it occupies, and its primitive type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FieldDefinition {
    /// Field definition number, the key into the profile.
    pub field_id: u8,
    /// Total size of the field's data in bytes.
    pub size: u8,
    pub base_type: BaseType,
}

impl FieldDefinition {
    fn read(stream: &mut ByteStream<'_>, global_mesg_num: u16) -> Result<Self, DecoderError> {
        let field_id = stream.read_byte()?;
        let size = stream.read_byte()?;
        let type_byte = stream.read_byte()?;

        let base_type = match BaseType::from_id(type_byte) {
            Some(base) if size > 0 && size as usize % base.size() == 0 => base,
            Some(base) => {
                warn!(
                    global_mesg_num,
                    field_id,
                    size,
                    base_type = %base,
                    "Field size is not a multiple of its base type, reading as uint8"
                );
                BaseType::Uint8
            }
            None => {
                warn!(
                    global_mesg_num,
                    field_id, type_byte, "Unknown base type, reading as uint8"
                );
                BaseType::Uint8
            }
        };

        Ok(Self {
            field_id,
            size,
            base_type,
        })
    }

    /// Number of elements the field holds.  Strings are always a single
    /// value regardless of their declared width.
    pub fn num_elements(&self) -> usize {
        match self.base_type {
            BaseType::String => 1,
            base => self.size as usize / base.size(),
        }
    }
}

/// A developer field declared by a definition message.
///
/// Developer data is decoded opaquely; the bytes pass through untouched and
/// their semantic interpretation is left to the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeveloperFieldDefinition {
    pub field_number: u8,
    pub size: u8,
    pub developer_data_index: u8,
}

impl DeveloperFieldDefinition {
    fn read(stream: &mut ByteStream<'_>) -> Result<Self, DecoderError> {
        Ok(Self {
            field_number: stream.read_byte()?,
            size: stream.read_byte()?,
            developer_data_index: stream.read_byte()?,
        })
    }
}

/// A parsed definition message.
///
/// Bound to a local message type slot until a later definition replaces it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DefinitionMessage {
    pub local_type: u8,
    /// Byte order of every multi-byte value in the governed data messages.
    pub endianness: Endianness,
    pub global_mesg_num: u16,
    pub fields: Vec<FieldDefinition>,
    pub dev_fields: Vec<DeveloperFieldDefinition>,
}

impl DefinitionMessage {
    /// Reads a definition message starting at its record header byte.
    pub fn read(stream: &mut ByteStream<'_>) -> Result<Self, DecoderError> {
        let position = stream.position();
        let header = RecordHeader::new(stream.read_byte()?);
        let RecordKind::Definition { dev_fields: has_dev } = header.kind() else {
            return Err(DecoderError::RecordType {
                header: header.byte(),
                position,
            });
        };

        let reserved = stream.read_byte()?;
        if reserved != 0 {
            return Err(DecoderError::ReservedByte {
                reserved,
                position: stream.position() - 1,
            });
        }

        let arch_position = stream.position();
        let endianness = match stream.read_byte()? {
            0 => Endianness::Little,
            1 => Endianness::Big,
            architecture => {
                return Err(DecoderError::Architecture {
                    architecture,
                    position: arch_position,
                });
            }
        };

        let global_mesg_num = stream.read_u16(endianness)?;

        let num_fields = stream.read_byte()?;
        let mut fields = Vec::with_capacity(num_fields as usize);
        for _ in 0..num_fields {
            fields.push(FieldDefinition::read(stream, global_mesg_num)?);
        }

        let mut dev_fields = Vec::new();
        if has_dev {
            let num_dev_fields = stream.read_byte()?;
            for _ in 0..num_dev_fields {
                dev_fields.push(DeveloperFieldDefinition::read(stream)?);
            }
        }

        Ok(Self {
            local_type: header.local_type(),
            endianness,
            global_mesg_num,
            fields,
            dev_fields,
        })
    }

    /// Payload size in bytes of one governed data message, excluding its
    /// record header byte.
    pub fn data_size(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.size as usize)
            .chain(self.dev_fields.iter().map(|f| f.size as usize))
            .sum()
    }

    pub fn field(&self, field_id: u8) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }
}

/// Raw field contents of a data message, typed by host representation.
///
/// Arity is preserved for numeric types; a string field always collapses to
/// one value, and developer payloads stay opaque bytes.
#[derive(Clone, PartialEq, Debug)]
pub enum RawValue {
    Sint8(Vec<i8>),
    Uint8(Vec<u8>),
    Sint16(Vec<i16>),
    Uint16(Vec<u16>),
    Sint32(Vec<i32>),
    Uint32(Vec<u32>),
    Sint64(Vec<i64>),
    Uint64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(String),
    Bytes(Vec<u8>),
}

impl RawValue {
    /// Number of elements; strings and opaque byte blobs count as one.
    pub fn len(&self) -> usize {
        use RawValue::*;
        match self {
            Sint8(v) => v.len(),
            Uint8(v) => v.len(),
            Sint16(v) => v.len(),
            Uint16(v) => v.len(),
            Sint32(v) => v.len(),
            Uint32(v) => v.len(),
            Sint64(v) => v.len(),
            Uint64(v) => v.len(),
            Float32(v) => v.len(),
            Float64(v) => v.len(),
            String(_) | Bytes(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bit pattern of element `idx`, widened to 64 bits.
    ///
    /// Used for invalid-sentinel comparisons, which are defined on the wire
    /// encoding rather than the numeric value.  `None` for strings, blobs,
    /// and out-of-range indices.
    pub fn bits(&self, idx: usize) -> Option<u64> {
        use RawValue::*;
        match self {
            Sint8(v) => v.get(idx).map(|x| *x as u8 as u64),
            Uint8(v) => v.get(idx).map(|x| *x as u64),
            Sint16(v) => v.get(idx).map(|x| *x as u16 as u64),
            Uint16(v) => v.get(idx).map(|x| *x as u64),
            Sint32(v) => v.get(idx).map(|x| *x as u32 as u64),
            Uint32(v) => v.get(idx).map(|x| *x as u64),
            Sint64(v) => v.get(idx).map(|x| *x as u64),
            Uint64(v) => v.get(idx).copied(),
            Float32(v) => v.get(idx).map(|x| x.to_bits() as u64),
            Float64(v) => v.get(idx).map(|x| x.to_bits()),
            String(_) | Bytes(_) => None,
        }
    }

    /// The first element as a signed integer, used to evaluate sub-field
    /// reference conditions against other fields of the same message.
    pub fn reference(&self) -> Option<i64> {
        use RawValue::*;
        match self {
            Sint8(v) => v.first().map(|x| *x as i64),
            Uint8(v) => v.first().map(|x| *x as i64),
            Sint16(v) => v.first().map(|x| *x as i64),
            Uint16(v) => v.first().map(|x| *x as i64),
            Sint32(v) => v.first().map(|x| *x as i64),
            Uint32(v) => v.first().map(|x| *x as i64),
            Sint64(v) => v.first().copied(),
            Uint64(v) => v.first().and_then(|x| i64::try_from(*x).ok()),
            Float32(_) | Float64(_) | String(_) | Bytes(_) => None,
        }
    }
}

fn read_values(
    stream: &mut ByteStream<'_>,
    def: &FieldDefinition,
    endianness: Endianness,
) -> Result<RawValue, DecoderError> {
    let position = stream.position();
    let bytes = stream.read_bytes(def.size as usize)?;
    let n = def.size as usize / def.base_type.size();

    macro_rules! read_wide {
        ($variant:ident, $ty:ty, $zero:expr, $into:ident) => {{
            let mut buf: Vec<$ty> = vec![$zero; n];
            match endianness {
                Endianness::Little => LittleEndian::$into(bytes, &mut buf),
                Endianness::Big => BigEndian::$into(bytes, &mut buf),
            }
            RawValue::$variant(buf)
        }};
    }

    use BaseType::*;
    Ok(match def.base_type {
        Enum | Uint8 | Uint8z | Byte => RawValue::Uint8(bytes.to_vec()),
        Sint8 => RawValue::Sint8(bytes.iter().map(|&b| b as i8).collect()),
        Sint16 => read_wide!(Sint16, i16, 0, read_i16_into),
        Uint16 | Uint16z => read_wide!(Uint16, u16, 0, read_u16_into),
        Sint32 => read_wide!(Sint32, i32, 0, read_i32_into),
        Uint32 | Uint32z => read_wide!(Uint32, u32, 0, read_u32_into),
        Sint64 => read_wide!(Sint64, i64, 0, read_i64_into),
        Uint64 | Uint64z => read_wide!(Uint64, u64, 0, read_u64_into),
        Float32 => read_wide!(Float32, f32, 0.0, read_f32_into),
        Float64 => read_wide!(Float64, f64, 0.0, read_f64_into),
        String => {
            let terminated = match bytes.iter().position(|&b| b == 0) {
                Some(idx) => &bytes[..idx],
                None => bytes,
            };
            let text = std::str::from_utf8(terminated)
                .map_err(|source| DecoderError::Utf8 { position, source })?;
            RawValue::String(text.to_owned())
        }
    })
}

/// A parsed data message, holding the raw values of each declared field in
/// declaration order.
#[derive(Clone, PartialEq, Debug)]
pub struct DataMessage {
    /// The definition governing this message's layout.
    pub definition: Arc<DefinitionMessage>,
    /// Raw values, one per field definition.
    pub fields: Vec<RawValue>,
    /// Opaque developer payloads, one per developer field definition.
    pub dev_fields: Vec<RawValue>,
}

impl DataMessage {
    /// Reads a data message starting at its record header byte.
    ///
    /// The message's endianness comes from the governing definition; the
    /// record header only identifies the slot.
    pub fn read(
        stream: &mut ByteStream<'_>,
        definition: Arc<DefinitionMessage>,
    ) -> Result<Self, DecoderError> {
        let position = stream.position();
        let header = RecordHeader::new(stream.read_byte()?);
        if header.kind() != RecordKind::Data {
            return Err(DecoderError::RecordType {
                header: header.byte(),
                position,
            });
        }

        let mut fields = Vec::with_capacity(definition.fields.len());
        for def in &definition.fields {
            fields.push(read_values(stream, def, definition.endianness)?);
        }

        let mut dev_fields = Vec::with_capacity(definition.dev_fields.len());
        for dev in &definition.dev_fields {
            dev_fields.push(RawValue::Bytes(stream.read_bytes(dev.size as usize)?.to_vec()));
        }

        Ok(Self {
            definition,
            fields,
            dev_fields,
        })
    }

    pub fn global_mesg_num(&self) -> u16 {
        self.definition.global_mesg_num
    }

    pub fn local_type(&self) -> u8 {
        self.definition.local_type
    }

    /// The raw value of the field with the given definition number, if the
    /// message carries it.
    pub fn field(&self, field_id: u8) -> Option<&RawValue> {
        self.definition
            .fields
            .iter()
            .position(|f| f.field_id == field_id)
            .and_then(|idx| self.fields.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;

    use super::{DataMessage, DefinitionMessage, RawValue, RecordHeader, RecordKind};
    use crate::DecoderError;
    use crate::basetype::BaseType;
    use crate::stream::{ByteStream, Endianness};

    #[test]
    fn record_header_classification() {
        assert_eq!(RecordHeader::new(0x00).kind(), RecordKind::Data);
        assert_eq!(RecordHeader::new(0x0F).kind(), RecordKind::Data);
        assert_eq!(
            RecordHeader::new(0x40).kind(),
            RecordKind::Definition { dev_fields: false }
        );
        assert_eq!(
            RecordHeader::new(0x61).kind(),
            RecordKind::Definition { dev_fields: true }
        );
        assert_eq!(
            RecordHeader::new(0x80).kind(),
            RecordKind::CompressedTimestamp
        );
        assert_eq!(RecordHeader::new(0x4A).local_type(), 10);
    }

    #[test]
    fn parse_definition() -> Result<()> {
        // Local type 0, little endian, global 0, one field (3, 4, uint32z).
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x03, 0x04, 0x8C];
        let mut stream = ByteStream::new(&bytes);
        let def = DefinitionMessage::read(&mut stream)?;
        assert_eq!(def.local_type, 0);
        assert_eq!(def.endianness, Endianness::Little);
        assert_eq!(def.global_mesg_num, 0);
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.fields[0].field_id, 3);
        assert_eq!(def.fields[0].size, 4);
        assert_eq!(def.fields[0].base_type, BaseType::Uint32z);
        assert_eq!(def.data_size(), 4);
        assert_eq!(stream.position(), bytes.len());
        Ok(())
    }

    #[test]
    fn parse_big_endian_definition() -> Result<()> {
        // Architecture byte 1: the global message number reads big endian.
        let bytes = [0x41, 0x00, 0x01, 0x00, 0x14, 0x01, 0x00, 0x02, 0x84];
        let mut stream = ByteStream::new(&bytes);
        let def = DefinitionMessage::read(&mut stream)?;
        assert_eq!(def.endianness, Endianness::Big);
        assert_eq!(def.global_mesg_num, 20);
        assert_eq!(def.local_type, 1);
        Ok(())
    }

    #[test]
    fn parse_definition_with_dev_fields() -> Result<()> {
        let bytes = [
            0x60, 0x00, 0x00, 0x14, 0x00, 0x01, 0x00, 0x01, 0x02, // one normal field
            0x01, 0x07, 0x02, 0x00, // one dev field: number 7, 2 bytes, index 0
        ];
        let mut stream = ByteStream::new(&bytes);
        let def = DefinitionMessage::read(&mut stream)?;
        assert_eq!(def.dev_fields.len(), 1);
        assert_eq!(def.dev_fields[0].field_number, 7);
        assert_eq!(def.dev_fields[0].size, 2);
        assert_eq!(def.data_size(), 3);
        Ok(())
    }

    #[test]
    fn nonzero_reserved_byte_is_fatal() {
        let bytes = [0x40, 0x01, 0x00, 0x00, 0x00, 0x00];
        let mut stream = ByteStream::new(&bytes);
        assert!(matches!(
            DefinitionMessage::read(&mut stream),
            Err(DecoderError::ReservedByte { reserved: 1, .. })
        ));
    }

    #[test]
    fn invalid_architecture_is_fatal() {
        let bytes = [0x40, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut stream = ByteStream::new(&bytes);
        assert!(matches!(
            DefinitionMessage::read(&mut stream),
            Err(DecoderError::Architecture { architecture: 2, .. })
        ));
    }

    #[test]
    fn unknown_base_type_downgrades_to_uint8() -> Result<()> {
        // Base type 0x1F does not exist; the field reads as raw bytes.
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x03, 0x1F];
        let mut stream = ByteStream::new(&bytes);
        let def = DefinitionMessage::read(&mut stream)?;
        assert_eq!(def.fields[0].base_type, BaseType::Uint8);
        assert_eq!(def.fields[0].num_elements(), 3);
        Ok(())
    }

    #[test]
    fn misaligned_field_size_downgrades_to_uint8() -> Result<()> {
        // Three bytes cannot hold uint16 elements.
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x03, 0x84];
        let mut stream = ByteStream::new(&bytes);
        let def = DefinitionMessage::read(&mut stream)?;
        assert_eq!(def.fields[0].base_type, BaseType::Uint8);
        Ok(())
    }

    fn single_field_definition() -> Result<Arc<DefinitionMessage>> {
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x03, 0x04, 0x8C];
        let mut stream = ByteStream::new(&bytes);
        Ok(Arc::new(DefinitionMessage::read(&mut stream)?))
    }

    #[test]
    fn data_round_trip() -> Result<()> {
        let def = single_field_definition()?;
        let bytes = [0x00, 0x11, 0x22, 0x33, 0x44];
        let mut stream = ByteStream::new(&bytes);
        let msg = DataMessage::read(&mut stream, def)?;
        assert_eq!(msg.fields, vec![RawValue::Uint32(vec![0x44332211])]);
        assert_eq!(msg.global_mesg_num(), 0);
        Ok(())
    }

    #[test]
    fn big_endian_data() -> Result<()> {
        let bytes = [0x41, 0x00, 0x01, 0x00, 0x00, 0x01, 0x03, 0x04, 0x86];
        let mut stream = ByteStream::new(&bytes);
        let def = Arc::new(DefinitionMessage::read(&mut stream)?);
        let data = [0x01, 0x11, 0x22, 0x33, 0x44];
        let mut stream = ByteStream::new(&data);
        let msg = DataMessage::read(&mut stream, def)?;
        assert_eq!(msg.fields, vec![RawValue::Uint32(vec![0x11223344])]);
        Ok(())
    }

    #[test]
    fn multi_element_field_preserves_order() -> Result<()> {
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x05, 0x06, 0x84];
        let mut stream = ByteStream::new(&bytes);
        let def = Arc::new(DefinitionMessage::read(&mut stream)?);
        let data = [0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00];
        let mut stream = ByteStream::new(&data);
        let msg = DataMessage::read(&mut stream, def)?;
        assert_eq!(msg.fields, vec![RawValue::Uint16(vec![1, 2, 3])]);
        Ok(())
    }

    #[test]
    fn string_field_truncates_at_nul() -> Result<()> {
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x08, 0x08, 0x07];
        let mut stream = ByteStream::new(&bytes);
        let def = Arc::new(DefinitionMessage::read(&mut stream)?);
        assert_eq!(def.fields[0].num_elements(), 1);

        let mut data = vec![0x00];
        data.extend_from_slice(b"abc\0zzzz");
        let mut stream = ByteStream::new(&data);
        let msg = DataMessage::read(&mut stream, def)?;
        assert_eq!(msg.fields, vec![RawValue::String("abc".to_owned())]);
        // The cursor consumed the full declared width.
        assert_eq!(stream.position(), 9);
        Ok(())
    }

    #[test]
    fn invalid_utf8_string_is_an_error() -> Result<()> {
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x07];
        let mut stream = ByteStream::new(&bytes);
        let def = Arc::new(DefinitionMessage::read(&mut stream)?);
        let data = [0x00, 0xFF, 0xFE, 0x61, 0x00];
        let mut stream = ByteStream::new(&data);
        assert!(matches!(
            DataMessage::read(&mut stream, def),
            Err(DecoderError::Utf8 { .. })
        ));
        Ok(())
    }

    #[test]
    fn dev_field_bytes_pass_through() -> Result<()> {
        let bytes = [
            0x60, 0x00, 0x00, 0x14, 0x00, 0x01, 0x00, 0x01, 0x02, 0x01, 0x07, 0x03, 0x00,
        ];
        let mut stream = ByteStream::new(&bytes);
        let def = Arc::new(DefinitionMessage::read(&mut stream)?);
        let data = [0x00, 0x2A, 0xDE, 0xAD, 0xBE];
        let mut stream = ByteStream::new(&data);
        let msg = DataMessage::read(&mut stream, def)?;
        assert_eq!(msg.fields, vec![RawValue::Uint8(vec![0x2A])]);
        assert_eq!(msg.dev_fields, vec![RawValue::Bytes(vec![0xDE, 0xAD, 0xBE])]);
        Ok(())
    }

    #[test]
    fn data_read_rejects_non_data_header() -> Result<()> {
        let def = single_field_definition()?;
        let data = [0x40, 0x11, 0x22, 0x33, 0x44];
        let mut stream = ByteStream::new(&data);
        assert!(matches!(
            DataMessage::read(&mut stream, def),
            Err(DecoderError::RecordType { header: 0x40, position: 0 })
        ));
        Ok(())
    }

    #[test]
    fn field_lookup_by_id() -> Result<()> {
        let def = single_field_definition()?;
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x00];
        let mut stream = ByteStream::new(&bytes);
        let msg = DataMessage::read(&mut stream, def)?;
        assert_eq!(msg.field(3), Some(&RawValue::Uint32(vec![0])));
        assert_eq!(msg.field(4), None);
        Ok(())
    }

    #[test]
    fn raw_value_bits_and_reference() {
        let v = RawValue::Sint8(vec![-1, 0x7F]);
        assert_eq!(v.bits(0), Some(0xFF));
        assert_eq!(v.bits(1), Some(0x7F));
        assert_eq!(v.bits(2), None);
        assert_eq!(v.reference(), Some(-1));

        let v = RawValue::Float32(vec![f32::from_bits(0xFFFF_FFFF)]);
        assert_eq!(v.bits(0), Some(0xFFFF_FFFF));
        assert_eq!(v.reference(), None);

        let v = RawValue::String("x".to_owned());
        assert_eq!(v.bits(0), None);
        assert_eq!(v.len(), 1);
    }
}
