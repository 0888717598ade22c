//! The FIT base-type registry
//!
//! The FIT SDK's `fit_base_type` enumeration assigns each primitive wire type
//! a one-byte identifier: the top bit flags endian sensitivity (set exactly
//! when the type is wider than one byte), bits 5-6 are reserved, and the low
//! five bits carry the type number 0..=16.  Every type reserves one bit
//! pattern as its "invalid" sentinel, meaning the device logged no data for
//! the field.

use std::str::FromStr;

use strum::EnumString;

const ENDIAN_ABILITY: u8 = 0x80;
const NUMBER_MASK: u8 = 0x1F;

/// One of the seventeen FIT primitive types.
///
/// Names match the FIT SDK's Profile spelling, so [`BaseType::from_name`]
/// accepts strings such as `"uint16z"` or `"float32"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, EnumString, strum::Display, Debug)]
#[strum(serialize_all = "snake_case")]
pub enum BaseType {
    Enum,
    Sint8,
    Uint8,
    Sint16,
    Uint16,
    Sint32,
    Uint32,
    String,
    Float32,
    Float64,
    Uint8z,
    Uint16z,
    Uint32z,
    Byte,
    Sint64,
    Uint64,
    Uint64z,
}

impl BaseType {
    /// Looks up a base type by its wire identifier.
    ///
    /// Only the low five bits participate in the lookup; the endian-ability
    /// flag is informational.
    pub fn from_id(id: u8) -> Option<BaseType> {
        use BaseType::*;
        Some(match id & NUMBER_MASK {
            0 => Enum,
            1 => Sint8,
            2 => Uint8,
            3 => Sint16,
            4 => Uint16,
            5 => Sint32,
            6 => Uint32,
            7 => String,
            8 => Float32,
            9 => Float64,
            10 => Uint8z,
            11 => Uint16z,
            12 => Uint32z,
            13 => Byte,
            14 => Sint64,
            15 => Uint64,
            16 => Uint64z,
            _ => return None,
        })
    }

    /// Looks up a base type by its Profile name, e.g. `"uint32z"`.
    pub fn from_name(name: &str) -> Option<BaseType> {
        BaseType::from_str(name).ok()
    }

    /// The low-five-bit type number.
    pub fn number(self) -> u8 {
        use BaseType::*;
        match self {
            Enum => 0,
            Sint8 => 1,
            Uint8 => 2,
            Sint16 => 3,
            Uint16 => 4,
            Sint32 => 5,
            Uint32 => 6,
            String => 7,
            Float32 => 8,
            Float64 => 9,
            Uint8z => 10,
            Uint16z => 11,
            Uint32z => 12,
            Byte => 13,
            Sint64 => 14,
            Uint64 => 15,
            Uint64z => 16,
        }
    }

    /// The canonical wire identifier, endian-ability flag included.
    pub fn id(self) -> u8 {
        if self.endian_ability() {
            self.number() | ENDIAN_ABILITY
        } else {
            self.number()
        }
    }

    /// Size in bytes of a single element.
    pub fn size(self) -> usize {
        use BaseType::*;
        match self {
            Enum | Sint8 | Uint8 | String | Uint8z | Byte => 1,
            Sint16 | Uint16 | Uint16z => 2,
            Sint32 | Uint32 | Uint32z | Float32 => 4,
            Float64 | Sint64 | Uint64 | Uint64z => 8,
        }
    }

    /// Whether multi-byte encoding makes the type sensitive to endianness.
    pub fn endian_ability(self) -> bool {
        self.size() > 1
    }

    pub fn is_signed(self) -> bool {
        use BaseType::*;
        matches!(self, Sint8 | Sint16 | Sint32 | Sint64)
    }

    /// Whether values of the type participate in numeric processing
    /// (scale/offset, invalid sentinels as numbers).  Strings do not.
    pub fn is_numeric(self) -> bool {
        !matches!(self, BaseType::String)
    }

    /// The bit pattern reserved as the "no data" sentinel, widened to 64
    /// bits.
    ///
    /// All-ones for unsigned integers, enums, bytes, and floats;
    /// max-positive for signed integers; zero for the `z` variants and
    /// strings.
    pub fn invalid(self) -> u64 {
        use BaseType::*;
        match self {
            Enum | Uint8 | Byte => 0xFF,
            Sint8 => 0x7F,
            Sint16 => 0x7FFF,
            Uint16 => 0xFFFF,
            Sint32 => 0x7FFF_FFFF,
            Uint32 | Float32 => 0xFFFF_FFFF,
            String | Uint8z | Uint16z | Uint32z | Uint64z => 0x00,
            Float64 | Uint64 => 0xFFFF_FFFF_FFFF_FFFF,
            Sint64 => 0x7FFF_FFFF_FFFF_FFFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BaseType;

    #[test]
    fn wire_id_round_trip() {
        // Every type survives a trip through its canonical identifier.
        for number in 0u8..=16 {
            let bt = BaseType::from_id(number).unwrap();
            assert_eq!(bt.number(), number);
            assert_eq!(BaseType::from_id(bt.id()), Some(bt));
        }
        assert_eq!(BaseType::from_id(17), None);
        assert_eq!(BaseType::from_id(0x1F), None);
    }

    #[test]
    fn known_wire_ids() {
        // Identifiers as they appear in definition messages.
        assert_eq!(BaseType::from_id(0x00), Some(BaseType::Enum));
        assert_eq!(BaseType::from_id(0x07), Some(BaseType::String));
        assert_eq!(BaseType::from_id(0x84), Some(BaseType::Uint16));
        assert_eq!(BaseType::from_id(0x86), Some(BaseType::Uint32));
        assert_eq!(BaseType::from_id(0x8C), Some(BaseType::Uint32z));
        assert_eq!(BaseType::from_id(0x90), Some(BaseType::Uint64z));
        assert_eq!(BaseType::Uint32z.id(), 0x8C);
        assert_eq!(BaseType::Uint8.id(), 0x02);
    }

    #[test]
    fn sizes_and_endian_ability() {
        assert_eq!(BaseType::Enum.size(), 1);
        assert_eq!(BaseType::Uint16.size(), 2);
        assert_eq!(BaseType::Float32.size(), 4);
        assert_eq!(BaseType::Sint64.size(), 8);
        assert!(!BaseType::Uint8.endian_ability());
        assert!(BaseType::Uint16.endian_ability());
        assert!(BaseType::Sint16.is_signed());
        assert!(!BaseType::Uint16.is_signed());
        assert!(BaseType::Enum.is_numeric());
        assert!(!BaseType::String.is_numeric());
    }

    #[test]
    fn invalid_sentinels() {
        assert_eq!(BaseType::Enum.invalid(), 0xFF);
        assert_eq!(BaseType::Sint8.invalid(), 0x7F);
        assert_eq!(BaseType::Sint32.invalid(), 0x7FFF_FFFF);
        assert_eq!(BaseType::Uint32.invalid(), 0xFFFF_FFFF);
        assert_eq!(BaseType::Uint32z.invalid(), 0x00);
        assert_eq!(BaseType::Uint64.invalid(), u64::MAX);
    }

    #[test]
    fn name_lookup() {
        assert_eq!(BaseType::from_name("uint32z"), Some(BaseType::Uint32z));
        assert_eq!(BaseType::from_name("string"), Some(BaseType::String));
        assert_eq!(BaseType::from_name("float64"), Some(BaseType::Float64));
        assert_eq!(BaseType::from_name("int32"), None);
        assert_eq!(BaseType::Uint16z.to_string(), "uint16z");
    }
}
