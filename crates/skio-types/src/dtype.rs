use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Element type of an array.
///
/// The set is closed: booleans, signed and unsigned integers from 8 to 64
/// bits, and single/double precision floats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl DType {
    /// All element types, smallest integers first.
    pub const ALL: [DType; 11] = [
        DType::Bool,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::Uint8,
        DType::Uint16,
        DType::Uint32,
        DType::Uint64,
        DType::Float32,
        DType::Float64,
    ];

    /// Returns `true` for `Float32` and `Float64`.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns `true` for signed and unsigned integer types (not `Bool`).
    pub fn is_integer(self) -> bool {
        self.int_range().is_some()
    }

    /// Returns `true` if the type can represent negative values.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Float32 | Self::Float64
        )
    }

    /// Inclusive `(min, max)` of an integer type, `None` otherwise.
    pub fn int_range(self) -> Option<(i128, i128)> {
        let range = match self {
            Self::Int8 => (i8::MIN as i128, i8::MAX as i128),
            Self::Int16 => (i16::MIN as i128, i16::MAX as i128),
            Self::Int32 => (i32::MIN as i128, i32::MAX as i128),
            Self::Int64 => (i64::MIN as i128, i64::MAX as i128),
            Self::Uint8 => (0, u8::MAX as i128),
            Self::Uint16 => (0, u16::MAX as i128),
            Self::Uint32 => (0, u32::MAX as i128),
            Self::Uint64 => (0, u64::MAX as i128),
            Self::Bool | Self::Float32 | Self::Float64 => return None,
        };
        Some(range)
    }

    /// Size of one element in bytes.
    pub fn item_size(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 => 8,
        }
    }

    /// Canonical lowercase name (`"int16"`, `"float64"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses numpy character codes (`"h"`, `"B"`, `"d"`), array-interface
/// short codes (`"i2"`, `"<u1"`, `"f8"`) and full names (`"int16"`).
impl FromStr for DType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim_start_matches(['<', '>', '=', '|']);
        let dtype = match code {
            "?" | "b1" | "bool" => Self::Bool,
            "b" | "i1" | "int8" => Self::Int8,
            "h" | "i2" | "int16" => Self::Int16,
            "i" | "i4" | "int32" => Self::Int32,
            "l" | "q" | "i8" | "int64" => Self::Int64,
            "B" | "u1" | "uint8" => Self::Uint8,
            "H" | "u2" | "uint16" => Self::Uint16,
            "I" | "u4" | "uint32" => Self::Uint32,
            "L" | "Q" | "u8" | "uint64" => Self::Uint64,
            "f" | "f4" | "float32" => Self::Float32,
            "d" | "f8" | "float64" | "float" => Self::Float64,
            _ => return Err(TypeError::UnsupportedDType(s.to_string())),
        };
        Ok(dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_character_codes() {
        assert_eq!("h".parse::<DType>().unwrap(), DType::Int16);
        assert_eq!("H".parse::<DType>().unwrap(), DType::Uint16);
        assert_eq!("B".parse::<DType>().unwrap(), DType::Uint8);
        assert_eq!("d".parse::<DType>().unwrap(), DType::Float64);
    }

    #[test]
    fn parses_short_codes_with_byte_order() {
        assert_eq!("<i2".parse::<DType>().unwrap(), DType::Int16);
        assert_eq!("|u1".parse::<DType>().unwrap(), DType::Uint8);
        assert_eq!("f4".parse::<DType>().unwrap(), DType::Float32);
    }

    #[test]
    fn parses_names() {
        for dtype in DType::ALL {
            assert_eq!(dtype.name().parse::<DType>().unwrap(), dtype);
        }
    }

    #[test]
    fn rejects_unknown_code() {
        let err = "z9".parse::<DType>().unwrap_err();
        assert_eq!(err, TypeError::UnsupportedDType("z9".into()));
    }

    #[test]
    fn integer_ranges() {
        assert_eq!(DType::Int16.int_range(), Some((-32768, 32767)));
        assert_eq!(DType::Uint8.int_range(), Some((0, 255)));
        assert_eq!(DType::Uint64.int_range(), Some((0, u64::MAX as i128)));
        assert_eq!(DType::Float64.int_range(), None);
        assert!(!DType::Bool.is_integer());
    }

    #[test]
    fn signedness() {
        assert!(DType::Int8.is_signed());
        assert!(!DType::Uint32.is_signed());
        assert!(DType::Float32.is_signed());
        assert!(DType::Float32.is_float());
        assert!(!DType::Int64.is_float());
    }

    #[test]
    fn serde_uses_names() {
        let json = serde_json::to_string(&DType::Uint16).unwrap();
        assert_eq!(json, "\"uint16\"");
        let parsed: DType = serde_json::from_str("\"float32\"").unwrap();
        assert_eq!(parsed, DType::Float32);
    }
}
