use serde::{Deserialize, Serialize};
use skio_types::DType;

/// How invalid entries are identified when decoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidSpec {
    /// No filtering: every entry is valid.
    #[default]
    None,
    /// Entries equal to this value are invalid.
    Sentinel(#[serde(deserialize_with = "wide_int::deserialize")] i128),
    /// Entries outside the open interval `(low, high)` are invalid.
    Range(
        #[serde(deserialize_with = "wide_int::deserialize")] i128,
        #[serde(deserialize_with = "wide_int::deserialize")] i128,
    ),
}

/// Which integer replaces invalid entries when encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidValue {
    /// No replacement. The result stays masked if any entry is invalid.
    #[default]
    Disabled,
    /// The type minimum for signed types, the type maximum for unsigned ones.
    Auto,
    /// This exact value.
    Value(#[serde(deserialize_with = "wide_int::deserialize")] i128),
}

/// Upper bound on the scale factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFactor {
    /// The maximum value of the target integer type.
    TypeMax,
    Value(f64),
}

/// Options for [`decode_scaled`](crate::decode_scaled).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Floating point type of the result.
    pub dtype: DType,
    /// Which stored integers are invalid.
    pub invalid: InvalidSpec,
    /// Mark invalid entries in a mask instead of only writing `NaN`.
    pub masked: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            dtype: DType::Float64,
            invalid: InvalidSpec::None,
            masked: false,
        }
    }
}

/// Options for [`encode_scaled`](crate::encode_scaled).
///
/// The defaults scale over the full integer range, keep the sign of the
/// data, allow a real-valued factor and round to nearest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Replacement policy for invalid (`NaN`, infinite or masked) entries.
    pub invalid_value: InvalidValue,
    /// Smallest encoded value. Defaults to the type minimum, one above it
    /// when that is the sentinel.
    #[serde(deserialize_with = "wide_int::option")]
    pub range_min: Option<i128>,
    /// Largest encoded value. Defaults to the type maximum, one below it
    /// when that is the sentinel.
    #[serde(deserialize_with = "wide_int::option")]
    pub range_max: Option<i128>,
    /// Keep zero at zero so the sign survives the encoding. Ignored when
    /// the range or the type cannot hold both signs.
    pub keep_sign: bool,
    /// Restrict the factor to an integer.
    pub int_factor: bool,
    /// Return `1 / factor`; encoding then multiplies by the factor.
    pub invert_factor: bool,
    /// Cap on the factor.
    pub max_factor: Option<MaxFactor>,
    /// Use this factor instead of computing one. `0` means unset.
    pub force_factor: Option<f64>,
    /// Round to nearest (ties to even) instead of truncating.
    pub round: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            invalid_value: InvalidValue::Disabled,
            range_min: None,
            range_max: None,
            keep_sign: true,
            int_factor: false,
            invert_factor: false,
            max_factor: None,
            force_factor: None,
            round: true,
        }
    }
}

/// `i128` fields read from any integer, for formats (TOML) that only
/// hand out 64-bit values.
mod wide_int {
    use std::fmt;

    use serde::de::{self, Deserializer, Visitor};

    struct WideInt;

    impl<'de> Visitor<'de> for WideInt {
        type Value = i128;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i128, E> {
            Ok(v.into())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i128, E> {
            Ok(v.into())
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<i128, E> {
            Ok(v)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<i128, E> {
            i128::try_from(v).map_err(|_| E::custom(format!("{v} does not fit in i128")))
        }
    }

    struct OptionalWideInt;

    impl<'de> Visitor<'de> for OptionalWideInt {
        type Value = Option<i128>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or nothing")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            deserialize(d).map(Some)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i128, D::Error> {
        d.deserialize_any(WideInt)
    }

    pub fn option<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i128>, D::Error> {
        d.deserialize_option(OptionalWideInt)
    }
}
