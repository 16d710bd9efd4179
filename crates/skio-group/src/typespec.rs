//! Declared value types and the casts applied on `set`.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, NaiveDateTime, Utc};
use skio_types::{AnyArray, ArrayValue, DType, NdArray, TypeError};

use crate::error::{GroupError, GroupResult};
use crate::value::Value;

/// Scalar kinds a key can be declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    DateTime,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::DateTime => "datetime",
        }
    }
}

/// Whether assigning an array stores the caller's buffer or a copy of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CopyPolicy {
    #[default]
    Reference,
    Copy,
}

/// Constraints for array-typed keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArraySpec {
    /// Element type the array is converted to, if set.
    pub dtype: Option<DType>,
    /// Exact number of dimensions required, if set.
    pub ndim: Option<usize>,
    pub copy: CopyPolicy,
    /// Keep the validity mask of incoming arrays. When `false` the mask is
    /// dropped and only the data is stored.
    pub masked: bool,
}

/// A user-supplied cast.
pub type CastFn = Rc<dyn Fn(Value) -> GroupResult<Value>>;

/// The declared type of a key.
#[derive(Clone)]
pub enum TypeSpec {
    Primitive {
        kind: PrimitiveKind,
        /// Cast options: `base` for `int`, `encoding` for `str`/`bytes`,
        /// `format` for `datetime`.
        options: BTreeMap<String, Value>,
    },
    Array(ArraySpec),
    Group,
    Custom { name: String, cast: CastFn },
}

impl TypeSpec {
    fn primitive(kind: PrimitiveKind) -> Self {
        Self::Primitive {
            kind,
            options: BTreeMap::new(),
        }
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Bool)
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int)
    }

    pub fn float() -> Self {
        Self::primitive(PrimitiveKind::Float)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::Str)
    }

    pub fn bytes() -> Self {
        Self::primitive(PrimitiveKind::Bytes)
    }

    pub fn datetime() -> Self {
        Self::primitive(PrimitiveKind::DateTime)
    }

    pub fn array(spec: ArraySpec) -> Self {
        Self::Array(spec)
    }

    pub fn custom(
        name: impl Into<String>,
        cast: impl Fn(Value) -> GroupResult<Value> + 'static,
    ) -> Self {
        Self::Custom {
            name: name.into(),
            cast: Rc::new(cast),
        }
    }

    /// Add a cast option to a primitive type. Ignored for other types.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Self::Primitive { options, .. } = &mut self {
            options.insert(key.into(), value.into());
        }
        self
    }

    /// Name shown by group listings (`int`, `array, dtype: float64, dim: 2`).
    pub fn type_name(&self) -> String {
        match self {
            Self::Primitive { kind, .. } => kind.name().to_string(),
            Self::Array(spec) => {
                let mut parts = vec!["array".to_string()];
                if let Some(dtype) = spec.dtype {
                    parts.push(format!("dtype: {dtype}"));
                }
                if let Some(ndim) = spec.ndim {
                    parts.push(format!("dim: {ndim}"));
                }
                parts.join(", ")
            }
            Self::Group => "group".to_string(),
            Self::Custom { name, .. } => name.clone(),
        }
    }

    /// Cast `value` to this type. `Value::None` passes through unchanged.
    pub fn cast(&self, value: Value) -> GroupResult<Value> {
        if value.is_none() {
            return Ok(value);
        }
        match self {
            Self::Primitive { kind, options } => cast_primitive(*kind, options, value),
            Self::Array(spec) => cast_array(spec, value).map(Value::Array),
            Self::Group => match value {
                Value::Group(_) => Ok(value),
                other => Err(cannot_cast(&other, "group")),
            },
            Self::Custom { cast, .. } => cast(value),
        }
    }
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { kind, options } => f
                .debug_struct("Primitive")
                .field("kind", kind)
                .field("options", options)
                .finish(),
            Self::Array(spec) => f.debug_tuple("Array").field(spec).finish(),
            Self::Group => f.write_str("Group"),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

fn cannot_cast(value: &Value, target: &str) -> GroupError {
    GroupError::InvalidArgument(format!(
        "cannot cast {} to {target}",
        value.type_name()
    ))
}

// ---------------------------------------------------------------------------
// Primitive casts
// ---------------------------------------------------------------------------

fn cast_primitive(
    kind: PrimitiveKind,
    options: &BTreeMap<String, Value>,
    value: Value,
) -> GroupResult<Value> {
    let allowed: &[&str] = match kind {
        PrimitiveKind::Int => &["base"],
        PrimitiveKind::Str | PrimitiveKind::Bytes => &["encoding"],
        PrimitiveKind::DateTime => &["format"],
        PrimitiveKind::Bool | PrimitiveKind::Float => &[],
    };
    if let Some(unknown) = options.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(GroupError::InvalidArgument(format!(
            "unknown option '{unknown}' for {}",
            kind.name()
        )));
    }

    match kind {
        PrimitiveKind::Bool => to_bool(value).map(Value::Bool),
        PrimitiveKind::Int => {
            let base = match options.get("base") {
                None => None,
                Some(Value::Int(b)) if (2..=36).contains(b) => Some(*b as u32),
                Some(other) => {
                    return Err(GroupError::InvalidArgument(format!(
                        "base must be an int between 2 and 36, not {other}"
                    )))
                }
            };
            to_int(value, base).map(Value::Int)
        }
        PrimitiveKind::Float => to_float(value).map(Value::Float),
        PrimitiveKind::Str => to_str(value, string_option(options, "encoding")?).map(Value::Str),
        PrimitiveKind::Bytes => to_bytes(value, string_option(options, "encoding")?).map(Value::Bytes),
        PrimitiveKind::DateTime => {
            to_datetime(value, string_option(options, "format")?).map(Value::DateTime)
        }
    }
}

fn string_option<'a>(
    options: &'a BTreeMap<String, Value>,
    name: &str,
) -> GroupResult<Option<&'a str>> {
    match options.get(name) {
        None => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(GroupError::InvalidArgument(format!(
            "option '{name}' must be a string, not {}",
            other.type_name()
        ))),
    }
}

fn to_bool(value: Value) -> GroupResult<bool> {
    Ok(match &value {
        Value::Bool(v) => *v,
        Value::Int(v) => *v != 0,
        Value::Float(v) => *v != 0.0,
        Value::Str(v) => !v.is_empty(),
        Value::Bytes(v) => !v.is_empty(),
        Value::List(v) => !v.is_empty(),
        Value::Map(v) => !v.is_empty(),
        Value::DateTime(_) => true,
        Value::None => false,
        Value::Array(_) | Value::Group(_) => return Err(cannot_cast(&value, "bool")),
    })
}

fn to_int(value: Value, base: Option<u32>) -> GroupResult<i64> {
    match (&value, base) {
        (Value::Str(s), base) => {
            let digits = s.trim().replace('_', "");
            i64::from_str_radix(&digits, base.unwrap_or(10)).map_err(|_| {
                GroupError::InvalidArgument(format!("invalid literal for int: {s:?}"))
            })
        }
        (_, Some(_)) => Err(GroupError::InvalidArgument(
            "can't convert non-string with explicit base".into(),
        )),
        (Value::Int(v), None) => Ok(*v),
        (Value::Bool(v), None) => Ok(*v as i64),
        (Value::Float(v), None) if v.is_finite() => Ok(v.trunc() as i64),
        (Value::Float(v), None) => Err(GroupError::InvalidArgument(format!(
            "cannot convert float {v} to int"
        ))),
        _ => Err(cannot_cast(&value, "int")),
    }
}

fn to_float(value: Value) -> GroupResult<f64> {
    match &value {
        Value::Float(v) => Ok(*v),
        Value::Int(v) => Ok(*v as f64),
        Value::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            GroupError::InvalidArgument(format!("could not convert string to float: {s:?}"))
        }),
        _ => Err(cannot_cast(&value, "float")),
    }
}

fn to_str(value: Value, encoding: Option<&str>) -> GroupResult<String> {
    match (value, encoding) {
        (Value::Bytes(b), encoding) => decode_text(&b, encoding.unwrap_or("utf-8")),
        (Value::Str(_), Some(_)) => Err(GroupError::InvalidArgument(
            "decoding str is not supported".into(),
        )),
        (Value::Str(s), None) => Ok(s),
        (Value::Int(v), None) => Ok(v.to_string()),
        (Value::Float(v), None) => Ok(format!("{v:?}")),
        (Value::Bool(v), None) => Ok(v.to_string()),
        (Value::DateTime(v), None) => Ok(v.to_rfc3339()),
        (other, _) => Err(cannot_cast(&other, "str")),
    }
}

fn to_bytes(value: Value, encoding: Option<&str>) -> GroupResult<Vec<u8>> {
    match (value, encoding) {
        (Value::Bytes(b), None) => Ok(b),
        (Value::Str(s), encoding) => encode_text(&s, encoding.unwrap_or("utf-8")),
        (Value::List(items), None) => items
            .iter()
            .map(|item| match item {
                Value::Int(v) => u8::try_from(*v).map_err(|_| {
                    GroupError::InvalidArgument("bytes must be in range(0, 256)".into())
                }),
                other => Err(cannot_cast(other, "bytes")),
            })
            .collect(),
        (other, Some(_)) => Err(GroupError::InvalidArgument(format!(
            "encoding without a string argument ({})",
            other.type_name()
        ))),
        (other, None) => Err(cannot_cast(&other, "bytes")),
    }
}

fn to_datetime(value: Value, format: Option<&str>) -> GroupResult<DateTime<Utc>> {
    match (&value, format) {
        (Value::Str(s), Some(format)) => NaiveDateTime::parse_from_str(s, format)
            .map(|naive| naive.and_utc())
            .map_err(|e| GroupError::InvalidArgument(format!("bad datetime {s:?}: {e}"))),
        (Value::Str(s), None) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| GroupError::InvalidArgument(format!("bad datetime {s:?}: {e}"))),
        (_, Some(_)) => Err(GroupError::InvalidArgument(
            "format requires a string argument".into(),
        )),
        (Value::DateTime(v), None) => Ok(*v),
        (Value::Int(secs), None) => DateTime::from_timestamp(*secs, 0)
            .ok_or_else(|| GroupError::InvalidArgument(format!("timestamp {secs} out of range"))),
        (Value::Float(secs), None) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos).ok_or_else(|| {
                GroupError::InvalidArgument(format!("timestamp {secs} out of range"))
            })
        }
        _ => Err(cannot_cast(&value, "datetime")),
    }
}

fn decode_text(bytes: &[u8], encoding: &str) -> GroupResult<String> {
    let bad = |e: &dyn fmt::Display| {
        GroupError::InvalidArgument(format!("cannot decode bytes as {encoding}: {e}"))
    };
    match normalize_encoding(encoding).as_str() {
        "utf8" => String::from_utf8(bytes.to_vec()).map_err(|e| bad(&e)),
        "ascii" if bytes.is_ascii() => Ok(bytes.iter().map(|&b| b as char).collect()),
        "ascii" => Err(bad(&"non-ascii byte")),
        "latin1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        "utf16" => match bytes {
            [0xff, 0xfe, rest @ ..] => utf16(rest, u16::from_le_bytes).map_err(|e| bad(&e)),
            [0xfe, 0xff, rest @ ..] => utf16(rest, u16::from_be_bytes).map_err(|e| bad(&e)),
            _ => utf16(bytes, u16::from_le_bytes).map_err(|e| bad(&e)),
        },
        "utf16le" => utf16(bytes, u16::from_le_bytes).map_err(|e| bad(&e)),
        "utf16be" => utf16(bytes, u16::from_be_bytes).map_err(|e| bad(&e)),
        _ => Err(GroupError::InvalidArgument(format!(
            "unknown encoding: {encoding}"
        ))),
    }
}

fn encode_text(text: &str, encoding: &str) -> GroupResult<Vec<u8>> {
    let units = || text.encode_utf16();
    match normalize_encoding(encoding).as_str() {
        "utf8" => Ok(text.as_bytes().to_vec()),
        "ascii" | "latin1" => {
            let limit = if encoding_is_ascii(encoding) { 0x7f } else { 0xff };
            text.chars()
                .map(|c| {
                    u8::try_from(c as u32)
                        .ok()
                        .filter(|&b| u32::from(b) <= limit)
                        .ok_or_else(|| {
                            GroupError::InvalidArgument(format!(
                                "{c:?} cannot be encoded as {encoding}"
                            ))
                        })
                })
                .collect()
        }
        "utf16" => Ok([0xff, 0xfe]
            .into_iter()
            .chain(units().flat_map(u16::to_le_bytes))
            .collect()),
        "utf16le" => Ok(units().flat_map(u16::to_le_bytes).collect()),
        "utf16be" => Ok(units().flat_map(u16::to_be_bytes).collect()),
        _ => Err(GroupError::InvalidArgument(format!(
            "unknown encoding: {encoding}"
        ))),
    }
}

fn normalize_encoding(encoding: &str) -> String {
    encoding
        .to_ascii_lowercase()
        .replace(['-', '_'], "")
}

fn encoding_is_ascii(encoding: &str) -> bool {
    normalize_encoding(encoding) == "ascii"
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err("truncated data".into());
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]])).collect();
    String::from_utf16(&units).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Array casts
// ---------------------------------------------------------------------------

fn cast_array(spec: &ArraySpec, value: Value) -> GroupResult<ArrayValue> {
    let array = match value {
        Value::Array(a) => a,
        Value::List(items) => ArrayValue::new(list_to_array(&items)?),
        Value::Int(v) => ArrayValue::new(NdArray::scalar(v)),
        Value::Float(v) => ArrayValue::new(NdArray::scalar(v)),
        Value::Bool(v) => ArrayValue::new(NdArray::scalar(v)),
        other => return Err(cannot_cast(&other, "array")),
    };

    let array = if spec.masked {
        array
    } else {
        array.without_mask()
    };

    let array = match spec.dtype {
        Some(dtype) if dtype != array.dtype() => {
            let (data, mask) = array.into_parts();
            let data = data.cast(dtype);
            match mask {
                Some(mask) => ArrayValue::masked(data, mask)?,
                None => ArrayValue::new(data),
            }
        }
        _ => array,
    };

    if let Some(ndim) = spec.ndim {
        if array.ndim() != ndim {
            return Err(GroupError::InvalidArgument(format!(
                "array of {ndim} dimensions needed, got {}",
                array.ndim()
            )));
        }
    }

    Ok(match spec.copy {
        CopyPolicy::Reference => array,
        CopyPolicy::Copy => array.deep_copy(),
    })
}

/// Build an array from nested lists of numbers. Integers give `int64`,
/// any float gives `float64`, booleans only give `bool`.
pub fn list_to_array(items: &[Value]) -> Result<AnyArray, TypeError> {
    let mut shape = Vec::new();
    let mut found = Vec::new();
    collect_leaves(items, 0, &mut shape, &mut found)?;
    if found.iter().any(|(depth, _)| depth + 1 != shape.len()) {
        return Err(TypeError::RaggedList);
    }
    let leaves: Vec<&Value> = found.into_iter().map(|(_, leaf)| leaf).collect();

    let all_bool = leaves.iter().all(|v| matches!(v, Value::Bool(_)));
    let any_float = leaves.iter().any(|v| matches!(v, Value::Float(_)));
    let numbers: Vec<f64> = leaves
        .iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(TypeError::NotNumeric(other.type_name().to_string())),
        })
        .collect::<Result<_, _>>()?;

    if all_bool && !leaves.is_empty() {
        let flags: Vec<bool> = numbers.iter().map(|&v| v != 0.0).collect();
        return Ok(NdArray::new(shape, flags)?.into());
    }
    if any_float || leaves.is_empty() {
        return Ok(NdArray::new(shape, numbers)?.into());
    }
    let ints: Vec<i64> = leaves
        .iter()
        .map(|v| match v {
            Value::Int(i) => *i,
            Value::Bool(b) => *b as i64,
            _ => 0,
        })
        .collect();
    Ok(NdArray::new(shape, ints)?.into())
}

fn collect_leaves<'a>(
    items: &'a [Value],
    depth: usize,
    shape: &mut Vec<usize>,
    leaves: &mut Vec<(usize, &'a Value)>,
) -> Result<(), TypeError> {
    match shape.get(depth) {
        Some(&expected) if expected != items.len() => return Err(TypeError::RaggedList),
        Some(_) => {}
        None => shape.push(items.len()),
    }
    let nested = items.iter().filter(|v| matches!(v, Value::List(_))).count();
    if nested != 0 && nested != items.len() {
        return Err(TypeError::RaggedList);
    }
    for item in items {
        match item {
            Value::List(inner) => collect_leaves(inner, depth + 1, shape, leaves)?,
            leaf => leaves.push((depth, leaf)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Primitive casts
    // -----------------------------------------------------------------------

    #[test]
    fn int_from_float_truncates() {
        assert_eq!(TypeSpec::int().cast(2.9.into()).unwrap(), Value::Int(2));
        assert_eq!(TypeSpec::int().cast((-2.9).into()).unwrap(), Value::Int(-2));
        assert!(TypeSpec::int().cast(f64::NAN.into()).is_err());
    }

    #[test]
    fn int_from_string_with_base() {
        let spec = TypeSpec::int().option("base", 16);
        assert_eq!(spec.cast("ff".into()).unwrap(), Value::Int(255));
        assert!(spec.cast(Value::Int(3)).is_err());
        assert_eq!(TypeSpec::int().cast(" 42 ".into()).unwrap(), Value::Int(42));
    }

    #[test]
    fn int_rejects_lists() {
        let err = TypeSpec::int().cast(Value::List(vec![])).unwrap_err();
        assert_eq!(err, GroupError::InvalidArgument("cannot cast list to int".into()));
    }

    #[test]
    fn none_is_never_cast() {
        assert_eq!(TypeSpec::int().cast(Value::None).unwrap(), Value::None);
        assert_eq!(
            TypeSpec::array(ArraySpec::default()).cast(Value::None).unwrap(),
            Value::None
        );
    }

    #[test]
    fn float_and_bool() {
        assert_eq!(TypeSpec::float().cast(2.into()).unwrap(), Value::Float(2.0));
        assert_eq!(TypeSpec::float().cast("1.5".into()).unwrap(), Value::Float(1.5));
        assert_eq!(TypeSpec::boolean().cast(0.into()).unwrap(), Value::Bool(false));
        assert_eq!(TypeSpec::boolean().cast("x".into()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn str_from_utf16_bytes() {
        let spec = TypeSpec::string().option("encoding", "utf-16");
        let raw = Value::Bytes(b"\xff\xfe1\x002\x003\x004\x00".to_vec());
        assert_eq!(spec.cast(raw).unwrap(), Value::from("1234"));
    }

    #[test]
    fn str_from_numbers() {
        assert_eq!(TypeSpec::string().cast(2.into()).unwrap(), Value::from("2"));
        assert_eq!(TypeSpec::string().cast(2.5.into()).unwrap(), Value::from("2.5"));
    }

    #[test]
    fn bytes_roundtrip_through_encoding() {
        let spec = TypeSpec::bytes().option("encoding", "utf-16be");
        assert_eq!(
            spec.cast("ab".into()).unwrap(),
            Value::Bytes(vec![0, b'a', 0, b'b'])
        );
        let back = TypeSpec::string().option("encoding", "UTF_16BE");
        assert_eq!(
            back.cast(Value::Bytes(vec![0, b'a', 0, b'b'])).unwrap(),
            Value::from("ab")
        );
    }

    #[test]
    fn unknown_option_is_rejected() {
        let spec = TypeSpec::float().option("precision", 3);
        assert!(matches!(
            spec.cast(1.0.into()),
            Err(GroupError::InvalidArgument(_))
        ));
    }

    #[test]
    fn datetime_casts() {
        let rfc = TypeSpec::datetime()
            .cast("2020-01-02T03:04:05Z".into())
            .unwrap();
        let ts = TypeSpec::datetime().cast(1_577_934_245.into()).unwrap();
        assert_eq!(rfc, ts);
        let fmt = TypeSpec::datetime()
            .option("format", "%Y/%m/%d %H:%M:%S")
            .cast("2020/01/02 03:04:05".into())
            .unwrap();
        assert_eq!(fmt, rfc);
    }

    // -----------------------------------------------------------------------
    // Array casts
    // -----------------------------------------------------------------------

    fn matrix_spec() -> TypeSpec {
        TypeSpec::array(ArraySpec {
            dtype: Some(DType::Float64),
            ndim: Some(2),
            ..Default::default()
        })
    }

    #[test]
    fn array_rank_must_match() {
        let err = matrix_spec()
            .cast(NdArray::from_vec(vec![1.0f64; 5]).into())
            .unwrap_err();
        assert!(err.to_string().contains("array of 2 dimensions needed"));
    }

    #[test]
    fn array_is_converted_to_declared_dtype() {
        let ones = NdArray::new(vec![2, 2], vec![1i16; 4]).unwrap();
        let out = matrix_spec().cast(ones.into()).unwrap();
        assert_eq!(out.as_array().unwrap().dtype(), DType::Float64);
    }

    #[test]
    fn reference_policy_keeps_buffer() {
        let data = NdArray::new(vec![1, 2], vec![1.0f64, 2.0]).unwrap();
        let id = data.buffer_id();
        let out = matrix_spec().cast(data.into()).unwrap();
        assert_eq!(out.as_array().unwrap().data().buffer_id(), id);
    }

    #[test]
    fn copy_policy_detaches_buffer() {
        let spec = TypeSpec::array(ArraySpec {
            copy: CopyPolicy::Copy,
            ..Default::default()
        });
        let data = NdArray::from_vec(vec![1u8, 2]);
        let id = data.buffer_id();
        let out = spec.cast(data.into()).unwrap();
        assert_ne!(out.as_array().unwrap().data().buffer_id(), id);
    }

    #[test]
    fn mask_kept_only_when_declared() {
        let data = NdArray::new(vec![2, 2], vec![1i64; 4]).unwrap();
        let mask = NdArray::new(vec![2, 2], vec![true, false, false, true]).unwrap();
        let masked = Value::Array(ArrayValue::masked(data, mask).unwrap());

        let plain = matrix_spec().cast(masked.clone()).unwrap();
        assert!(!plain.as_array().unwrap().is_masked());

        let keep = TypeSpec::array(ArraySpec {
            masked: true,
            copy: CopyPolicy::Copy,
            ..Default::default()
        });
        let kept = keep.cast(masked).unwrap();
        assert!(kept.as_array().unwrap().has_invalid());
    }

    #[test]
    fn nested_lists_build_arrays() {
        let rows = Value::List(vec![
            Value::List(vec![1.into(), 2.into()]),
            Value::List(vec![3.into(), 4.5.into()]),
        ]);
        let out = matrix_spec().cast(rows).unwrap();
        let array = out.as_array().unwrap();
        assert_eq!(array.shape(), &[2, 2]);
        assert_eq!(array.data().to_f64_vec(), vec![1.0, 2.0, 3.0, 4.5]);
    }

    #[test]
    fn integer_lists_stay_integer() {
        let out = list_to_array(&[1.into(), 2.into()]).unwrap();
        assert_eq!(out.dtype(), DType::Int64);
        let flags = list_to_array(&[true.into(), false.into()]).unwrap();
        assert_eq!(flags.dtype(), DType::Bool);
    }

    #[test]
    fn ragged_lists_are_rejected() {
        let rows = vec![
            Value::List(vec![1.into(), 2.into()]),
            Value::List(vec![3.into()]),
        ];
        assert_eq!(list_to_array(&rows).unwrap_err(), TypeError::RaggedList);
        let mixed = vec![Value::List(vec![1.into()]), 2.into()];
        assert_eq!(list_to_array(&mixed).unwrap_err(), TypeError::RaggedList);
    }

    #[test]
    fn non_numeric_leaves_are_rejected() {
        let err = list_to_array(&["a".into()]).unwrap_err();
        assert_eq!(err, TypeError::NotNumeric("str".into()));
    }

    #[test]
    fn type_names() {
        assert_eq!(TypeSpec::int().type_name(), "int");
        assert_eq!(matrix_spec().type_name(), "array, dtype: float64, dim: 2");
        assert_eq!(TypeSpec::Group.type_name(), "group");
        assert_eq!(TypeSpec::custom("unit", Ok).type_name(), "unit");
    }
}
