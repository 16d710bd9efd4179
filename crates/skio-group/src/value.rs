use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use skio_types::{AnyArray, ArrayValue, DType, Element, NdArray};

use crate::group::Group;

/// A value stored in a [`Group`].
///
/// Arrays and nested groups are handles: cloning a `Value` aliases them.
/// [`Value::deep_copy`] duplicates them instead.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Explicit absence of data. Never cast by a type declaration.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Array(ArrayValue),
    Group(Group),
}

impl Value {
    /// Short name of the variant, as shown in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Array(_) => "array",
            Self::Group(_) => "group",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value of an `Int` or `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(v) => Some(v),
            _ => None,
        }
    }

    /// A copy that shares no array buffer or group with `self`.
    pub fn deep_copy(&self) -> Value {
        match self {
            Self::Array(a) => Self::Array(a.deep_copy()),
            Self::List(items) => Self::List(items.iter().map(Value::deep_copy).collect()),
            Self::Map(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            Self::Group(g) => Self::Group(g.copy(true)),
            other => other.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl From<ArrayValue> for Value {
    fn from(v: ArrayValue) -> Self {
        Self::Array(v)
    }
}

impl From<AnyArray> for Value {
    fn from(v: AnyArray) -> Self {
        Self::Array(ArrayValue::new(v))
    }
}

impl<T: Element> From<NdArray<T>> for Value
where
    AnyArray: From<NdArray<T>>,
{
    fn from(v: NdArray<T>) -> Self {
        Self::Array(ArrayValue::new(v))
    }
}

impl From<Group> for Value {
    fn from(v: Group) -> Self {
        Self::Group(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "b\"{}\"", v.escape_ascii()),
            Self::DateTime(v) => f.write_str(&v.to_rfc3339()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Array(a) => write!(f, "{}", ArrayPreview(a)),
            Self::Group(g) => write!(f, "{g}"),
        }
    }
}

/// `array([[1.0, --], [3.0, 4.0]], dtype=float64)`: nested by shape,
/// masked entries as `--`.
struct ArrayPreview<'a>(&'a ArrayValue);

impl fmt::Display for ArrayPreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let array = self.0;
        let flags = array.invalid_flags();
        let items: Vec<String> = element_strings(array.data())
            .into_iter()
            .zip(flags)
            .map(|(s, masked)| if masked { "--".to_string() } else { s })
            .collect();
        let mut out = String::new();
        nest(&mut out, array.shape(), &items);
        write!(f, "array({out}, dtype={})", array.dtype())
    }
}

fn element_strings(data: &AnyArray) -> Vec<String> {
    match data.dtype() {
        DType::Bool => data
            .to_f64_vec()
            .into_iter()
            .map(|v| (v != 0.0).to_string())
            .collect(),
        DType::Float32 => data
            .as_typed::<f32>()
            .map(|a| a.as_slice().iter().map(|v| format!("{v:?}")).collect())
            .unwrap_or_default(),
        DType::Float64 => data
            .to_f64_vec()
            .into_iter()
            .map(|v| format!("{v:?}"))
            .collect(),
        _ => data
            .to_i128_vec()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect(),
    }
}

fn nest(out: &mut String, shape: &[usize], items: &[String]) {
    match shape.split_first() {
        None => out.push_str(items.first().map_or("", String::as_str)),
        Some((&n, rest)) => {
            let stride: usize = rest.iter().product();
            out.push('[');
            for i in 0..n {
                if i > 0 {
                    out.push_str(", ");
                }
                let start = i * stride;
                nest(out, rest, &items[start..start + stride]);
            }
            out.push(']');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_display_like_literals() {
        assert_eq!(Value::from(2).to_string(), "2");
        assert_eq!(Value::from(2.0).to_string(), "2.0");
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bytes(vec![b'a', 0xff]).to_string(), "b\"a\\xff\"");
    }

    #[test]
    fn containers_display_nested() {
        let list = Value::List(vec![1.into(), "x".into()]);
        assert_eq!(list.to_string(), "[1, \"x\"]");
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), Value::Bool(true));
        assert_eq!(Value::Map(map).to_string(), "{\"k\": true}");
    }

    #[test]
    fn array_display_follows_shape_and_mask() {
        let data = NdArray::new(vec![2, 2], vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let mask = NdArray::new(vec![2, 2], vec![false, true, false, false]).unwrap();
        let v = Value::Array(ArrayValue::masked(data, mask).unwrap());
        assert_eq!(v.to_string(), "array([[1.0, --], [3.0, 4.0]], dtype=float64)");
    }

    #[test]
    fn scalar_array_display() {
        let v = Value::from(NdArray::scalar(7i16));
        assert_eq!(v.to_string(), "array(7, dtype=int16)");
    }

    #[test]
    fn deep_copy_detaches_arrays() {
        let v = Value::List(vec![Value::from(NdArray::from_vec(vec![1u8, 2]))]);
        let shallow = v.clone();
        let deep = v.deep_copy();
        let id = |v: &Value| v.as_list().unwrap()[0].as_array().unwrap().data().buffer_id();
        assert_eq!(id(&v), id(&shallow));
        assert_ne!(id(&v), id(&deep));
        assert_eq!(v, deep);
    }

    #[test]
    fn option_converts_to_none() {
        assert_eq!(Value::from(None::<i64>), Value::None);
        assert_eq!(Value::from(Some(3i64)), Value::Int(3));
    }
}
