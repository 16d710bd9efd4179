//! JSON file driver.
//!
//! A document is an object with a `"skio"` format marker, the group name,
//! its registered values and its nested groups:
//!
//! ```json
//! {"skio": 1, "group": "Measure", "values": {"gain": 2.5}, "children": {"infos": {...}}}
//! ```
//!
//! Plain JSON types map to themselves. Every other value is a single-key
//! object naming its kind: `$float` (non-finite floats), `$bytes` (hex),
//! `$datetime` (RFC 3339), `$map`, `$array`, `$packed` (scaled integers) and
//! `$group`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use skio_codec::{decode_scaled, encode_scaled, DecodeOptions, EncodeOptions, InvalidSpec, InvalidValue};
use skio_group::{Group, SchemaBuilder, Value};
use skio_types::{AnyArray, ArrayValue, DType, Element, NdArray, TypeResult};
use tracing::{debug, trace};

use crate::driver::FileDriver;
use crate::error::{FileError, FileResult};

const MARKER: &str = "skio";
const FORMAT_VERSION: u64 = 1;

/// Settings of [`JsonDriver`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonDriverConfig {
    /// Store floating point arrays as integers of this type, with a scale
    /// factor and an offset.
    pub pack: Option<DType>,
    /// Indent the output.
    pub pretty: bool,
}

/// Reads and writes groups as tagged JSON documents.
#[derive(Clone, Debug, Default)]
pub struct JsonDriver {
    config: JsonDriverConfig,
}

impl JsonDriver {
    pub fn new(config: JsonDriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JsonDriverConfig {
        &self.config
    }

    /// The document body of `group`: name, registered values and nested
    /// groups.
    pub fn encode_group(&self, group: &Group) -> FileResult<Map<String, Json>> {
        let mut values = Map::new();
        for (key, value) in group.items_raw(false) {
            values.insert(key, self.encode_value(&value)?);
        }
        let mut children = Map::new();
        for name in group.child_names() {
            if let Some(child) = group.child(&name) {
                children.insert(name, Json::Object(self.encode_group(&child)?));
            }
        }

        let mut body = Map::new();
        body.insert("group".into(), Json::from(group.name()));
        body.insert("values".into(), Json::Object(values));
        body.insert("children".into(), Json::Object(children));
        Ok(body)
    }

    pub fn encode_value(&self, value: &Value) -> FileResult<Json> {
        let json = match value {
            Value::None => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int(v) => Json::from(*v),
            Value::Float(v) if v.is_finite() => Json::from(*v),
            Value::Float(v) => tagged("$float", float_element(*v)),
            Value::Str(v) => Json::from(v.as_str()),
            Value::Bytes(v) => tagged("$bytes", Json::from(hex::encode(v))),
            Value::DateTime(v) => tagged("$datetime", Json::from(v.to_rfc3339())),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.encode_value(item))
                    .collect::<FileResult<_>>()?,
            ),
            Value::Map(map) => {
                let mut out = Map::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.encode_value(item)?);
                }
                tagged("$map", Json::Object(out))
            }
            Value::Array(array) => self.encode_array(array)?,
            Value::Group(group) => tagged("$group", Json::Object(self.encode_group(group)?)),
        };
        Ok(json)
    }

    fn encode_array(&self, array: &ArrayValue) -> FileResult<Json> {
        if let Some(int_type) = self.config.pack {
            if array.dtype().is_float() {
                return self.pack_array(array, int_type);
            }
        }

        let mut body = Map::new();
        body.insert("dtype".into(), Json::from(array.dtype().name()));
        body.insert("shape".into(), shape_json(array.shape()));
        body.insert("data".into(), Json::Array(encode_elements(array.data())));
        if let Some(mask) = array.mask() {
            let flags = mask.as_slice().iter().map(|&m| Json::Bool(m)).collect();
            body.insert("mask".into(), Json::Array(flags));
        }
        Ok(tagged("$array", Json::Object(body)))
    }

    /// Integers with the minimum of the valid data shifted to zero; invalid
    /// and masked entries hold the fill value.
    fn pack_array(&self, array: &ArrayValue, int_type: DType) -> FileResult<Json> {
        let opts = EncodeOptions {
            invalid_value: InvalidValue::Auto,
            keep_sign: false,
            ..Default::default()
        };
        let encoded = encode_scaled(array, int_type, &opts)?;
        let (int_min, int_max) = int_type
            .int_range()
            .ok_or_else(|| malformed(format!("cannot pack into {int_type}")))?;
        let fill = if int_type.is_signed() { int_min } else { int_max };

        let offset = array
            .data()
            .to_f64_vec()
            .into_iter()
            .zip(array.invalid_flags())
            .filter(|(v, bad)| !bad && v.is_finite())
            .map(|(v, _)| v)
            .reduce(f64::min)
            .unwrap_or(0.0);

        trace!(dtype = %int_type, factor = encoded.factor, offset, "packing array");
        let mut body = Map::new();
        body.insert("dtype".into(), Json::from(int_type.name()));
        body.insert("float_dtype".into(), Json::from(array.dtype().name()));
        body.insert("shape".into(), shape_json(array.shape()));
        body.insert(
            "data".into(),
            Json::Array(encode_elements(encoded.data.data())),
        );
        body.insert("scale_factor".into(), Json::from(encoded.factor));
        body.insert("add_offset".into(), Json::from(offset));
        body.insert("fill_value".into(), int_element(fill));
        body.insert("masked".into(), Json::Bool(array.is_masked()));
        Ok(tagged("$packed", Json::Object(body)))
    }
}

impl FileDriver for JsonDriver {
    fn name(&self) -> &str {
        "json"
    }

    fn load(&self, path: &Path, group: &Group) -> FileResult<()> {
        let bytes = fs::read(path)?;
        let doc: Json = serde_json::from_slice(&bytes)
            .map_err(|e| FileError::FormatMismatch(format!("not a JSON document: {e}")))?;
        let body = doc
            .as_object()
            .filter(|obj| obj.contains_key(MARKER))
            .ok_or_else(|| FileError::FormatMismatch("no skio marker".into()))?;
        match body.get(MARKER).and_then(Json::as_u64) {
            Some(FORMAT_VERSION) => {}
            other => {
                return Err(malformed(format!(
                    "unsupported format version {other:?}"
                )))
            }
        }

        apply_group(group, body)?;
        debug!(path = %path.display(), group = %group.name(), "json document loaded");
        Ok(())
    }

    fn save(&self, path: &Path, group: &Group) -> FileResult<()> {
        let mut body = Map::new();
        body.insert(MARKER.into(), Json::from(FORMAT_VERSION));
        body.extend(self.encode_group(group)?);
        let doc = Json::Object(body);
        let text = if self.config.pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        }
        .map_err(malformed)?;
        fs::write(path, text)?;
        debug!(path = %path.display(), group = %group.name(), "json document saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Write the values and nested groups of a document body into `group`.
///
/// The write policy is lifted except `no_new_key`; keys the group refuses
/// and nested groups it does not declare are skipped.
fn apply_group(group: &Group, body: &Map<String, Json>) -> FileResult<()> {
    let _guard = group.write_enabled(true);

    if let Some(values) = body.get("values") {
        let values = values
            .as_object()
            .ok_or_else(|| malformed("'values' must be an object"))?;
        let entries = values
            .iter()
            .map(|(key, json)| decode_value(json).map(|v| (key.clone(), v)))
            .collect::<FileResult<Vec<_>>>()?;
        group.update(entries, false)?;
    }

    if let Some(children) = body.get("children").and_then(Json::as_object) {
        for (name, child_body) in children {
            match (group.child(name), child_body.as_object()) {
                (Some(child), Some(child_body)) => apply_group(&child, child_body)?,
                _ => trace!(group = %group.name(), child = %name, "skipping nested group"),
            }
        }
    }
    Ok(())
}

pub fn decode_value(json: &Json) -> FileResult<Value> {
    let value = match json {
        Json::Null => Value::None,
        Json::Bool(v) => Value::Bool(*v),
        Json::Number(n) => match n.as_i64() {
            Some(v) => Value::Int(v),
            None => Value::Float(float_from_json(json)?),
        },
        Json::String(v) => Value::Str(v.clone()),
        Json::Array(items) => Value::List(items.iter().map(decode_value).collect::<FileResult<_>>()?),
        Json::Object(obj) => decode_tagged(obj)?,
    };
    Ok(value)
}

fn decode_tagged(obj: &Map<String, Json>) -> FileResult<Value> {
    let (tag, body) = match obj.iter().next() {
        Some(entry) if obj.len() == 1 => entry,
        _ => return Err(malformed("objects must carry exactly one type tag")),
    };

    let value = match tag.as_str() {
        "$float" => Value::Float(float_from_json(body)?),
        "$bytes" => {
            let text = body.as_str().ok_or_else(|| malformed("$bytes must be a string"))?;
            Value::Bytes(hex::decode(text).map_err(malformed)?)
        }
        "$datetime" => {
            let text = body
                .as_str()
                .ok_or_else(|| malformed("$datetime must be a string"))?;
            let dt = DateTime::parse_from_rfc3339(text).map_err(malformed)?;
            Value::DateTime(dt.with_timezone(&Utc))
        }
        "$map" => {
            let map = object(body, tag)?
                .iter()
                .map(|(k, v)| decode_value(v).map(|v| (k.clone(), v)))
                .collect::<FileResult<BTreeMap<_, _>>>()?;
            Value::Map(map)
        }
        "$array" => Value::Array(decode_array(object(body, tag)?)?),
        "$packed" => Value::Array(unpack_array(object(body, tag)?)?),
        "$group" => {
            let body = object(body, tag)?;
            let name = body.get("group").and_then(Json::as_str).unwrap_or("group");
            let group = Group::new(SchemaBuilder::new(name).build());
            apply_group(&group, body)?;
            Value::Group(group)
        }
        other => return Err(malformed(format!("unknown type tag {other:?}"))),
    };
    Ok(value)
}

fn decode_array(body: &Map<String, Json>) -> FileResult<ArrayValue> {
    let dtype = dtype_field(body, "dtype")?;
    let shape = shape_field(body)?;
    let data = decode_elements(dtype, shape.clone(), field(body, "data")?)?;
    match body.get("mask") {
        None => Ok(ArrayValue::new(data)),
        Some(mask) => {
            let flags = decode_elements(DType::Bool, shape, mask)?
                .as_typed::<bool>()
                .cloned()
                .ok_or_else(|| malformed("mask must hold booleans"))?;
            ArrayValue::masked(data, flags).map_err(malformed)
        }
    }
}

fn unpack_array(body: &Map<String, Json>) -> FileResult<ArrayValue> {
    let int_type = dtype_field(body, "dtype")?;
    let float_type = dtype_field(body, "float_dtype")?;
    let shape = shape_field(body)?;
    let data = decode_elements(int_type, shape.clone(), field(body, "data")?)?;
    let factor = float_from_json(field(body, "scale_factor")?)?;
    let offset = float_from_json(field(body, "add_offset")?)?;
    let fill = int_from_json(field(body, "fill_value")?)?;
    let masked = body.get("masked").and_then(Json::as_bool).unwrap_or(false);

    let opts = DecodeOptions {
        dtype: DType::Float64,
        invalid: InvalidSpec::Sentinel(fill),
        masked: false,
    };
    let decoded = decode_scaled(&data, factor, &opts)?;
    let values: Vec<f64> = decoded
        .data()
        .to_f64_vec()
        .into_iter()
        .map(|v| v + offset)
        .collect();
    let invalid: Vec<bool> = values.iter().map(|v| v.is_nan()).collect();

    let data = AnyArray::from_f64_vec(float_type, shape.clone(), values).map_err(malformed)?;
    if masked {
        let mask = NdArray::new(shape, invalid).map_err(malformed)?;
        ArrayValue::masked(data, mask).map_err(malformed)
    } else {
        Ok(ArrayValue::new(data))
    }
}

fn decode_elements(dtype: DType, shape: Vec<usize>, json: &Json) -> FileResult<AnyArray> {
    let items = json
        .as_array()
        .ok_or_else(|| malformed("array data must be a list"))?;
    let array = match dtype {
        DType::Bool => {
            let flags = items
                .iter()
                .map(|j| j.as_bool().ok_or_else(|| malformed("expected a boolean")))
                .collect::<FileResult<Vec<bool>>>()?;
            NdArray::new(shape, flags).map(AnyArray::from)
        }
        dtype if dtype.is_float() => {
            let values = items
                .iter()
                .map(float_from_json)
                .collect::<FileResult<Vec<f64>>>()?;
            AnyArray::from_f64_vec(dtype, shape, values)
        }
        dtype => {
            let values = items
                .iter()
                .map(int_from_json)
                .collect::<FileResult<Vec<i128>>>()?;
            ints_to_array(dtype, shape, &values)
        }
    };
    array.map_err(malformed)
}

fn ints_to_array(dtype: DType, shape: Vec<usize>, values: &[i128]) -> TypeResult<AnyArray> {
    match dtype {
        DType::Bool => typed::<bool>(shape, values),
        DType::Int8 => typed::<i8>(shape, values),
        DType::Int16 => typed::<i16>(shape, values),
        DType::Int32 => typed::<i32>(shape, values),
        DType::Int64 => typed::<i64>(shape, values),
        DType::Uint8 => typed::<u8>(shape, values),
        DType::Uint16 => typed::<u16>(shape, values),
        DType::Uint32 => typed::<u32>(shape, values),
        DType::Uint64 => typed::<u64>(shape, values),
        DType::Float32 => typed::<f32>(shape, values),
        DType::Float64 => typed::<f64>(shape, values),
    }
}

fn typed<T: Element>(shape: Vec<usize>, values: &[i128]) -> TypeResult<AnyArray>
where
    AnyArray: From<NdArray<T>>,
{
    let data = values.iter().map(|&v| T::from_i128(v)).collect();
    NdArray::new(shape, data).map(AnyArray::from)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn malformed(reason: impl fmt::Display) -> FileError {
    FileError::Serialization(reason.to_string())
}

fn tagged(tag: &str, body: Json) -> Json {
    let mut obj = Map::new();
    obj.insert(tag.to_string(), body);
    Json::Object(obj)
}

fn object<'a>(json: &'a Json, tag: &str) -> FileResult<&'a Map<String, Json>> {
    json.as_object()
        .ok_or_else(|| malformed(format!("{tag} must be an object")))
}

fn field<'a>(body: &'a Map<String, Json>, name: &str) -> FileResult<&'a Json> {
    body.get(name)
        .ok_or_else(|| malformed(format!("missing field '{name}'")))
}

fn dtype_field(body: &Map<String, Json>, name: &str) -> FileResult<DType> {
    field(body, name)?
        .as_str()
        .ok_or_else(|| malformed(format!("'{name}' must be a string")))?
        .parse::<DType>()
        .map_err(malformed)
}

fn shape_field(body: &Map<String, Json>) -> FileResult<Vec<usize>> {
    field(body, "shape")?
        .as_array()
        .ok_or_else(|| malformed("'shape' must be a list"))?
        .iter()
        .map(|n| {
            n.as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| malformed("'shape' must hold sizes"))
        })
        .collect()
}

fn shape_json(shape: &[usize]) -> Json {
    Json::Array(shape.iter().map(|&n| Json::from(n)).collect())
}

fn encode_elements(data: &AnyArray) -> Vec<Json> {
    match data.dtype() {
        DType::Bool => data
            .to_i128_vec()
            .into_iter()
            .map(|v| Json::Bool(v == Some(1)))
            .collect(),
        dtype if dtype.is_float() => data.to_f64_vec().into_iter().map(float_element).collect(),
        _ => data
            .to_i128_vec()
            .into_iter()
            .map(|v| int_element(v.unwrap_or_default()))
            .collect(),
    }
}

/// Numbers as is, non-finite values as `"nan"`, `"inf"` or `"-inf"`.
fn float_element(v: f64) -> Json {
    if v.is_nan() {
        Json::from("nan")
    } else if v == f64::INFINITY {
        Json::from("inf")
    } else if v == f64::NEG_INFINITY {
        Json::from("-inf")
    } else {
        Json::from(v)
    }
}

fn int_element(v: i128) -> Json {
    if let Ok(v) = i64::try_from(v) {
        Json::from(v)
    } else if let Ok(v) = u64::try_from(v) {
        Json::from(v)
    } else {
        Json::from(v.to_string())
    }
}

fn float_from_json(json: &Json) -> FileResult<f64> {
    match json {
        Json::Number(n) => n.as_f64().ok_or_else(|| malformed(format!("bad number {n}"))),
        Json::String(s) => match s.as_str() {
            "nan" => Ok(f64::NAN),
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            other => Err(malformed(format!("bad float {other:?}"))),
        },
        other => Err(malformed(format!("expected a float, got {other}"))),
    }
}

fn int_from_json(json: &Json) -> FileResult<i128> {
    json.as_i64()
        .map(i128::from)
        .or_else(|| json.as_u64().map(i128::from))
        .ok_or_else(|| malformed(format!("expected an integer, got {json}")))
}
