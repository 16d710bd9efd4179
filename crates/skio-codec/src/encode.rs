use skio_types::{AnyArray, ArrayValue, DType, Element, NdArray};
use tracing::debug;

use crate::config::{EncodeOptions, InvalidValue, MaxFactor};
use crate::error::{CodecError, CodecResult};

/// Result of [`encode_scaled`].
#[derive(Clone, Debug, PartialEq)]
pub struct Encoded {
    /// Integer array of the requested type. Masked only when invalid entries
    /// exist and no sentinel replaces them.
    pub data: ArrayValue,
    /// Decoding multiplies the integers by this factor, or divides by it
    /// when the factor was inverted.
    pub factor: f64,
}

/// Same as [`encode_scaled`] with the integer type given as a numpy
/// character code (`"h"`, `"B"`, ...) or a type name.
pub fn encode_scaled_code(
    data: &ArrayValue,
    int_code: &str,
    opts: &EncodeOptions,
) -> CodecResult<Encoded> {
    let int_type: DType = int_code.parse()?;
    encode_scaled(data, int_type, opts)
}

/// Encode floating-point data to integers of `int_type` with the best
/// scale factor for the requested range.
///
/// `NaN`, infinite and masked entries are invalid. They take the sentinel
/// chosen by `opts.invalid_value`, or stay masked when it is
/// [`InvalidValue::Disabled`]. Valid entries always land inside
/// `[range_min, range_max]`.
pub fn encode_scaled(
    data: &ArrayValue,
    int_type: DType,
    opts: &EncodeOptions,
) -> CodecResult<Encoded> {
    let (int_min, int_max) = int_type.int_range().ok_or_else(|| {
        CodecError::InvalidArgument(format!("{int_type} is not an integer type"))
    })?;

    let raw = data.data().to_f64_vec();
    let invalid: Vec<bool> = data
        .invalid_flags()
        .into_iter()
        .zip(&raw)
        .map(|(masked, v)| masked || !v.is_finite())
        .collect();
    let (min_x, max_x) = valid_extremes(&raw, &invalid);

    let mut keep_sign = opts.keep_sign;
    if int_min == 0 && min_x.is_some_and(|m| m < 0.0) {
        keep_sign = false;
    }

    let sentinel = match opts.invalid_value {
        InvalidValue::Disabled => None,
        InvalidValue::Auto if int_min == 0 => Some(int_max),
        InvalidValue::Auto => Some(int_min),
        InvalidValue::Value(v) if v < int_min || v > int_max => {
            return Err(CodecError::InvalidArgument(format!(
                "invalid value {v} does not fit in {int_type}"
            )));
        }
        InvalidValue::Value(v) => Some(v),
    };

    let mut range_min = match opts.range_min {
        None if sentinel == Some(int_min) => int_min + 1,
        None => int_min,
        Some(r) => r.clamp(int_min, int_max),
    };
    let range_max = match opts.range_max {
        None if sentinel == Some(int_max) => int_max - 1,
        None => int_max,
        Some(r) => r.clamp(int_min, int_max),
    };

    if !keep_sign && range_min < 0 {
        range_min = 0;
    } else if range_min >= 0 || range_max <= 0 {
        keep_sign = false;
    }
    if range_min > range_max {
        return Err(CodecError::InvalidArgument(format!(
            "empty range [{range_min}, {range_max}]"
        )));
    }

    let factor = scale_factor(
        opts,
        min_x,
        max_x,
        range_min,
        range_max,
        keep_sign,
        int_max,
    )?;

    debug!(
        dtype = %int_type,
        factor,
        keep_sign,
        range_min = %range_min,
        range_max = %range_max,
        sentinel = ?sentinel,
        "computed scale factor"
    );

    let mut scaled: Vec<f64> = raw
        .iter()
        .map(|&v| {
            if opts.invert_factor {
                v * factor
            } else {
                v / factor
            }
        })
        .collect();

    if range_min >= 0 || !keep_sign {
        let (low, _) = valid_extremes(&scaled, &invalid);
        if let Some(low) = low {
            let shift = range_min as f64 - low;
            for v in &mut scaled {
                *v += shift;
            }
        }
    }

    let ints: Vec<i128> = scaled
        .iter()
        .zip(&invalid)
        .map(|(&v, &bad)| {
            if bad {
                return 0;
            }
            let v = if opts.round { v.round_ties_even() } else { v.trunc() };
            (v as i128).clamp(range_min, range_max)
        })
        .collect();

    let fill = sentinel.unwrap_or(0);
    let shape = data.shape().to_vec();
    let encoded = build_ints(int_type, shape.clone(), &ints, &invalid, fill)?;

    let has_invalid = invalid.iter().any(|&b| b);
    let data = if sentinel.is_none() && has_invalid {
        ArrayValue::masked(encoded, NdArray::new(shape, invalid)?)?
    } else {
        ArrayValue::new(encoded)
    };

    Ok(Encoded { data, factor })
}

fn valid_extremes(values: &[f64], invalid: &[bool]) -> (Option<f64>, Option<f64>) {
    values
        .iter()
        .zip(invalid)
        .filter(|(_, bad)| !**bad)
        .fold((None, None), |(lo, hi), (&v, _)| {
            (
                Some(lo.map_or(v, |l: f64| l.min(v))),
                Some(hi.map_or(v, |h: f64| h.max(v))),
            )
        })
}

fn scale_factor(
    opts: &EncodeOptions,
    min_x: Option<f64>,
    max_x: Option<f64>,
    range_min: i128,
    range_max: i128,
    keep_sign: bool,
    int_max: i128,
) -> CodecResult<f64> {
    let mut factor = match opts.force_factor.filter(|&f| f != 0.0) {
        Some(f) if !f.is_finite() => {
            return Err(CodecError::InvalidArgument(format!(
                "forced factor {f} is not finite"
            )));
        }
        Some(f) => f,
        None => {
            let computed = match (min_x, max_x) {
                (Some(lo), Some(hi)) if keep_sign => {
                    let low_ratio = lo.abs() / (range_min as f64).abs();
                    let high_ratio = hi.abs() / (range_max as f64).abs();
                    if low_ratio > high_ratio {
                        low_ratio
                    } else {
                        high_ratio
                    }
                }
                (Some(lo), Some(hi)) => (hi - lo) / (range_max - range_min) as f64,
                _ => 1.0,
            };
            if computed.is_finite() && computed != 0.0 {
                computed
            } else {
                1.0
            }
        }
    };

    let step = if opts.invert_factor {
        factor = 1.0 / factor;
        -1.0
    } else {
        1.0
    };

    if opts.int_factor {
        let truncated = factor.trunc();
        factor = if truncated != factor {
            truncated + step
        } else {
            truncated
        };
    }

    let cap = match opts.max_factor {
        Some(MaxFactor::TypeMax) => Some(int_max as f64),
        Some(MaxFactor::Value(v)) if v == -1.0 => Some(int_max as f64),
        Some(MaxFactor::Value(v)) if v != 0.0 => Some(v),
        _ => None,
    };
    if let Some(cap) = cap {
        if factor > cap {
            factor = cap;
        }
    }

    Ok(factor.abs())
}

fn build_ints(
    int_type: DType,
    shape: Vec<usize>,
    ints: &[i128],
    invalid: &[bool],
    fill: i128,
) -> CodecResult<AnyArray> {
    let array = match int_type {
        DType::Int8 => typed::<i8>(shape, ints, invalid, fill)?.into(),
        DType::Int16 => typed::<i16>(shape, ints, invalid, fill)?.into(),
        DType::Int32 => typed::<i32>(shape, ints, invalid, fill)?.into(),
        DType::Int64 => typed::<i64>(shape, ints, invalid, fill)?.into(),
        DType::Uint8 => typed::<u8>(shape, ints, invalid, fill)?.into(),
        DType::Uint16 => typed::<u16>(shape, ints, invalid, fill)?.into(),
        DType::Uint32 => typed::<u32>(shape, ints, invalid, fill)?.into(),
        DType::Uint64 => typed::<u64>(shape, ints, invalid, fill)?.into(),
        other => {
            return Err(CodecError::InvalidArgument(format!(
                "{other} is not an integer type"
            )))
        }
    };
    Ok(array)
}

fn typed<T: Element>(
    shape: Vec<usize>,
    ints: &[i128],
    invalid: &[bool],
    fill: i128,
) -> CodecResult<NdArray<T>> {
    let data = ints
        .iter()
        .zip(invalid)
        .map(|(&v, &bad)| T::from_i128(if bad { fill } else { v }))
        .collect();
    Ok(NdArray::new(shape, data)?)
}
