use skio_types::{AnyArray, ArrayValue, NdArray};
use tracing::trace;

use crate::config::{DecodeOptions, InvalidSpec};
use crate::error::{CodecError, CodecResult};

/// Decode floating-point values from scaled integers.
///
/// Every element is multiplied by `scale` and converted to `opts.dtype`.
/// Elements matched by `opts.invalid` become `NaN`; with `opts.masked` they
/// are also flagged in the mask of the result, together with any value that
/// is not finite after decoding. `opts.masked` without an invalid spec gives
/// a masked array with nothing masked.
pub fn decode_scaled(data: &AnyArray, scale: f64, opts: &DecodeOptions) -> CodecResult<ArrayValue> {
    if !opts.dtype.is_float() {
        return Err(CodecError::InvalidArgument(
            "dtype must be a floating data type".into(),
        ));
    }

    let floats = data.to_f64_vec();
    let exact = data.to_i128_vec();
    let invalid: Vec<bool> = floats
        .iter()
        .zip(&exact)
        .map(|(&v, &i)| is_invalid(opts.invalid, v, i))
        .collect();

    let values: Vec<f64> = floats
        .iter()
        .zip(&invalid)
        .map(|(&v, &bad)| if bad { f64::NAN } else { v * scale })
        .collect();

    trace!(
        len = values.len(),
        scale,
        dtype = %opts.dtype,
        masked = opts.masked,
        "decoding scaled integers"
    );

    let shape = data.shape().to_vec();
    let mask = match (opts.masked, opts.invalid) {
        (false, _) => None,
        (true, InvalidSpec::None) => Some(vec![false; values.len()]),
        (true, _) => Some(values.iter().map(|v| !v.is_finite()).collect()),
    };
    let decoded = AnyArray::from_f64_vec(opts.dtype, shape.clone(), values)?;

    match mask {
        None => Ok(ArrayValue::new(decoded)),
        Some(mask) => Ok(ArrayValue::masked(decoded, NdArray::new(shape, mask)?)?),
    }
}

fn is_invalid(spec: InvalidSpec, value: f64, exact: Option<i128>) -> bool {
    match (spec, exact) {
        (InvalidSpec::None, _) => false,
        (InvalidSpec::Sentinel(s), Some(i)) => i == s,
        (InvalidSpec::Sentinel(s), None) => value == s as f64,
        (InvalidSpec::Range(low, high), Some(i)) => !(i > low && i < high),
        (InvalidSpec::Range(low, high), None) => !(value > low as f64 && value < high as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skio_types::DType;

    fn idat() -> AnyArray {
        NdArray::new(vec![2, 3], vec![0i64, 1, 2, 3, 4, 5])
            .unwrap()
            .into()
    }

    fn values(v: &ArrayValue) -> Vec<f64> {
        v.data().to_f64_vec()
    }

    fn nan_positions(v: &ArrayValue) -> Vec<bool> {
        values(v).iter().map(|x| x.is_nan()).collect()
    }

    // -----------------------------------------------------------------------
    // Invalid handling
    // -----------------------------------------------------------------------

    #[test]
    fn no_invalid_spec_scales_everything() {
        let out = decode_scaled(&idat(), 0.5, &DecodeOptions::default()).unwrap();
        assert_eq!(values(&out), vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
        assert_eq!(out.shape(), &[2, 3]);
        assert!(!out.is_masked());
    }

    #[test]
    fn masked_without_spec_masks_nothing() {
        let opts = DecodeOptions {
            masked: true,
            ..Default::default()
        };
        let out = decode_scaled(&idat(), 0.5, &opts).unwrap();
        assert!(out.is_masked());
        assert!(!out.has_invalid());
    }

    #[test]
    fn sentinel_becomes_nan() {
        let opts = DecodeOptions {
            invalid: InvalidSpec::Sentinel(3),
            ..Default::default()
        };
        let out = decode_scaled(&idat(), 0.5, &opts).unwrap();
        assert_eq!(
            nan_positions(&out),
            vec![false, false, false, true, false, false]
        );
        assert_eq!(values(&out)[4], 2.0);
    }

    #[test]
    fn sentinel_masked() {
        let opts = DecodeOptions {
            invalid: InvalidSpec::Sentinel(3),
            masked: true,
            ..Default::default()
        };
        let out = decode_scaled(&idat(), 0.5, &opts).unwrap();
        assert_eq!(
            out.invalid_flags(),
            vec![false, false, false, true, false, false]
        );
    }

    #[test]
    fn zero_sentinel_is_honored() {
        let opts = DecodeOptions {
            invalid: InvalidSpec::Sentinel(0),
            masked: true,
            ..Default::default()
        };
        let out = decode_scaled(&idat(), 0.5, &opts).unwrap();
        assert_eq!(
            out.invalid_flags(),
            vec![true, false, false, false, false, false]
        );
    }

    #[test]
    fn range_keeps_open_interval() {
        let opts = DecodeOptions {
            invalid: InvalidSpec::Range(1, 4),
            ..Default::default()
        };
        let out = decode_scaled(&idat(), 0.5, &opts).unwrap();
        assert_eq!(
            nan_positions(&out),
            vec![true, true, false, false, true, true]
        );
        assert_eq!(values(&out)[2], 1.0);
        assert_eq!(values(&out)[3], 1.5);
    }

    #[test]
    fn range_masked() {
        let opts = DecodeOptions {
            invalid: InvalidSpec::Range(1, 4),
            masked: true,
            ..Default::default()
        };
        let out = decode_scaled(&idat(), 0.5, &opts).unwrap();
        assert_eq!(
            out.invalid_flags(),
            vec![true, true, false, false, true, true]
        );
    }

    #[test]
    fn non_finite_results_are_masked() {
        let data: AnyArray = NdArray::from_vec(vec![1.0f64, f64::INFINITY, 2.0]).into();
        let opts = DecodeOptions {
            invalid: InvalidSpec::Sentinel(2),
            masked: true,
            ..Default::default()
        };
        let out = decode_scaled(&data, 1.0, &opts).unwrap();
        assert_eq!(out.invalid_flags(), vec![false, true, true]);
    }

    // -----------------------------------------------------------------------
    // Target type
    // -----------------------------------------------------------------------

    #[test]
    fn float32_target() {
        let opts = DecodeOptions {
            dtype: DType::Float32,
            ..Default::default()
        };
        let out = decode_scaled(&idat(), 0.5, &opts).unwrap();
        assert_eq!(out.dtype(), DType::Float32);
    }

    #[test]
    fn integer_target_is_rejected() {
        let opts = DecodeOptions {
            dtype: DType::Int32,
            ..Default::default()
        };
        let err = decode_scaled(&idat(), 0.5, &opts).unwrap_err();
        assert!(err.to_string().contains("dtype must be a floating data type"));
    }

    #[test]
    fn input_is_untouched() {
        let data = idat();
        let before = data.clone();
        let out = decode_scaled(&data, 2.0, &DecodeOptions::default()).unwrap();
        assert_eq!(data, before);
        assert_ne!(out.data().buffer_id(), data.buffer_id());
    }
}
