//! Scaled-integer codec for floating-point arrays.
//!
//! Scientific file formats commonly store measurements as small integers and
//! a scale factor: `value = integer * factor`. This crate computes that
//! representation and reverses it.
//!
//! - [`encode_scaled`] picks the best factor for a target integer type and
//!   returns the encoded array together with the factor it used.
//! - [`decode_scaled`] multiplies integers back by a factor, turning invalid
//!   sentinels into `NaN` or into a validity mask.
//!
//! Both functions are pure: inputs are never modified and outputs are fresh
//! buffers.
//!
//! ```rust
//! use skio_codec::{decode_scaled, encode_scaled, DecodeOptions, EncodeOptions};
//! use skio_types::{ArrayValue, DType, NdArray};
//!
//! let data = ArrayValue::new(NdArray::from_vec(vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]));
//! let opts = EncodeOptions { range_max: Some(1), ..Default::default() };
//! let encoded = encode_scaled(&data, DType::Int16, &opts).unwrap();
//! assert_eq!(encoded.factor, 2.5);
//!
//! let decoded = decode_scaled(encoded.data.data(), encoded.factor, &DecodeOptions::default()).unwrap();
//! assert_eq!(decoded.len(), 6);
//! ```

pub mod config;
pub mod decode;
pub mod encode;
pub mod error;

pub use config::{DecodeOptions, EncodeOptions, InvalidSpec, InvalidValue, MaxFactor};
pub use decode::decode_scaled;
pub use encode::{encode_scaled, encode_scaled_code, Encoded};
pub use error::{CodecError, CodecResult};
