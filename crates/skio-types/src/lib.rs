//! Numeric foundation types for skio.
//!
//! Every other skio crate depends on `skio-types`. It defines the closed set
//! of element types an array may hold and the array containers themselves.
//!
//! # Key Types
//!
//! - [`DType`] -- element type tag, parsed from numpy-style codes
//! - [`NdArray`] -- shaped array over a reference-counted buffer
//! - [`AnyArray`] -- an `NdArray` of any supported element type
//! - [`ArrayValue`] -- an array plus an optional validity mask

pub mod array;
pub mod dtype;
pub mod error;
pub mod masked;

pub use array::{AnyArray, Element, NdArray};
pub use dtype::DType;
pub use error::{TypeError, TypeResult};
pub use masked::ArrayValue;
