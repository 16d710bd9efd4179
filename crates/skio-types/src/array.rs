use std::fmt;
use std::sync::Arc;

use crate::dtype::DType;
use crate::error::{TypeError, TypeResult};

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A scalar type that can be stored in an [`NdArray`].
///
/// Conversions saturate at the target type's limits; `NaN` converts to `0`
/// for integer targets.
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The tag for this element type.
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;

    /// Exact integer value, `None` for floating point elements.
    fn to_i128(self) -> Option<i128>;

    fn from_i128(value: i128) -> Self;

    /// Borrow the typed array out of an [`AnyArray`] of the same type.
    fn downcast(array: &AnyArray) -> Option<&NdArray<Self>>;
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(value: f64) -> Self {
        value != 0.0
    }

    fn to_i128(self) -> Option<i128> {
        Some(self as i128)
    }

    fn from_i128(value: i128) -> Self {
        value != 0
    }

    fn downcast(array: &AnyArray) -> Option<&NdArray<Self>> {
        match array {
            AnyArray::Bool(a) => Some(a),
            _ => None,
        }
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn to_i128(self) -> Option<i128> {
                Some(self as i128)
            }

            fn from_i128(value: i128) -> Self {
                value.clamp(<$t>::MIN as i128, <$t>::MAX as i128) as $t
            }

            fn downcast(array: &AnyArray) -> Option<&NdArray<Self>> {
                match array {
                    AnyArray::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn to_i128(self) -> Option<i128> {
                None
            }

            fn from_i128(value: i128) -> Self {
                value as $t
            }

            fn downcast(array: &AnyArray) -> Option<&NdArray<Self>> {
                match array {
                    AnyArray::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    )*};
}

impl_int_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
);

impl_float_element!(f32 => Float32, f64 => Float64);

// ---------------------------------------------------------------------------
// NdArray
// ---------------------------------------------------------------------------

/// A shaped, row-major array over a reference-counted buffer.
///
/// Cloning an `NdArray` aliases the same buffer; use [`NdArray::deep_copy`]
/// for an independent copy. Buffers are never mutated in place, so aliasing
/// is only observable through [`NdArray::buffer_id`].
#[derive(Clone)]
pub struct NdArray<T> {
    shape: Vec<usize>,
    data: Arc<[T]>,
}

impl<T: Element> NdArray<T> {
    /// Create an array from a shape and row-major data.
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> TypeResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TypeError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data: data.into(),
        })
    }

    /// A one-dimensional array.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            shape: vec![data.len()],
            data: data.into(),
        }
    }

    /// A zero-dimensional array holding one value.
    pub fn scalar(value: T) -> Self {
        Self {
            shape: Vec::new(),
            data: Arc::from([value]),
        }
    }

    /// An array of the given shape with every element set to `value`.
    pub fn filled(shape: Vec<usize>, value: T) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len].into(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data.to_vec()
    }

    /// Size of the element buffer in bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len() * T::DTYPE.item_size()
    }

    /// Identity of the underlying buffer. Arrays sharing a buffer report the
    /// same id.
    pub fn buffer_id(&self) -> usize {
        Arc::as_ptr(&self.data) as *const T as usize
    }

    pub fn shares_buffer<U>(&self, other: &NdArray<U>) -> bool {
        Arc::as_ptr(&self.data) as *const () == Arc::as_ptr(&other.data) as *const ()
    }

    /// Copy the elements into a freshly allocated buffer.
    pub fn deep_copy(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: Arc::from(&self.data[..]),
        }
    }

    /// A view with a different shape over the same buffer.
    pub fn reshape(&self, shape: Vec<usize>) -> TypeResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.data.len() {
            return Err(TypeError::ShapeMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(Self {
            shape,
            data: Arc::clone(&self.data),
        })
    }

    /// Apply `f` element-wise into a new array of the same shape.
    pub fn map<U: Element>(&self, f: impl Fn(T) -> U) -> NdArray<U> {
        NdArray {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Convert every element to `U`, exactly for integer to integer casts
    /// and through `f64` otherwise.
    pub fn cast<U: Element>(&self) -> NdArray<U> {
        self.map(|v| match v.to_i128() {
            Some(i) if !U::DTYPE.is_float() => U::from_i128(i),
            _ => U::from_f64(v.to_f64()),
        })
    }
}

impl<T: Element> PartialEq for NdArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data[..] == other.data[..]
    }
}

impl<T: Element> fmt::Debug for NdArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.shape)
            .field("data", &&self.data[..])
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AnyArray
// ---------------------------------------------------------------------------

/// An [`NdArray`] whose element type is only known at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyArray {
    Bool(NdArray<bool>),
    Int8(NdArray<i8>),
    Int16(NdArray<i16>),
    Int32(NdArray<i32>),
    Int64(NdArray<i64>),
    Uint8(NdArray<u8>),
    Uint16(NdArray<u16>),
    Uint32(NdArray<u32>),
    Uint64(NdArray<u64>),
    Float32(NdArray<f32>),
    Float64(NdArray<f64>),
}

/// Run `$body` with `$array` bound to the typed array inside `$value`.
macro_rules! each_array {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            AnyArray::Bool($array) => $body,
            AnyArray::Int8($array) => $body,
            AnyArray::Int16($array) => $body,
            AnyArray::Int32($array) => $body,
            AnyArray::Int64($array) => $body,
            AnyArray::Uint8($array) => $body,
            AnyArray::Uint16($array) => $body,
            AnyArray::Uint32($array) => $body,
            AnyArray::Uint64($array) => $body,
            AnyArray::Float32($array) => $body,
            AnyArray::Float64($array) => $body,
        }
    };
}

macro_rules! impl_from_ndarray {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl From<NdArray<$t>> for AnyArray {
            fn from(array: NdArray<$t>) -> Self {
                AnyArray::$variant(array)
            }
        }
    )*};
}

impl_from_ndarray!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
);

impl AnyArray {
    pub fn dtype(&self) -> DType {
        each_array!(self, a => element_dtype(a))
    }

    pub fn shape(&self) -> &[usize] {
        each_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        each_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nbytes(&self) -> usize {
        each_array!(self, a => a.nbytes())
    }

    pub fn buffer_id(&self) -> usize {
        each_array!(self, a => a.buffer_id())
    }

    pub fn deep_copy(&self) -> AnyArray {
        each_array!(self, a => AnyArray::from(a.deep_copy()))
    }

    pub fn reshape(&self, shape: Vec<usize>) -> TypeResult<AnyArray> {
        each_array!(self, a => a.reshape(shape).map(AnyArray::from))
    }

    /// Borrow the typed array if the element type is `T`.
    pub fn as_typed<T: Element>(&self) -> Option<&NdArray<T>> {
        T::downcast(self)
    }

    /// Every element converted to `f64`, row-major.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        each_array!(self, a => a.as_slice().iter().map(|v| v.to_f64()).collect())
    }

    /// Every element as an exact integer, `None` entries for floats.
    pub fn to_i128_vec(&self) -> Vec<Option<i128>> {
        each_array!(self, a => a.as_slice().iter().map(|v| v.to_i128()).collect())
    }

    /// Convert to a typed array of element `U`.
    pub fn cast_to<U: Element>(&self) -> NdArray<U> {
        each_array!(self, a => a.cast::<U>())
    }

    /// Convert to another element type. Returns an alias of `self` when the
    /// type already matches.
    pub fn cast(&self, dtype: DType) -> AnyArray {
        if dtype == self.dtype() {
            return self.clone();
        }
        match dtype {
            DType::Bool => self.cast_to::<bool>().into(),
            DType::Int8 => self.cast_to::<i8>().into(),
            DType::Int16 => self.cast_to::<i16>().into(),
            DType::Int32 => self.cast_to::<i32>().into(),
            DType::Int64 => self.cast_to::<i64>().into(),
            DType::Uint8 => self.cast_to::<u8>().into(),
            DType::Uint16 => self.cast_to::<u16>().into(),
            DType::Uint32 => self.cast_to::<u32>().into(),
            DType::Uint64 => self.cast_to::<u64>().into(),
            DType::Float32 => self.cast_to::<f32>().into(),
            DType::Float64 => self.cast_to::<f64>().into(),
        }
    }

    /// Build an array of `dtype` from `f64` values, saturating.
    pub fn from_f64_vec(dtype: DType, shape: Vec<usize>, values: Vec<f64>) -> TypeResult<AnyArray> {
        NdArray::new(shape, values).map(|a| AnyArray::Float64(a).cast(dtype))
    }
}

fn element_dtype<T: Element>(_: &NdArray<T>) -> DType {
    T::DTYPE
}
