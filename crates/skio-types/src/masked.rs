use crate::array::{AnyArray, Element, NdArray};
use crate::dtype::DType;
use crate::error::{TypeError, TypeResult};

/// An array with an optional validity mask.
///
/// A mask entry of `true` marks the element at the same position as invalid.
/// A present mask without any `true` entry still makes this a masked array;
/// [`ArrayValue::has_invalid`] tells the two cases apart.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayValue {
    data: AnyArray,
    mask: Option<NdArray<bool>>,
}

impl ArrayValue {
    /// An unmasked array.
    pub fn new(data: impl Into<AnyArray>) -> Self {
        Self {
            data: data.into(),
            mask: None,
        }
    }

    /// A masked array. The mask must have the shape of the data.
    pub fn masked(data: impl Into<AnyArray>, mask: NdArray<bool>) -> TypeResult<Self> {
        let data = data.into();
        if mask.shape() != data.shape() {
            return Err(TypeError::ShapeMismatch {
                expected: data.len(),
                actual: mask.len(),
            });
        }
        Ok(Self {
            data,
            mask: Some(mask),
        })
    }

    pub fn data(&self) -> &AnyArray {
        &self.data
    }

    pub fn mask(&self) -> Option<&NdArray<bool>> {
        self.mask.as_ref()
    }

    pub fn into_parts(self) -> (AnyArray, Option<NdArray<bool>>) {
        (self.data, self.mask)
    }

    /// Returns `true` if a mask is attached.
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Returns `true` if at least one element is masked.
    pub fn has_invalid(&self) -> bool {
        self.mask
            .as_ref()
            .is_some_and(|m| m.as_slice().iter().any(|&v| v))
    }

    /// Validity flags for every element (`true` = invalid), all `false`
    /// when unmasked.
    pub fn invalid_flags(&self) -> Vec<bool> {
        match &self.mask {
            Some(mask) => mask.to_vec(),
            None => vec![false; self.data.len()],
        }
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The same data with the mask dropped.
    pub fn without_mask(&self) -> Self {
        Self::new(self.data.clone())
    }

    /// Data and mask copied into fresh buffers.
    pub fn deep_copy(&self) -> Self {
        Self {
            data: self.data.deep_copy(),
            mask: self.mask.as_ref().map(NdArray::deep_copy),
        }
    }

    /// Typed view of the data if the element type is `T`.
    pub fn as_typed<T: Element>(&self) -> Option<&NdArray<T>> {
        self.data.as_typed()
    }
}

impl From<AnyArray> for ArrayValue {
    fn from(data: AnyArray) -> Self {
        Self::new(data)
    }
}

impl<T: Element> From<NdArray<T>> for ArrayValue
where
    AnyArray: From<NdArray<T>>,
{
    fn from(data: NdArray<T>) -> Self {
        Self::new(data)
    }
}
