//! Typed accessors derived from layout paths.

use std::fmt;
use std::marker::PhantomData;

use memseg_core::{ByteOrder, PrimitiveClassifier, StandardClassifier};
use memseg_mem::{Carrier, MemorySegment};

use crate::error::{Error, Result};
use crate::layout::{LayoutKind, MemoryLayout};
use crate::path::{Dimension, LayoutPath, PathElement};

/// Fixed offset plus one stride per open dimension.
#[derive(Debug, Clone)]
struct Coordinates {
    offset_bits: u64,
    dims: Vec<Dimension>,
}

impl Coordinates {
    fn of(path: &LayoutPath<'_>) -> Self {
        Self {
            offset_bits: path.raw_offset_bits(),
            dims: path.dims().to_vec(),
        }
    }

    /// Byte offset for one coordinate per open dimension.
    fn byte_offset(&self, coords: &[u64]) -> Result<usize> {
        if coords.len() != self.dims.len() {
            return Err(Error::Coordinates {
                expected: self.dims.len(),
                got: coords.len(),
            });
        }
        let mut bits = i128::from(self.offset_bits);
        for (dim, &index) in self.dims.iter().zip(coords) {
            if let Some(count) = dim.bound {
                if index >= count {
                    return Err(Error::IndexOutOfRange { index, count });
                }
            }
            bits += i128::from(dim.stride_bits) * i128::from(index);
        }
        let bits = u64::try_from(bits).map_err(|_| Error::Overflow)?;
        if bits % 8 != 0 {
            return Err(Error::NotByteAligned { bits });
        }
        usize::try_from(bits / 8).map_err(|_| Error::Overflow)
    }
}

/// Reads and writes one value layout inside a segment.
///
/// Built by [`MemoryLayout::value_handle`]. Takes one coordinate per open
/// sequence dimension in the path it was built from.
pub struct ValueHandle<T> {
    coords: Coordinates,
    order: ByteOrder,
    align: usize,
    _carrier: PhantomData<fn() -> T>,
}

impl<T: Carrier> ValueHandle<T> {
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Required byte alignment of the accessed address.
    pub fn alignment(&self) -> usize {
        self.align
    }

    pub fn free_dimensions(&self) -> usize {
        self.coords.dims.len()
    }

    fn locate(&self, segment: &MemorySegment, coords: &[u64]) -> Result<usize> {
        let offset = self.coords.byte_offset(coords)?;
        if !segment.is_aligned_at(offset, self.align) {
            return Err(Error::Misaligned {
                offset,
                align: self.align,
            });
        }
        Ok(offset)
    }

    pub fn get(&self, segment: &MemorySegment, coords: &[u64]) -> Result<T> {
        let offset = self.locate(segment, coords)?;
        Ok(segment.get_ordered::<T>(offset, self.order)?)
    }

    pub fn set(&self, segment: &MemorySegment, coords: &[u64], value: T) -> Result<()> {
        let offset = self.locate(segment, coords)?;
        Ok(segment.set_ordered(offset, value, self.order)?)
    }
}

impl<T> Clone for ValueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            coords: self.coords.clone(),
            order: self.order,
            align: self.align,
            _carrier: PhantomData,
        }
    }
}

impl<T: Carrier> fmt::Debug for ValueHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueHandle")
            .field("carrier", &T::KIND)
            .field("order", &self.order)
            .field("align", &self.align)
            .field("dims", &self.coords.dims.len())
            .finish()
    }
}

/// Cuts the sub-layout a path selects out of a segment.
#[derive(Debug, Clone)]
pub struct SliceHandle {
    coords: Coordinates,
    byte_size: usize,
}

impl SliceHandle {
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn slice(&self, segment: &MemorySegment, coords: &[u64]) -> Result<MemorySegment> {
        let offset = self.coords.byte_offset(coords)?;
        Ok(segment.slice(offset, self.byte_size)?)
    }
}

impl MemoryLayout {
    /// A handle for the value layout at `path`, carried as `T`.
    pub fn value_handle<T: Carrier>(&self, path: &[PathElement]) -> Result<ValueHandle<T>> {
        self.value_handle_with(&StandardClassifier, path)
    }

    /// Like [`value_handle`](Self::value_handle), checking the carrier width
    /// with `classifier`.
    pub fn value_handle_with<T: Carrier>(
        &self,
        classifier: &dyn PrimitiveClassifier,
        path: &[PathElement],
    ) -> Result<ValueHandle<T>> {
        let resolved = self.path(path)?;
        let target = resolved.layout();
        let (layout_bits, order) = match target.kind() {
            LayoutKind::Value { bit_size, order } => (*bit_size, *order),
            _ => return Err(Error::NotAValue),
        };
        let carrier_bits = classifier.bit_width(T::KIND);
        if u64::from(carrier_bits) != layout_bits || layout_bits != T::SIZE as u64 * 8 {
            return Err(Error::CarrierMismatch {
                carrier: T::KIND,
                carrier_bits,
                layout_bits,
            });
        }
        let align = usize::try_from(target.byte_alignment()).map_err(|_| Error::Overflow)?;
        Ok(ValueHandle {
            coords: Coordinates::of(&resolved),
            order,
            align,
            _carrier: PhantomData,
        })
    }

    /// A handle that slices out the layout at `path`.
    pub fn slice_handle(&self, path: &[PathElement]) -> Result<SliceHandle> {
        let resolved = self.path(path)?;
        let byte_size =
            usize::try_from(resolved.layout().byte_size()?).map_err(|_| Error::Overflow)?;
        Ok(SliceHandle {
            coords: Coordinates::of(&resolved),
            byte_size,
        })
    }
}
