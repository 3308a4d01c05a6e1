//! Layout paths: walk from a root layout to a nested member.
//!
//! A path is a list of [`PathElement`]s. Group and index elements narrow the
//! selection to a fixed offset. Open sequence elements add a free dimension
//! (a stride and a bound) that a handle later fills with a coordinate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::{LayoutKind, MemoryLayout};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathElement {
    /// Member of a struct or union, by name.
    Group(String),
    /// One fixed element of a sequence.
    SequenceIndex(u64),
    /// Every element of a sequence (one free dimension).
    Sequence,
    /// Elements `start`, `start + step`, ... (one free dimension).
    SequenceRange { start: u64, step: i64 },
}

impl PathElement {
    pub fn group(name: impl Into<String>) -> Self {
        PathElement::Group(name.into())
    }
}

/// One open dimension of a path, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dimension {
    pub(crate) stride_bits: i64,
    /// Number of valid coordinates; `None` for unbounded sequences.
    pub(crate) bound: Option<u64>,
}

/// A resolved path: the selected layout, its fixed offset, and any open
/// dimensions.
#[derive(Debug, Clone)]
pub struct LayoutPath<'a> {
    layout: &'a MemoryLayout,
    offset_bits: u64,
    dims: Vec<Dimension>,
}

impl<'a> LayoutPath<'a> {
    pub fn root(layout: &'a MemoryLayout) -> Self {
        Self {
            layout,
            offset_bits: 0,
            dims: Vec::new(),
        }
    }

    pub fn resolve(root: &'a MemoryLayout, elements: &[PathElement]) -> Result<Self> {
        elements
            .iter()
            .try_fold(Self::root(root), |path, element| path.step(element))
    }

    fn step(mut self, element: &PathElement) -> Result<Self> {
        match element {
            PathElement::Group(name) => {
                let layout: &'a MemoryLayout = self.layout;
                let (members, is_struct) = match layout.kind() {
                    LayoutKind::Struct(members) => (members, true),
                    LayoutKind::Union(members) => (members, false),
                    _ => return Err(Error::NotAGroup),
                };
                let mut offset = 0u64;
                for member in members {
                    if member.name() == Some(name.as_str()) {
                        self.offset_bits = self.offset_bits.checked_add(offset).ok_or(Error::Overflow)?;
                        self.layout = member;
                        return Ok(self);
                    }
                    if is_struct {
                        offset = offset.checked_add(member.bit_size()?).ok_or(Error::Overflow)?;
                    }
                }
                Err(Error::NoSuchMember { name: name.clone() })
            }
            PathElement::SequenceIndex(index) => {
                let (element, count) = sequence_parts(self.layout)?;
                if let Some(count) = count {
                    if *index >= count {
                        return Err(Error::IndexOutOfRange { index: *index, count });
                    }
                }
                let delta = element
                    .bit_size()?
                    .checked_mul(*index)
                    .ok_or(Error::Overflow)?;
                self.offset_bits = self.offset_bits.checked_add(delta).ok_or(Error::Overflow)?;
                self.layout = element;
                Ok(self)
            }
            PathElement::Sequence => {
                let (element, count) = sequence_parts(self.layout)?;
                self.dims.push(Dimension {
                    stride_bits: signed(element.bit_size()?)?,
                    bound: count,
                });
                self.layout = element;
                Ok(self)
            }
            PathElement::SequenceRange { start, step } => {
                if *step == 0 {
                    return Err(Error::ZeroStep);
                }
                let (element, count) = sequence_parts(self.layout)?;
                let bound = match count {
                    Some(count) => {
                        if *start >= count {
                            return Err(Error::IndexOutOfRange { index: *start, count });
                        }
                        let step_abs = step.unsigned_abs();
                        Some(if *step > 0 {
                            (count - start - 1) / step_abs + 1
                        } else {
                            start / step_abs + 1
                        })
                    }
                    // Going backwards from `start` is always bounded.
                    None if *step < 0 => Some(start / step.unsigned_abs() + 1),
                    None => None,
                };
                let elem_bits = element.bit_size()?;
                let delta = elem_bits.checked_mul(*start).ok_or(Error::Overflow)?;
                self.offset_bits = self.offset_bits.checked_add(delta).ok_or(Error::Overflow)?;
                self.dims.push(Dimension {
                    stride_bits: signed(elem_bits)?
                        .checked_mul(*step)
                        .ok_or(Error::Overflow)?,
                    bound,
                });
                self.layout = element;
                Ok(self)
            }
        }
    }

    /// The selected layout.
    pub fn layout(&self) -> &'a MemoryLayout {
        self.layout
    }

    /// Number of open sequence dimensions.
    pub fn free_dimensions(&self) -> usize {
        self.dims.len()
    }

    pub(crate) fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub(crate) fn raw_offset_bits(&self) -> u64 {
        self.offset_bits
    }

    /// Offset of the selection in bits. Only defined for closed paths.
    pub fn bit_offset(&self) -> Result<u64> {
        if !self.dims.is_empty() {
            return Err(Error::OpenPath);
        }
        Ok(self.offset_bits)
    }

    pub fn byte_offset(&self) -> Result<u64> {
        let bits = self.bit_offset()?;
        if bits % 8 != 0 {
            return Err(Error::NotByteAligned { bits });
        }
        Ok(bits / 8)
    }
}

fn sequence_parts(layout: &MemoryLayout) -> Result<(&MemoryLayout, Option<u64>)> {
    match layout.kind() {
        LayoutKind::Sequence { element, count } => Ok((&**element, *count)),
        _ => Err(Error::NotASequence),
    }
}

fn signed(bits: u64) -> Result<i64> {
    i64::try_from(bits).map_err(|_| Error::Overflow)
}

impl MemoryLayout {
    /// Resolve `elements` against this layout.
    pub fn path(&self, elements: &[PathElement]) -> Result<LayoutPath<'_>> {
        LayoutPath::resolve(self, elements)
    }

    pub fn bit_offset(&self, elements: &[PathElement]) -> Result<u64> {
        self.path(elements)?.bit_offset()
    }

    pub fn byte_offset(&self, elements: &[PathElement]) -> Result<u64> {
        self.path(elements)?.byte_offset()
    }

    /// The layout the path selects. Open elements are allowed.
    pub fn select(&self, elements: &[PathElement]) -> Result<MemoryLayout> {
        Ok(self.path(elements)?.layout().clone())
    }
}
