use std::iter::FusedIterator;

use super::MemorySegment;
use crate::error::{Error, Result};

/// Iterates a segment as equal, non-overlapping element slices.
///
/// Splitting divides the remaining index range in two; no memory is read or
/// moved, so it can be repeated recursively to hand work to several threads.
#[derive(Debug, Clone)]
pub struct ElementSplitter {
    segment: MemorySegment,
    elem_size: usize,
    index: usize,
    fence: usize,
}

impl MemorySegment {
    /// Split into `byte_size / elem_size` element slices.
    pub fn elements(&self, elem_size: usize) -> Result<ElementSplitter> {
        if elem_size == 0 || self.byte_size() % elem_size != 0 {
            return Err(Error::IncompatibleSize {
                size: self.byte_size(),
                element: elem_size,
            });
        }
        Ok(ElementSplitter {
            segment: self.clone(),
            elem_size,
            index: 0,
            fence: self.byte_size() / elem_size,
        })
    }
}

impl ElementSplitter {
    pub fn element_size(&self) -> usize {
        self.elem_size
    }

    /// Hand off the first half of the remaining elements, keeping the rest.
    /// Returns `None` when fewer than two elements remain.
    pub fn try_split(&mut self) -> Option<ElementSplitter> {
        let lo = self.index;
        let mid = lo + (self.fence - lo) / 2;
        if lo >= mid {
            return None;
        }
        self.index = mid;
        Some(ElementSplitter {
            segment: self.segment.clone(),
            elem_size: self.elem_size,
            index: lo,
            fence: mid,
        })
    }
}

impl Iterator for ElementSplitter {
    type Item = MemorySegment;

    fn next(&mut self) -> Option<MemorySegment> {
        if self.index >= self.fence {
            return None;
        }
        let item = self
            .segment
            .view(self.index * self.elem_size, self.elem_size);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.fence - self.index;
        (n, Some(n))
    }
}

impl DoubleEndedIterator for ElementSplitter {
    fn next_back(&mut self) -> Option<MemorySegment> {
        if self.index >= self.fence {
            return None;
        }
        self.fence -= 1;
        Some(
            self.segment
                .view(self.fence * self.elem_size, self.elem_size),
        )
    }
}

impl ExactSizeIterator for ElementSplitter {}

impl FusedIterator for ElementSplitter {}
