//! Memory layouts: sizes, alignments, and names for structured memory.
//!
//! Sizes and alignments are tracked in bits. Struct members are laid out
//! back to back with no implicit padding; insert padding layouts where the
//! native ABI would.

use std::fmt;

use memseg_core::ByteOrder;
use memseg_mem::Carrier;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutKind {
    Value { bit_size: u64, order: ByteOrder },
    Padding { bit_size: u64 },
    /// `count: None` is an unbounded sequence.
    Sequence {
        element: Box<MemoryLayout>,
        count: Option<u64>,
    },
    Struct(Vec<MemoryLayout>),
    Union(Vec<MemoryLayout>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LayoutRepr")]
pub struct MemoryLayout {
    kind: LayoutKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bit_alignment: Option<u64>,
}

/// Deserialized form; alignment overrides are checked on conversion.
#[derive(Deserialize)]
struct LayoutRepr {
    kind: LayoutKind,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bit_alignment: Option<u64>,
}

impl TryFrom<LayoutRepr> for MemoryLayout {
    type Error = Error;

    fn try_from(repr: LayoutRepr) -> Result<Self> {
        let layout = Self {
            kind: repr.kind,
            name: repr.name,
            bit_alignment: None,
        };
        match repr.bit_alignment {
            Some(bits) => layout.with_bit_alignment(bits),
            None => Ok(layout),
        }
    }
}

impl MemoryLayout {
    fn from_kind(kind: LayoutKind) -> Self {
        Self {
            kind,
            name: None,
            bit_alignment: None,
        }
    }

    /// A value of `bit_size` bits in the given byte order.
    pub fn value_bits(bit_size: u64, order: ByteOrder) -> Self {
        Self::from_kind(LayoutKind::Value { bit_size, order })
    }

    /// A native-order value matching carrier `T`.
    pub fn of<T: Carrier>() -> Self {
        Self::value_bits(T::SIZE as u64 * 8, ByteOrder::native())
    }

    pub fn padding(bit_size: u64) -> Self {
        Self::from_kind(LayoutKind::Padding { bit_size })
    }

    pub fn sequence(count: u64, element: MemoryLayout) -> Self {
        Self::from_kind(LayoutKind::Sequence {
            element: Box::new(element),
            count: Some(count),
        })
    }

    pub fn unbounded_sequence(element: MemoryLayout) -> Self {
        Self::from_kind(LayoutKind::Sequence {
            element: Box::new(element),
            count: None,
        })
    }

    pub fn structure(members: Vec<MemoryLayout>) -> Self {
        Self::from_kind(LayoutKind::Struct(members))
    }

    pub fn union(members: Vec<MemoryLayout>) -> Self {
        Self::from_kind(LayoutKind::Union(members))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the natural alignment. `bits` must be a power of two >= 8.
    pub fn with_bit_alignment(mut self, bits: u64) -> Result<Self> {
        if bits < 8 || !bits.is_power_of_two() {
            return Err(Error::InvalidAlignment { bits });
        }
        self.bit_alignment = Some(bits);
        Ok(self)
    }

    /// Change the byte order of a value layout.
    pub fn with_order(mut self, order: ByteOrder) -> Result<Self> {
        match &mut self.kind {
            LayoutKind::Value { order: o, .. } => {
                *o = order;
                Ok(self)
            }
            _ => Err(Error::NotAValue),
        }
    }

    pub fn kind(&self) -> &LayoutKind {
        &self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn order(&self) -> Option<ByteOrder> {
        match self.kind {
            LayoutKind::Value { order, .. } => Some(order),
            _ => None,
        }
    }

    pub fn is_padding(&self) -> bool {
        matches!(self.kind, LayoutKind::Padding { .. })
    }

    pub fn bit_size(&self) -> Result<u64> {
        match &self.kind {
            LayoutKind::Value { bit_size, .. } | LayoutKind::Padding { bit_size } => Ok(*bit_size),
            LayoutKind::Sequence { element, count } => {
                let count = count.ok_or(Error::UnboundedSequence)?;
                element
                    .bit_size()?
                    .checked_mul(count)
                    .ok_or(Error::Overflow)
            }
            LayoutKind::Struct(members) => members.iter().try_fold(0u64, |total, m| -> Result<u64> {
                total.checked_add(m.bit_size()?).ok_or(Error::Overflow)
            }),
            LayoutKind::Union(members) => members
                .iter()
                .try_fold(0u64, |widest, m| -> Result<u64> {
                    Ok(widest.max(m.bit_size()?))
                }),
        }
    }

    pub fn byte_size(&self) -> Result<u64> {
        let bits = self.bit_size()?;
        if bits % 8 != 0 {
            return Err(Error::NotByteAligned { bits });
        }
        Ok(bits / 8)
    }

    /// Explicit alignment if set, otherwise the natural one.
    pub fn bit_alignment(&self) -> u64 {
        if let Some(bits) = self.bit_alignment {
            return bits;
        }
        match &self.kind {
            LayoutKind::Value { bit_size, .. } => (*bit_size).max(8),
            LayoutKind::Padding { .. } => 8,
            LayoutKind::Sequence { element, .. } => element.bit_alignment(),
            LayoutKind::Struct(members) | LayoutKind::Union(members) => members
                .iter()
                .map(MemoryLayout::bit_alignment)
                .max()
                .unwrap_or(8),
        }
    }

    pub fn byte_alignment(&self) -> u64 {
        self.bit_alignment() / 8
    }

    pub(crate) fn has_natural_alignment(&self) -> bool {
        self.bit_alignment.is_none()
    }
}

impl fmt::Display for MemoryLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_natural_alignment() {
            write!(f, "{}%", self.bit_alignment())?;
        }
        match &self.kind {
            LayoutKind::Value { bit_size, order } => {
                let tag = if *order == ByteOrder::BigEndian { 'B' } else { 'b' };
                write!(f, "{tag}{bit_size}")?;
            }
            LayoutKind::Padding { bit_size } => write!(f, "x{bit_size}")?,
            LayoutKind::Sequence { element, count } => match count {
                Some(n) => write!(f, "[{n}:{element}]")?,
                None => write!(f, "[:{element}]")?,
            },
            LayoutKind::Struct(members) | LayoutKind::Union(members) => {
                let sep = if matches!(self.kind, LayoutKind::Union(_)) { "|" } else { "" };
                f.write_str("[")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{m}")?;
                }
                f.write_str("]")?;
            }
        }
        if let Some(name) = &self.name {
            write!(f, "({name})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> MemoryLayout {
        MemoryLayout::structure(vec![
            MemoryLayout::of::<i32>().with_name("x"),
            MemoryLayout::of::<i32>().with_name("y"),
        ])
        .with_name("point")
    }

    #[test]
    fn struct_and_union_sizes() {
        assert_eq!(point().byte_size().unwrap(), 8);
        let u = MemoryLayout::union(vec![MemoryLayout::of::<u8>(), MemoryLayout::of::<f64>()]);
        assert_eq!(u.byte_size().unwrap(), 8);
        assert_eq!(u.byte_alignment(), 8);
        let seq = MemoryLayout::sequence(10, point());
        assert_eq!(seq.byte_size().unwrap(), 80);
        assert_eq!(seq.byte_alignment(), 4);
    }

    #[test]
    fn unbounded_sequences_have_no_size() {
        let seq = MemoryLayout::unbounded_sequence(MemoryLayout::of::<u16>());
        assert!(matches!(seq.bit_size(), Err(Error::UnboundedSequence)));
        assert_eq!(seq.bit_alignment(), 16);
    }

    #[test]
    fn sub_byte_sizes_are_not_byte_sized() {
        let p = MemoryLayout::padding(4);
        assert_eq!(p.bit_size().unwrap(), 4);
        assert!(matches!(p.byte_size(), Err(Error::NotByteAligned { bits: 4 })));
    }

    #[test]
    fn attributes() {
        let v = MemoryLayout::of::<u32>()
            .with_order(ByteOrder::BigEndian)
            .unwrap()
            .with_bit_alignment(8)
            .unwrap()
            .with_name("packed");
        assert_eq!(v.order(), Some(ByteOrder::BigEndian));
        assert_eq!(v.byte_alignment(), 1);
        assert_eq!(v.name(), Some("packed"));
        assert!(MemoryLayout::padding(8).with_order(ByteOrder::BigEndian).is_err());
        assert!(MemoryLayout::of::<u8>().with_bit_alignment(12).is_err());
    }

    #[test]
    fn display_is_compact() {
        let le = MemoryLayout::value_bits(32, ByteOrder::LittleEndian);
        let s = MemoryLayout::structure(vec![le.clone().with_name("x"), MemoryLayout::padding(32)]);
        assert_eq!(s.to_string(), "[b32(x)x32]");
        let u = MemoryLayout::union(vec![le.clone(), le]).with_name("u");
        assert_eq!(u.to_string(), "[b32|b32](u)");
    }

    #[test]
    fn layouts_serialize() {
        let json = serde_json::to_string(&point()).unwrap();
        let back: MemoryLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point());
    }

    #[test]
    fn deserialized_alignment_is_validated() {
        let packed = MemoryLayout::of::<u32>().with_bit_alignment(8).unwrap();
        let json = serde_json::to_string(&packed).unwrap();
        let back: MemoryLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back.byte_alignment(), 1);
        for bad in ["0", "4", "24"] {
            let json = json.replace("\"bit_alignment\":8", &format!("\"bit_alignment\":{bad}"));
            let err = serde_json::from_str::<MemoryLayout>(&json).unwrap_err();
            assert!(err.to_string().contains("invalid bit alignment"), "{bad}: {err}");
        }
        let nested = MemoryLayout::sequence(2, packed);
        let json = serde_json::to_string(&nested)
            .unwrap()
            .replace("\"bit_alignment\":8", "\"bit_alignment\":0");
        assert!(serde_json::from_str::<MemoryLayout>(&json).is_err());
    }
}
