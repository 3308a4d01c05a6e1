//! Primitive kind classification.
//!
//! A lookup table from primitive kind to bit width and signedness. The layout
//! crate consults it to check that a requested carrier type matches the bit
//! size a value layout declares.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Address,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Address,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Address => "address",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrimitiveKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrimitiveKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownPrimitive(s.to_string()))
    }
}

/// Width and signedness of one primitive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveInfo {
    pub bit_width: u32,
    pub signed: bool,
    pub floating: bool,
}

impl PrimitiveInfo {
    pub fn byte_width(&self) -> u32 {
        self.bit_width / 8
    }
}

/// Maps a primitive kind to its bit width and signedness.
pub trait PrimitiveClassifier: Send + Sync {
    fn classify(&self, kind: PrimitiveKind) -> PrimitiveInfo;

    fn bit_width(&self, kind: PrimitiveKind) -> u32 {
        self.classify(kind).bit_width
    }

    fn is_signed(&self, kind: PrimitiveKind) -> bool {
        self.classify(kind).signed
    }
}

/// The fixed table for the platform this crate is compiled for.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardClassifier;

impl PrimitiveClassifier for StandardClassifier {
    fn classify(&self, kind: PrimitiveKind) -> PrimitiveInfo {
        let (bit_width, signed, floating) = match kind {
            PrimitiveKind::Bool => (8, false, false),
            PrimitiveKind::Byte => (8, true, false),
            PrimitiveKind::Char => (16, false, false),
            PrimitiveKind::Short => (16, true, false),
            PrimitiveKind::Int => (32, true, false),
            PrimitiveKind::Long => (64, true, false),
            PrimitiveKind::Float => (32, true, true),
            PrimitiveKind::Double => (64, true, true),
            PrimitiveKind::Address => (usize::BITS, false, false),
        };
        PrimitiveInfo {
            bit_width,
            signed,
            floating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_rust_types() {
        let c = StandardClassifier;
        assert_eq!(c.bit_width(PrimitiveKind::Byte), 8);
        assert_eq!(c.bit_width(PrimitiveKind::Char), 16);
        assert_eq!(c.bit_width(PrimitiveKind::Int), 32);
        assert_eq!(c.bit_width(PrimitiveKind::Double), 64);
        assert_eq!(
            c.bit_width(PrimitiveKind::Address) as usize,
            std::mem::size_of::<usize>() * 8
        );
    }

    #[test]
    fn char_is_unsigned() {
        let c = StandardClassifier;
        assert!(!c.is_signed(PrimitiveKind::Char));
        assert!(c.is_signed(PrimitiveKind::Short));
    }

    #[test]
    fn parse_round_trip_names() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(kind.name().parse::<PrimitiveKind>().unwrap(), kind);
        }
        assert!("quad".parse::<PrimitiveKind>().is_err());
    }
}
