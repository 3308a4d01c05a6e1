//! Element carriers: the plain value types a segment can read and write.
//!
//! Every carrier is valid for any bit pattern, so reading raw bytes as a
//! carrier can never produce an invalid value.

use memseg_core::PrimitiveKind;

mod sealed {
    pub trait Sealed {}
}

pub trait Carrier: sealed::Sealed + Copy + Send + Sync + 'static {
    /// Primitive kind used to check the carrier against a value layout.
    const KIND: PrimitiveKind;
    const SIZE: usize = std::mem::size_of::<Self>();
    const ALIGN: usize = std::mem::align_of::<Self>();

    /// Reverse the byte order of the value.
    fn swap_bytes(self) -> Self;
}

macro_rules! int_carrier {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Carrier for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;

                #[inline]
                fn swap_bytes(self) -> Self {
                    <$ty>::swap_bytes(self)
                }
            }
        )*
    };
}

int_carrier! {
    u8 => Byte,
    i8 => Byte,
    u16 => Char,
    i16 => Short,
    u32 => Int,
    i32 => Int,
    u64 => Long,
    i64 => Long,
    usize => Address,
}

impl sealed::Sealed for f32 {}
impl Carrier for f32 {
    const KIND: PrimitiveKind = PrimitiveKind::Float;

    #[inline]
    fn swap_bytes(self) -> Self {
        f32::from_bits(self.to_bits().swap_bytes())
    }
}

impl sealed::Sealed for f64 {}
impl Carrier for f64 {
    const KIND: PrimitiveKind = PrimitiveKind::Double;

    #[inline]
    fn swap_bytes(self) -> Self {
        f64::from_bits(self.to_bits().swap_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memseg_core::{PrimitiveClassifier, StandardClassifier};

    fn width_matches<T: Carrier>() -> bool {
        StandardClassifier.bit_width(T::KIND) as usize == T::SIZE * 8
    }

    #[test]
    fn carrier_sizes_agree_with_classifier() {
        assert!(width_matches::<u8>());
        assert!(width_matches::<i16>());
        assert!(width_matches::<u16>());
        assert!(width_matches::<i32>());
        assert!(width_matches::<i64>());
        assert!(width_matches::<f32>());
        assert!(width_matches::<f64>());
        assert!(width_matches::<usize>());
    }

    #[test]
    fn float_swap_is_bitwise() {
        let v = 1.5f64;
        assert_eq!(v.swap_bytes().swap_bytes(), v);
        assert_eq!(v.swap_bytes().to_bits(), v.to_bits().swap_bytes());
    }
}
