use std::fmt::Debug;

use flatbuffers::Push;

/// Fixed width little-endian values that can be stored inline in a table or
/// vector.
pub trait Scalar: Copy + PartialEq + Debug + Push<Output = Self> {
    /// Size in bytes. Also the required alignment.
    const SIZE: usize;

    /// Read from the first `SIZE` bytes of `bytes`.
    ///
    /// Callers must have bounds checked the slice.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn read_le(bytes: &[u8]) -> Self {
                    let mut arr = [0; std::mem::size_of::<$ty>()];
                    arr.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(arr)
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Scalar for bool {
    const SIZE: usize = 1;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_le_layout() {
        let bytes = [0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(-2, i64::read_le(&bytes));
    }

    #[test]
    fn bool_nonzero_is_true() {
        assert!(bool::read_le(&[2]));
        assert!(!bool::read_le(&[0]));
    }

    #[test]
    fn f64_bits() {
        assert_eq!(1.5, f64::read_le(&1.5f64.to_le_bytes()));
    }
}
