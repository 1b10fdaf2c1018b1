use std::fmt;
use std::marker::PhantomData;

/// Offset to an object written by a `PlanBuilder`.
///
/// The value is the object's distance from the end of the buffer, which stays
/// stable while the builder keeps prepending data. Only meaningful for the
/// builder that produced it.
pub struct WIPOffset<T> {
    value: usize,
    _marker: PhantomData<T>,
}

impl<T> WIPOffset<T> {
    pub(crate) const fn new(value: usize) -> Self {
        WIPOffset {
            value,
            _marker: PhantomData,
        }
    }

    pub const fn value(&self) -> usize {
        self.value
    }

    /// Reinterpret as an offset to a different kind of object.
    pub const fn cast<U>(self) -> WIPOffset<U> {
        WIPOffset::new(self.value)
    }
}

impl<T> Clone for WIPOffset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WIPOffset<T> {}

impl<T> PartialEq for WIPOffset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for WIPOffset<T> {}

impl<T> fmt::Debug for WIPOffset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WIPOffset").field(&self.value).finish()
    }
}

/// Marker for an encoded utf8 string.
#[derive(Debug)]
pub enum Utf8 {}

/// Marker for a vector whose elements are offsets to `T`.
#[derive(Debug)]
pub struct Vector<T>(PhantomData<T>);

/// Marker for a table with unknown schema.
#[derive(Debug)]
pub enum AnyTable {}
