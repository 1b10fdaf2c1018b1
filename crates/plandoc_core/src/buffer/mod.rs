//! Bounds checked primitives for reading a plan document buffer.
//!
//! Every read goes through `check_range` and `check_alignment`. Positions are
//! absolute byte positions from the start of the buffer, alignment is also
//! relative to the start of the buffer.

mod scalar;

pub use scalar::Scalar;

use plandoc_error::{PlanError, Result};

/// Byte offset of a field inside a table's vtable.
pub type VOffset = u16;

pub const SIZE_UOFFSET: usize = 4;
pub const SIZE_SOFFSET: usize = 4;
pub const SIZE_VOFFSET: usize = 2;

/// Largest buffer that can be addressed with 32 bit signed offsets.
pub const MAX_BUFFER_SIZE: usize = i32::MAX as usize;

/// Convert a zero based field index into its vtable byte offset.
///
/// The first two vtable entries hold the vtable length and the table's inline
/// size, so slot 0 lives at byte 4.
pub const fn slot_voffset(slot: u16) -> VOffset {
    (2 + slot) * SIZE_VOFFSET as u16
}

/// Inverse of `slot_voffset`.
pub const fn voffset_slot(voffset: VOffset) -> u16 {
    voffset / SIZE_VOFFSET as u16 - 2
}

/// Whether `voffset` addresses a field slot: past the vtable header, on a
/// slot boundary, and small enough for the vtable length to be encoded.
pub const fn is_field_voffset(voffset: VOffset) -> bool {
    voffset >= slot_voffset(0)
        && voffset as usize % SIZE_VOFFSET == 0
        && voffset as usize + SIZE_VOFFSET <= u16::MAX as usize
}

/// A forward unsigned offset stored in the buffer.
///
/// The target is computed relative to the position the offset was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelOffset(u32);

impl RelOffset {
    pub const fn new(value: u32) -> Self {
        RelOffset(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Read an offset stored at `pos`.
    pub fn read(buf: &[u8], pos: usize) -> Result<Self> {
        read_scalar::<u32>(buf, pos).map(RelOffset)
    }

    /// Resolve this offset, having been read from `from`, into an absolute
    /// position.
    ///
    /// The resolved position must lie inside the buffer. A zero offset would
    /// point at itself and is never produced by an encoder.
    pub fn resolve(self, buf: &[u8], from: usize) -> Result<usize> {
        if self.0 == 0 {
            return Err(PlanError::corrupt("Zero offset").with_field("pos", from));
        }

        match from.checked_add(self.0 as usize) {
            Some(target) if target < buf.len() => Ok(target),
            _ => Err(PlanError::corrupt("Offset points outside of buffer")
                .with_field("pos", from)
                .with_field("offset", self.0)
                .with_field("buffer_len", buf.len())),
        }
    }
}

/// Read an offset at `pos` and resolve it.
pub fn follow_offset(buf: &[u8], pos: usize) -> Result<usize> {
    RelOffset::read(buf, pos)?.resolve(buf, pos)
}

/// Check that `len` bytes starting at `pos` are in the buffer.
pub fn check_range(buf: &[u8], pos: usize, len: usize) -> Result<()> {
    match pos.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(()),
        _ => Err(PlanError::corrupt("Range outside of buffer")
            .with_field("pos", pos)
            .with_field("len", len)
            .with_field("buffer_len", buf.len())),
    }
}

pub fn check_alignment(pos: usize, align: usize) -> Result<()> {
    if pos % align != 0 {
        return Err(PlanError::corrupt("Misaligned read")
            .with_field("pos", pos)
            .with_field("alignment", align));
    }
    Ok(())
}

pub fn read_scalar<T: Scalar>(buf: &[u8], pos: usize) -> Result<T> {
    check_alignment(pos, T::SIZE)?;
    check_range(buf, pos, T::SIZE)?;
    Ok(T::read_le(&buf[pos..]))
}

/// Resolve the vtable position for a table starting at `table_pos`.
///
/// Tables start with a signed offset, the vtable lives at `table_pos -
/// soffset`.
pub fn vtable_pos(buf: &[u8], table_pos: usize) -> Result<usize> {
    let soffset = read_scalar::<i32>(buf, table_pos)?;
    let pos = table_pos as i64 - soffset as i64;
    if pos < 0 || pos as usize >= buf.len() {
        return Err(PlanError::corrupt("VTable outside of buffer")
            .with_field("table_pos", table_pos)
            .with_field("soffset", soffset));
    }
    Ok(pos as usize)
}

/// Read the bytes of a length prefixed string starting at `pos` without
/// checking the encoding.
pub fn read_bytes(buf: &[u8], pos: usize) -> Result<&[u8]> {
    let len = read_scalar::<u32>(buf, pos)? as usize;
    let start = pos + SIZE_UOFFSET;
    check_range(buf, start, len)?;
    Ok(&buf[start..start + len])
}

/// Read a length prefixed utf8 string starting at `pos`.
pub fn read_str(buf: &[u8], pos: usize) -> Result<&str> {
    std::str::from_utf8(read_bytes(buf, pos)?)
        .map_err(|e| PlanError::from(e).with_field("pos", pos))
}
