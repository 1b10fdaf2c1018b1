//! Plan document builder.
//!
//! `PlanBuilder` drives a `flatbuffers::FlatBufferBuilder`. Objects are
//! prepended to the buffer, so children must be written before the tables
//! that reference them. The inner builder asserts on misuse, every call is
//! checked here first so misuse surfaces as `BuilderMisuse` instead.

mod offset;

use std::fmt;

use flatbuffers::{FlatBufferBuilder, TableUnfinishedWIPOffset, UnionWIPOffset};
pub use offset::{AnyTable, Utf8, Vector, WIPOffset};
use plandoc_error::{PlanError, Result};
use tracing::debug;

use crate::buffer::{
    MAX_BUFFER_SIZE,
    SIZE_SOFFSET,
    SIZE_UOFFSET,
    SIZE_VOFFSET,
    Scalar,
    VOffset,
    is_field_voffset,
    slot_voffset,
};

const DEFAULT_CAPACITY: usize = 1024;

/// Upper bound on alignment padding inserted by a single write.
const MAX_PADDING: usize = 8;

type RawOffset = flatbuffers::WIPOffset<UnionWIPOffset>;

/// Writes a single plan document.
///
/// A builder is a single writer session. It may be reused for another
/// document after `reset`.
pub struct PlanBuilder {
    fbb: FlatBufferBuilder<'static>,
    /// Start of the table currently being written.
    table: Option<flatbuffers::WIPOffset<TableUnfinishedWIPOffset>>,
    /// Slots written to the current table.
    slots: Vec<VOffset>,
    finished: bool,
}

impl fmt::Debug for PlanBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanBuilder")
            .field("used_space", &self.used_space())
            .field("in_table", &self.table.is_some())
            .field("slots", &self.slots)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        PlanBuilder {
            fbb: FlatBufferBuilder::with_capacity(capacity.min(MAX_BUFFER_SIZE)),
            table: None,
            slots: Vec::new(),
            finished: false,
        }
    }

    /// Reset the builder to write a new document, keeping the allocation.
    pub fn reset(&mut self) {
        if self.table.is_some() {
            // The inner builder keeps the field locations of an unfinished
            // table across a reset.
            self.fbb = FlatBufferBuilder::with_capacity(DEFAULT_CAPACITY);
        } else {
            self.fbb.reset();
        }
        self.table = None;
        self.slots.clear();
        self.finished = false;
    }

    /// Number of bytes written so far.
    pub fn used_space(&self) -> usize {
        self.fbb.unfinished_data().len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Write a string, returning its offset.
    pub fn create_string(&mut self, s: &str) -> Result<WIPOffset<Utf8>> {
        self.check_writable("create_string")?;
        self.check_not_nested("create_string")?;
        // Length prefix, bytes, and a trailing nul.
        self.check_capacity(SIZE_UOFFSET + s.len() + 1)?;

        let off = self.fbb.create_string(s);
        Ok(WIPOffset::new(off.value() as usize))
    }

    /// Write a vector of offsets to previously written objects.
    pub fn create_vector_of_offsets<T>(
        &mut self,
        items: &[WIPOffset<T>],
    ) -> Result<WIPOffset<Vector<T>>> {
        self.check_writable("create_vector")?;
        self.check_not_nested("create_vector")?;

        let byte_len = items
            .len()
            .checked_mul(SIZE_UOFFSET)
            .ok_or_else(|| PlanError::invalid_argument("Vector too long to encode"))?;
        self.check_capacity(byte_len + SIZE_UOFFSET)?;

        let raw = items
            .iter()
            .map(|item| self.raw_offset(*item))
            .collect::<Result<Vec<_>>>()?;
        let off = self.fbb.create_vector(&raw);

        Ok(WIPOffset::new(off.value() as usize))
    }

    /// Write each string then a vector referencing them, in order.
    pub fn create_vector_of_strings<S>(&mut self, items: &[S]) -> Result<WIPOffset<Vector<Utf8>>>
    where
        S: AsRef<str>,
    {
        let offsets = items
            .iter()
            .map(|s| self.create_string(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.create_vector_of_offsets(&offsets)
    }

    /// Begin writing a table. Fields are added with the `push_slot_*`
    /// methods, and the table is completed with `end_table`.
    pub fn start_table(&mut self) -> Result<()> {
        self.check_writable("start_table")?;
        if self.table.is_some() {
            return Err(PlanError::builder_misuse(
                "Cannot start a table while another table is in progress",
            ));
        }
        self.slots.clear();
        self.table = Some(self.fbb.start_table());
        Ok(())
    }

    /// Add an offset field to the current table.
    pub fn push_slot_offset<T>(&mut self, voffset: VOffset, off: WIPOffset<T>) -> Result<()> {
        self.check_slot(voffset)?;
        let off = self.raw_offset(off)?;
        self.check_capacity(SIZE_UOFFSET)?;

        self.fbb.push_slot_always(voffset, off);
        self.slots.push(voffset);
        Ok(())
    }

    /// Add a scalar field, omitting it when equal to the schema default.
    pub fn push_slot_scalar<T: Scalar>(
        &mut self,
        voffset: VOffset,
        value: T,
        default: T,
    ) -> Result<()> {
        if value == default {
            // Still validate that we're inside a table.
            return self.check_slot(voffset);
        }
        self.push_slot_scalar_always(voffset, value)
    }

    /// Add a scalar field even when it's equal to the default.
    pub fn push_slot_scalar_always<T: Scalar>(&mut self, voffset: VOffset, value: T) -> Result<()> {
        self.check_slot(voffset)?;
        self.check_capacity(T::SIZE)?;

        self.fbb.push_slot_always(voffset, value);
        self.slots.push(voffset);
        Ok(())
    }

    /// Finish the current table, writing (or reusing) its vtable.
    pub fn end_table<T>(&mut self) -> Result<WIPOffset<T>> {
        self.check_writable("end_table")?;
        let start = self.table.ok_or_else(|| {
            PlanError::builder_misuse("Cannot end a table that was never started")
        })?;

        // Inline size including the aligned vtable offset must fit in a u16.
        let used = self.used_space();
        let inline_size =
            used + padding_bytes(used, SIZE_SOFFSET) + SIZE_SOFFSET - start.value() as usize;
        if inline_size > u16::MAX as usize {
            return Err(PlanError::invalid_argument("Table too large to encode")
                .with_field("inline_size", inline_size));
        }

        let vtable_len = self
            .slots
            .iter()
            .map(|&voffset| voffset as usize + SIZE_VOFFSET)
            .max()
            .unwrap_or(slot_voffset(0) as usize);
        self.check_capacity(SIZE_SOFFSET + vtable_len)?;

        let off = self.fbb.end_table(start);
        self.table = None;
        self.slots.clear();

        Ok(WIPOffset::new(off.value() as usize))
    }

    /// Finish the document with the given root table.
    pub fn finish<T>(&mut self, root: WIPOffset<T>) -> Result<()> {
        self.check_writable("finish")?;
        self.check_not_nested("finish")?;
        let root = self.raw_offset(root)?;
        self.check_capacity(SIZE_UOFFSET)?;

        self.fbb.finish(root, None);
        self.finished = true;

        debug!(bytes = self.used_space(), "finished plan document");

        Ok(())
    }

    /// Get the encoded document.
    pub fn finished_data(&self) -> Result<&[u8]> {
        self.check_finished()?;
        Ok(self.fbb.finished_data())
    }

    /// Consume the builder returning the encoded document.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.check_finished()?;
        let (mut buf, head) = self.fbb.collapse();
        Ok(buf.split_off(head))
    }

    fn check_writable(&self, op: &'static str) -> Result<()> {
        if self.finished {
            return Err(PlanError::builder_misuse("Builder already finished").with_field("op", op));
        }
        Ok(())
    }

    fn check_finished(&self) -> Result<()> {
        if !self.finished {
            return Err(PlanError::builder_misuse(
                "Cannot read data from an unfinished builder",
            ));
        }
        Ok(())
    }

    fn check_not_nested(&self, op: &'static str) -> Result<()> {
        if self.table.is_some() {
            return Err(PlanError::builder_misuse(
                "Cannot write a child object while a table is in progress",
            )
            .with_field("op", op));
        }
        Ok(())
    }

    fn check_slot(&self, voffset: VOffset) -> Result<()> {
        self.check_writable("push_slot")?;
        if self.table.is_none() {
            return Err(PlanError::builder_misuse(
                "Cannot add a field outside of a table",
            ));
        }
        if !is_field_voffset(voffset) {
            return Err(PlanError::invalid_argument("Invalid vtable offset")
                .with_field("voffset", voffset));
        }
        if self.slots.contains(&voffset) {
            return Err(PlanError::builder_misuse("Field written twice")
                .with_field("voffset", voffset));
        }
        Ok(())
    }

    /// Convert an offset for the inner builder, rejecting offsets that can't
    /// have come from this builder.
    fn raw_offset<T>(&self, off: WIPOffset<T>) -> Result<RawOffset> {
        let used = self.used_space();
        if off.value() == 0 || off.value() > used {
            return Err(PlanError::builder_misuse(
                "Offset does not refer to an object written by this builder",
            )
            .with_field("offset", off.value())
            .with_field("used", used));
        }
        Ok(flatbuffers::WIPOffset::new(off.value() as u32))
    }

    /// Check that `additional` bytes plus alignment padding still fit.
    fn check_capacity(&self, additional: usize) -> Result<()> {
        let used = self.used_space();
        match used
            .checked_add(additional)
            .and_then(|n| n.checked_add(MAX_PADDING))
        {
            Some(total) if total <= MAX_BUFFER_SIZE => Ok(()),
            _ => Err(
                PlanError::invalid_argument("Plan document exceeds maximum buffer size")
                    .with_field("used", used)
                    .with_field("additional", additional),
            ),
        }
    }
}

/// Number of padding bytes needed for `buf_size` to be a multiple of
/// `alignment`. Alignment must be a power of two.
const fn padding_bytes(buf_size: usize, alignment: usize) -> usize {
    (!buf_size).wrapping_add(1) & (alignment - 1)
}

#[cfg(test)]
mod tests {
    use plandoc_error::ErrorKind;

    use super::*;
    use crate::buffer::{follow_offset, read_scalar, read_str, vtable_pos};

    #[test]
    fn padding() {
        assert_eq!(0, padding_bytes(0, 4));
        assert_eq!(3, padding_bytes(1, 4));
        assert_eq!(1, padding_bytes(3, 4));
        assert_eq!(0, padding_bytes(8, 8));
        assert_eq!(0, padding_bytes(5, 1));
    }

    #[test]
    fn string_layout() {
        let mut builder = PlanBuilder::new();
        let s = builder.create_string("v2").unwrap();
        builder.start_table().unwrap();
        builder.push_slot_offset(4, s).unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        let buf = builder.finished_data().unwrap();
        assert_eq!(0, buf.len() % 4);

        let table = follow_offset(buf, 0).unwrap();
        let vtable = vtable_pos(buf, table).unwrap();
        assert_eq!(6, read_scalar::<u16>(buf, vtable).unwrap());
        let field = read_scalar::<u16>(buf, vtable + 4).unwrap() as usize;
        let s = follow_offset(buf, table + field).unwrap();
        assert_eq!("v2", read_str(buf, s).unwrap());
        // Trailing nul after the string bytes.
        assert_eq!(0, buf[s + 4 + 2]);
    }

    #[test]
    fn empty_table_vtable_is_header_only() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        let buf = builder.finished_data().unwrap();
        let table = follow_offset(buf, 0).unwrap();
        let vtable = vtable_pos(buf, table).unwrap();
        assert_eq!(4, read_scalar::<u16>(buf, vtable).unwrap());
        assert_eq!(4, read_scalar::<u16>(buf, vtable + 2).unwrap());
    }

    #[test]
    fn identical_vtables_are_shared() {
        let mut builder = PlanBuilder::new();
        let mut tables = Vec::new();
        for i in 1..4 {
            // Two 4 byte fields keep every table the same inline size, so the
            // vtables are byte identical.
            builder.start_table().unwrap();
            builder.push_slot_scalar::<i32>(4, i, 0).unwrap();
            builder.push_slot_scalar::<i32>(6, i * 10, 0).unwrap();
            tables.push(builder.end_table::<AnyTable>().unwrap());
        }
        let vec = builder.create_vector_of_offsets(&tables).unwrap();
        builder.start_table().unwrap();
        builder.push_slot_offset(4, vec).unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        let buf = builder.finished_data().unwrap();
        let root = follow_offset(buf, 0).unwrap();
        let root_vt = vtable_pos(buf, root).unwrap();
        let vec_field = read_scalar::<u16>(buf, root_vt + 4).unwrap() as usize;
        let vec_pos = follow_offset(buf, root + vec_field).unwrap();
        assert_eq!(3, read_scalar::<u32>(buf, vec_pos).unwrap());

        let vtables: Vec<_> = (0..3)
            .map(|i| {
                let elem = vec_pos + 4 + i * 4;
                let table = follow_offset(buf, elem).unwrap();
                vtable_pos(buf, table).unwrap()
            })
            .collect();
        assert_eq!(vtables[0], vtables[1]);
        assert_eq!(vtables[1], vtables[2]);
    }

    #[test]
    fn default_scalar_is_omitted() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        builder.push_slot_scalar::<i64>(4, 0, 0).unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        let buf = builder.finished_data().unwrap();
        let table = follow_offset(buf, 0).unwrap();
        let vtable = vtable_pos(buf, table).unwrap();
        assert_eq!(4, read_scalar::<u16>(buf, vtable).unwrap());
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut builder = PlanBuilder::with_capacity(8);
        let long = "x".repeat(300);
        let s = builder.create_string(&long).unwrap();
        builder.start_table().unwrap();
        builder.push_slot_offset(4, s).unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        let buf = builder.into_bytes().unwrap();
        let table = follow_offset(&buf, 0).unwrap();
        let vtable = vtable_pos(&buf, table).unwrap();
        let field = read_scalar::<u16>(&buf, vtable + 4).unwrap() as usize;
        let s = follow_offset(&buf, table + field).unwrap();
        assert_eq!(long, read_str(&buf, s).unwrap());
    }

    #[test]
    fn end_without_start() {
        let mut builder = PlanBuilder::new();
        let err = builder.end_table::<AnyTable>().unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn nested_tables_rejected() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        let err = builder.start_table().unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn child_inside_table_rejected() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        let err = builder.create_string("late").unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
        assert_eq!(Some("create_string"), err.get_field("op"));
    }

    #[test]
    fn field_outside_table_rejected() {
        let mut builder = PlanBuilder::new();
        let err = builder.push_slot_scalar_always::<u8>(4, 1).unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        builder.push_slot_scalar_always::<u8>(4, 1).unwrap();
        let err = builder.push_slot_scalar_always::<u8>(4, 2).unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn bad_voffset_rejected() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        let err = builder.push_slot_scalar_always::<u8>(5, 1).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn write_after_finish_rejected() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        let err = builder.create_string("after").unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
        let err = builder.finish(root).unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn finish_inside_table_rejected() {
        let mut builder = PlanBuilder::new();
        let s = builder.create_string("a").unwrap();
        builder.start_table().unwrap();
        let err = builder.finish(s).unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn data_before_finish_rejected() {
        let builder = PlanBuilder::new();
        let err = builder.finished_data().unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn foreign_offset_rejected() {
        let mut other = PlanBuilder::new();
        let _ = other.create_string("padding padding padding").unwrap();
        let foreign = other.create_string("foreign").unwrap();

        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        let err = builder.push_slot_offset(4, foreign).unwrap_err();
        assert_eq!(ErrorKind::BuilderMisuse, err.kind());
    }

    #[test]
    fn reset_allows_reuse() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();
        let first = builder.finished_data().unwrap().to_vec();

        builder.reset();
        assert_eq!(0, builder.used_space());
        builder.start_table().unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        assert_eq!(first, builder.finished_data().unwrap());
    }

    #[test]
    fn reset_inside_table() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        builder.push_slot_scalar_always::<i32>(4, 7).unwrap();
        builder.reset();

        builder.start_table().unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();

        // The abandoned field must not leak into the new table's vtable.
        let buf = builder.finished_data().unwrap();
        let table = follow_offset(buf, 0).unwrap();
        let vtable = vtable_pos(buf, table).unwrap();
        assert_eq!(4, read_scalar::<u16>(buf, vtable).unwrap());
    }

    #[test]
    fn oversized_table_rejected() {
        let mut builder = PlanBuilder::new();
        builder.start_table().unwrap();
        // 9000 eight byte fields overflow the 16 bit inline size.
        for slot in 0..9000 {
            builder
                .push_slot_scalar_always::<i64>(slot_voffset(slot), 1)
                .unwrap();
        }
        let err = builder.end_table::<AnyTable>().unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }
}
