use plandoc_error::{PlanError, Result};

use crate::buffer::{
    SIZE_SOFFSET,
    SIZE_UOFFSET,
    SIZE_VOFFSET,
    Scalar,
    VOffset,
    check_range,
    follow_offset,
    is_field_voffset,
    read_bytes,
    read_scalar,
    read_str,
    voffset_slot,
    vtable_pos,
};

/// A table's vtable.
#[derive(Debug, Clone, Copy)]
pub struct VTable<'a> {
    buf: &'a [u8],
    pos: usize,
    len: u16,
    table_len: u16,
}

impl<'a> VTable<'a> {
    /// Read and check the vtable header at `pos`. Every entry of the vtable
    /// is checked to be in bounds.
    pub fn read(buf: &'a [u8], pos: usize) -> Result<Self> {
        let len = read_scalar::<u16>(buf, pos)?;
        if (len as usize) < 2 * SIZE_VOFFSET || len as usize % SIZE_VOFFSET != 0 {
            return Err(PlanError::corrupt("Invalid vtable length")
                .with_field("pos", pos)
                .with_field("len", len));
        }
        check_range(buf, pos, len as usize)?;

        let table_len = read_scalar::<u16>(buf, pos + SIZE_VOFFSET)?;
        if (table_len as usize) < SIZE_SOFFSET {
            return Err(PlanError::corrupt("Invalid table length")
                .with_field("pos", pos)
                .with_field("table_len", table_len));
        }

        Ok(VTable {
            buf,
            pos,
            len,
            table_len,
        })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Length of the vtable in bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Size of the table's inline data, including the vtable offset.
    pub fn table_len(&self) -> usize {
        self.table_len as usize
    }

    /// Number of slots described by this vtable.
    pub fn num_slots(&self) -> usize {
        (self.len() - 2 * SIZE_VOFFSET) / SIZE_VOFFSET
    }

    /// Offset of a field within its table, zero if absent.
    ///
    /// `voffset` must address a field slot. Slots past the end of the vtable
    /// are absent.
    pub fn get(&self, voffset: VOffset) -> Result<u16> {
        if !is_field_voffset(voffset) {
            return Err(PlanError::invalid_argument("Invalid vtable offset")
                .with_field("voffset", voffset));
        }
        let idx = voffset as usize;
        if idx + SIZE_VOFFSET > self.len() {
            return Ok(0);
        }
        Ok(u16::read_le(&self.buf[self.pos + idx..]))
    }
}

/// Lazy view of a table.
///
/// Construction only checks that the table header is readable. Fields are
/// resolved and checked when accessed.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TableView<'a> {
    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        read_scalar::<i32>(buf, pos)?;
        Ok(TableView { buf, pos })
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn vtable(&self) -> Result<VTable<'a>> {
        VTable::read(self.buf, vtable_pos(self.buf, self.pos)?)
    }

    /// Absolute position of a field holding a value of `size` bytes, or
    /// `None` if the field is absent.
    fn field_pos(&self, voffset: VOffset, size: usize) -> Result<Option<usize>> {
        let vtable = self.vtable()?;
        let field = vtable.get(voffset)? as usize;
        if field == 0 {
            return Ok(None);
        }
        if field < SIZE_SOFFSET || field + size > vtable.table_len() {
            return Err(PlanError::corrupt("Field outside of table")
                .with_field("table_pos", self.pos)
                .with_field("slot", voffset_slot(voffset))
                .with_field("field_offset", field));
        }
        Ok(Some(self.pos + field))
    }

    pub fn has_field(&self, voffset: VOffset) -> Result<bool> {
        Ok(self.vtable()?.get(voffset)? != 0)
    }

    /// Get a scalar field, returning `default` when absent.
    pub fn get_scalar<T: Scalar>(&self, voffset: VOffset, default: T) -> Result<T> {
        Ok(self.get_scalar_opt(voffset)?.unwrap_or(default))
    }

    pub fn get_scalar_opt<T: Scalar>(&self, voffset: VOffset) -> Result<Option<T>> {
        match self.field_pos(voffset, T::SIZE)? {
            Some(pos) => Ok(Some(read_scalar(self.buf, pos)?)),
            None => Ok(None),
        }
    }

    pub fn get_str(&self, voffset: VOffset) -> Result<Option<&'a str>> {
        match self.field_pos(voffset, SIZE_UOFFSET)? {
            Some(pos) => Ok(Some(read_str(self.buf, follow_offset(self.buf, pos)?)?)),
            None => Ok(None),
        }
    }

    /// Get the raw bytes of a string field without checking they're utf8.
    pub fn get_bytes(&self, voffset: VOffset) -> Result<Option<&'a [u8]>> {
        match self.field_pos(voffset, SIZE_UOFFSET)? {
            Some(pos) => Ok(Some(read_bytes(self.buf, follow_offset(self.buf, pos)?)?)),
            None => Ok(None),
        }
    }

    pub fn get_table(&self, voffset: VOffset) -> Result<Option<TableView<'a>>> {
        match self.field_pos(voffset, SIZE_UOFFSET)? {
            Some(pos) => Ok(Some(TableView::at(
                self.buf,
                follow_offset(self.buf, pos)?,
            )?)),
            None => Ok(None),
        }
    }

    pub fn get_vector(&self, voffset: VOffset) -> Result<Option<VectorView<'a>>> {
        match self.field_pos(voffset, SIZE_UOFFSET)? {
            Some(pos) => Ok(Some(VectorView::at(
                self.buf,
                follow_offset(self.buf, pos)?,
            )?)),
            None => Ok(None),
        }
    }
}

/// Lazy view of a vector of offsets to strings or tables.
#[derive(Debug, Clone, Copy)]
pub struct VectorView<'a> {
    buf: &'a [u8],
    /// Position of the first element.
    start: usize,
    len: usize,
}

impl<'a> VectorView<'a> {
    /// Read the vector header at `pos`. The element region is checked to be
    /// in bounds, elements themselves are resolved on access.
    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        let len = read_scalar::<u32>(buf, pos)? as usize;
        let start = pos + SIZE_UOFFSET;
        let byte_len = len.checked_mul(SIZE_UOFFSET).ok_or_else(|| {
            PlanError::corrupt("Vector length overflows").with_field("pos", pos)
        })?;
        check_range(buf, start, byte_len)?;
        Ok(VectorView { buf, start, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Position of the offset stored for element `idx`.
    fn elem_pos(&self, idx: usize) -> Result<usize> {
        if idx >= self.len {
            return Err(PlanError::invalid_argument("Vector index out of range")
                .with_field("index", idx)
                .with_field("len", self.len));
        }
        Ok(self.start + idx * SIZE_UOFFSET)
    }

    pub fn get_table(&self, idx: usize) -> Result<TableView<'a>> {
        let pos = follow_offset(self.buf, self.elem_pos(idx)?)?;
        TableView::at(self.buf, pos)
    }

    pub fn get_str(&self, idx: usize) -> Result<&'a str> {
        let pos = follow_offset(self.buf, self.elem_pos(idx)?)?;
        read_str(self.buf, pos)
    }

    /// Get the raw bytes of a string element.
    pub fn get_bytes(&self, idx: usize) -> Result<&'a [u8]> {
        let pos = follow_offset(self.buf, self.elem_pos(idx)?)?;
        read_bytes(self.buf, pos)
    }
}

#[cfg(test)]
mod tests {
    use plandoc_error::ErrorKind;

    use super::*;
    use crate::builder::{AnyTable, PlanBuilder};

    fn build_table() -> Vec<u8> {
        let mut builder = PlanBuilder::new();
        let name = builder.create_string("scan").unwrap();
        let cols = builder.create_vector_of_strings(&["a", "b"]).unwrap();
        builder.start_table().unwrap();
        builder.push_slot_scalar::<i64>(4, 42, 0).unwrap();
        builder.push_slot_offset(6, name).unwrap();
        builder.push_slot_offset(10, cols).unwrap();
        let root = builder.end_table::<AnyTable>().unwrap();
        builder.finish(root).unwrap();
        builder.into_bytes().unwrap()
    }

    fn root(buf: &[u8]) -> TableView<'_> {
        TableView::at(buf, follow_offset(buf, 0).unwrap()).unwrap()
    }

    #[test]
    fn read_fields() {
        let buf = build_table();
        let table = root(&buf);

        assert_eq!(42, table.get_scalar::<i64>(4, 0).unwrap());
        assert_eq!(Some("scan"), table.get_str(6).unwrap());
        assert!(!table.has_field(8).unwrap());
        assert_eq!(None, table.get_str(8).unwrap());

        let cols = table.get_vector(10).unwrap().unwrap();
        assert_eq!(2, cols.len());
        assert_eq!("a", cols.get_str(0).unwrap());
        assert_eq!("b", cols.get_str(1).unwrap());
    }

    #[test]
    fn slots_past_vtable_are_absent() {
        let buf = build_table();
        let table = root(&buf);
        let vtable = table.vtable().unwrap();
        assert_eq!(4, vtable.num_slots());
        assert!(!table.has_field(40).unwrap());
        assert_eq!(7, table.get_scalar::<i32>(40, 7).unwrap());
    }

    #[test]
    fn non_field_voffset_is_invalid_argument() {
        let buf = build_table();
        let table = root(&buf);

        // Header entries and odd offsets don't address a field.
        for voffset in [0, 2, 5] {
            let err = table.has_field(voffset).unwrap_err();
            assert_eq!(ErrorKind::InvalidArgument, err.kind(), "voffset {voffset}");
            let err = table.get_str(voffset).unwrap_err();
            assert_eq!(ErrorKind::InvalidArgument, err.kind(), "voffset {voffset}");
        }
        assert_eq!(ErrorKind::InvalidArgument, table.vtable().unwrap().get(3).unwrap_err().kind());
        // Byte 2 of the vtable is the inline size, not a field.
        let err = table.get_scalar::<i32>(2, 0).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn string_bytes_skip_utf8_check() {
        let mut buf = build_table();
        let table = root(&buf);
        let field = table.vtable().unwrap().get(6).unwrap() as usize;
        let name = follow_offset(&buf, table.position() + field).unwrap();
        buf[name + 4] = 0xff;

        let table = root(&buf);
        assert!(table.get_str(6).unwrap_err().is_corrupt());
        assert_eq!(Some(&b"\xffcan"[..]), table.get_bytes(6).unwrap());
        assert_eq!(None, table.get_bytes(8).unwrap());

        let cols = table.get_vector(10).unwrap().unwrap();
        assert_eq!(b"b", cols.get_bytes(1).unwrap());
        let err = cols.get_bytes(2).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn vector_index_out_of_range() {
        let buf = build_table();
        let cols = root(&buf).get_vector(10).unwrap().unwrap();
        let err = cols.get_str(2).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn field_past_table_is_corrupt() {
        let mut buf = build_table();
        let table = root(&buf);
        let vtable = table.vtable().unwrap();
        let entry = vtable.position() + 6;
        // Point the name field past the inline table data.
        let bad = vtable.table_len() as u16;
        buf[entry..entry + 2].copy_from_slice(&bad.to_le_bytes());

        let err = root(&buf).get_str(6).unwrap_err();
        assert!(err.is_corrupt());
        assert_eq!(Some("1"), err.get_field("slot"));
    }

    #[test]
    fn vector_past_buffer_is_corrupt() {
        let mut buf = build_table();
        let table = root(&buf);
        let vtable = table.vtable().unwrap();
        let field = vtable.get(10).unwrap() as usize;
        let vec_pos = follow_offset(&buf, table.position() + field).unwrap();
        buf[vec_pos..vec_pos + 4].copy_from_slice(&1000u32.to_le_bytes());

        let err = root(&buf).get_vector(10).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn bad_vtable_length_is_corrupt() {
        let mut buf = build_table();
        let vtable_pos = root(&buf).vtable().unwrap().position();
        buf[vtable_pos..vtable_pos + 2].copy_from_slice(&3u16.to_le_bytes());

        let err = root(&buf).get_str(6).unwrap_err();
        assert!(err.is_corrupt());
    }
}
