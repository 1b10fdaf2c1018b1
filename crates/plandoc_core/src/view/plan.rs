use plandoc_error::{PlanError, Result};

use super::{PlanMapView, TableView, VectorView};
use crate::buffer::{VOffset, slot_voffset};
use crate::config::VersionPolicy;
use crate::schema::{VT_EXEC_PARAMS, VT_OP_LIST, VT_REL_PLAN_VERSION};

/// Lazy view of the root `SqlPlan` table.
///
/// Each accessor resolves only the offsets it needs, corruption is reported
/// by the accessor that first touches it.
#[derive(Debug, Clone, Copy)]
pub struct SqlPlanView<'a> {
    table: TableView<'a>,
}

impl<'a> SqlPlanView<'a> {
    pub fn new(table: TableView<'a>) -> Self {
        SqlPlanView { table }
    }

    pub fn table(&self) -> TableView<'a> {
        self.table
    }

    pub fn rel_plan_version(&self) -> Result<Option<&'a str>> {
        self.table.get_str(VT_REL_PLAN_VERSION)
    }

    /// Raw bytes of the version string, readable even when they aren't
    /// valid utf8.
    pub fn rel_plan_version_bytes(&self) -> Result<Option<&'a [u8]>> {
        self.table.get_bytes(VT_REL_PLAN_VERSION)
    }

    pub fn has_rel_plan_version(&self) -> Result<bool> {
        self.table.has_field(VT_REL_PLAN_VERSION)
    }

    /// Check the plan version against a consumer's policy.
    pub fn check_version(&self, policy: &VersionPolicy) -> Result<()> {
        policy.check(self.rel_plan_version()?)
    }

    pub fn op_list(&self) -> Result<Option<OpListView<'a>>> {
        Ok(self.table.get_vector(VT_OP_LIST)?.map(OpListView))
    }

    /// Number of operators. Zero when the list is absent or empty, use
    /// `has_op_list` to tell the two apart.
    pub fn op_list_len(&self) -> Result<usize> {
        Ok(self.op_list()?.map(|ops| ops.len()).unwrap_or(0))
    }

    pub fn has_op_list(&self) -> Result<bool> {
        self.table.has_field(VT_OP_LIST)
    }

    /// Get the operator at `idx`. An absent list behaves like an empty one.
    pub fn op(&self, idx: usize) -> Result<PlanOpView<'a>> {
        match self.op_list()? {
            Some(ops) => ops.get(idx),
            None => Err(op_out_of_range(idx, 0)),
        }
    }

    pub fn ops(&self) -> Result<OpIter<'a>> {
        Ok(OpIter {
            ops: self.op_list()?,
            idx: 0,
        })
    }

    pub fn exec_params(&self) -> Result<Option<PlanMapView<'a>>> {
        Ok(self.table.get_table(VT_EXEC_PARAMS)?.map(PlanMapView::new))
    }

    pub fn has_exec_params(&self) -> Result<bool> {
        self.table.has_field(VT_EXEC_PARAMS)
    }
}

fn op_out_of_range(idx: usize, len: usize) -> PlanError {
    PlanError::invalid_argument("Operator index out of range")
        .with_field("index", idx)
        .with_field("len", len)
}

/// The encoded operator list.
#[derive(Debug, Clone, Copy)]
pub struct OpListView<'a>(VectorView<'a>);

impl<'a> OpListView<'a> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Result<PlanOpView<'a>> {
        if idx >= self.len() {
            return Err(op_out_of_range(idx, self.len()));
        }
        Ok(PlanOpView::new(self.0.get_table(idx)?))
    }

    pub fn iter(&self) -> OpIter<'a> {
        OpIter {
            ops: Some(*self),
            idx: 0,
        }
    }
}

#[derive(Debug)]
pub struct OpIter<'a> {
    ops: Option<OpListView<'a>>,
    idx: usize,
}

impl<'a> Iterator for OpIter<'a> {
    type Item = Result<PlanOpView<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let ops = self.ops.as_ref()?;
        if self.idx >= ops.len() {
            return None;
        }
        let op = ops.get(self.idx);
        self.idx += 1;
        Some(op)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .ops
            .as_ref()
            .map(|ops| ops.len() - self.idx)
            .unwrap_or(0);
        (remaining, Some(remaining))
    }
}

/// Opaque operator table.
///
/// The codec doesn't know operator schemas, typed field access goes through
/// `table()`.
#[derive(Debug, Clone, Copy)]
pub struct PlanOpView<'a> {
    table: TableView<'a>,
}

impl<'a> PlanOpView<'a> {
    pub fn new(table: TableView<'a>) -> Self {
        PlanOpView { table }
    }

    pub fn table(&self) -> TableView<'a> {
        self.table
    }

    pub fn has_field(&self, voffset: VOffset) -> Result<bool> {
        self.table.has_field(voffset)
    }

    /// Number of slots in the operator's vtable, present or not.
    pub fn slot_count(&self) -> Result<usize> {
        Ok(self.table.vtable()?.num_slots())
    }

    /// Indices of slots holding a value.
    pub fn present_slots(&self) -> Result<Vec<u16>> {
        let vtable = self.table.vtable()?;
        let mut slots = Vec::new();
        for slot in 0..vtable.num_slots() as u16 {
            if vtable.get(slot_voffset(slot))? != 0 {
                slots.push(slot);
            }
        }
        Ok(slots)
    }

    /// Size in bytes of the operator's inline data.
    pub fn inline_size(&self) -> Result<usize> {
        Ok(self.table.vtable()?.table_len())
    }
}
