//! Table layouts for the plan document.
//!
//! ```text
//! table SqlPlan {
//!   rel_plan_version: string;
//!   op_list: [PlanOp];
//!   exec_params: PlanMap;
//! }
//!
//! table PlanMap {
//!   keys: [string];
//!   values: [string];
//! }
//! ```
//!
//! `PlanOp` tables are opaque to the codec.

use plandoc_error::{PlanError, Result};

use crate::buffer::{VOffset, slot_voffset};
use crate::builder::{PlanBuilder, Utf8, Vector, WIPOffset};

/// Marker for the root plan table.
#[derive(Debug)]
pub enum SqlPlanTable {}

/// Marker for an operator table.
#[derive(Debug)]
pub enum PlanOpTable {}

/// Marker for a string map table.
#[derive(Debug)]
pub enum PlanMapTable {}

pub const VT_REL_PLAN_VERSION: VOffset = slot_voffset(0);
pub const VT_OP_LIST: VOffset = slot_voffset(1);
pub const VT_EXEC_PARAMS: VOffset = slot_voffset(2);

pub const VT_MAP_KEYS: VOffset = slot_voffset(0);
pub const VT_MAP_VALUES: VOffset = slot_voffset(1);

/// Child offsets for the root table. Absent fields are omitted from the
/// table entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlPlanArgs {
    pub rel_plan_version: Option<WIPOffset<Utf8>>,
    pub op_list: Option<WIPOffset<Vector<PlanOpTable>>>,
    pub exec_params: Option<WIPOffset<PlanMapTable>>,
}

/// Write the root `SqlPlan` table. All children must already be written.
pub fn create_sql_plan(
    builder: &mut PlanBuilder,
    args: &SqlPlanArgs,
) -> Result<WIPOffset<SqlPlanTable>> {
    builder.start_table()?;
    // Highest slot first, matching generated builders.
    if let Some(off) = args.exec_params {
        builder.push_slot_offset(VT_EXEC_PARAMS, off)?;
    }
    if let Some(off) = args.op_list {
        builder.push_slot_offset(VT_OP_LIST, off)?;
    }
    if let Some(off) = args.rel_plan_version {
        builder.push_slot_offset(VT_REL_PLAN_VERSION, off)?;
    }
    builder.end_table()
}

/// Write a `PlanMap` table from key/value pairs.
///
/// Entries are written in ascending key order, comparing keys bytewise, so
/// the same entries always encode the same way whatever order they're given
/// in. Duplicate keys are rejected.
pub fn create_plan_map<K, V>(
    builder: &mut PlanBuilder,
    entries: &[(K, V)],
) -> Result<WIPOffset<PlanMapTable>>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: Vec<(&str, &str)> = entries
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    sorted.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    if let Some(dup) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(PlanError::invalid_argument("Duplicate key in plan map")
            .with_field("key", dup[0].0));
    }

    let keys = sorted
        .iter()
        .map(|(k, _)| builder.create_string(k))
        .collect::<Result<Vec<_>>>()?;
    let values = sorted
        .iter()
        .map(|(_, v)| builder.create_string(v))
        .collect::<Result<Vec<_>>>()?;

    let keys = builder.create_vector_of_offsets(&keys)?;
    let values = builder.create_vector_of_offsets(&values)?;

    builder.start_table()?;
    builder.push_slot_offset(VT_MAP_VALUES, values)?;
    builder.push_slot_offset(VT_MAP_KEYS, keys)?;
    builder.end_table()
}
