//! Utilities for testing plan documents.
//!
//! `TestOp` is a minimal operator schema used by tests and the command line
//! fixtures:
//!
//! ```text
//! table TestOp {
//!   id: long;
//!   name: string;
//! }
//! ```

use flatbuffers::{ForwardsUOffset, InvalidFlatbuffer, Verifiable, Verifier};
use plandoc_error::{OptionExt, Result};
use serde::{Deserialize, Serialize};

use crate::buffer::{VOffset, slot_voffset};
use crate::builder::{PlanBuilder, WIPOffset};
use crate::plan::{PlanMap, PlanOpCodec, SqlPlan, encode_plan};
use crate::schema::PlanOpTable;
use crate::view::PlanOpView;

pub const VT_TEST_OP_ID: VOffset = slot_voffset(0);
pub const VT_TEST_OP_NAME: VOffset = slot_voffset(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOp {
    pub id: i64,
    pub name: String,
}

impl TestOp {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        TestOp {
            id,
            name: name.into(),
        }
    }
}

impl PlanOpCodec for TestOp {
    fn encode_op(&self, builder: &mut PlanBuilder) -> Result<WIPOffset<PlanOpTable>> {
        let name = builder.create_string(&self.name)?;
        builder.start_table()?;
        builder.push_slot_scalar::<i64>(VT_TEST_OP_ID, self.id, 0)?;
        builder.push_slot_offset(VT_TEST_OP_NAME, name)?;
        builder.end_table()
    }

    fn decode_op(op: PlanOpView<'_>) -> Result<Self> {
        let table = op.table();
        Ok(TestOp {
            id: table.get_scalar::<i64>(VT_TEST_OP_ID, 0)?,
            name: table
                .get_str(VT_TEST_OP_NAME)?
                .required("Missing operator name")?
                .to_string(),
        })
    }
}

impl Verifiable for TestOp {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i64>("id", VT_TEST_OP_ID, false)?
            .visit_field::<ForwardsUOffset<&str>>("name", VT_TEST_OP_NAME, true)?
            .finish();
        Ok(())
    }
}

/// `{ "v2", [opA, opB], {"timeout": "30"} }`
pub fn scenario_plan() -> SqlPlan<TestOp> {
    SqlPlan {
        rel_plan_version: Some("v2".to_string()),
        op_list: Some(vec![TestOp::new(1, "opA"), TestOp::new(2, "opB")]),
        exec_params: Some([("timeout", "30")].into_iter().collect::<PlanMap>()),
    }
}

/// Encoded form of `scenario_plan`.
pub fn scenario_buffer() -> Result<Vec<u8>> {
    encode_plan(&scenario_plan())
}
