//! Owned plan model.
//!
//! `SqlPlan` is a plain value. Encoding goes through a `PlanBuilder` and
//! decoding through the lazy views, operators are converted by the caller's
//! `PlanOpCodec` implementation.

use std::collections::BTreeMap;
use std::collections::btree_map;

use flatbuffers::Verifiable;
use plandoc_error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::builder::{PlanBuilder, WIPOffset};
use crate::config::DecodeOptions;
use crate::schema::{
    PlanMapTable,
    PlanOpTable,
    SqlPlanArgs,
    SqlPlanTable,
    create_plan_map,
    create_sql_plan,
};
use crate::verifier::verify_sql_plan_with;
use crate::view::{PlanMapView, PlanOpView, SqlPlanView, root_as_sql_plan};

/// Conversion between an operator type and its encoded table.
///
/// Operator schemas are owned by the caller. The codec only requires that an
/// operator is a single table. The `Verifiable` implementation checks the
/// operator's fields during eager verification, starting with
/// `Verifier::visit_table`.
pub trait PlanOpCodec: Verifiable + Sized {
    /// Write this operator, returning the offset of its table.
    ///
    /// Called with no table in progress. Implementations write their
    /// children first.
    fn encode_op(&self, builder: &mut PlanBuilder) -> Result<WIPOffset<PlanOpTable>>;

    fn decode_op(op: PlanOpView<'_>) -> Result<Self>;
}

/// Execution parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanMap(BTreeMap<String, String>);

impl PlanMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    fn encode_into(&self, builder: &mut PlanBuilder) -> Result<WIPOffset<PlanMapTable>> {
        let entries: Vec<_> = self.0.iter().collect();
        create_plan_map(builder, &entries)
    }

    fn from_view(view: PlanMapView<'_>) -> Result<Self> {
        let mut map = PlanMap::new();
        for entry in view.iter()? {
            let (key, value) = entry?;
            if map.insert(key, value).is_some() {
                return Err(PlanError::corrupt("Duplicate key in plan map").with_field("key", key));
            }
        }
        Ok(map)
    }
}

impl<K, V> FromIterator<(K, V)> for PlanMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        PlanMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a PlanMap {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An execution plan.
///
/// `op_list` distinguishes a list that was never set (`None`) from an
/// explicitly empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlPlan<O> {
    pub rel_plan_version: Option<String>,
    pub op_list: Option<Vec<O>>,
    pub exec_params: Option<PlanMap>,
}

impl<O> Default for SqlPlan<O> {
    fn default() -> Self {
        SqlPlan {
            rel_plan_version: None,
            op_list: None,
            exec_params: None,
        }
    }
}

impl<O: PlanOpCodec> SqlPlan<O> {
    /// Write the plan as the root table of `builder`, returning its offset.
    /// The builder is not finished.
    pub fn encode_into(&self, builder: &mut PlanBuilder) -> Result<WIPOffset<SqlPlanTable>> {
        let rel_plan_version = self
            .rel_plan_version
            .as_deref()
            .map(|v| builder.create_string(v))
            .transpose()?;

        let op_list = match &self.op_list {
            Some(ops) => {
                let offsets = ops
                    .iter()
                    .enumerate()
                    .map(|(idx, op)| {
                        op.encode_op(builder)
                            .map_err(|e| e.with_field("op_index", idx))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(builder.create_vector_of_offsets(&offsets)?)
            }
            None => None,
        };

        let exec_params = self
            .exec_params
            .as_ref()
            .map(|params| params.encode_into(builder))
            .transpose()?;

        create_sql_plan(
            builder,
            &SqlPlanArgs {
                rel_plan_version,
                op_list,
                exec_params,
            },
        )
    }

    /// Materialize a plan from a view, decoding every field.
    pub fn from_view(view: SqlPlanView<'_>) -> Result<Self> {
        let rel_plan_version = view.rel_plan_version()?.map(|v| v.to_string());

        let op_list = match view.op_list()? {
            Some(ops) => {
                let mut decoded = Vec::with_capacity(ops.len());
                for (idx, op) in ops.iter().enumerate() {
                    let op = O::decode_op(op?).map_err(|e| e.with_field("op_index", idx))?;
                    trace!(idx, "decoded operator");
                    decoded.push(op);
                }
                Some(decoded)
            }
            None => None,
        };

        let exec_params = view.exec_params()?.map(PlanMap::from_view).transpose()?;

        Ok(SqlPlan {
            rel_plan_version,
            op_list,
            exec_params,
        })
    }
}

/// Encode a plan into a new buffer.
pub fn encode_plan<O: PlanOpCodec>(plan: &SqlPlan<O>) -> Result<Vec<u8>> {
    let mut builder = PlanBuilder::new();
    let root = plan.encode_into(&mut builder)?;
    builder.finish(root)?;
    builder.into_bytes()
}

/// Decode an owned plan from a buffer.
///
/// Verification runs first when enabled in `opts`, including the operator
/// type's own checks. The version policy is applied before any operators are
/// decoded.
pub fn decode_plan<O: PlanOpCodec>(buf: &[u8], opts: &DecodeOptions) -> Result<SqlPlan<O>> {
    if let Some(verify) = &opts.verify {
        verify_sql_plan_with::<O>(buf, verify)?;
    }

    let view = root_as_sql_plan(buf)?;
    view.check_version(&opts.version_policy)?;
    let plan = SqlPlan::from_view(view)?;

    debug!(
        version = plan.rel_plan_version.as_deref(),
        ops = plan.op_list.as_ref().map(|ops| ops.len()),
        "decoded plan"
    );

    Ok(plan)
}
