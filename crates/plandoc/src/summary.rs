use std::fmt;

use plandoc_core::{PlanMap, SqlPlanView};
use plandoc_error::Result;
use serde::Serialize;

/// Structural summary of a plan document.
#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub size: usize,
    pub rel_plan_version: Option<String>,
    /// `None` when the operator list is absent.
    pub op_list: Option<Vec<OpSummary>>,
    pub exec_params: Option<PlanMap>,
}

#[derive(Debug, Serialize)]
pub struct OpSummary {
    pub index: usize,
    pub inline_size: usize,
    pub slot_count: usize,
    pub present_slots: Vec<u16>,
}

impl PlanSummary {
    pub fn from_view(size: usize, view: SqlPlanView<'_>) -> Result<Self> {
        let rel_plan_version = view.rel_plan_version()?.map(|v| v.to_string());

        let op_list = match view.op_list()? {
            Some(ops) => {
                let mut summaries = Vec::with_capacity(ops.len());
                for (index, op) in ops.iter().enumerate() {
                    let op = op?;
                    summaries.push(OpSummary {
                        index,
                        inline_size: op.inline_size()?,
                        slot_count: op.slot_count()?,
                        present_slots: op.present_slots()?,
                    });
                }
                Some(summaries)
            }
            None => None,
        };

        let exec_params = match view.exec_params()? {
            Some(map) => Some(map.iter()?.collect::<Result<PlanMap>>()?),
            None => None,
        };

        Ok(PlanSummary {
            size,
            rel_plan_version,
            op_list,
            exec_params,
        })
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "size: {} bytes", self.size)?;

        match &self.rel_plan_version {
            Some(version) => writeln!(f, "version: {version}")?,
            None => writeln!(f, "version: <absent>")?,
        }

        match &self.op_list {
            Some(ops) => {
                writeln!(f, "ops: {}", ops.len())?;
                for op in ops {
                    writeln!(
                        f,
                        "  [{}] slots: {}, present: {:?}, inline size: {}",
                        op.index, op.slot_count, op.present_slots, op.inline_size
                    )?;
                }
            }
            None => writeln!(f, "ops: <absent>")?,
        }

        match &self.exec_params {
            Some(params) => {
                writeln!(f, "exec_params: {}", params.len())?;
                for (key, value) in params {
                    writeln!(f, "  {key} = {value}")?;
                }
            }
            None => writeln!(f, "exec_params: <absent>")?,
        }

        Ok(())
    }
}
