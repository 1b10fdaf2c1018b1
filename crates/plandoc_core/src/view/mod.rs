//! Lazy read-only views over an encoded plan document.

mod map;
mod plan;
mod table;

pub use map::{PlanMapIter, PlanMapView};
pub use plan::{OpIter, OpListView, PlanOpView, SqlPlanView};
pub use table::{TableView, VTable, VectorView};

use plandoc_error::Result;

use crate::buffer::follow_offset;
use crate::config::VerifierOptions;
use crate::verifier::verify_sql_plan;

/// Get a lazy view of the plan rooted in `buf`.
///
/// Only the root offset is checked. Fields are checked on access.
pub fn root_as_sql_plan(buf: &[u8]) -> Result<SqlPlanView<'_>> {
    let root = follow_offset(buf, 0)?;
    Ok(SqlPlanView::new(TableView::at(buf, root)?))
}

/// Verify the entire document before returning a view.
pub fn root_as_sql_plan_verified<'a>(
    buf: &'a [u8],
    opts: &VerifierOptions,
) -> Result<SqlPlanView<'a>> {
    verify_sql_plan(buf, opts)?;
    root_as_sql_plan(buf)
}
