//! Eager structural verification.
//!
//! Views check fields lazily on access. For untrusted input the verifier
//! walks every reachable object up front with `flatbuffers::Verifier`, then
//! checks what the wire format can't express (map shape, table extents)
//! through the views. After that, access through views can only fail on
//! schema-level mismatches, not on bad offsets.

use std::marker::PhantomData;

use flatbuffers::{ForwardsUOffset, InvalidFlatbuffer, Verifiable, Verifier};
use plandoc_error::{ErrorKind, PlanError, Result, ResultExt};
use tracing::debug;

use crate::config::VerifierOptions;
use crate::schema::{
    PlanMapTable,
    PlanOpTable,
    VT_EXEC_PARAMS,
    VT_MAP_KEYS,
    VT_MAP_VALUES,
    VT_OP_LIST,
    VT_REL_PLAN_VERSION,
};
use crate::view::root_as_sql_plan;

type StrVector<'a> = flatbuffers::Vector<'a, ForwardsUOffset<&'a str>>;

/// Operators are opaque, only the table header is checked.
impl Verifiable for PlanOpTable {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?.finish();
        Ok(())
    }
}

impl Verifiable for PlanMapTable {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<StrVector<'_>>>("keys", VT_MAP_KEYS, false)?
            .visit_field::<ForwardsUOffset<StrVector<'_>>>("values", VT_MAP_VALUES, false)?
            .finish();
        Ok(())
    }
}

/// Root `SqlPlan` table with operators verified as `O`.
#[derive(Debug)]
pub struct VerifiedPlan<O>(PhantomData<O>);

impl<O: Verifiable> Verifiable for VerifiedPlan<O> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<&str>>("relPlanVersion", VT_REL_PLAN_VERSION, false)?
            .visit_field::<ForwardsUOffset<flatbuffers::Vector<'_, ForwardsUOffset<O>>>>(
                "opList",
                VT_OP_LIST,
                false,
            )?
            .visit_field::<ForwardsUOffset<PlanMapTable>>("execParams", VT_EXEC_PARAMS, false)?
            .finish();
        Ok(())
    }
}

/// Verify a plan document, checking operator tables as `O`.
pub fn verify_sql_plan_with<O: Verifiable>(buf: &[u8], opts: &VerifierOptions) -> Result<()> {
    if buf.len() > opts.max_buffer_size {
        return Err(PlanError::corrupt("Buffer exceeds maximum size")
            .with_field("len", buf.len())
            .with_field("max", opts.max_buffer_size));
    }

    let fb_opts = flatbuffers::VerifierOptions::from(opts);
    let mut verifier = Verifier::new(&fb_opts, buf);
    <ForwardsUOffset<VerifiedPlan<O>>>::run_verifier(&mut verifier, 0)
        .context("Plan document failed verification")
        .map_err(|e| e.kind_of(ErrorKind::CorruptBuffer))?;

    // Checks the wire format doesn't cover.
    let plan = root_as_sql_plan(buf)?;
    plan.rel_plan_version()?;
    let mut num_ops = 0;
    for op in plan.ops()? {
        op?.inline_size()?;
        num_ops += 1;
    }
    if let Some(map) = plan.exec_params()? {
        map.validate()?;
    }

    debug!(bytes = buf.len(), ops = num_ops, "verified plan document");

    Ok(())
}

/// Verify a plan document treating operators as opaque tables.
pub fn verify_sql_plan(buf: &[u8], opts: &VerifierOptions) -> Result<()> {
    verify_sql_plan_with::<PlanOpTable>(buf, opts)
}
