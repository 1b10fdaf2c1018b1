use bytes::Bytes;
use plandoc_error::Result;

use crate::builder::PlanBuilder;
use crate::config::{DecodeOptions, VerifierOptions};
use crate::plan::{PlanOpCodec, SqlPlan, decode_plan, encode_plan};
use crate::view::{SqlPlanView, root_as_sql_plan, root_as_sql_plan_verified};

/// An encoded plan document.
///
/// Cheap to clone, clones share the same buffer. Views borrow from the
/// document and can't outlive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    buf: Bytes,
}

impl PlanDocument {
    /// Wrap an encoded buffer. Nothing is checked until a view is requested.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        PlanDocument { buf: buf.into() }
    }

    /// Take the output of a finished builder.
    pub fn from_builder(builder: PlanBuilder) -> Result<Self> {
        Ok(Self::new(builder.into_bytes()?))
    }

    pub fn encode<O: PlanOpCodec>(plan: &SqlPlan<O>) -> Result<Self> {
        Ok(Self::new(encode_plan(plan)?))
    }

    pub fn view(&self) -> Result<SqlPlanView<'_>> {
        root_as_sql_plan(&self.buf)
    }

    pub fn verified_view(&self, opts: &VerifierOptions) -> Result<SqlPlanView<'_>> {
        root_as_sql_plan_verified(&self.buf, opts)
    }

    pub fn decode<O: PlanOpCodec>(&self, opts: &DecodeOptions) -> Result<SqlPlan<O>> {
        decode_plan(&self.buf, opts)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf
    }
}

impl AsRef<[u8]> for PlanDocument {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}
