use plandoc_error::{PlanError, Result};
use serde::{Deserialize, Serialize};

use crate::buffer::MAX_BUFFER_SIZE;

/// Limits applied by the eager verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierOptions {
    /// Maximum nesting of tables, counting the root.
    pub max_depth: usize,
    /// Maximum number of tables visited.
    pub max_tables: usize,
    /// Maximum number of bytes visited. Shared sub-objects count once per
    /// reference, so a small buffer can't expand into an unbounded walk.
    pub max_apparent_size: usize,
    /// Maximum size of the input buffer.
    pub max_buffer_size: usize,
    /// Require strings to be followed by a nul byte.
    pub require_null_terminator: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        VerifierOptions {
            max_depth: 64,
            max_tables: 1_000_000,
            max_apparent_size: 1 << 31,
            max_buffer_size: MAX_BUFFER_SIZE,
            require_null_terminator: false,
        }
    }
}

impl From<&VerifierOptions> for flatbuffers::VerifierOptions {
    fn from(opts: &VerifierOptions) -> Self {
        flatbuffers::VerifierOptions {
            max_depth: opts.max_depth,
            max_tables: opts.max_tables,
            max_apparent_size: opts.max_apparent_size,
            ignore_missing_null_terminator: !opts.require_null_terminator,
        }
    }
}

/// Which plan format versions a consumer accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Accept any version.
    #[default]
    Any,
    /// Accept only the listed versions. Documents without a version are
    /// always accepted.
    AllowList(Vec<String>),
}

impl VersionPolicy {
    pub fn allow<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VersionPolicy::AllowList(versions.into_iter().map(Into::into).collect())
    }

    pub fn check(&self, version: Option<&str>) -> Result<()> {
        match (self, version) {
            (VersionPolicy::Any, _) | (VersionPolicy::AllowList(_), None) => Ok(()),
            (VersionPolicy::AllowList(allowed), Some(version)) => {
                if allowed.iter().any(|v| v == version) {
                    Ok(())
                } else {
                    Err(
                        PlanError::unsupported_version("Unsupported plan version")
                            .with_field("version", version)
                            .with_field("accepted", allowed.join(",")),
                    )
                }
            }
        }
    }
}

/// Options for decoding a document into an owned plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Run the verifier before decoding.
    pub verify: Option<VerifierOptions>,
    pub version_policy: VersionPolicy,
}

impl DecodeOptions {
    /// Options for input from an untrusted source.
    pub fn untrusted() -> Self {
        DecodeOptions {
            verify: Some(VerifierOptions::default()),
            version_policy: VersionPolicy::Any,
        }
    }

    pub fn with_version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }
}
