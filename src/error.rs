//! Error types for the compile path.

use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Disjoint semantic-model sets that could not be joined.
///
/// Not fatal for callers: the SMQ can be partitioned across the sets with
/// [`crate::distribute::distribute_smq`] and each partition compiled
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} | model_sets={model_sets:?}")]
pub struct JoinError {
    pub message: String,
    pub model_sets: Vec<Vec<String>>,
}

/// Errors the compiler reports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Malformed SMQ: empty metrics, bad fragment, joins arity, bad limit.
    #[error("invalid SMQ: {0}")]
    InputValidation(String),

    /// A reference did not resolve against the manifest, or the manifest
    /// itself is unusable.
    #[error("manifest violation: {0}")]
    ManifestViolation(String),

    /// Metric expansion exceeded the depth cap or revisited a name.
    #[error("metric expansion limit: {}", path.join(" -> "))]
    ExpansionLimit { path: Vec<String> },

    /// Projection layers that cannot be joined into one query.
    #[error(transparent)]
    Join(#[from] JoinError),

    /// Unknown or unsupported dialect identifier.
    #[error("dialect error: {0}")]
    Dialect(String),
}

impl CompileError {
    pub fn expansion_limit(path: &[String]) -> Self {
        CompileError::ExpansionLimit {
            path: path.to_vec(),
        }
    }
}
