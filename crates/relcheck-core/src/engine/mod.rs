mod check;
mod list;
mod resolver;

pub use check::{CheckRequest, GraphEvaluator};
pub use list::{ListObjectsRequest, ListRelationsRequest, ListUsersRequest};
pub use resolver::RelationResolver;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::tuple::{Revision, Tuple, TupleFilter};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("type not found: {0}")]
    UndefinedType(String),

    #[error("relation '{relation}' not found on type '{type_name}'")]
    UndefinedRelation { type_name: String, relation: String },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Evaluation-safety signal. A check that hits one of these is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailClosed {
    DepthExceeded,
    CycleDetected,
    Timeout,
}

impl FailClosed {
    pub fn code(&self) -> &'static str {
        match self {
            FailClosed::DepthExceeded => "depth_exceeded",
            FailClosed::CycleDetected => "cycle_detected",
            FailClosed::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Resolution steps from the requested relation down to the granting tuple.
    pub path: Vec<String>,
    pub fail_closed: Option<FailClosed>,
}

impl Decision {
    pub fn allow(path: Vec<String>) -> Self {
        Self {
            allowed: true,
            path,
            fail_closed: None,
        }
    }

    pub fn deny() -> Self {
        Self {
            allowed: false,
            path: Vec::new(),
            fail_closed: None,
        }
    }

    pub fn halted(signal: FailClosed) -> Self {
        Self {
            allowed: false,
            path: Vec::new(),
            fail_closed: Some(signal),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_depth: usize,
    pub check_timeout: Duration,
    pub max_concurrent_checks: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 25,
            check_timeout: Duration::from_secs(10),
            max_concurrent_checks: 10,
        }
    }
}

/// Read access to tuples at a revision. `None` reads the latest revision.
pub trait TupleReader: Send + Sync {
    fn read_tuples(
        &self,
        filter: &TupleFilter,
        revision: Option<Revision>,
    ) -> impl Future<Output = Result<Vec<Tuple>, EvalError>> + Send;
}
