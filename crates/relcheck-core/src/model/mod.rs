mod parser;
pub mod types;
pub mod validation;

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

pub use parser::{ParseError, parse_model};
pub use types::{AuthorizationModel, DirectType, RelationDef, Rewrite, TypeDefinition};
pub use validation::{
    ModelLimits, TupleValidationError, ValidationError, validate_model, validate_tuple,
};

/// Opaque identifier of one immutable model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(Uuid);

impl ModelId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ModelId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
