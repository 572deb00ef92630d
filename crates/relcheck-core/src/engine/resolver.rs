use std::sync::Arc;

use crate::model::{AuthorizationModel, ModelId, Rewrite};

use super::EvalError;

/// Looks up rewrite expressions in one model version.
#[derive(Debug, Clone)]
pub struct RelationResolver {
    model_id: ModelId,
    model: Arc<AuthorizationModel>,
}

impl RelationResolver {
    pub fn new(model_id: ModelId, model: Arc<AuthorizationModel>) -> Self {
        Self { model_id, model }
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn model(&self) -> &AuthorizationModel {
        &self.model
    }

    pub fn expression_for(&self, type_name: &str, relation: &str) -> Result<&Rewrite, EvalError> {
        let type_def = self
            .model
            .get_type(type_name)
            .ok_or_else(|| EvalError::UndefinedType(type_name.to_string()))?;
        type_def
            .get_relation(relation)
            .map(|r| &r.rewrite)
            .ok_or_else(|| EvalError::UndefinedRelation {
                type_name: type_name.to_string(),
                relation: relation.to_string(),
            })
    }

    /// Relation names of a type, in declaration order.
    pub fn relations_of(&self, type_name: &str) -> Result<Vec<&str>, EvalError> {
        let type_def = self
            .model
            .get_type(type_name)
            .ok_or_else(|| EvalError::UndefinedType(type_name.to_string()))?;
        Ok(type_def.relations.iter().map(|r| r.name.as_str()).collect())
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.model.get_type(type_name).is_some()
    }

    pub fn defines(&self, type_name: &str, relation: &str) -> bool {
        self.model.get_relation(type_name, relation).is_some()
    }
}
