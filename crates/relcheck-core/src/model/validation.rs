use std::collections::HashMap;

use super::types::{AuthorizationModel, Rewrite, TypeDefinition};
use crate::tuple::Tuple;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLimits {
    pub max_types: usize,
    pub max_relations_per_type: usize,
}

impl Default for ModelLimits {
    fn default() -> Self {
        Self {
            max_types: 50,
            max_relations_per_type: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("model declares no types")]
    EmptyModel,
    #[error("too many types: {count} exceeds limit of {limit}")]
    TooManyTypes { count: usize, limit: usize },
    #[error("too many relations in type '{type_name}': {count} exceeds limit of {limit}")]
    TooManyRelations {
        type_name: String,
        count: usize,
        limit: usize,
    },
    #[error("{type_name}#{relation} references undefined type '{referenced}'")]
    UndefinedType {
        type_name: String,
        relation: String,
        referenced: String,
    },
    #[error("{type_name}#{relation} references undefined relation '{referenced}'")]
    UndefinedRelation {
        type_name: String,
        relation: String,
        referenced: String,
    },
    #[error(
        "{type_name}#{relation} uses '{tupleset}' as a tupleset, which must be a direct relation on plain types"
    )]
    InvalidTupleset {
        type_name: String,
        relation: String,
        tupleset: String,
    },
    #[error("computed relations on type '{type_name}' form a cycle through '{relation}'")]
    ComputedCycle { type_name: String, relation: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TupleValidationError {
    #[error("object type '{0}' is not declared")]
    UndefinedObjectType(String),
    #[error("user type '{0}' is not declared")]
    UndefinedUserType(String),
    #[error("relation '{relation}' is not defined on type '{type_name}'")]
    UndefinedRelation { type_name: String, relation: String },
    #[error("user '{user}' is not an allowed type for {object_type}#{relation}")]
    UserNotAllowed {
        object_type: String,
        relation: String,
        user: String,
    },
}

/// Checks limits and cross-references. Every problem found is reported.
pub fn validate_model(
    model: &AuthorizationModel,
    limits: &ModelLimits,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if model.types.is_empty() {
        errors.push(ValidationError::EmptyModel);
    }

    if model.types.len() > limits.max_types {
        errors.push(ValidationError::TooManyTypes {
            count: model.types.len(),
            limit: limits.max_types,
        });
    }

    for type_def in &model.types {
        if type_def.relations.len() > limits.max_relations_per_type {
            errors.push(ValidationError::TooManyRelations {
                type_name: type_def.name.clone(),
                count: type_def.relations.len(),
                limit: limits.max_relations_per_type,
            });
        }
        for rel in &type_def.relations {
            let ctx = RefContext {
                model,
                type_def,
                relation: &rel.name,
            };
            ctx.check_rewrite(&rel.rewrite, &mut errors);
        }
        detect_computed_cycles(type_def, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

struct RefContext<'a> {
    model: &'a AuthorizationModel,
    type_def: &'a TypeDefinition,
    relation: &'a str,
}

impl RefContext<'_> {
    fn undefined_type(&self, referenced: &str) -> ValidationError {
        ValidationError::UndefinedType {
            type_name: self.type_def.name.clone(),
            relation: self.relation.to_string(),
            referenced: referenced.to_string(),
        }
    }

    fn undefined_relation(&self, referenced: String) -> ValidationError {
        ValidationError::UndefinedRelation {
            type_name: self.type_def.name.clone(),
            relation: self.relation.to_string(),
            referenced,
        }
    }

    fn check_rewrite(&self, rewrite: &Rewrite, errors: &mut Vec<ValidationError>) {
        match rewrite {
            Rewrite::Direct(types) => {
                for direct in types {
                    if self.model.get_type(&direct.type_name).is_none() {
                        errors.push(self.undefined_type(&direct.type_name));
                        continue;
                    }
                    if let Some(ref rel) = direct.relation
                        && self.model.get_relation(&direct.type_name, rel).is_none()
                    {
                        errors.push(self.undefined_relation(format!("{}#{rel}", direct.type_name)));
                    }
                }
            }
            Rewrite::Computed(name) => {
                if self.type_def.get_relation(name).is_none() {
                    errors.push(self.undefined_relation(name.clone()));
                }
            }
            Rewrite::Union(children) | Rewrite::Intersection(children) => {
                for child in children {
                    self.check_rewrite(child, errors);
                }
            }
            Rewrite::Exclusion(base, subtract) => {
                self.check_rewrite(base, errors);
                self.check_rewrite(subtract, errors);
            }
            Rewrite::TupleToUserset { tupleset, computed } => {
                self.check_tuple_to_userset(tupleset, computed, errors);
            }
        }
    }

    fn check_tuple_to_userset(
        &self,
        tupleset: &str,
        computed: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(tupleset_def) = self.type_def.get_relation(tupleset) else {
            errors.push(self.undefined_relation(tupleset.to_string()));
            return;
        };
        let Rewrite::Direct(ref targets) = tupleset_def.rewrite else {
            errors.push(self.invalid_tupleset(tupleset));
            return;
        };
        if targets.iter().any(|t| t.wildcard || t.relation.is_some()) {
            errors.push(self.invalid_tupleset(tupleset));
            return;
        }
        let reachable = targets
            .iter()
            .any(|t| self.model.get_relation(&t.type_name, computed).is_some());
        if !reachable {
            errors.push(self.undefined_relation(format!("{computed} from {tupleset}")));
        }
    }

    fn invalid_tupleset(&self, tupleset: &str) -> ValidationError {
        ValidationError::InvalidTupleset {
            type_name: self.type_def.name.clone(),
            relation: self.relation.to_string(),
            tupleset: tupleset.to_string(),
        }
    }
}

fn computed_refs<'a>(rewrite: &'a Rewrite, out: &mut Vec<&'a str>) {
    match rewrite {
        Rewrite::Computed(name) => out.push(name),
        Rewrite::Union(children) | Rewrite::Intersection(children) => {
            for child in children {
                computed_refs(child, out);
            }
        }
        Rewrite::Exclusion(base, subtract) => {
            computed_refs(base, out);
            computed_refs(subtract, out);
        }
        Rewrite::Direct(_) | Rewrite::TupleToUserset { .. } => {}
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

fn detect_computed_cycles(type_def: &TypeDefinition, errors: &mut Vec<ValidationError>) {
    let edges: HashMap<&str, Vec<&str>> = type_def
        .relations
        .iter()
        .map(|rel| {
            let mut refs = Vec::new();
            computed_refs(&rel.rewrite, &mut refs);
            (rel.name.as_str(), refs)
        })
        .collect();

    let mut state: HashMap<&str, Visit> = HashMap::new();
    for rel in &type_def.relations {
        if let Some(relation) = visit(&rel.name, &edges, &mut state) {
            errors.push(ValidationError::ComputedCycle {
                type_name: type_def.name.clone(),
                relation: relation.to_string(),
            });
        }
    }
}

/// Depth-first walk; returns the relation closing a cycle, if one is found.
fn visit<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    state: &mut HashMap<&'a str, Visit>,
) -> Option<&'a str> {
    match state.get(node) {
        Some(Visit::Done) => return None,
        Some(Visit::InProgress) => return Some(node),
        None => {}
    }
    state.insert(node, Visit::InProgress);
    let mut found = None;
    for next in edges.get(node).into_iter().flatten() {
        if !edges.contains_key(next) {
            continue;
        }
        if let Some(cycle) = visit(next, edges, state) {
            found = Some(cycle);
            break;
        }
    }
    state.insert(node, Visit::Done);
    found
}

/// Checks a tuple against the model's declared types and direct restrictions.
pub fn validate_tuple(model: &AuthorizationModel, tuple: &Tuple) -> Result<(), TupleValidationError> {
    let object_type = model.get_type(&tuple.object.object_type).ok_or_else(|| {
        TupleValidationError::UndefinedObjectType(tuple.object.object_type.clone())
    })?;
    if model.get_type(&tuple.subject.subject_type).is_none() {
        return Err(TupleValidationError::UndefinedUserType(
            tuple.subject.subject_type.clone(),
        ));
    }
    let relation = object_type.get_relation(&tuple.relation).ok_or_else(|| {
        TupleValidationError::UndefinedRelation {
            type_name: object_type.name.clone(),
            relation: tuple.relation.clone(),
        }
    })?;
    if !relation.rewrite.admits(&tuple.subject) {
        return Err(TupleValidationError::UserNotAllowed {
            object_type: object_type.name.clone(),
            relation: relation.name.clone(),
            user: tuple.subject.to_string(),
        });
    }
    Ok(())
}
