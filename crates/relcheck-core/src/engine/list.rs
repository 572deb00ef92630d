use std::collections::BTreeSet;

use futures::{StreamExt, TryStreamExt, stream};

use crate::tuple::{ObjectRef, Revision, SubjectRef, TupleFilter};

use super::{CheckRequest, EvalError, GraphEvaluator, TupleReader};

#[derive(Debug, Clone)]
pub struct ListObjectsRequest {
    pub user: SubjectRef,
    pub relation: String,
    pub object_type: String,
    pub revision: Option<Revision>,
}

#[derive(Debug, Clone)]
pub struct ListRelationsRequest {
    pub user: SubjectRef,
    pub object: ObjectRef,
    /// Restrict the answer to these relations. `None` checks every relation.
    pub relations: Option<Vec<String>>,
    pub revision: Option<Revision>,
}

#[derive(Debug, Clone)]
pub struct ListUsersRequest {
    pub object: ObjectRef,
    pub relation: String,
    pub user_type: String,
    pub revision: Option<Revision>,
}

impl<T: TupleReader> GraphEvaluator<T> {
    /// Object ids of `object_type` the user holds `relation` on, sorted.
    ///
    /// Candidates are the distinct objects of the type present in the store
    /// at the revision; each one is checked, at most
    /// `max_concurrent_checks` at a time.
    pub async fn list_objects(&self, request: &ListObjectsRequest) -> Result<Vec<String>, EvalError> {
        self.resolver()
            .expression_for(&request.object_type, &request.relation)?;

        let filter = TupleFilter {
            object_type: Some(request.object_type.clone()),
            ..Default::default()
        };
        let candidates: BTreeSet<String> = self
            .reader()
            .read_tuples(&filter, request.revision)
            .await?
            .into_iter()
            .map(|t| t.object.object_id)
            .collect();

        let checked: Vec<(String, bool)> = stream::iter(candidates)
            .map(|object_id| async move {
                let check = CheckRequest {
                    user: request.user.clone(),
                    relation: request.relation.clone(),
                    object: ObjectRef::new(&request.object_type, &object_id),
                    revision: request.revision,
                };
                self.check(&check).await.map(|d| (object_id, d.allowed))
            })
            .buffered(self.config().max_concurrent_checks.max(1))
            .try_collect()
            .await?;

        Ok(checked
            .into_iter()
            .filter_map(|(id, allowed)| allowed.then_some(id))
            .collect())
    }

    /// Relations the user holds on the object, in declaration order.
    pub async fn list_relations(
        &self,
        request: &ListRelationsRequest,
    ) -> Result<Vec<String>, EvalError> {
        let object_type = &request.object.object_type;
        let declared = self.resolver().relations_of(object_type)?;

        let wanted: Vec<String> = match request.relations {
            Some(ref subset) => {
                for name in subset {
                    self.resolver().expression_for(object_type, name)?;
                }
                declared
                    .into_iter()
                    .filter(|r| subset.iter().any(|s| s == r))
                    .map(str::to_string)
                    .collect()
            }
            None => declared.into_iter().map(str::to_string).collect(),
        };

        let checked: Vec<(String, bool)> = stream::iter(wanted)
            .map(|relation| async move {
                let check = CheckRequest {
                    user: request.user.clone(),
                    relation: relation.clone(),
                    object: request.object.clone(),
                    revision: request.revision,
                };
                self.check(&check).await.map(|d| (relation, d.allowed))
            })
            .buffered(self.config().max_concurrent_checks.max(1))
            .try_collect()
            .await?;

        Ok(checked
            .into_iter()
            .filter_map(|(relation, allowed)| allowed.then_some(relation))
            .collect())
    }

    /// Plain subjects of `user_type` that hold `relation` on the object, sorted.
    ///
    /// Wildcards and usersets are never returned; a user admitted through a
    /// wildcard shows up only if some tuple names it explicitly.
    pub async fn list_users(&self, request: &ListUsersRequest) -> Result<Vec<SubjectRef>, EvalError> {
        self.resolver()
            .expression_for(&request.object.object_type, &request.relation)?;
        if !self.resolver().has_type(&request.user_type) {
            return Err(EvalError::UndefinedType(request.user_type.clone()));
        }

        let filter = TupleFilter {
            subject_type: Some(request.user_type.clone()),
            subject_relation: Some(None),
            ..Default::default()
        };
        let candidates: BTreeSet<SubjectRef> = self
            .reader()
            .read_tuples(&filter, request.revision)
            .await?
            .into_iter()
            .map(|t| t.subject)
            .filter(|s| !s.is_wildcard())
            .collect();

        let checked: Vec<(SubjectRef, bool)> = stream::iter(candidates)
            .map(|user| async move {
                let check = CheckRequest {
                    user: user.clone(),
                    relation: request.relation.clone(),
                    object: request.object.clone(),
                    revision: request.revision,
                };
                self.check(&check).await.map(|d| (user, d.allowed))
            })
            .buffered(self.config().max_concurrent_checks.max(1))
            .try_collect()
            .await?;

        Ok(checked
            .into_iter()
            .filter_map(|(user, allowed)| allowed.then_some(user))
            .collect())
    }
}
