use std::sync::Arc;

use relcheck_core::engine::{
    CheckRequest, Decision, EngineConfig, GraphEvaluator, ListObjectsRequest,
    ListRelationsRequest, ListUsersRequest, RelationResolver,
};
use relcheck_core::model::{ModelId, ModelLimits, validate_tuple};
use relcheck_core::tuple::{ObjectRef, Revision, SubjectRef, Tuple, TupleFilter};
use relcheck_storage::{
    ContinuationToken, ModelRecord, ModelStore, ReadOptions, TuplePage, TupleStore, WriteBatch,
};

use crate::adapter::StoreTupleReader;
use crate::audit;
use crate::cache::{DecisionCache, DecisionKey};
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::registry::ModelRegistry;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 1_000;

/// How fresh the data a request is evaluated against must be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Consistency {
    #[default]
    Latest,
    AtLeastAsFresh(Revision),
    AtRevision(Revision),
}

#[derive(Debug, Clone)]
pub struct CheckInput {
    pub user: SubjectRef,
    pub relation: String,
    pub object: ObjectRef,
    pub model_id: Option<ModelId>,
    pub consistency: Consistency,
}

#[derive(Debug, Clone)]
pub struct CheckOutput {
    pub decision: Decision,
    pub revision: Revision,
    pub model_id: ModelId,
}

#[derive(Debug, Clone, Default)]
pub struct ReadInput {
    pub filter: TupleFilter,
    pub page_size: Option<usize>,
    pub continuation: Option<String>,
    pub consistency: Consistency,
}

#[derive(Debug, Clone)]
pub struct ListObjectsInput {
    pub user: SubjectRef,
    pub relation: String,
    pub object_type: String,
    pub model_id: Option<ModelId>,
}

#[derive(Debug, Clone)]
pub struct ListRelationsInput {
    pub user: SubjectRef,
    pub object: ObjectRef,
    pub relations: Option<Vec<String>>,
    pub model_id: Option<ModelId>,
}

#[derive(Debug, Clone)]
pub struct ListUsersInput {
    pub object: ObjectRef,
    pub relation: String,
    pub user_type: String,
    pub model_id: Option<ModelId>,
}

pub struct AuthzService<S: TupleStore + ModelStore> {
    store: Arc<S>,
    registry: ModelRegistry<S>,
    engine_config: EngineConfig,
    model_limits: ModelLimits,
    cache: DecisionCache,
    metrics: Arc<Metrics>,
}

impl<S: TupleStore + ModelStore> AuthzService<S> {
    pub fn new(store: Arc<S>, engine_config: EngineConfig, model_limits: ModelLimits) -> Self {
        let metrics = Arc::new(Metrics::new());
        Self {
            registry: ModelRegistry::new(
                Arc::clone(&store),
                model_limits.clone(),
                Arc::clone(&metrics),
            ),
            store,
            engine_config,
            model_limits,
            cache: DecisionCache::disabled(),
            metrics,
        }
    }

    pub fn with_cache(mut self, cache: DecisionCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.registry = ModelRegistry::new(
            Arc::clone(&self.store),
            self.model_limits.clone(),
            Arc::clone(&metrics),
        );
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn evaluator(&self, resolver: RelationResolver) -> GraphEvaluator<StoreTupleReader<S>> {
        GraphEvaluator::new(
            Arc::new(StoreTupleReader::new(Arc::clone(&self.store))),
            resolver,
            self.engine_config.clone(),
        )
    }

    /// Decides whether `user` holds `relation` on `object`.
    ///
    /// Evaluation-safety signals deny the check and are reported on the
    /// decision; they are never returned as errors.
    pub async fn check(&self, input: CheckInput) -> Result<CheckOutput, ApiError> {
        require_non_empty("relation", &input.relation)?;

        let resolver = self.registry.resolver(input.model_id).await?;
        resolver.expression_for(&input.object.object_type, &input.relation)?;
        let model_id = resolver.model_id();
        let revision = self.pin_revision(input.consistency).await?;

        let key = DecisionKey {
            model_id,
            revision,
            user: input.user.to_string(),
            relation: input.relation.clone(),
            object: input.object.to_string(),
        };

        let cached = if self.cache.is_enabled() {
            let hit = self.cache.get(&key);
            if hit.is_some() {
                self.metrics.record_decision_cache_hit();
            } else {
                self.metrics.record_decision_cache_miss();
            }
            hit
        } else {
            None
        };

        let decision = match cached {
            Some(decision) => decision,
            None => {
                let request = CheckRequest {
                    user: input.user,
                    relation: input.relation,
                    object: input.object,
                    revision: Some(revision),
                };
                let decision = self.evaluator(resolver).check(&request).await?;
                if let Some(signal) = decision.fail_closed {
                    audit::audit_decision_fail_closed(&key.user, &key.relation, &key.object, signal);
                }
                self.cache.insert(key, &decision);
                decision
            }
        };

        self.metrics.record_decision(&decision);
        Ok(CheckOutput {
            decision,
            revision,
            model_id,
        })
    }

    /// Validates every tuple against the model, then commits them as one batch.
    pub async fn write_tuples(
        &self,
        tuples: Vec<Tuple>,
        strict: bool,
        model_id: Option<ModelId>,
    ) -> Result<Revision, ApiError> {
        if tuples.is_empty() {
            return Err(ApiError::InvalidRequest(
                "write requires at least one tuple".to_string(),
            ));
        }

        let resolver = self.registry.resolver(model_id).await?;
        for tuple in &tuples {
            validate_tuple(resolver.model(), tuple)?;
        }

        let write_count = tuples.len();
        let batch = WriteBatch {
            writes: tuples,
            deletes: Vec::new(),
            strict,
        };
        let revision = self.store.write(&batch).await?;
        self.cache.invalidate_all();
        audit::audit_tuples_written(write_count, 0, revision);
        Ok(revision)
    }

    /// Deletes tuples. Tuples must be well-formed for the model; missing ones are ignored.
    pub async fn delete_tuples(
        &self,
        tuples: Vec<Tuple>,
        model_id: Option<ModelId>,
    ) -> Result<Revision, ApiError> {
        if tuples.is_empty() {
            return Err(ApiError::InvalidRequest(
                "delete requires at least one tuple".to_string(),
            ));
        }

        let resolver = self.registry.resolver(model_id).await?;
        for tuple in &tuples {
            validate_tuple(resolver.model(), tuple)?;
        }

        let delete_count = tuples.len();
        let revision = self.store.write(&WriteBatch::deletes(tuples)).await?;
        self.cache.invalidate_all();
        audit::audit_tuples_written(0, delete_count, revision);
        Ok(revision)
    }

    pub async fn read_tuples(&self, input: ReadInput) -> Result<TuplePage, ApiError> {
        let limit = match input.page_size {
            Some(0) => {
                return Err(ApiError::InvalidRequest(
                    "page_size must be positive".to_string(),
                ));
            }
            Some(n) => n.min(MAX_PAGE_SIZE),
            None => DEFAULT_PAGE_SIZE,
        };
        let after = input
            .continuation
            .as_deref()
            .map(ContinuationToken::parse)
            .transpose()?;
        let revision = self.pin_revision(input.consistency).await?;

        let options = ReadOptions {
            revision: Some(revision),
            after,
            limit: Some(limit),
        };
        Ok(self.store.read(&input.filter, &options).await?)
    }

    pub async fn list_objects(&self, input: ListObjectsInput) -> Result<Vec<String>, ApiError> {
        require_non_empty("relation", &input.relation)?;
        require_non_empty("type", &input.object_type)?;

        let resolver = self.registry.resolver(input.model_id).await?;
        let revision = self.store.revision().await?;
        let request = ListObjectsRequest {
            user: input.user,
            relation: input.relation,
            object_type: input.object_type,
            revision: Some(revision),
        };
        Ok(self.evaluator(resolver).list_objects(&request).await?)
    }

    pub async fn list_relations(
        &self,
        input: ListRelationsInput,
    ) -> Result<Vec<String>, ApiError> {
        let resolver = self.registry.resolver(input.model_id).await?;
        let revision = self.store.revision().await?;
        let request = ListRelationsRequest {
            user: input.user,
            object: input.object,
            relations: input.relations,
            revision: Some(revision),
        };
        Ok(self.evaluator(resolver).list_relations(&request).await?)
    }

    pub async fn list_users(&self, input: ListUsersInput) -> Result<Vec<SubjectRef>, ApiError> {
        require_non_empty("relation", &input.relation)?;
        require_non_empty("user_type", &input.user_type)?;

        let resolver = self.registry.resolver(input.model_id).await?;
        let revision = self.store.revision().await?;
        let request = ListUsersRequest {
            object: input.object,
            relation: input.relation,
            user_type: input.user_type,
            revision: Some(revision),
        };
        Ok(self.evaluator(resolver).list_users(&request).await?)
    }

    pub async fn write_model(&self, definition: &str) -> Result<ModelId, ApiError> {
        require_non_empty("definition", definition.trim())?;
        self.registry.register(definition).await
    }

    pub async fn read_model(&self, id: &ModelId) -> Result<ModelRecord, ApiError> {
        self.registry.record(id).await
    }

    pub async fn latest_model(&self) -> Result<ModelRecord, ApiError> {
        self.registry.latest_record().await
    }

    async fn pin_revision(&self, consistency: Consistency) -> Result<Revision, ApiError> {
        let current = self.store.revision().await?;
        let requested = match consistency {
            Consistency::Latest => return Ok(current),
            Consistency::AtLeastAsFresh(r) | Consistency::AtRevision(r) => r,
        };
        if requested > current {
            return Err(ApiError::InvalidRequest(format!(
                "revision {requested} is ahead of the current revision {current}"
            )));
        }
        match consistency {
            Consistency::AtRevision(r) => {
                let horizon = self.store.horizon().await?;
                if r < horizon {
                    return Err(ApiError::InvalidRequest(format!(
                        "revision {r} has been compacted; oldest readable revision is {horizon}"
                    )));
                }
                Ok(r)
            }
            _ => Ok(current),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relcheck_core::engine::FailClosed;
    use relcheck_storage::InMemoryStore;

    use crate::config::CacheConfig;

    const MODEL: &str = r#"
        type user
        type group {
            define member: [user]
        }
        type folder {
            define viewer: [user, group#member]
        }
        type doc {
            define parent: [folder]
            define owner: [user]
            define editor: [user] or owner
            define viewer: [user, user:*] or editor or viewer from parent
            define banned: [user]
            define can_view: viewer but not banned
        }
    "#;

    fn make_service() -> AuthzService<InMemoryStore> {
        AuthzService::new(
            Arc::new(InMemoryStore::new()),
            EngineConfig::default(),
            ModelLimits::default(),
        )
    }

    fn cached_service() -> AuthzService<InMemoryStore> {
        make_service().with_cache(DecisionCache::new(&CacheConfig::default()))
    }

    fn tuples(raw: &[&str]) -> Vec<Tuple> {
        raw.iter().map(|t| t.parse().unwrap()).collect()
    }

    fn check_input(user: &str, relation: &str, object: &str) -> CheckInput {
        CheckInput {
            user: user.parse().unwrap(),
            relation: relation.to_string(),
            object: object.parse().unwrap(),
            model_id: None,
            consistency: Consistency::Latest,
        }
    }

    async fn setup(service: &AuthzService<InMemoryStore>, raw: &[&str]) -> Revision {
        service.write_model(MODEL).await.unwrap();
        service.write_tuples(tuples(raw), false, None).await.unwrap()
    }

    async fn allowed(service: &AuthzService<InMemoryStore>, user: &str, rel: &str, obj: &str) -> bool {
        service
            .check(check_input(user, rel, obj))
            .await
            .unwrap()
            .decision
            .allowed
    }

    #[tokio::test]
    async fn check_grants_direct_relation() {
        let service = make_service();
        setup(&service, &["doc:readme#viewer@user:alice"]).await;

        assert!(allowed(&service, "user:alice", "viewer", "doc:readme").await);
        assert!(!allowed(&service, "user:bob", "viewer", "doc:readme").await);
    }

    #[tokio::test]
    async fn check_follows_parent_and_group() {
        let service = make_service();
        setup(
            &service,
            &[
                "doc:readme#parent@folder:eng",
                "folder:eng#viewer@group:staff#member",
                "group:staff#member@user:carol",
            ],
        )
        .await;

        let output = service
            .check(check_input("user:carol", "can_view", "doc:readme"))
            .await
            .unwrap();

        assert!(output.decision.allowed);
        assert_eq!(output.decision.path.first().unwrap(), "doc:readme#can_view");
        assert_eq!(output.revision, Revision::new(1));
    }

    #[tokio::test]
    async fn check_without_model_is_model_not_found() {
        let service = make_service();

        let err = service
            .check(check_input("user:alice", "viewer", "doc:1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ModelNotFound(_)));
    }

    #[tokio::test]
    async fn check_undefined_relation_is_error() {
        let service = make_service();
        setup(&service, &["doc:1#owner@user:alice"]).await;

        let err = service
            .check(check_input("user:alice", "publisher", "doc:1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::UndefinedRelation);

        let err = service
            .check(check_input("user:alice", "viewer", "spreadsheet:1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::UndefinedRelation);
    }

    #[tokio::test]
    async fn check_empty_relation_is_invalid_request() {
        let service = make_service();
        setup(&service, &["doc:1#owner@user:alice"]).await;

        let err = service
            .check(check_input("user:alice", "", "doc:1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn write_rejects_tuples_the_model_does_not_allow() {
        let service = make_service();
        service.write_model(MODEL).await.unwrap();

        for raw in [
            "doc:1#viewer@robot:r2",
            "doc:1#unknown@user:alice",
            "spreadsheet:1#viewer@user:alice",
            "doc:1#parent@user:alice",
        ] {
            let err = service
                .write_tuples(tuples(&[raw]), false, None)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ApiError::InvalidTuple(_)),
                "{raw} should be invalid, got {err}"
            );
        }
        assert_eq!(service.store().revision().await.unwrap(), Revision::ZERO);
    }

    #[tokio::test]
    async fn strict_write_reports_duplicates() {
        let service = make_service();
        setup(&service, &["doc:1#owner@user:alice"]).await;

        let lenient = service
            .write_tuples(tuples(&["doc:1#owner@user:alice"]), false, None)
            .await;
        assert!(lenient.is_ok());

        let err = service
            .write_tuples(tuples(&["doc:1#owner@user:alice"]), true, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::DuplicateTuple);
    }

    #[tokio::test]
    async fn empty_write_is_invalid_request() {
        let service = make_service();
        service.write_model(MODEL).await.unwrap();

        let err = service.write_tuples(vec![], false, None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        let err = service.delete_tuples(vec![], None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn delete_revokes_access() {
        let service = make_service();
        setup(&service, &["doc:1#viewer@user:alice"]).await;
        assert!(allowed(&service, "user:alice", "viewer", "doc:1").await);

        service
            .delete_tuples(
                tuples(&["doc:1#viewer@user:alice", "doc:9#viewer@user:nobody"]),
                None,
            )
            .await
            .unwrap();

        assert!(!allowed(&service, "user:alice", "viewer", "doc:1").await);
    }

    #[tokio::test]
    async fn delete_rejects_tuples_the_model_does_not_describe() {
        let service = make_service();
        let before = setup(&service, &["doc:1#viewer@user:alice"]).await;

        for raw in [
            "robot:1#approver@alien:x",
            "doc:1#approver@user:alice",
            "doc:1#viewer@alien:x",
        ] {
            let err = service
                .delete_tuples(tuples(&[raw, "doc:1#viewer@user:alice"]), None)
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::InvalidTuple(_)), "{raw}: {err:?}");
        }

        assert_eq!(service.store().revision().await.unwrap(), before);
        assert!(allowed(&service, "user:alice", "viewer", "doc:1").await);
    }

    #[tokio::test]
    async fn delete_of_missing_well_formed_tuple_is_noop() {
        let service = make_service();
        let before = setup(&service, &["doc:1#viewer@user:alice"]).await;

        let revision = service
            .delete_tuples(tuples(&["doc:2#viewer@user:bob"]), None)
            .await
            .unwrap();

        assert_eq!(revision, before);
    }

    #[tokio::test]
    async fn check_at_revision_sees_past_state() {
        let service = make_service();
        let before = setup(&service, &["doc:1#viewer@user:alice"]).await;
        service
            .delete_tuples(tuples(&["doc:1#viewer@user:alice"]), None)
            .await
            .unwrap();

        let mut input = check_input("user:alice", "viewer", "doc:1");
        input.consistency = Consistency::AtRevision(before);
        let output = service.check(input).await.unwrap();

        assert!(output.decision.allowed);
        assert_eq!(output.revision, before);
    }

    #[tokio::test]
    async fn revision_ahead_of_store_is_invalid_request() {
        let service = make_service();
        setup(&service, &["doc:1#viewer@user:alice"]).await;

        for consistency in [
            Consistency::AtRevision(Revision::new(50)),
            Consistency::AtLeastAsFresh(Revision::new(50)),
        ] {
            let mut input = check_input("user:alice", "viewer", "doc:1");
            input.consistency = consistency;
            let err = service.check(input).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest(_)));
        }
    }

    #[tokio::test]
    async fn at_least_as_fresh_uses_current_revision() {
        let service = make_service();
        let first = setup(&service, &["doc:1#viewer@user:alice"]).await;
        let second = service
            .write_tuples(tuples(&["doc:2#viewer@user:alice"]), false, None)
            .await
            .unwrap();

        let mut input = check_input("user:alice", "viewer", "doc:2");
        input.consistency = Consistency::AtLeastAsFresh(first);
        let output = service.check(input).await.unwrap();

        assert!(output.decision.allowed);
        assert_eq!(output.revision, second);
    }

    #[tokio::test]
    async fn compacted_revision_is_invalid_request() {
        let service = make_service();
        let first = setup(&service, &["doc:1#viewer@user:alice"]).await;
        let second = service
            .write_tuples(tuples(&["doc:2#viewer@user:alice"]), false, None)
            .await
            .unwrap();
        service.store().compact(second).await.unwrap();

        let mut input = check_input("user:alice", "viewer", "doc:1");
        input.consistency = Consistency::AtRevision(first);
        let err = service.check(input).await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(ref msg) if msg.contains("compacted")));
    }

    #[tokio::test]
    async fn model_pinning_uses_older_model() {
        let service = make_service();
        let old = service
            .write_model("type user\ntype doc { define viewer: [user] }")
            .await
            .unwrap();
        service
            .write_tuples(tuples(&["doc:1#viewer@user:alice"]), false, None)
            .await
            .unwrap();
        service
            .write_model("type user\ntype doc { define reader: [user] }")
            .await
            .unwrap();

        let latest = service.check(check_input("user:alice", "viewer", "doc:1")).await;
        assert!(latest.is_err(), "viewer is gone from the latest model");

        let mut input = check_input("user:alice", "viewer", "doc:1");
        input.model_id = Some(old);
        let output = service.check(input).await.unwrap();
        assert!(output.decision.allowed);
        assert_eq!(output.model_id, old);
    }

    #[tokio::test]
    async fn decision_cache_hits_and_invalidates_on_write() {
        let service = cached_service();
        setup(&service, &["doc:1#viewer@user:alice"]).await;

        assert!(allowed(&service, "user:alice", "viewer", "doc:1").await);
        assert!(allowed(&service, "user:alice", "viewer", "doc:1").await);
        assert_eq!(service.metrics().decision_cache_hits(), 1);
        assert_eq!(service.metrics().decision_cache_misses(), 1);

        service
            .delete_tuples(tuples(&["doc:1#viewer@user:alice"]), None)
            .await
            .unwrap();

        assert!(!allowed(&service, "user:alice", "viewer", "doc:1").await);
        assert_eq!(service.metrics().decision_cache_misses(), 2);
    }

    #[tokio::test]
    async fn fail_closed_decision_is_denied_and_counted() {
        let service = AuthzService::new(
            Arc::new(InMemoryStore::new()),
            EngineConfig {
                max_depth: 1,
                ..Default::default()
            },
            ModelLimits::default(),
        );
        setup(
            &service,
            &[
                "doc:readme#parent@folder:eng",
                "folder:eng#viewer@group:staff#member",
                "group:staff#member@user:carol",
            ],
        )
        .await;

        let output = service
            .check(check_input("user:carol", "can_view", "doc:readme"))
            .await
            .unwrap();

        assert!(!output.decision.allowed);
        assert_eq!(output.decision.fail_closed, Some(FailClosed::DepthExceeded));
        assert_eq!(
            service.metrics().fail_closed(FailClosed::DepthExceeded),
            1
        );
        assert_eq!(service.metrics().decisions_denied(), 1);
    }

    #[tokio::test]
    async fn read_tuples_pages_with_continuation() {
        let service = make_service();
        setup(
            &service,
            &[
                "doc:1#viewer@user:a",
                "doc:2#viewer@user:b",
                "doc:3#viewer@user:c",
            ],
        )
        .await;

        let first = service
            .read_tuples(ReadInput {
                page_size: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.tuples.len(), 2);
        let token = first.continuation.unwrap();

        let second = service
            .read_tuples(ReadInput {
                page_size: Some(2),
                continuation: Some(token.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(second.tuples.len(), 1);
        assert!(second.continuation.is_none());
    }

    #[tokio::test]
    async fn read_tuples_rejects_bad_paging() {
        let service = make_service();

        let zero = service
            .read_tuples(ReadInput {
                page_size: Some(0),
                ..Default::default()
            })
            .await;
        assert!(matches!(zero, Err(ApiError::InvalidRequest(_))));

        let garbage = service
            .read_tuples(ReadInput {
                continuation: Some("garbage".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(garbage.code(), crate::error::ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn list_operations() {
        let service = make_service();
        setup(
            &service,
            &[
                "doc:a#owner@user:alice",
                "doc:b#viewer@user:alice",
                "doc:c#viewer@user:bob",
                "doc:b#banned@user:alice",
            ],
        )
        .await;

        let objects = service
            .list_objects(ListObjectsInput {
                user: "user:alice".parse().unwrap(),
                relation: "viewer".to_string(),
                object_type: "doc".to_string(),
                model_id: None,
            })
            .await
            .unwrap();
        assert_eq!(objects, vec!["a", "b"]);

        let relations = service
            .list_relations(ListRelationsInput {
                user: "user:alice".parse().unwrap(),
                object: "doc:b".parse().unwrap(),
                relations: None,
                model_id: None,
            })
            .await
            .unwrap();
        assert_eq!(relations, vec!["viewer", "banned"]);

        let users = service
            .list_users(ListUsersInput {
                object: "doc:a".parse().unwrap(),
                relation: "viewer".to_string(),
                user_type: "user".to_string(),
                model_id: None,
            })
            .await
            .unwrap();
        assert_eq!(users, vec![SubjectRef::direct("user", "alice")]);
    }

    #[tokio::test]
    async fn read_and_latest_model() {
        let service = make_service();
        assert!(matches!(
            service.latest_model().await,
            Err(ApiError::ModelNotFound(_))
        ));

        let id = service.write_model(MODEL).await.unwrap();

        assert_eq!(service.latest_model().await.unwrap().id, id);
        assert_eq!(service.read_model(&id).await.unwrap().definition, MODEL);
        assert!(matches!(
            service.read_model(&ModelId::generate()).await,
            Err(ApiError::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_model_definition_is_rejected() {
        let service = make_service();
        let err = service.write_model("   ").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }
}
