use std::sync::Arc;

use dashmap::DashMap;
use relcheck_core::engine::RelationResolver;
use relcheck_core::model::{AuthorizationModel, ModelId, ModelLimits, parse_model, validate_model};
use relcheck_storage::{ModelRecord, ModelStore};

use crate::audit;
use crate::error::ApiError;
use crate::metrics::Metrics;

/// Append-only registry of authorization models.
///
/// Definitions live in the store; parsed models are cached by id. A model is
/// never modified after registration, so cached entries never go stale.
pub struct ModelRegistry<S: ModelStore> {
    store: Arc<S>,
    limits: ModelLimits,
    parsed: DashMap<ModelId, Arc<AuthorizationModel>>,
    metrics: Arc<Metrics>,
}

impl<S: ModelStore> ModelRegistry<S> {
    pub fn new(store: Arc<S>, limits: ModelLimits, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            limits,
            parsed: DashMap::new(),
            metrics,
        }
    }

    /// Parses and validates `definition`, then stores it under a new id.
    pub async fn register(&self, definition: &str) -> Result<ModelId, ApiError> {
        let model = parse_model(definition)?;
        validate_model(&model, &self.limits).map_err(ApiError::Validation)?;

        let id = ModelId::generate();
        self.store
            .append_model(ModelRecord {
                id,
                definition: definition.to_string(),
            })
            .await?;

        audit::audit_model_registered(&id, model.types.len());
        self.parsed.insert(id, Arc::new(model));
        Ok(id)
    }

    pub async fn get(&self, id: &ModelId) -> Result<Arc<AuthorizationModel>, ApiError> {
        if let Some(model) = self.parsed.get(id) {
            self.metrics.record_model_cache_hit();
            return Ok(Arc::clone(&model));
        }
        self.metrics.record_model_cache_miss();

        let record = self.record(id).await?;
        let model = Arc::new(parse_model(&record.definition)?);
        self.parsed.insert(*id, Arc::clone(&model));
        Ok(model)
    }

    pub async fn record(&self, id: &ModelId) -> Result<ModelRecord, ApiError> {
        self.store
            .read_model(id)
            .await?
            .ok_or_else(|| ApiError::ModelNotFound(id.to_string()))
    }

    pub async fn latest_record(&self) -> Result<ModelRecord, ApiError> {
        self.store
            .latest_model()
            .await?
            .ok_or_else(|| ApiError::ModelNotFound("no model has been registered".to_string()))
    }

    /// Resolver for the requested model, or for the newest one.
    pub async fn resolver(&self, id: Option<ModelId>) -> Result<RelationResolver, ApiError> {
        let id = match id {
            Some(id) => id,
            None => self.latest_record().await?.id,
        };
        let model = self.get(&id).await?;
        Ok(RelationResolver::new(id, model))
    }
}
