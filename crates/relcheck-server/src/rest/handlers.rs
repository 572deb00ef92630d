use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use relcheck_core::model::ModelId;
use relcheck_core::tuple::{ObjectRef, Revision, SubjectRef, Tuple, TupleFilter};
use relcheck_storage::{ModelRecord, ModelStore, TupleStore};

use crate::error::ApiError;
use crate::service::{
    CheckInput, Consistency, ListObjectsInput, ListRelationsInput, ListUsersInput, ReadInput,
};

use super::AppState;
use super::types::*;

fn resolve_consistency(c: Option<ConsistencyRequest>) -> Consistency {
    match c {
        Some(ConsistencyRequest::AtLeastAsFresh { revision }) => {
            Consistency::AtLeastAsFresh(Revision::new(revision))
        }
        Some(ConsistencyRequest::AtRevision { revision }) => {
            Consistency::AtRevision(Revision::new(revision))
        }
        Some(ConsistencyRequest::Latest) | None => Consistency::Latest,
    }
}

fn parse_model_id(raw: Option<&str>) -> Result<Option<ModelId>, ApiError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| ApiError::InvalidRequest(format!("invalid model_id '{s}': {e}")))
        })
        .transpose()
}

fn parse_relation(relation: &str) -> Result<String, ApiError> {
    if relation.is_empty() {
        return Err(ApiError::InvalidRequest(
            "relation must not be empty".to_string(),
        ));
    }
    if relation
        .chars()
        .any(|c| matches!(c, '#' | '@' | ':') || c.is_whitespace())
    {
        return Err(ApiError::InvalidRequest(format!(
            "relation '{relation}' contains a reserved character"
        )));
    }
    Ok(relation.to_string())
}

fn parse_tuple(body: &TupleBody) -> Result<Tuple, ApiError> {
    Ok(Tuple::new(
        body.object.parse()?,
        parse_relation(&body.relation)?,
        body.user.parse()?,
    ))
}

fn parse_tuples(bodies: &[TupleBody]) -> Result<Vec<Tuple>, ApiError> {
    bodies.iter().map(parse_tuple).collect()
}

fn tuple_body(tuple: &Tuple) -> TupleBody {
    TupleBody {
        object: tuple.object.to_string(),
        relation: tuple.relation.clone(),
        user: tuple.subject.to_string(),
    }
}

fn read_filter(req: &ReadRequest) -> Result<TupleFilter, ApiError> {
    let mut filter = TupleFilter {
        relation: req.relation.as_deref().map(parse_relation).transpose()?,
        ..Default::default()
    };

    if let Some(ref object) = req.object {
        if object.contains(':') {
            let object: ObjectRef = object.parse()?;
            filter.object_type = Some(object.object_type);
            filter.object_id = Some(object.object_id);
        } else if object.is_empty() {
            return Err(ApiError::InvalidRequest(
                "object filter must not be empty".to_string(),
            ));
        } else {
            filter.object_type = Some(object.clone());
        }
    }

    if let Some(ref user) = req.user {
        if user.contains(':') {
            let subject: SubjectRef = user.parse()?;
            filter.subject_type = Some(subject.subject_type);
            filter.subject_id = Some(subject.subject_id);
            filter.subject_relation = Some(subject.subject_relation);
        } else if user.is_empty() {
            return Err(ApiError::InvalidRequest(
                "user filter must not be empty".to_string(),
            ));
        } else {
            filter.subject_type = Some(user.clone());
        }
    }

    Ok(filter)
}

fn model_response(record: ModelRecord) -> ModelResponse {
    ModelResponse {
        model_id: record.id.to_string(),
        definition: record.definition,
    }
}

pub async fn check<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Json(req) = body?;
    let input = CheckInput {
        user: req.user.parse()?,
        relation: parse_relation(&req.relation)?,
        object: req.object.parse()?,
        model_id: parse_model_id(req.model_id.as_deref())?,
        consistency: resolve_consistency(req.consistency),
    };

    let output = state.service.check(input).await?;
    let decision = output.decision;
    let resolution = (req.trace || decision.fail_closed.is_some()).then(|| Resolution {
        path: decision.path,
        fail_closed: decision.fail_closed.map(|s| s.code().to_string()),
    });

    Ok(Json(CheckResponse {
        allowed: decision.allowed,
        revision: output.revision.value(),
        resolution,
    }))
}

pub async fn write<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<WriteRequest>, JsonRejection>,
) -> Result<Json<WriteResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Json(req) = body?;
    let tuples = parse_tuples(&req.tuples)?;
    let model_id = parse_model_id(req.model_id.as_deref())?;

    let revision = state
        .service
        .write_tuples(tuples, req.strict, model_id)
        .await?;

    Ok(Json(WriteResponse {
        success: true,
        revision: revision.value(),
    }))
}

pub async fn delete<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<WriteResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Json(req) = body?;
    let tuples = parse_tuples(&req.tuples)?;
    let model_id = parse_model_id(req.model_id.as_deref())?;

    let revision = state.service.delete_tuples(tuples, model_id).await?;

    Ok(Json(WriteResponse {
        success: true,
        revision: revision.value(),
    }))
}

pub async fn read<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<ReadRequest>, JsonRejection>,
) -> Result<Json<ReadResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Json(req) = body?;
    let input = ReadInput {
        filter: read_filter(&req)?,
        page_size: req.page_size,
        continuation: req.continuation_token,
        consistency: resolve_consistency(req.consistency),
    };

    let page = state.service.read_tuples(input).await?;

    Ok(Json(ReadResponse {
        tuples: page.tuples.iter().map(tuple_body).collect(),
        revision: page.revision.value(),
        continuation_token: page.continuation.map(|t| t.to_string()),
    }))
}

pub async fn list_objects<S>(
    State(state): State<AppState<S>>,
    query: Result<Query<ListObjectsQuery>, QueryRejection>,
) -> Result<Json<ListObjectsResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Query(q) = query?;
    let input = ListObjectsInput {
        user: q.user.parse()?,
        relation: parse_relation(&q.relation)?,
        object_type: q.object_type,
        model_id: parse_model_id(q.model_id.as_deref())?,
    };

    let objects = state.service.list_objects(input).await?;
    Ok(Json(ListObjectsResponse { objects }))
}

pub async fn list_relations<S>(
    State(state): State<AppState<S>>,
    query: Result<Query<ListRelationsQuery>, QueryRejection>,
) -> Result<Json<ListRelationsResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Query(q) = query?;
    let relations = q
        .relations
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(|r| {
            r.split(',')
                .map(|name| parse_relation(name.trim()))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let input = ListRelationsInput {
        user: q.user.parse()?,
        object: q.object.parse()?,
        relations,
        model_id: parse_model_id(q.model_id.as_deref())?,
    };

    let relations = state.service.list_relations(input).await?;
    Ok(Json(ListRelationsResponse { relations }))
}

pub async fn list_users<S>(
    State(state): State<AppState<S>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<Json<ListUsersResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Query(q) = query?;
    let input = ListUsersInput {
        object: q.object.parse()?,
        relation: parse_relation(&q.relation)?,
        user_type: q.user_type,
        model_id: parse_model_id(q.model_id.as_deref())?,
    };

    let users = state.service.list_users(input).await?;
    Ok(Json(ListUsersResponse {
        users: users.iter().map(SubjectRef::to_string).collect(),
    }))
}

pub async fn write_model<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<WriteModelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WriteModelResponse>), ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Json(req) = body?;
    let model_id = state.service.write_model(&req.definition).await?;
    Ok((
        StatusCode::CREATED,
        Json(WriteModelResponse {
            model_id: model_id.to_string(),
        }),
    ))
}

pub async fn read_model<S>(
    State(state): State<AppState<S>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ModelResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let Path(raw) = path?;
    let id = parse_model_id(Some(&raw))?
        .ok_or_else(|| ApiError::InvalidRequest("model id must not be empty".to_string()))?;
    let record = state.service.read_model(&id).await?;
    Ok(Json(model_response(record)))
}

pub async fn latest_model<S>(
    State(state): State<AppState<S>>,
) -> Result<Json<ModelResponse>, ApiError>
where
    S: TupleStore + ModelStore + 'static,
{
    let record = state.service.latest_model().await?;
    Ok(Json(model_response(record)))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
