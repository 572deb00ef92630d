use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relcheck_core::engine::EvalError;
use relcheck_core::model::{ParseError, TupleValidationError, ValidationError};
use relcheck_core::tuple::RefParseError;
use relcheck_storage::StorageError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid reference: {0}")]
    InvalidRef(#[from] RefParseError),

    #[error("invalid tuple: {0}")]
    InvalidTuple(#[from] TupleValidationError),

    #[error("model parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("model validation errors: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("{0}")]
    Eval(#[from] EvalError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Wire-level error classification returned in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidTuple,
    DuplicateTuple,
    InvalidModel,
    ModelNotFound,
    UndefinedRelation,
    Unauthenticated,
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest
            | ErrorCode::InvalidTuple
            | ErrorCode::InvalidModel
            | ErrorCode::UndefinedRelation => StatusCode::BAD_REQUEST,
            ErrorCode::DuplicateTuple => StatusCode::CONFLICT,
            ErrorCode::ModelNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::InvalidRef(_) => ErrorCode::InvalidRequest,
            ApiError::InvalidTuple(_) => ErrorCode::InvalidTuple,
            ApiError::Parse(_) | ApiError::Validation(_) => ErrorCode::InvalidModel,
            ApiError::ModelNotFound(_) => ErrorCode::ModelNotFound,
            ApiError::Eval(EvalError::UndefinedType(_))
            | ApiError::Eval(EvalError::UndefinedRelation { .. }) => ErrorCode::UndefinedRelation,
            ApiError::Eval(EvalError::Storage(_)) => ErrorCode::Internal,
            ApiError::Storage(StorageError::DuplicateTuple(_)) => ErrorCode::DuplicateTuple,
            ApiError::Storage(
                StorageError::InvalidBatch(_)
                | StorageError::RevisionAhead { .. }
                | StorageError::RevisionCompacted { .. }
                | StorageError::InvalidContinuation(_),
            ) => ErrorCode::InvalidRequest,
            ApiError::Storage(StorageError::ModelExists(_) | StorageError::Internal(_)) => {
                ErrorCode::Internal
            }
            ApiError::Unauthenticated(_) => ErrorCode::Unauthenticated,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code().status()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        if code == ErrorCode::Internal {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code = ?code, "request rejected");
        }
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (code.status(), Json(body)).into_response()
    }
}
