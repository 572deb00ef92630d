use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub user: String,
    pub relation: String,
    pub object: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub consistency: Option<ConsistencyRequest>,
    #[serde(default)]
    pub trace: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Serialize)]
pub struct Resolution {
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_closed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TupleBody {
    pub object: String,
    pub relation: String,
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub tuples: Vec<TupleBody>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub tuples: Vec<TupleBody>,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub success: bool,
    pub revision: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadRequest {
    /// `type` or `type:id`.
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    /// `type`, `type:id`, `type:id#relation` or `type:*`.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub consistency: Option<ConsistencyRequest>,
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub tuples: Vec<TupleBody>,
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    pub user: String,
    pub relation: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListObjectsResponse {
    pub objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListRelationsQuery {
    pub user: String,
    pub object: String,
    #[serde(default)]
    pub model_id: Option<String>,
    /// Comma-separated subset of relations to test.
    #[serde(default)]
    pub relations: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListRelationsResponse {
    pub relations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub object: String,
    pub relation: String,
    pub user_type: String,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteModelRequest {
    pub definition: String,
}

#[derive(Debug, Serialize)]
pub struct WriteModelResponse {
    pub model_id: String,
}

#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub model_id: String,
    pub definition: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsistencyRequest {
    Latest,
    AtLeastAsFresh { revision: u64 },
    AtRevision { revision: u64 },
}
