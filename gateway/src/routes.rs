//! Route handlers and their request/response DTOs.
//!
//! Requests arrive with raw operation and role codes, PEM text and hex
//! strings; handlers convert them into the engine's typed messages and map
//! engine errors onto HTTP statuses. Every response, error or not, carries
//! the wildcard CORS headers.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use trustchain_core::{
    AccessBlock, AccessControlMessage, CommitId, CommitMessage, ContributionBlock, Operation,
    PublicKey, RepoId, Role, Signature, MAX_BRANCH_LENGTH, MAX_KEY_LENGTH, MAX_SIGNATURE_LENGTH,
};
use trustchain_enclave::Error as EngineError;

use crate::state::SharedState;

/// An error reply: `{"error": "..."}` with a kind-dependent status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match &e {
            EngineError::BadParameters(_) | EngineError::BadFormat(_) => StatusCode::BAD_REQUEST,
            EngineError::AccessDenied(_) | EngineError::SecurityFailure => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::OutOfCapacity => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::CryptoFailure(_) | EngineError::ShortBuffer { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Adds the wildcard CORS headers to every response.
pub async fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// `OPTIONS` preflight for every route.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Parses a PEM field, enforcing the wire-level key length bound.
fn parse_public_key(field: &str, value: &str) -> Result<PublicKey, ApiError> {
    if value.len() > MAX_KEY_LENGTH {
        return Err(ApiError::bad_request(format!(
            "{field} longer than {MAX_KEY_LENGTH} bytes"
        )));
    }
    PublicKey::from_pem(value).map_err(|e| ApiError::bad_request(format!("{field}: {e}")))
}

/// Parses a hex signature field, enforcing the wire-level length bound.
fn parse_signature(value: &str) -> Result<Signature, ApiError> {
    if value.len() > MAX_SIGNATURE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "signature longer than {MAX_SIGNATURE_LENGTH} chars"
        )));
    }
    Signature::from_hex(value).map_err(|e| ApiError::bad_request(format!("signature: {e}")))
}

#[derive(Deserialize)]
pub struct InitRepoRequest {
    pub admin_key: String,
}

#[derive(Serialize)]
pub struct InitRepoResponse {
    pub status: &'static str,
    pub repository_id: RepoId,
    pub genesis_block: AccessBlock,
}

/// `POST /init-repo`
pub async fn init_repo(
    State(state): State<SharedState>,
    Json(request): Json<InitRepoRequest>,
) -> Result<Json<InitRepoResponse>, ApiError> {
    if request.admin_key.len() > MAX_KEY_LENGTH {
        return Err(ApiError::bad_request(format!(
            "admin_key longer than {MAX_KEY_LENGTH} bytes"
        )));
    }
    let mut engine = state.engine.lock().await;
    let (repository_id, genesis_block) = engine.init_repo(&request.admin_key)?;
    Ok(Json(InitRepoResponse {
        status: "success",
        repository_id,
        genesis_block,
    }))
}

#[derive(Deserialize)]
pub struct AccessControlRequest {
    pub repo_id: RepoId,
    pub operation: u32,
    pub role: u32,
    pub public_key: String,
    pub signature_key: String,
    pub signature: String,
}

#[derive(Serialize)]
pub struct AccessControlResponse {
    pub status: &'static str,
    pub block: AccessBlock,
}

/// `POST /access-control`
pub async fn access_control(
    State(state): State<SharedState>,
    Json(request): Json<AccessControlRequest>,
) -> Result<Json<AccessControlResponse>, ApiError> {
    let message = AccessControlMessage {
        rep_id: request.repo_id,
        op: Operation::from_code(request.operation)
            .ok_or_else(|| ApiError::bad_request(format!("unknown operation: {}", request.operation)))?,
        role: Role::from_code(request.role)
            .ok_or_else(|| ApiError::bad_request(format!("unknown role: {}", request.role)))?,
        pubkey: parse_public_key("public_key", &request.public_key)?,
        sigkey: parse_public_key("signature_key", &request.signature_key)?,
        signature: parse_signature(&request.signature)?,
    };
    let mut engine = state.engine.lock().await;
    let block = engine.access_control(&message)?;
    Ok(Json(AccessControlResponse {
        status: "success",
        block,
    }))
}

#[derive(Deserialize)]
pub struct CommitRequest {
    pub repo_id: RepoId,
    pub operation: u32,
    pub commit_hash: String,
    pub signature_key: String,
    pub signature: String,
    /// Hex ciphertext of the key material to unwrap inside the enclave.
    pub encrypted_key: String,
    /// Optional branch annotation; recorded in the reply only.
    pub branch: Option<String>,
}

#[derive(Serialize)]
pub struct CommitResponse {
    pub status: &'static str,
    pub block: ContributionBlock,
    pub decrypted_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// `POST /commit`
pub async fn commit(
    State(state): State<SharedState>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    if let Some(branch) = &request.branch {
        if branch.len() > MAX_BRANCH_LENGTH {
            return Err(ApiError::bad_request(format!(
                "branch name longer than {MAX_BRANCH_LENGTH} bytes"
            )));
        }
    }
    let message = CommitMessage {
        rep_id: request.repo_id,
        op: Operation::from_code(request.operation)
            .ok_or_else(|| ApiError::bad_request(format!("unknown operation: {}", request.operation)))?,
        commit_hash: CommitId::new(request.commit_hash.as_str())
            .map_err(|e| ApiError::bad_request(format!("commit_hash: {e}")))?,
        sigkey: parse_public_key("signature_key", &request.signature_key)?,
        signature: parse_signature(&request.signature)?,
    };
    let mut engine = state.engine.lock().await;
    let (block, decrypted_key) = engine.commit(&message, &request.encrypted_key)?;
    Ok(Json(CommitResponse {
        status: "success",
        block,
        decrypted_key,
        branch: request.branch,
    }))
}

#[derive(Deserialize)]
pub struct LatestHashQuery {
    #[serde(default)]
    pub nonce: u32,
}

#[derive(Serialize)]
pub struct LatestHashResponse {
    pub status: &'static str,
    pub nonce: u32,
    pub latest_hash: String,
    pub signature: String,
}

/// `GET /latest-hash/{repo_id}`
pub async fn latest_hash(
    State(state): State<SharedState>,
    Path(repo_id): Path<RepoId>,
    Query(query): Query<LatestHashQuery>,
) -> Result<Json<LatestHashResponse>, ApiError> {
    let engine = state.engine.lock().await;
    let (message, signature) = engine.latest_hash(repo_id, query.nonce)?;
    Ok(Json(LatestHashResponse {
        status: "success",
        nonce: message.nonce,
        latest_hash: message.latest_hash.to_hex(),
        signature: signature.to_hex(),
    }))
}

#[derive(Serialize)]
pub struct TeePublicKeyResponse {
    pub status: &'static str,
    pub public_key: String,
}

/// `GET /tee-pubkey`
pub async fn tee_public_key(
    State(state): State<SharedState>,
) -> Result<Json<TeePublicKeyResponse>, ApiError> {
    let engine = state.engine.lock().await;
    let public_key = engine.tee_public_key()?;
    Ok(Json(TeePublicKeyResponse {
        status: "success",
        public_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (EngineError::BadParameters("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::BadFormat("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::AccessDenied("x".into()), StatusCode::FORBIDDEN),
            (EngineError::SecurityFailure, StatusCode::FORBIDDEN),
            (EngineError::NotFound(7), StatusCode::NOT_FOUND),
            (EngineError::OutOfCapacity, StatusCode::SERVICE_UNAVAILABLE),
            (
                EngineError::CryptoFailure("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[test]
    fn error_body_shape() {
        let api_error = ApiError::from(EngineError::NotFound(3));
        let body = serde_json::to_string(&ErrorBody {
            error: api_error.message,
        })
        .unwrap();
        assert_eq!(body, r#"{"error":"repository 3 not found"}"#);
    }

    #[test]
    fn latest_hash_query_defaults_nonce_to_zero() {
        let query: LatestHashQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.nonce, 0);
    }

    #[test]
    fn oversized_wire_fields_are_rejected() {
        let oversized_key = "x".repeat(MAX_KEY_LENGTH + 1);
        let error = parse_public_key("public_key", &oversized_key).unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);

        let oversized_signature = "ab".repeat(MAX_SIGNATURE_LENGTH);
        let error = parse_signature(&oversized_signature).unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }
}
