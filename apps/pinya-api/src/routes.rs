use std::sync::Arc;

use axum::{
	Json, Router,
	extract::{Query, Request, State},
	http::{HeaderMap, StatusCode, header::AUTHORIZATION},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use pinya_service::{
	AliasListResponse, AliasResponse, AskRequest, AskResponse, ConfigChannelRequest, ConfigResponse,
	ConfigRoleRequest, ConfigThresholdRequest, DeleteAliasRequest, EditRequest, Error,
	ForgetRequest, ForgetResponse, GapGetRequest, GapView, KnowledgeGetRequest, KnowledgeView,
	KnowledgeWriteResponse, ReindexRequest, ReindexResponse, ReplyGlobalRequest, ReplyRoleRequest,
	ReplyRoleResponse, ResolveGapRequest, ResolveGapResponse, SetAliasRequest, StatusResponse,
	TeachRequest, TopicsRequest, TopicsResponse, VoteRequest, VoteResponse,
};

/// Expected bearer token for a router. `None` leaves the router open.
#[derive(Clone)]
struct BearerToken(Option<Arc<str>>);

pub fn router(state: AppState) -> Router {
	let token = bearer_token(state.service.cfg.security.api_auth_token.as_deref());

	Router::new()
		.route("/v1/ask", post(ask))
		.route("/v1/knowledge/teach", post(teach))
		.route("/v1/knowledge/edit", post(edit))
		.route("/v1/knowledge/forget", post(forget))
		.route("/v1/knowledge/get", post(get_knowledge))
		.route("/v1/knowledge/topics", get(topics))
		.route("/v1/aliases", get(list_aliases))
		.route("/v1/aliases/set", post(set_alias))
		.route("/v1/aliases/delete", post(delete_alias))
		.route("/v1/gaps/resolve", post(resolve_gap))
		.route("/v1/gaps/get", post(get_gap))
		.route("/v1/votes", post(vote))
		.route_layer(middleware::from_fn_with_state(token, require_bearer))
		.route("/health", get(health))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	let token = bearer_token(state.service.cfg.security.admin_auth_token.as_deref());

	Router::new()
		.route("/v1/admin/config/role", post(config_role))
		.route("/v1/admin/config/channel", post(config_channel))
		.route("/v1/admin/config/threshold", post(config_threshold))
		.route("/v1/admin/config/reply_global", post(config_reply_global))
		.route("/v1/admin/config/reply_role", post(config_reply_role))
		.route("/v1/admin/status", get(status))
		.route("/v1/admin/reindex", post(reindex))
		.route_layer(middleware::from_fn_with_state(token, require_bearer))
		.with_state(state)
}

fn bearer_token(configured: Option<&str>) -> BearerToken {
	BearerToken(configured.map(str::trim).filter(|token| !token.is_empty()).map(Arc::from))
}

async fn require_bearer(
	State(BearerToken(expected)): State<BearerToken>,
	request: Request,
	next: Next,
) -> Response {
	if let Some(expected) = expected
		&& !read_bearer_token(request.headers())
			.is_some_and(|provided| tokens_match(provided, expected.as_ref()))
	{
		return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Missing or invalid bearer token.")
			.into_response();
	}

	next.run(request).await
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

/// Compares every byte so the time taken does not reveal how much of the token matched.
fn tokens_match(provided: &str, expected: &str) -> bool {
	let (provided, expected) = (provided.as_bytes(), expected.as_bytes());

	if provided.len() != expected.len() {
		return false;
	}

	provided.iter().zip(expected).fold(0_u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn ask(
	State(state): State<AppState>,
	Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
	let response = state.service.ask(payload).await?;

	Ok(Json(response))
}

async fn teach(
	State(state): State<AppState>,
	Json(payload): Json<TeachRequest>,
) -> Result<Json<KnowledgeWriteResponse>, ApiError> {
	let response = state.service.teach(payload).await?;

	Ok(Json(response))
}

async fn edit(
	State(state): State<AppState>,
	Json(payload): Json<EditRequest>,
) -> Result<Json<KnowledgeWriteResponse>, ApiError> {
	let response = state.service.edit(payload).await?;

	Ok(Json(response))
}

async fn forget(
	State(state): State<AppState>,
	Json(payload): Json<ForgetRequest>,
) -> Result<Json<ForgetResponse>, ApiError> {
	let response = state.service.forget(payload).await?;

	Ok(Json(response))
}

async fn get_knowledge(
	State(state): State<AppState>,
	Json(payload): Json<KnowledgeGetRequest>,
) -> Result<Json<KnowledgeView>, ApiError> {
	let response = state.service.get_knowledge(payload).await?;

	Ok(Json(response))
}

async fn topics(
	State(state): State<AppState>,
	Query(query): Query<TopicsRequest>,
) -> Result<Json<TopicsResponse>, ApiError> {
	let response = state.service.topics(query).await?;

	Ok(Json(response))
}

async fn list_aliases(State(state): State<AppState>) -> Result<Json<AliasListResponse>, ApiError> {
	let response = state.service.list_aliases().await?;

	Ok(Json(response))
}

async fn set_alias(
	State(state): State<AppState>,
	Json(payload): Json<SetAliasRequest>,
) -> Result<Json<AliasResponse>, ApiError> {
	let response = state.service.set_alias(payload).await?;

	Ok(Json(response))
}

async fn delete_alias(
	State(state): State<AppState>,
	Json(payload): Json<DeleteAliasRequest>,
) -> Result<Json<AliasResponse>, ApiError> {
	let response = state.service.delete_alias(payload).await?;

	Ok(Json(response))
}

async fn resolve_gap(
	State(state): State<AppState>,
	Json(payload): Json<ResolveGapRequest>,
) -> Result<Json<ResolveGapResponse>, ApiError> {
	let response = state.service.resolve_gap(payload).await?;

	Ok(Json(response))
}

async fn get_gap(
	State(state): State<AppState>,
	Json(payload): Json<GapGetRequest>,
) -> Result<Json<GapView>, ApiError> {
	let response = state.service.get_gap(payload).await?;

	Ok(Json(response))
}

async fn vote(
	State(state): State<AppState>,
	Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
	let response = state.service.vote(payload).await?;

	Ok(Json(response))
}

async fn config_role(
	State(state): State<AppState>,
	Json(payload): Json<ConfigRoleRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
	let response = state.service.config_role(payload).await?;

	Ok(Json(response))
}

async fn config_channel(
	State(state): State<AppState>,
	Json(payload): Json<ConfigChannelRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
	let response = state.service.config_channel(payload).await?;

	Ok(Json(response))
}

async fn config_threshold(
	State(state): State<AppState>,
	Json(payload): Json<ConfigThresholdRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
	let response = state.service.config_threshold(payload).await?;

	Ok(Json(response))
}

async fn config_reply_global(
	State(state): State<AppState>,
	Json(payload): Json<ReplyGlobalRequest>,
) -> Result<Json<ConfigResponse>, ApiError> {
	let response = state.service.config_reply_global(payload).await?;

	Ok(Json(response))
}

async fn config_reply_role(
	State(state): State<AppState>,
	Json(payload): Json<ReplyRoleRequest>,
) -> Result<Json<ReplyRoleResponse>, ApiError> {
	let response = state.service.config_reply_role(payload).await?;

	Ok(Json(response))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
	Json(state.service.status())
}

async fn reindex(
	State(state): State<AppState>,
	Json(payload): Json<ReindexRequest>,
) -> Result<Json<ReindexResponse>, ApiError> {
	let response = state.service.reindex(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::ConfigurationMissing { message } =>
				json_error(StatusCode::PRECONDITION_FAILED, "CONFIGURATION_MISSING", message),
			Error::Forbidden { message } => json_error(StatusCode::FORBIDDEN, "FORBIDDEN", message),
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			Error::NotFound { message } => json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			Error::Conflict { message } => json_error(StatusCode::CONFLICT, "CONFLICT", message),
			Error::Provider { message } => {
				tracing::error!(error = %message, "Provider call failed.");

				json_error(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", "Upstream model call failed.")
			},
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage operation failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", "Internal storage error.")
			},
			Error::Timeout { stage } => {
				tracing::error!(stage = %stage, "Provider call timed out.");

				json_error(StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", format!("The {stage} step timed out."))
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into() }
}
