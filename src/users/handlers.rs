use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::{
    error::ApiError,
    state::AppState,
    users::{
        dto::{PublicUser, UserListResponse, UserResponse},
        services::{limit_from_query, validate_user_input},
    },
};

/// `application/json` or any `application/*+json` media type.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(mime) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
    else {
        return false;
    };
    let mime = mime.trim().to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users", get(list_users).post(create_or_update_user))
}

/// POST /users: create the user, or rename it when the email is known.
#[instrument(skip(state, headers, body))]
pub async fn create_or_update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // a non-JSON or empty body parses as `{}`
    let body = if !is_json_content_type(&headers) || body.is_empty() {
        Value::Object(Default::default())
    } else {
        match Json::<Value>::from_bytes(&body) {
            Ok(Json(v)) => v,
            Err(rejection) => return Ok(rejection.into_response()),
        }
    };

    let input = validate_user_input(&body).map_err(|issues| {
        warn!(issues = issues.len(), "invalid user input");
        ApiError::Validation(issues)
    })?;

    let user = state.store.upsert_by_email(&input).await.map_err(|e| {
        warn!(error = %e, email = %input.email, "upsert user failed");
        ApiError::from(e)
    })?;

    info!(user_id = %user.id, email = %user.email, "user saved");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            ok: true,
            user: PublicUser::from(user),
        }),
    )
        .into_response())
}

/// GET /users?limit=N: newest users first.
#[instrument(skip(state, params))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<UserListResponse>, StatusCode> {
    let limit = limit_from_query(&params);
    let users = state.store.list_recent(limit).await.map_err(|e| {
        error!(error = %e, limit, "list users failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(UserListResponse {
        ok: true,
        users: users.into_iter().map(PublicUser::from).collect(),
    }))
}
