//! HTTP routes
//!
//! A thin adapter: every route decodes its input, resolves the caller's session
//! from the cookie and hands off to the access core.

use crate::access::{AccessError, LinkIssuer, RedemptionService};
use crate::auth::{SessionAuthority, SessionId, SessionKey};
use crate::server::cookies::{clear_session_cookie, session_cookie, session_from_headers};
use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, Level};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionAuthority>,
    pub session_key: SessionKey,
    pub redemption: Arc<RedemptionService>,
    pub links: Arc<LinkIssuer>,
    pub secure_cookies: bool,
}

impl AppState {
    /// The caller's live session, if the request carries one
    fn current_session(&self, headers: &HeaderMap) -> Option<SessionId> {
        session_from_headers(headers, &self.session_key)
            .filter(|id| self.sessions.get(id).is_some())
    }
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/folders", get(folders_handler))
        .route("/authenticate", post(authenticate_handler))
        .route("/download/{folder}", get(files_handler))
        .route("/download/{folder}/{file}", get(download_handler))
        .route("/logout", get(logout_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FoldersResponse {
    pub folders: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    pub folder: String,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateForm {
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub folder: String,
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.error_code().to_string(),
            message: self.denial_message(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn folders_handler(State(state): State<AppState>) -> Json<FoldersResponse> {
    let folders = state
        .links
        .list_groups()
        .into_iter()
        .map(|g| g.to_string())
        .collect();
    Json(FoldersResponse { folders })
}

async fn authenticate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
) -> Response {
    let form = match read_authenticate_input(request).await {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };

    let (session, is_new) = match state.current_session(&headers) {
        Some(id) => (id, false),
        None => (state.sessions.create().id, true),
    };

    match state
        .redemption
        .redeem(&form.otp, &form.folder, &session)
        .await
    {
        Ok(group) => {
            let location = format!("/download/{}", urlencoding::encode(group.as_str()));
            let mut response =
                (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response();
            if is_new {
                if let Some(cookie) = session_cookie(
                    &state.session_key,
                    &session,
                    state.sessions.lifetime(),
                    state.secure_cookies,
                ) {
                    response.headers_mut().insert(header::SET_COOKIE, cookie);
                }
            }
            response
        }
        Err(e) => {
            if is_new {
                // Only sessions that unlocked something are handed out
                state.sessions.destroy(&session);
            }
            e.into_response()
        }
    }
}

/// Accept the credentials either as a urlencoded form or as a JSON object
async fn read_authenticate_input(request: Request) -> Result<AuthenticateForm, AccessError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        let Json(form) = Json::<AuthenticateForm>::from_request(request, &())
            .await
            .map_err(|e| AccessError::Validation(e.body_text()))?;
        Ok(form)
    } else {
        let Form(form) = Form::<AuthenticateForm>::from_request(request, &())
            .await
            .map_err(|e| AccessError::Validation(e.body_text()))?;
        Ok(form)
    }
}

async fn files_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(folder): Path<String>,
) -> Result<Json<FilesResponse>, AccessError> {
    let session = state
        .current_session(&headers)
        .ok_or(AccessError::Unauthorized)?;

    let files = state
        .links
        .list_items(&session, &folder)?
        .into_iter()
        .map(|i| i.to_string())
        .collect();

    Ok(Json(FilesResponse { folder, files }))
}

async fn download_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((folder, file)): Path<(String, String)>,
) -> Result<Response, AccessError> {
    let session = state
        .current_session(&headers)
        .ok_or(AccessError::Unauthorized)?;

    let link = state.links.issue(&session, &folder, &file).await?;
    debug!(folder = %folder, file = %file, "Redirecting to delegated link");

    Ok((StatusCode::FOUND, [(header::LOCATION, link.url)]).into_response())
}

async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session) = session_from_headers(&headers, &state.session_key) {
        if state.sessions.destroy(&session) {
            info!(session_id = %session, "Logged out");
        }
    }

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, HeaderValue::from_static("/")),
            (header::SET_COOKIE, clear_session_cookie()),
        ],
    )
        .into_response()
}
