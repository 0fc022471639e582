use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::{
    outbound::{EmailTransport, SmsProvider},
    session,
};

/// Shared state for the send endpoints. Providers stay `None` when their
/// credentials are not configured; the endpoints answer 500 in that case.
#[derive(Clone)]
pub struct ServerState {
    pub pool: SqlitePool,
    pub mailer: Option<Arc<dyn EmailTransport>>,
    pub sms: Option<Arc<dyn SmsProvider>>,
    pub require_email_auth: bool,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing required fields: {0}")]
    MissingFields(&'static str),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("{0} service not configured")]
    NotConfigured(&'static str),

    #[error("Failed to send email")]
    EmailSendFailed,

    #[error("Failed to send SMS: {0}")]
    SmsSendFailed(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotConfigured(_)
            | ApiError::EmailSendFailed
            | ApiError::SmsSendFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `to` accepts a single address or a list, like the email providers do.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    pub to: Option<OneOrMany>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SmsPayload {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

async fn authorize(pool: &SqlitePool, headers: &HeaderMap) -> Result<(), ApiError> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized("No token provided"))?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw);
    match session::lookup_token(pool, token).await {
        Ok(Some(_)) => Ok(()),
        _ => Err(ApiError::Unauthorized("Invalid token")),
    }
}

pub async fn send_email(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<EmailPayload>,
) -> Result<Json<Value>, ApiError> {
    if state.require_email_auth {
        authorize(&state.pool, &headers).await?;
    }

    let to: Vec<String> = payload
        .to
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter(|addr| !addr.is_empty())
        .collect();
    let subject = payload.subject.unwrap_or_default();
    let body = payload.html.or(payload.text).unwrap_or_default();
    if to.is_empty() || subject.is_empty() || body.is_empty() {
        return Err(ApiError::MissingFields("to, subject, and html"));
    }

    let mailer = state
        .mailer
        .as_ref()
        .ok_or(ApiError::NotConfigured("Email"))?;
    match mailer.send(&to, &subject, &body).await {
        Ok(id) => {
            info!(target: "kitchenhub", area = "api", recipients = to.len(), "email_sent");
            Ok(Json(json!({ "success": true, "id": id })))
        }
        Err(err) => {
            error!(target: "kitchenhub", area = "api", error = %err, "email_send_failed");
            Err(ApiError::EmailSendFailed)
        }
    }
}

pub async fn send_sms(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<SmsPayload>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.pool, &headers).await?;

    let to = payload.to.unwrap_or_default();
    let body = payload.body.unwrap_or_default();
    if to.is_empty() || body.is_empty() {
        return Err(ApiError::MissingFields("to, body"));
    }

    let sms = state.sms.as_ref().ok_or(ApiError::NotConfigured("SMS"))?;
    match sms.send(&to, &body).await {
        Ok(sid) => {
            info!(target: "kitchenhub", area = "api", sid = %sid, "sms_sent");
            Ok(Json(json!({ "success": true, "sid": sid })))
        }
        Err(err) => {
            error!(target: "kitchenhub", area = "api", error = %err, "sms_send_failed");
            Err(ApiError::SmsSendFailed(err.message().to_string()))
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/send-email", post(send_email))
        .route("/api/send-sms", post(send_sms))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
