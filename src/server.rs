use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

use eios_parser::{parse_time, to_ics};
use eios_schedule::portal::{Credentials, PlanDirectory};
use eios_schedule::{Error, ScheduleService};

pub struct AppState {
    pub service: ScheduleService,
    pub plans: PlanDirectory,
}

type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/schedule/day", get(handle_day))
        .route("/api/schedule/week", get(handle_week))
        .route("/api/schedule/day-detail", get(handle_day_detail))
        .route("/api/schedule/event-detail", get(handle_event_detail))
        .route("/api/schedule/cache", delete(handle_invalidate))
        .with_state(state)
}

enum ApiError {
    Unauthorized,
    BadRequest(String),
    Schedule(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Schedule(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Basic credentials required".to_string(),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Schedule(err) => {
                let status = match &err {
                    Error::NotFound { .. } => StatusCode::NOT_FOUND,
                    Error::Validation(_) => StatusCode::BAD_REQUEST,
                    Error::StateExtraction(_) | Error::PlanNotFound => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    Error::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
                    Error::Upstream { .. } | Error::Transport(_) => StatusCode::BAD_GATEWAY,
                };

                if status.is_server_error() {
                    error!(error = %err, "schedule request failed");
                }
                (status, err.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Account and password from an `Authorization: Basic` header.
fn basic_auth(headers: &HeaderMap) -> Result<(String, String), ApiError> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .ok_or(ApiError::Unauthorized)?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(ApiError::Unauthorized)?;

    let (account, secret) = decoded.split_once(':').ok_or(ApiError::Unauthorized)?;
    Ok((account.to_string(), secret.to_string()))
}

async fn credentials(
    state: &AppState,
    headers: &HeaderMap,
    plan: Option<String>,
) -> Result<Credentials, ApiError> {
    let (account, secret) = basic_auth(headers)?;

    let plan = match plan {
        Some(plan) => plan,
        None => state.plans.plan_id(&account, &secret).await?,
    };

    Ok(Credentials::new(account, secret, plan))
}

#[derive(Deserialize)]
struct DayQuery {
    date: NaiveDate,
    plan: Option<String>,
    #[serde(default)]
    force_refresh: bool,
}

#[derive(Deserialize)]
struct WeekQuery {
    start_date: NaiveDate,
    plan: Option<String>,
    #[serde(default)]
    force_refresh: bool,
    format: Option<String>,
}

#[derive(Deserialize)]
struct EventQuery {
    date: NaiveDate,
    start_time: String,
    plan: Option<String>,
    #[serde(default)]
    force_refresh: bool,
}

async fn handle_day(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<DayQuery>,
) -> Result<Response, ApiError> {
    let credentials = credentials(&state, &headers, query.plan).await?;
    let events = state
        .service
        .day(&credentials, query.date, query.force_refresh)
        .await?;

    Ok(Json(events).into_response())
}

async fn handle_week(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<WeekQuery>,
) -> Result<Response, ApiError> {
    let credentials = credentials(&state, &headers, query.plan).await?;
    let week = state
        .service
        .week(&credentials, query.start_date, query.force_refresh)
        .await?;

    match query.format.as_deref() {
        None | Some("json") => Ok(Json(week).into_response()),
        Some("ics") => Ok((
            [(header::CONTENT_TYPE, "text/calendar")],
            to_ics(&credentials.account, week.values().flatten()).to_string(),
        )
            .into_response()),
        Some(other) => Err(ApiError::BadRequest(format!("unknown format `{other}`"))),
    }
}

async fn handle_day_detail(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<DayQuery>,
) -> Result<Response, ApiError> {
    let credentials = credentials(&state, &headers, query.plan).await?;
    let events = state
        .service
        .day_detail(&credentials, query.date, query.force_refresh)
        .await?;

    Ok(Json(events).into_response())
}

async fn handle_event_detail(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<EventQuery>,
) -> Result<Response, ApiError> {
    let start = parse_time(&query.start_time).ok_or_else(|| {
        ApiError::BadRequest(format!("`{}` is not a HH:MM time", query.start_time))
    })?;

    let credentials = credentials(&state, &headers, query.plan).await?;
    let event = state
        .service
        .event_detail(&credentials, query.date, start, query.force_refresh)
        .await?;

    Ok(Json(event).into_response())
}

#[derive(Serialize)]
struct Invalidated {
    removed: usize,
}

async fn handle_invalidate(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (account, _) = basic_auth(&headers)?;
    let removed = state.service.invalidate(&account).await;
    state.plans.forget(&account).await;

    Ok(Json(Invalidated { removed }).into_response())
}
