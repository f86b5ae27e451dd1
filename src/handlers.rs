use crate::access_gate;
use crate::access_guard::AccessGuard;
use crate::amortization::{self, STANDARD_TERMS};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::routes::{self, RouteAccess, RouteSpec};
use axum::{
    extract::{FromRequest, Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Fetch-then-evaluate access guard backed by the identity provider.
    pub guard: AccessGuard,
}

/// JSON body extractor whose rejections render as [`AppError`] JSON bodies.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// API routes, without the transport layers added in `main`.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/routes", get(list_routes))
        .route("/api/v1/access/evaluate", post(evaluate_access))
        .route("/api/v1/access/check/:route", get(check_access))
        .route("/api/v1/financing/simulate", post(simulate_financing))
        .route("/api/v1/financing/options", post(financing_options))
        .route("/api/v1/session/events", post(session_event))
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "banking-gate",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/routes
///
/// Lists every page and the requirements it is gated by.
pub async fn list_routes() -> Json<&'static [RouteSpec]> {
    Json(routes::ROUTES)
}

/// POST /api/v1/access/evaluate
///
/// Pure decision over an explicit account and requirement. No provider calls.
pub async fn evaluate_access(
    AppJson(request): AppJson<EvaluateRequest>,
) -> Json<AccessDecision> {
    let decision = access_gate::evaluate(request.account.as_ref(), request.requirement);
    tracing::debug!("Evaluated {:?} -> {:?}", request.requirement, decision);
    Json(decision)
}

/// GET /api/v1/access/check/:route
///
/// Resolves the caller's bearer token with the identity provider and decides
/// access to the named route. Access failures are decisions, so the status
/// is 200 for every known route.
pub async fn check_access(
    State(state): State<Arc<AppState>>,
    Path(route): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AccessDecision>, AppError> {
    let page = routes::find(&route)
        .ok_or_else(|| AppError::NotFound(format!("Route '{}' is not defined", route)))?;

    let requirement = match page.access {
        RouteAccess::Public => return Ok(Json(AccessDecision::Allow)),
        RouteAccess::Guarded(requirement) => requirement,
    };

    let token = bearer_token(&headers);
    let decision = state.guard.check(token, requirement).await;

    tracing::info!("Access check for '{}': {:?}", route, decision);
    Ok(Json(decision))
}

/// POST /api/v1/financing/simulate
///
/// Computes one financing quote, rounded to cents.
pub async fn simulate_financing(
    AppJson(inputs): AppJson<FinancingInputs>,
) -> Result<Json<FinancingQuote>, AppError> {
    let (term_months, result) = amortization::compute_for(&inputs)?;
    Ok(Json(result.quote(term_months)))
}

/// POST /api/v1/financing/options
///
/// Computes a quote for each term of the menu (standard menu by default).
pub async fn financing_options(
    AppJson(request): AppJson<FinancingOptionsRequest>,
) -> Result<Json<Vec<FinancingQuote>>, AppError> {
    let terms = match &request.terms {
        Some(raw) => raw
            .iter()
            .map(amortization::parse_term)
            .collect::<Result<Vec<_>, _>>()?,
        None => STANDARD_TERMS.to_vec(),
    };
    let options = amortization::installment_options(
        &request.principal,
        &request.down_payment,
        &request.monthly_rate_percent,
        &terms,
    )?;

    Ok(Json(
        options
            .iter()
            .map(|(term, result)| result.quote(*term))
            .collect(),
    ))
}

/// POST /api/v1/session/events
///
/// Webhook through which the identity provider pushes sign-in/sign-out.
pub async fn session_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(event): AppJson<SessionEvent>,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = state.config.session_webhook_secret.as_deref() {
        let provided = headers
            .get("x-webhook-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_compare(provided, expected) {
            return Err(AppError::Unauthorized(
                "session webhook secret mismatch".to_string(),
            ));
        }
    }

    if event.account_id.trim().is_empty() {
        return Err(AppError::BadRequest("account_id is required".to_string()));
    }

    state.guard.apply_event(event).await;
    Ok(StatusCode::ACCEPTED)
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}
