use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use rust_decimal::Decimal;

use meritx_core::{valid_luhn, Credentials, MeritxError, WithdrawRequest};

use crate::auth::{auth_cookie, CurrentUser};
use crate::error::ApiError;
use crate::routes::AppState;

// ── Registration / login ─────────────────────────────────────────────────────

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let creds = credentials(payload)?;
    let token = state.auth.register(&creds).await?;
    Ok(logged_in(&token))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let creds = credentials(payload)?;
    let token = state.auth.authenticate(&creds).await?;
    Ok(logged_in(&token))
}

fn credentials(payload: Result<Json<Credentials>, JsonRejection>) -> Result<Credentials, ApiError> {
    let Json(creds) = payload.map_err(|e| MeritxError::BadInput(e.to_string()))?;
    if creds.login.is_empty() || creds.password.is_empty() {
        return Err(MeritxError::BadInput("login and password are required".into()).into());
    }
    Ok(creds)
}

fn logged_in(token: &str) -> Response {
    (StatusCode::OK, [(header::SET_COOKIE, auth_cookie(token))]).into_response()
}

// ── Orders ───────────────────────────────────────────────────────────────────

pub async fn upload_order(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    if !content_type_contains(&headers, "text/plain") {
        return Err(MeritxError::BadInput("expected text/plain".into()).into());
    }

    let number = body.trim();
    if !valid_luhn(number) {
        return Err(MeritxError::LuhnInvalid.into());
    }

    state.orders.load(user_id, number).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let orders = state.orders.list(user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(orders).into_response())
}

// ── Balance / withdrawals ────────────────────────────────────────────────────

pub async fn get_balance(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let balance = state.balance.balance(user_id).await?;
    Ok(Json(balance).into_response())
}

pub async fn withdraw(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload.map_err(|e| MeritxError::BadInput(e.to_string()))?;
    if !valid_luhn(&req.order) {
        return Err(MeritxError::LuhnInvalid.into());
    }
    if req.sum <= Decimal::ZERO {
        return Err(MeritxError::BadInput("sum must be positive".into()).into());
    }

    state.balance.withdraw(user_id, &req).await?;
    Ok(StatusCode::OK)
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let withdrawals = state.balance.withdrawals(user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(withdrawals).into_response())
}

fn content_type_contains(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(expected))
}
