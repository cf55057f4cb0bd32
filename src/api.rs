use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::{VoucherError, VoucherResult};
use crate::manager::VoucherManager;
use crate::types::{
    AccountId, ProgramId, VoucherDetails, VoucherId, VoucherStatus, DEFAULT_VOUCHER_AMOUNT,
    DEFAULT_VOUCHER_DURATION_SECS,
};

#[derive(Clone)]
struct AppState {
    manager: Arc<VoucherManager>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestVoucherBody {
    account: String,
    amount: Option<u128>,
    duration_in_sec: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoucherIdResponse {
    voucher_id: VoucherId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueBody {
    account: String,
    amount: u128,
    duration_in_sec: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProlongBody {
    voucher_id: String,
    account: String,
    balance: u128,
    duration_in_sec: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeBody {
    voucher_id: String,
    account: String,
}

pub fn router(manager: Arc<VoucherManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/gasless/voucher/request", post(request_voucher))
        .route("/gasless/voucher/:voucher_id/status", get(voucher_status))
        .route(
            "/gasless/voucher/details/:account/:program_id",
            get(voucher_details),
        )
        .route("/issue", post(issue_voucher))
        .route("/prolong", post(prolong_voucher))
        .route("/revoke", post(revoke_voucher))
        .layer(CorsLayer::permissive())
        .with_state(AppState { manager })
}

pub async fn serve(manager: Arc<VoucherManager>, addr: SocketAddr) -> VoucherResult<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(?addr, "voucher service listening");
    axum::serve(listener, router(manager))
        .await
        .map_err(|err| VoucherError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        address: state.manager.identity().address().to_string(),
    })
}

async fn request_voucher(
    State(state): State<AppState>,
    Json(body): Json<RequestVoucherBody>,
) -> Result<Json<VoucherIdResponse>, (StatusCode, Json<ErrorResponse>)> {
    let account = AccountId::parse_strict(&body.account).map_err(to_http_error)?;
    let amount = body.amount.unwrap_or(DEFAULT_VOUCHER_AMOUNT);
    let duration = body.duration_in_sec.unwrap_or(DEFAULT_VOUCHER_DURATION_SECS);
    let program = state.manager.program();
    state
        .manager
        .issue_if_needed(account, program, amount, duration)
        .await
        .map(|voucher_id| Json(VoucherIdResponse { voucher_id }))
        .map_err(to_http_error)
}

async fn voucher_status(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
) -> Json<VoucherStatus> {
    let normalized = if voucher_id.starts_with("0x") {
        voucher_id
    } else {
        format!("0x{voucher_id}")
    };
    // Garbage identifiers are a valid negative lookup, not an error.
    match normalized.parse::<VoucherId>() {
        Ok(voucher_id) => Json(state.manager.voucher_status(voucher_id).await),
        Err(_) => Json(VoucherStatus::missing()),
    }
}

async fn voucher_details(
    State(state): State<AppState>,
    Path((account, program_id)): Path<(String, String)>,
) -> Result<Json<VoucherDetails>, (StatusCode, Json<ErrorResponse>)> {
    let account = AccountId::parse_strict(&account).map_err(to_http_error)?;
    let program: ProgramId = program_id.parse().map_err(to_http_error)?;
    state
        .manager
        .voucher_details_for_program(account, program)
        .await
        .map(Json)
        .map_err(to_http_error)
}

async fn issue_voucher(
    State(state): State<AppState>,
    Json(body): Json<IssueBody>,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    let account = AccountId::parse_strict(&body.account).map_err(to_http_error)?;
    let program = state.manager.program();
    state
        .manager
        .issue(account, program, body.amount, body.duration_in_sec)
        .await
        .map(|voucher_id| voucher_id.to_string())
        .map_err(to_http_error)
}

async fn prolong_voucher(
    State(state): State<AppState>,
    Json(body): Json<ProlongBody>,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let voucher_id: VoucherId = body.voucher_id.parse().map_err(to_http_error)?;
    let account = AccountId::parse_strict(&body.account).map_err(to_http_error)?;
    state
        .manager
        .prolong(voucher_id, account, body.balance, body.duration_in_sec)
        .await
        .map_err(to_http_error)
}

async fn revoke_voucher(
    State(state): State<AppState>,
    Json(body): Json<RevokeBody>,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let voucher_id: VoucherId = body.voucher_id.parse().map_err(to_http_error)?;
    let account = AccountId::parse_strict(&body.account).map_err(to_http_error)?;
    state
        .manager
        .revoke(voucher_id, account)
        .await
        .map_err(to_http_error)
}

fn to_http_error(err: VoucherError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        VoucherError::Validation(_) => StatusCode::BAD_REQUEST,
        VoucherError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
