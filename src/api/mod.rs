mod cli;
mod report;

use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    ContractPeriod, LedgerEntry, PayoutMode, PlanSummary, RoundingPolicy, SimulationConfig,
    SimulationError, WithdrawalPolicy, simulate, summarize,
};

pub use cli::run_cli;

const MAX_ROUNDING_DECIMALS: u32 = 6;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiWithdrawalPolicy {
    Fatal,
    #[serde(alias = "cap")]
    Clamp,
}

impl From<ApiWithdrawalPolicy> for WithdrawalPolicy {
    fn from(value: ApiWithdrawalPolicy) -> Self {
        match value {
            ApiWithdrawalPolicy::Fatal => WithdrawalPolicy::Fatal,
            ApiWithdrawalPolicy::Clamp => WithdrawalPolicy::Clamp,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPayoutMode {
    #[default]
    Fixed,
    #[serde(alias = "level", alias = "deplete")]
    Annuity,
}

impl From<ApiPayoutMode> for PayoutMode {
    fn from(value: ApiPayoutMode) -> Self {
        match value {
            ApiPayoutMode::Fixed => PayoutMode::Fixed,
            ApiPayoutMode::Annuity => PayoutMode::Annuity,
        }
    }
}

/// One contract period as supplied by a caller. Rates are percentages.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodPayload {
    start_year: i32,
    end_year: i32,
    #[serde(default)]
    annual_deposit: f64,
    #[serde(default)]
    annual_withdrawal: f64,
    #[serde(default, alias = "interest")]
    interest_rate: f64,
    #[serde(default, alias = "tax")]
    tax_rate: f64,
    #[serde(default)]
    payout: ApiPayoutMode,
}

impl From<PeriodPayload> for ContractPeriod {
    fn from(value: PeriodPayload) -> Self {
        ContractPeriod {
            start_year: value.start_year,
            end_year: value.end_year,
            annual_deposit: value.annual_deposit,
            annual_withdrawal: value.annual_withdrawal,
            interest_rate: value.interest_rate / 100.0,
            tax_rate: value.tax_rate / 100.0,
            payout: value.payout.into(),
        }
    }
}

/// JSON body of `POST /api/simulate`, also accepted as a `--plan` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    starting_balance: Option<f64>,
    withdrawal_policy: Option<ApiWithdrawalPolicy>,
    rounding_decimals: Option<u32>,
    periods: Vec<PeriodPayload>,
}

#[derive(Debug)]
struct SimulationRequest {
    config: SimulationConfig,
    periods: Vec<ContractPeriod>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    ledger: Vec<LedgerEntry>,
    summary: Option<PlanSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    period_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
}

impl ErrorResponse {
    fn invalid_request(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
            kind: "invalid-request",
            period_index: None,
            year: None,
        }
    }
}

impl From<&SimulationError> for ErrorResponse {
    fn from(err: &SimulationError) -> Self {
        match err {
            SimulationError::Configuration(e) => Self {
                error: err.to_string(),
                kind: "configuration",
                period_index: e.period_index,
                year: None,
            },
            SimulationError::FundsExhausted(e) => Self {
                error: err.to_string(),
                kind: "funds-exhausted",
                period_index: Some(e.period_index),
                year: Some(e.year),
            },
        }
    }
}

fn request_from_payload(payload: SimulatePayload) -> Result<SimulationRequest, String> {
    let mut config = SimulationConfig::default();

    if let Some(v) = payload.starting_balance {
        config.starting_balance = v;
    }
    if let Some(v) = payload.withdrawal_policy {
        config.withdrawal_policy = v.into();
    }
    if let Some(decimals) = payload.rounding_decimals {
        if decimals > MAX_ROUNDING_DECIMALS {
            return Err(format!(
                "roundingDecimals must be <= {MAX_ROUNDING_DECIMALS}"
            ));
        }
        config.rounding = RoundingPolicy::MinorUnit { decimals };
    }

    if payload.periods.is_empty() {
        return Err("at least one period is required".to_string());
    }

    Ok(SimulationRequest {
        config,
        periods: payload.periods.into_iter().map(Into::into).collect(),
    })
}

fn request_from_json(json: &str) -> Result<SimulationRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid plan JSON: {e}"))?;
    request_from_payload(payload)
}

fn run_request(request: &SimulationRequest) -> Result<SimulateResponse, SimulationError> {
    let ledger = simulate(&request.config, &request.periods)?;
    let summary = summarize(request.config.starting_balance, &ledger);
    Ok(SimulateResponse { ledger, summary })
}

fn error_status(err: &SimulationError) -> StatusCode {
    match err {
        SimulationError::Configuration(_) => StatusCode::BAD_REQUEST,
        SimulationError::FundsExhausted(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "lijfrente HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/simulate", post(simulate_post_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    with_cache_control("ok")
}

async fn not_found_handler() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        ErrorResponse {
            error: "Not found".to_string(),
            kind: "not-found",
            period_index: None,
            year: None,
        },
    )
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let request = match request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            return json_response(StatusCode::BAD_REQUEST, ErrorResponse::invalid_request(&msg));
        }
    };

    match run_request(&request) {
        Ok(response) => {
            info!(
                periods = request.periods.len(),
                years = response.ledger.len(),
                "simulation served"
            );
            json_response(StatusCode::OK, response)
        }
        Err(err) => {
            info!(error = %err, "simulation rejected");
            json_response(error_status(&err), ErrorResponse::from(&err))
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}
