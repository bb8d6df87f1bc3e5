//! HTTP surface: probes, metrics, mint intake and token lookups.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use random_mint::{MintError, RandomnessOracle, Requester, RequestId, TokenId, TokenLedger};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ServiceWorkflow;
use crate::metrics::Metrics;

/// Shared application state accessible from HTTP handlers.
pub struct AppState {
    pub workflow: Arc<ServiceWorkflow>,
    pub metrics: Arc<Metrics>,
    /// Number of fulfillments currently in-flight.
    pub in_flight: Arc<AtomicU64>,
}

/// [`MintError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub MintError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<MintError> for ApiError {
    fn from(err: MintError) -> Self {
        Self(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            MintError::InsufficientPayment { .. } => StatusCode::PAYMENT_REQUIRED,
            MintError::FeeRejected { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MintError::DuplicateRequest(_) => StatusCode::CONFLICT,
            MintError::UnknownRequest(_) | MintError::UnknownToken(_) => StatusCode::NOT_FOUND,
            MintError::NotOwner => StatusCode::FORBIDDEN,
            MintError::RangeExceeded { .. }
            | MintError::InvalidRarityTable(_)
            | MintError::MissingTokenUri(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.0.to_string(),
            "class": format!("{:?}", self.0.class()),
        }))
    }
}

#[derive(Debug, Deserialize)]
pub struct MintRequestBody {
    pub requester: String,
    /// Amounts are decimal strings: wei values overflow JSON-safe integers.
    pub payment: String,
}

/// Identity claimed by the caller of an owner-only route.
#[derive(Debug, Deserialize)]
pub struct CallerBody {
    pub caller: String,
}

/// Liveness probe. Returns 200 if the process is running.
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Readiness / status probe.
async fn status(data: web::Data<AppState>) -> HttpResponse {
    let wf = &data.workflow;
    HttpResponse::Ok().json(serde_json::json!({
        "status": "running",
        "pending_requests": wf.pending_count(),
        "oracle_outstanding": wf.oracle().outstanding(),
        "unreconciled_fulfillments": wf.unreconciled().len(),
        "in_flight_fulfillments": data.in_flight.load(Ordering::Relaxed),
        "token_counter": wf.ledger().token_counter(),
        "treasury_balance": wf.treasury_balance().to_string(),
    }))
}

async fn metrics(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.metrics.to_json())
}

async fn collection(data: web::Data<AppState>) -> HttpResponse {
    let wf = &data.workflow;
    let ledger = wf.ledger();
    HttpResponse::Ok().json(serde_json::json!({
        "name": ledger.name(),
        "symbol": ledger.symbol(),
        "mint_fee": wf.mint_fee().to_string(),
        "token_counter": ledger.token_counter(),
        "category_uris": ledger.category_uris(),
        "rarity_table": wf.rarity_table(),
    }))
}

async fn request_mint(
    data: web::Data<AppState>,
    body: web::Json<MintRequestBody>,
) -> Result<HttpResponse, ApiError> {
    let Ok(payment) = body.payment.trim().parse::<u128>() else {
        return Ok(HttpResponse::BadRequest()
            .json(serde_json::json!({"error": format!("invalid payment: {}", body.payment)})));
    };

    match data
        .workflow
        .request_mint(Requester::new(body.requester.clone()), payment)
    {
        Ok(request_id) => {
            data.metrics.record_request();
            Ok(HttpResponse::Accepted().json(serde_json::json!({ "request_id": request_id })))
        }
        Err(e) => {
            data.metrics.record_request_rejected();
            Err(e.into())
        }
    }
}

async fn get_request(
    data: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let request_id = RequestId(path.into_inner());
    let request = data
        .workflow
        .pending_request(request_id)
        .ok_or(MintError::UnknownRequest(request_id))?;
    Ok(HttpResponse::Ok().json(request))
}

/// Operator purge of a pending request. Owner only.
async fn purge_request(
    data: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<CallerBody>,
) -> Result<HttpResponse, ApiError> {
    let request = data
        .workflow
        .purge_request(&Requester::new(body.caller.clone()), RequestId(path.into_inner()))?;
    Ok(HttpResponse::Ok().json(request))
}

async fn get_token(
    data: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let token_id = TokenId(path.into_inner());
    let ledger = data.workflow.ledger();
    let token = ledger.token(token_id)?;
    let token_uri = ledger.token_uri(token_id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token_id": token.token_id,
        "category": token.category,
        "owner": token.owner,
        "token_uri": token_uri,
    })))
}

async fn withdraw(
    data: web::Data<AppState>,
    body: web::Json<CallerBody>,
) -> Result<HttpResponse, ApiError> {
    let amount = data
        .workflow
        .withdraw(&Requester::new(body.caller.clone()))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "amount": amount.to_string() })))
}

/// Register every route on an actix `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/status", web::get().to(status))
        .route("/metrics", web::get().to(metrics))
        .route("/collection", web::get().to(collection))
        .route("/mint", web::post().to(request_mint))
        .route("/requests/{id}", web::get().to(get_request))
        .route("/requests/{id}", web::delete().to(purge_request))
        .route("/tokens/{id}", web::get().to(get_token))
        .route("/admin/withdraw", web::post().to(withdraw));
}
