use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use marcador_execution::Error;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::Service;

mod http;
mod ws;

const REQUEST_ID: &str = "x-request-id";

/// Error returned by every handler, rendered as `{ "error": code, "message": text }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] Error),
    #[error("{0}")]
    Body(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Engine(err) => match err {
                Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::InsufficientFunds { .. }
                | Error::InvalidState(_)
                | Error::AlreadySettled(_)
                | Error::Conflict => StatusCode::CONFLICT,
                Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Body(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Engine(err) => err.code(),
            Self::Body(_) => "invalid_body",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub struct Api {
    service: Arc<Service>,
}

impl Api {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::HeaderName::from_static(REQUEST_ID),
            ])
            .expose_headers([header::HeaderName::from_static(REQUEST_ID)]);

        let router = Router::new()
            .route("/healthz", get(http::healthz))
            .route("/users", post(http::register_user))
            .route("/users/:id", get(http::get_user))
            .route("/users/:id/referrals", get(http::referral_status))
            .route("/users/:id/commission", get(http::commission_quote))
            .route("/users/:id/bets", get(http::list_user_bets))
            .route("/users/:id/withdrawals", get(http::list_withdrawals))
            .route("/wallets/:id", get(http::get_wallet))
            .route("/wallets/:id/transactions", get(http::list_transactions))
            .route("/wallets/:id/deposits", post(http::deposit))
            .route("/wallets/:id/commissions", post(http::commission))
            .route("/wallets/:id/adjustments", post(http::adjustment))
            .route("/events", get(http::list_events).post(http::create_event))
            .route("/events/:id", get(http::get_event))
            .route("/events/:id/bets", get(http::list_event_bets))
            .route("/events/:id/settle", post(http::settle_event))
            .route("/events/:id/cancel", post(http::cancel_event))
            .route("/bets", post(http::place_bet))
            .route("/bets/:id", get(http::get_bet))
            .route("/withdrawals", post(http::request_withdrawal))
            .route("/withdrawals/:id", get(http::get_withdrawal))
            .route("/withdrawals/:id/approve", post(http::approve_withdrawal))
            .route("/withdrawals/:id/reject", post(http::reject_withdrawal))
            .route("/updates", get(ws::all_updates_ws))
            .route("/updates/:user_id", get(ws::user_updates_ws));

        let router = match self.service.config().body_limit_bytes {
            Some(limit) if limit > 0 => router.layer(DefaultBodyLimit::max(limit)),
            _ => router,
        };

        router
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(request_id_middleware))
                    .layer(cors),
            )
            .with_state(self.service.clone())
    }
}

async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(header::HeaderName::from_static(REQUEST_ID), header_value);
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}
