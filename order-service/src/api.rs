use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tracing::error;

use crate::handlers::OrderService;
use crate::store::OrderStore;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i32>,
}

#[derive(Debug)]
pub enum ApiError {
    Order(OrderError),
    Unauthenticated(String),
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Unauthenticated(message) => {
                let body = ErrorResponse {
                    error: "unauthenticated".to_string(),
                    message,
                    book_id: None,
                    available: None,
                };
                return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
            }
            ApiError::Order(err) => err,
        };

        let status = match &err {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::InsufficientStock { .. } | OrderError::State(_) => StatusCode::CONFLICT,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
            OrderError::Conflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrderError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &err {
            OrderError::Storage(detail) => {
                error!("Storage failure: {}", detail);
                "A temporary server error occurred, please retry".to_string()
            }
            other => other.to_string(),
        };

        let (book_id, available) = match &err {
            OrderError::InsufficientStock {
                book_id, available, ..
            } => (Some(*book_id), Some(*available)),
            _ => (None, None),
        };

        let body = ErrorResponse {
            error: err.kind().to_string(),
            message,
            book_id,
            available,
        };
        (status, Json(body)).into_response()
    }
}

/// Requester identity, taken from the `x-user-id` / `x-user-role` headers set
/// by the authenticating proxy.
pub struct Requester(pub Actor);

#[async_trait]
impl<St> FromRequestParts<St> for Requester
where
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or_else(|| ApiError::Unauthenticated("Missing or invalid user identity".to_string()))?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |role| role.trim().eq_ignore_ascii_case("admin"));

        Ok(Requester(Actor { id, is_admin }))
    }
}

pub fn create_router<S: OrderStore>(service: Arc<OrderService<S>>) -> Router {
    Router::new()
        .route("/orders", post(place_order::<S>).get(list_orders::<S>))
        .route("/orders/:id", get(get_order::<S>))
        .route("/orders/:id/cancel", put(cancel_order::<S>))
        .route("/orders/:id/status", put(update_order_status::<S>))
        .route("/health", get(health_check))
        .with_state(service)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn place_order<S: OrderStore>(
    State(service): State<Arc<OrderService<S>>>,
    Requester(actor): Requester,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderDetails>), ApiError> {
    let details = service.place_order(actor.id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list_orders<S: OrderStore>(
    State(service): State<Arc<OrderService<S>>>,
    Requester(actor): Requester,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderPage>, ApiError> {
    let filter = OrderFilter::try_from(query)?;
    let page = service.list_orders_for_user(actor.id, filter).await?;
    Ok(Json(page))
}

pub async fn get_order<S: OrderStore>(
    State(service): State<Arc<OrderService<S>>>,
    Requester(actor): Requester,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetails>, ApiError> {
    let details = service.get_order(order_id, actor).await?;
    Ok(Json(details))
}

pub async fn cancel_order<S: OrderStore>(
    State(service): State<Arc<OrderService<S>>>,
    Requester(actor): Requester,
    Path(order_id): Path<i64>,
    request: Option<Json<CancelOrderRequest>>,
) -> Result<StatusCode, ApiError> {
    let reason = request.and_then(|Json(body)| body.reason);
    service.cancel_order(order_id, actor, reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_order_status<S: OrderStore>(
    State(service): State<Arc<OrderService<S>>>,
    Requester(actor): Requester,
    Path(order_id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let status: OrderStatus = request.status.parse()?;
    let order = service
        .update_order_status(order_id, actor, status, request.tracking_number, request.notes)
        .await?;
    Ok(Json(order))
}

pub async fn health_check() -> &'static str {
    "OK"
}
