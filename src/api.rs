//! HTTP API: storefront checkout plus the password-gated admin order views.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminSession, AdminSessions};
use crate::config::StoreConfig;
use crate::domain::aggregates::{Checkout, Customer, LineItem, Locale, Order, OrderError, OrderStatus};
use crate::domain::correlation::{find_matches, OrderMatches};
use crate::domain::fingerprint::FingerprintToken;
use crate::publisher::EventPublisher;
use crate::store::OrderStore;
use crate::StoreError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub sessions: AdminSessions,
    pub publisher: EventPublisher,
    pub config: Arc<StoreConfig>,
}

impl AppState {
    pub fn new(config: StoreConfig, store: Arc<dyn OrderStore>, publisher: EventPublisher) -> Self {
        let sessions = AdminSessions::new(config.admin_password.clone(), config.admin_session_ttl);
        Self { store, sessions, publisher, config: Arc::new(config) }
    }
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(order_detail))
        .route("/orders/:id/status", put(update_status))
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route("/login", post(login));

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/checkout", post(checkout))
        .nest("/api/v1/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::OrderNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Order(OrderError::InvalidTransition { .. }) | Self::StatusConflict { .. } => StatusCode::CONFLICT,
            Self::Order(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CorruptRecord { .. } | Self::Database(_) | Self::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, StoreError>;

// =============================================================================
// Auth
// =============================================================================

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn require_admin(State(s): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = bearer_token(req.headers()).map(ToOwned::to_owned);
    let session = match token {
        Some(token) => s.sessions.authorize(&token).await,
        None => None,
    };
    match session {
        Some(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        None => StoreError::Unauthorized.into_response(),
    }
}

#[derive(Debug, Deserialize)] pub struct LoginRequest { pub password: String }
#[derive(Debug, Serialize)] pub struct LoginResponse { pub token: String, pub expires_at: DateTime<Utc> }

async fn login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
    let session = s.sessions.login(&r.password).await.ok_or(StoreError::Unauthorized)?;
    Ok(Json(LoginResponse { token: session.token, expires_at: session.expires_at }))
}

async fn logout(State(s): State<AppState>, Extension(session): Extension<AdminSession>) -> StatusCode {
    s.sessions.logout(&session.token).await;
    StatusCode::NO_CONTENT
}

// =============================================================================
// Storefront
// =============================================================================

async fn health(State(s): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "souq-orders",
        "store": { "en": s.config.store_name_en, "ar": s.config.store_name_ar },
        "events": s.publisher.is_enabled(),
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(min = 1, max = 40))]
    pub customer_phone: String,
    #[validate(length(min = 1, max = 1000))]
    pub customer_address: String,
    #[validate(length(min = 1))]
    pub items: Vec<LineItem>,
    pub notes: Option<String>,
    pub geolocation: Option<String>,
    pub fingerprint: Option<FingerprintToken>,
}

/// Forwarded-for first hop, then `X-Real-IP`, then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip").map(str::trim).filter(|v| !v.is_empty()))
        .map(ToOwned::to_owned)
        .or_else(|| peer.map(|p| p.ip().to_string()))
}

async fn checkout(
    State(s): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(r): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    r.validate().map_err(|e| StoreError::Validation(e.to_string()))?;
    let (order, event) = Order::place(Checkout {
        customer: Customer { name: r.customer_name, email: r.customer_email, phone: r.customer_phone, address: r.customer_address },
        items: r.items,
        notes: r.notes,
        geolocation: r.geolocation,
        fingerprint: r.fingerprint,
        ip_address: client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
    })?;
    s.store.insert(&order).await?;
    tracing::info!(order_id = %order.id, total = %order.total, items = order.items.len(), "order placed");
    s.publisher.publish(&event).await;
    Ok((StatusCode::CREATED, Json(order)))
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

#[derive(Debug, Serialize)]
pub struct OrderSummary { pub id: Uuid, pub created_at: DateTime<Utc>, pub customer_name: String, pub total: Decimal, pub status: OrderStatus, pub item_count: u32 }

impl From<Order> for OrderSummary {
    fn from(o: Order) -> Self {
        let item_count = o.item_count();
        Self { id: o.id, created_at: o.created_at, customer_name: o.customer.name, total: o.total, status: o.status, item_count }
    }
}

async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> ApiResult<Json<PaginatedResponse<OrderSummary>>> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    let orders = s.store.list(per_page, (page - 1).saturating_mul(per_page)).await?;
    let total = s.store.count().await?;
    Ok(Json(PaginatedResponse { data: orders.into_iter().map(OrderSummary::from).collect(), total, page, per_page }))
}

#[derive(Debug, Default, Deserialize)] pub struct DetailParams { #[serde(default)] pub lang: Locale }
#[derive(Debug, Serialize)] pub struct FingerprintEntry { pub label: &'static str, pub value: String }
#[derive(Debug, Serialize)] pub struct Location { pub latitude: f64, pub longitude: f64, pub maps_url: String }

/// A line item with its title in the requested language.
#[derive(Debug, Serialize)]
pub struct LineView { pub product_id: String, pub title: String, pub price: Decimal, pub quantity: u32, pub line_total: Option<Decimal> }

impl LineView {
    fn new(item: &LineItem, lang: Locale) -> Self {
        Self {
            product_id: item.product_id.clone(),
            title: item.title_for(lang).to_owned(),
            price: item.price,
            quantity: item.quantity,
            line_total: item.line_total(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub lang: Locale,
    pub lines: Vec<LineView>,
    /// `None` when the order has no token or it does not decode.
    pub fingerprint: Option<Vec<FingerprintEntry>>,
    pub location: Option<Location>,
    pub matches: OrderMatches,
}

async fn order_detail(State(s): State<AppState>, Path(id): Path<Uuid>, Query(p): Query<DetailParams>) -> ApiResult<Json<OrderDetail>> {
    let order = s.store.get(id).await?.ok_or(StoreError::OrderNotFound)?;
    let others = s.store.others(id).await?;
    let matches = find_matches(&order, &others);

    let fingerprint = order.fingerprint.as_ref().and_then(FingerprintToken::decode_lossy).map(|payload| {
        payload.entries().into_iter().map(|(label, value)| FingerprintEntry { label, value }).collect()
    });
    let location = match order.location() {
        Some(Ok(c)) => Some(Location { latitude: c.latitude, longitude: c.longitude, maps_url: c.maps_url() }),
        Some(Err(e)) => {
            tracing::debug!(order_id = %id, error = %e, "order geolocation unusable");
            None
        }
        None => None,
    };

    let lines = order.items.iter().map(|item| LineView::new(item, p.lang)).collect();

    Ok(Json(OrderDetail { order, lang: p.lang, lines, fingerprint, location, matches }))
}

#[derive(Debug, Deserialize)] pub struct StatusUpdate { pub status: OrderStatus }

async fn update_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<StatusUpdate>) -> ApiResult<Json<Order>> {
    let mut order = s.store.get(id).await?.ok_or(StoreError::OrderNotFound)?;
    let from = order.status;
    let event = order.set_status(r.status)?;
    s.store.update_status(id, from, order.status).await?;
    tracing::info!(order_id = %id, status = %order.status, "order status changed");
    s.publisher.publish(&event).await;
    Ok(Json(order))
}
