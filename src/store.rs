//! Order persistence.
//!
//! [`PgOrderStore`] talks to the hosted Postgres database; [`MemoryOrderStore`]
//! keeps orders in process and backs local runs without `DATABASE_URL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::{Customer, LineItem, Order, OrderStatus};
use crate::domain::fingerprint::FingerprintToken;
use crate::{Result, StoreError};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Order>>;
    /// One page of orders, newest first.
    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Order>>;
    async fn count(&self) -> Result<i64>;
    /// Every order except `id`, newest first.
    async fn others(&self, id: Uuid) -> Result<Vec<Order>>;
    /// Writes `to` only while the stored status is still `from`, so a
    /// concurrent change is reported as [`StoreError::StatusConflict`]
    /// instead of being overwritten.
    async fn update_status(&self, id: Uuid, from: OrderStatus, to: OrderStatus) -> Result<()>;
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    async fn newest_first(&self) -> Vec<Order> {
        let mut orders = self.orders.read().await.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        orders
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Order>> {
        Ok(self.newest_first().await.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.orders.read().await.len() as i64)
    }

    async fn others(&self, id: Uuid) -> Result<Vec<Order>> {
        Ok(self.newest_first().await.into_iter().filter(|o| o.id != id).collect())
    }

    async fn update_status(&self, id: Uuid, from: OrderStatus, to: OrderStatus) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders.iter_mut().find(|o| o.id == id).ok_or(StoreError::OrderNotFound)?;
        if order.status != from {
            return Err(StoreError::StatusConflict { id });
        }
        order.status = to;
        Ok(())
    }
}

// =============================================================================
// Postgres
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgOrderStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    customer_address: String,
    items: Json<serde_json::Value>,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    geolocation: Option<String>,
    notes: Option<String>,
    ip_address: Option<String>,
    fingerprint_b64: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self> {
        let items: Vec<LineItem> = serde_json::from_value(row.items.0)
            .map_err(|e| StoreError::CorruptRecord { id: row.id, reason: e.to_string() })?;
        Ok(Self {
            id: row.id,
            customer: Customer { name: row.customer_name, email: row.customer_email, phone: row.customer_phone, address: row.customer_address },
            items,
            total: row.total,
            status: row.status.parse()?,
            created_at: row.created_at,
            geolocation: row.geolocation,
            notes: row.notes,
            ip_address: row.ip_address,
            fingerprint: row.fingerprint_b64.map(FingerprintToken::from),
        })
    }
}

/// Converts rows, dropping (and logging) the ones that no longer parse.
fn usable(rows: Vec<OrderRow>) -> Vec<Order> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            Order::try_from(row).map_err(|e| tracing::warn!(order_id = %id, error = %e, "skipping unreadable order")).ok()
        })
        .collect()
}

const SELECT_ORDERS: &str = "SELECT id, customer_name, customer_email, customer_phone, customer_address, items, total, status, created_at, geolocation, notes, ip_address, fingerprint_b64 FROM orders";

impl PgOrderStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query("INSERT INTO orders (id, customer_name, customer_email, customer_phone, customer_address, items, total, status, created_at, geolocation, notes, ip_address, fingerprint_b64) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)")
            .bind(order.id).bind(&order.customer.name).bind(&order.customer.email).bind(&order.customer.phone).bind(&order.customer.address)
            .bind(Json(&order.items)).bind(order.total).bind(order.status.as_str()).bind(order.created_at)
            .bind(&order.geolocation).bind(&order.notes).bind(&order.ip_address).bind(order.fingerprint.as_ref().map(FingerprintToken::as_str))
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDERS} WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDERS} ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"))
            .bind(i64::from(limit)).bind(i64::from(offset)).fetch_all(&self.pool).await?;
        Ok(usable(rows))
    }

    async fn count(&self) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        Ok(total.0)
    }

    async fn others(&self, id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDERS} WHERE id <> $1 ORDER BY created_at DESC, id DESC"))
            .bind(id).fetch_all(&self.pool).await?;
        Ok(usable(rows))
    }

    async fn update_status(&self, id: Uuid, from: OrderStatus, to: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND status = $3")
            .bind(id).bind(to.as_str()).bind(from.as_str()).execute(&self.pool).await?;
        if result.rows_affected() > 0 { return Ok(()); }
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id).fetch_one(&self.pool).await?;
        if exists.0 { Err(StoreError::StatusConflict { id }) } else { Err(StoreError::OrderNotFound) }
    }
}
