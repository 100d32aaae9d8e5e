//! In-memory pharmacy orders.

use std::sync::atomic::{AtomicI64, Ordering};

use carehub_storage::{OrderStatus, StorageError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const FIRST_ORDER_ID: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacyOrder {
    pub id: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Client-supplied fields (items, totals, `user_id`, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl PharmacyOrder {
    /// `user_id` may be sent as a string or a number.
    pub fn user_id(&self) -> Option<String> {
        match self.details.get("user_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct OrderBook {
    orders: DashMap<i64, PharmacyOrder>,
    next_id: AtomicI64,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicI64::new(FIRST_ORDER_ID),
        }
    }

    /// Records a new order in `processing`. Server-owned keys in the
    /// payload are ignored.
    pub fn create(&self, mut details: Map<String, Value>) -> PharmacyOrder {
        for key in ["id", "status", "created_at"] {
            details.remove(key);
        }
        let order = PharmacyOrder {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            status: OrderStatus::Processing,
            created_at: Utc::now(),
            details,
        };
        self.orders.insert(order.id, order.clone());
        tracing::info!(order_id = order.id, user_id = ?order.user_id(), "Pharmacy order created");
        order
    }

    pub fn get(&self, id: i64) -> Option<PharmacyOrder> {
        self.orders.get(&id).map(|o| o.clone())
    }

    /// Orders whose `user_id` matches, oldest first.
    pub fn list_for_user(&self, user_id: &str) -> Vec<PharmacyOrder> {
        let mut orders: Vec<PharmacyOrder> = self
            .orders
            .iter()
            .filter(|o| o.user_id().as_deref() == Some(user_id))
            .map(|o| o.clone())
            .collect();
        orders.sort_by_key(|o| o.id);
        orders
    }

    pub fn list(&self) -> Vec<PharmacyOrder> {
        let mut orders: Vec<PharmacyOrder> = self.orders.iter().map(|o| o.clone()).collect();
        orders.sort_by_key(|o| o.id);
        orders
    }

    /// Moves an order forward. Going backwards is rejected.
    pub fn update_status(&self, id: i64, status: OrderStatus) -> Result<PharmacyOrder, StorageError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("Order", id))?;
        if !order.status.can_advance_to(status) {
            return Err(StorageError::invalid_transition(order.status, status));
        }
        order.status = status;
        Ok(order.clone())
    }
}
