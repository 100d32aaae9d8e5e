//! `/pharmacy`: public catalog browsing and in-memory orders.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::server::AppState;
use crate::services::{MedicineQuery, MedicineView, PharmacyOrder};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/medicines", get(list_medicines))
        .route("/categories", get(list_categories))
        .route("/subcategories", get(list_subcategories))
        .route("/orders", post(create_order))
        .route("/orders/{user_id}", get(list_orders))
}

async fn list_medicines(
    State(state): State<AppState>,
    Query(query): Query<MedicineQuery>,
) -> Json<Vec<MedicineView>> {
    Json(state.catalog.search(&query))
}

async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.catalog.categories())
}

#[derive(Debug, Deserialize)]
pub struct SubcategoryQuery {
    pub category: Option<String>,
}

async fn list_subcategories(
    State(state): State<AppState>,
    Query(query): Query<SubcategoryQuery>,
) -> Json<Vec<String>> {
    Json(state.catalog.subcategories(query.category.as_deref()))
}

async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<Map<String, Value>>,
) -> (StatusCode, Json<PharmacyOrder>) {
    (StatusCode::CREATED, Json(state.orders.create(payload)))
}

async fn list_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<PharmacyOrder>> {
    Json(state.orders.list_for_user(&user_id))
}
