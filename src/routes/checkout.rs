use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    cart::{Cart, Quote},
    db::Transaction,
    error::AppError,
    gateway::CreatedIntent,
};

#[derive(Debug, Deserialize)]
pub struct QuoteLine {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QuantityChange {
    pub delta: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCharge {
    #[serde(flatten)]
    pub intent: CreatedIntent,
    pub checkout_url: String,
    pub qr_image_url: String,
    pub quote: Quote,
}

async fn quote(
    State(state): State<AppState>,
    Json(lines): Json<Vec<QuoteLine>>,
) -> Result<impl IntoResponse, AppError> {
    let mut cart = Cart::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(AppError::InvalidRequest(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        let product = state.repo.get_product(&line.product_id).await?;
        cart.add(&product);
        cart.update_quantity(&product.id, i64::from(line.quantity) - 1);
    }
    Ok(Json(cart.quote()))
}

async fn show_cart(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cart.lock().quote())
}

async fn add_item(
    State(state): State<AppState>,
    Json(request): Json<AddItem>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.repo.get_product(&request.product_id).await?;
    let mut cart = state.cart.lock();
    cart.add(&product);
    Ok(Json(cart.quote()))
}

async fn change_quantity(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(request): Json<QuantityChange>,
) -> Result<impl IntoResponse, AppError> {
    let mut cart = state.cart.lock();
    if !cart.contains(&product_id) {
        return Err(AppError::NotFound(format!("cart line {product_id}")));
    }
    cart.update_quantity(&product_id, request.delta);
    Ok(Json(cart.quote()))
}

async fn remove_item(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut cart = state.cart.lock();
    if !cart.contains(&product_id) {
        return Err(AppError::NotFound(format!("cart line {product_id}")));
    }
    cart.remove(&product_id);
    Ok(Json(cart.quote()))
}

async fn clear_cart(State(state): State<AppState>) -> impl IntoResponse {
    let mut cart = state.cart.lock();
    cart.clear();
    Json(cart.quote())
}

/// Charges the cart total, records a pending sale and empties the cart.
async fn charge_cart(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let (quote, items) = {
        let cart = state.cart.lock();
        if cart.is_empty() {
            return Err(AppError::InvalidRequest("cart is empty".into()));
        }
        (cart.quote(), cart.line_items())
    };

    let intent = state.gateway.create_intent(quote.total).await?;
    tracing::info!("cart checkout opened intent {}", intent.intent_id);

    state
        .repo
        .insert_transaction(Transaction::pending(
            intent.intent_id.clone(),
            intent.amount,
            Utc::now(),
            items,
        ))
        .await?;
    state.cart.lock().clear();

    let links = state.terminal.links();
    let checkout_url = links.checkout_url(&intent.intent_id);
    let qr_image_url = links.qr_image_url(&checkout_url);
    Ok(Json(CheckoutCharge {
        intent,
        checkout_url,
        qr_image_url,
        quote,
    }))
}

pub fn checkout_routes(state: AppState) -> Router {
    Router::new()
        .route("/checkout/quote", post(quote))
        .route("/checkout/cart", get(show_cart).delete(clear_cart))
        .route("/checkout/cart/items", post(add_item))
        .route(
            "/checkout/cart/items/:id",
            patch(change_quantity).delete(remove_item),
        )
        .route("/checkout/charge", post(charge_cart))
        .with_state(state)
}
