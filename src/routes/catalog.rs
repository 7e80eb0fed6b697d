use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::{db::Product, error::AppError};

#[derive(Debug, Deserialize)]
pub struct ProductSearch {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub image_url: Option<String>,
}

impl ProductInput {
    fn into_product(self, id: String) -> Product {
        let image_url = self
            .image_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("https://picsum.photos/seed/{id}/400/300"));
        Product {
            id,
            name: self.name.trim().to_string(),
            price: self.price,
            category: self.category.trim().to_string(),
            image_url,
        }
    }
}

async fn list_products(
    State(state): State<AppState>,
    Query(search): Query<ProductSearch>,
) -> impl IntoResponse {
    let term = search.q.unwrap_or_default();
    let products: Vec<Product> = state
        .repo
        .list_products()
        .await
        .into_iter()
        .filter(|product| product.matches(&term))
        .collect();
    Json(products)
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse, AppError> {
    let product = input.into_product(Uuid::new_v4().to_string());
    let product = state.repo.insert_product(product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.repo.get_product(&product_id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .repo
        .update_product(input.into_product(product_id))
        .await?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.repo.delete_product(&product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn catalog_routes(state: AppState) -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use super::super::{app, test_support::*};
    use super::*;

    #[tokio::test]
    async fn search_matches_name_or_category() {
        let router = app(state());
        let (_, all) = call(&router, Method::GET, "/v1/products", None).await;
        assert_eq!(all.as_array().unwrap().len(), 4);

        let (_, coffee) = call(&router, Method::GET, "/v1/products?q=COFFEE", None).await;
        let names: Vec<&str> = coffee
            .as_array()
            .unwrap()
            .iter()
            .map(|product| product["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Artisan Latte", "Cold Brew"]);

        let (_, bagel) = call(&router, Method::GET, "/v1/products?q=bag", None).await;
        assert_eq!(bagel[0]["id"], "4");
    }

    #[tokio::test]
    async fn create_update_delete() {
        let router = app(state());
        let (status, created) = call(
            &router,
            Method::POST,
            "/v1/products",
            Some(json!({ "name": "Chai", "price": "3.80", "category": "Tea" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());
        assert!(created["imageUrl"].as_str().unwrap().contains(&id));

        let (status, updated) = call(
            &router,
            Method::PUT,
            &format!("/v1/products/{id}"),
            Some(json!({ "name": "Chai Latte", "price": "4.20", "category": "Tea" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Chai Latte");

        let (status, _) = call(&router, Method::DELETE, &format!("/v1/products/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&router, Method::GET, &format!("/v1/products/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_products_are_rejected() {
        let router = app(state());
        let (status, body) = call(
            &router,
            Method::POST,
            "/v1/products",
            Some(json!({ "name": "Free", "price": "0", "category": "Misc" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let (status, _) = call(
            &router,
            Method::PUT,
            "/v1/products/nope",
            Some(json!({ "name": "Ghost", "price": "1", "category": "Misc" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
