use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Product, StockStatus};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: i64,
    pub quantity: Option<i32>,
    pub status_stock: Option<StockStatus>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub status_stock: Option<StockStatus>,
    /// Replaces the image list when present.
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WeeklyStockReport {
    pub total_products: i64,
    pub out_of_stock: i64,
    pub low_stock: i64,
    pub low_stock_threshold: i32,
    pub products: Vec<Product>,
}
