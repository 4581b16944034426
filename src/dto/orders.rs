use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderStatus, Product};

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub invoice_number: String,
    pub orders: Vec<Order>,
    pub updated_products: Vec<Product>,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
