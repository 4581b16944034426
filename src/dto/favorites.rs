use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ToggleFavoriteRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ToggleFavoriteResponse {
    pub favorited: bool,
}

/// A favorited product; `id` is the product id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteDto {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: String,
    pub in_stock: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FavoriteList {
    #[schema(value_type = Vec<FavoriteDto>)]
    pub items: Vec<FavoriteDto>,
}
