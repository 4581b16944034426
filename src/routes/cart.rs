use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartResponse, UpdateQtyQuery},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", get(cart_list))
        .route("/add", post(add_to_cart))
        .route("/update/{id}", put(update_cart_item))
        .route("/clear", delete(clear_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart/list",
    responses(
        (status = 200, description = "Cart lines for current user", body = ApiResponse<CartResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let resp = cart_service::list_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/add",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add product to cart", body = ApiResponse<CartResponse>),
        (status = 400, description = "Bad request"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/cart/update/{id}",
    params(
        ("id" = Uuid, Path, description = "Cart line ID"),
        UpdateQtyQuery
    ),
    responses(
        (status = 200, description = "Set line quantity; zero removes it", body = ApiResponse<CartResponse>),
        (status = 400, description = "Exceeds stock"),
        (status = 404, description = "Cart line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<UpdateQtyQuery>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let resp = cart_service::update_quantity(&state, &user, id, query.qty).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/clear",
    responses(
        (status = 200, description = "Cart cleared", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::clear_cart(&state, &user).await?;
    Ok(Json(resp))
}
