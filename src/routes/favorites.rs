use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::favorites::{FavoriteList, ToggleFavoriteRequest, ToggleFavoriteResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::favorite_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites))
        .route("/toggle", post(toggle_favorite))
        .route("/{product_id}", delete(remove_favorite))
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    responses(
        (status = 200, description = "Favorite products of current user", body = ApiResponse<FavoriteList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FavoriteList>>> {
    let resp = favorite_service::list_favorites(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/favorites/toggle",
    request_body = ToggleFavoriteRequest,
    responses(
        (status = 200, description = "Favorite added or removed", body = ApiResponse<ToggleFavoriteResponse>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ToggleFavoriteRequest>,
) -> AppResult<Json<ApiResponse<ToggleFavoriteResponse>>> {
    let resp = favorite_service::toggle_favorite(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed from favorites", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Favorite not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = favorite_service::remove_favorite(&state, &user, product_id).await?;
    Ok(Json(resp))
}
