use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::favorites::{FavoriteDto, FavoriteList, ToggleFavoriteRequest, ToggleFavoriteResponse},
    entity::{
        favorites::{ActiveModel as FavoriteActive, Column as FavCol, Entity as Favorites},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    services::product_service::product_from_entity,
    state::AppState,
};

fn favorite_from_product(product: Product) -> FavoriteDto {
    FavoriteDto {
        id: product.id,
        image: product.first_image(),
        in_stock: product.quantity > 0,
        name: product.name,
        price: product.price,
    }
}

pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FavoriteList>> {
    let items: Vec<FavoriteDto> = Favorites::find()
        .filter(FavCol::UserId.eq(user.user_id))
        .order_by_desc(FavCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(_, product)| product.map(product_from_entity))
        .map(favorite_from_product)
        .collect();

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        FavoriteList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// Add the product to favorites, or remove it when it is already there.
pub async fn toggle_favorite(
    state: &AppState,
    user: &AuthUser,
    payload: ToggleFavoriteRequest,
) -> AppResult<ApiResponse<ToggleFavoriteResponse>> {
    let existing = Favorites::find()
        .filter(
            Condition::all()
                .add(FavCol::UserId.eq(user.user_id))
                .add(FavCol::ProductId.eq(payload.product_id)),
        )
        .one(&state.orm)
        .await?;

    let favorited = match existing {
        Some(fav) => {
            fav.delete(&state.orm).await?;
            false
        }
        None => {
            let product = Products::find_by_id(payload.product_id)
                .one(&state.orm)
                .await?;
            if product.is_none() {
                return Err(AppError::NotFound);
            }
            FavoriteActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(payload.product_id),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?;
            true
        }
    };

    audit::record(
        &state.pool,
        user.user_id,
        if favorited { "favorite_add" } else { "favorite_remove" },
        "favorites",
        serde_json::json!({ "product_id": payload.product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Toggled favorite",
        ToggleFavoriteResponse { favorited },
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Favorites::delete_many()
        .filter(
            Condition::all()
                .add(FavCol::UserId.eq(user.user_id))
                .add(FavCol::ProductId.eq(product_id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "favorite_remove",
        "favorites",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from favorites",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
