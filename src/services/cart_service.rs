use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemResponse, CartResponse},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::product_service::product_from_entity,
    state::AppState,
};

/// Sum of `price * quantity` over the cart lines.
pub fn cart_total(items: &[CartItemResponse]) -> i64 {
    items
        .iter()
        .map(|item| item.price * i64::from(item.quantity))
        .sum()
}

/// Read the caller's cart joined with current product data.
pub async fn load_cart<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<CartResponse> {
    let rows = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(db)
        .await?;

    let items: Vec<CartItemResponse> = rows
        .into_iter()
        .filter_map(|(line, product)| {
            let product = product_from_entity(product?);
            Some(CartItemResponse {
                id: line.id,
                product_id: product.id,
                image: product.first_image(),
                product_name: product.name,
                quantity: line.quantity,
                price: product.price,
                stock: product.quantity,
                category: product.category,
            })
        })
        .collect();

    let total = cart_total(&items);
    Ok(CartResponse { items, total })
}

/// Add `qty` units of a product to the user's cart, merging with an existing
/// line. The merged quantity may not exceed the product's stock.
pub async fn add_quantity<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    product_id: Uuid,
    qty: i32,
) -> AppResult<()> {
    if qty <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(db)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("Product not found".to_string())),
    };

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user_id))
                .add(CartCol::ProductId.eq(product_id)),
        )
        .one(db)
        .await?;

    let merged = qty + existing.as_ref().map(|line| line.quantity).unwrap_or(0);
    if merged > product.quantity {
        return Err(AppError::BadRequest(
            "Cannot add more than available stock".to_string(),
        ));
    }

    match existing {
        Some(line) => {
            let mut active: CartActive = line.into();
            active.quantity = Set(merged);
            active.update(db).await?;
        }
        None => {
            CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(product_id),
                quantity: Set(qty),
                created_at: NotSet,
            }
            .insert(db)
            .await?;
        }
    }

    Ok(())
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartResponse>> {
    let cart = load_cart(&state.orm, user.user_id).await?;
    let count = cart.items.len() as i64;
    Ok(ApiResponse::success("OK", cart, Some(Meta::new(1, count, count))))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartResponse>> {
    let txn = state.orm.begin().await?;
    add_quantity(&txn, user.user_id, payload.product_id, payload.qty).await?;
    let cart = load_cart(&txn, user.user_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "qty": payload.qty }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", cart, Some(Meta::empty())))
}

/// Set a cart line to an absolute quantity; zero or less removes the line.
pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    qty: i32,
) -> AppResult<ApiResponse<CartResponse>> {
    let txn = state.orm.begin().await?;
    let line = CartItems::find_by_id(item_id)
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?;
    let line = match line {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };

    if qty <= 0 {
        line.delete(&txn).await?;
    } else {
        let stock = Products::find_by_id(line.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .map(|p| p.quantity)
            .unwrap_or(0);
        if qty > stock {
            return Err(AppError::BadRequest(
                "Cannot set quantity higher than available stock".to_string(),
            ));
        }
        let mut active: CartActive = line.into();
        active.quantity = Set(qty);
        active.update(&txn).await?;
    }

    let cart = load_cart(&txn, user.user_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        if qty <= 0 { "cart_remove" } else { "cart_update" },
        "cart_items",
        serde_json::json!({ "item_id": item_id, "qty": qty }),
    )
    .await;

    Ok(ApiResponse::success("Cart updated", cart, Some(Meta::empty())))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    tracing::debug!(user_id = %user.user_id, removed = result.rows_affected, "cart cleared");

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected }),
        Some(Meta::empty()),
    ))
}
