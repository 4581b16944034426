use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        cart::CartResponse,
        orders::{CheckoutRequest, CheckoutResponse, OrderList, UpdateOrderStatusRequest},
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus, Product, Role, StockStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        cart_service::{add_quantity, load_cart},
        coupon_service::redeem_for_checkout,
        product_service::product_from_entity,
    },
    state::AppState,
};

/// Sum of `price * quantity` over `(price, quantity)` lines.
pub fn subtotal<I>(lines: I) -> i64
where
    I: IntoIterator<Item = (i64, i32)>,
{
    lines
        .into_iter()
        .map(|(price, quantity)| price * i64::from(quantity))
        .sum()
}

/// Percentage discount on `subtotal`, rounded to the nearest minor unit.
pub fn discount_amount(subtotal: i64, percent: f64) -> i64 {
    let percent = percent.clamp(0.0, 100.0);
    (subtotal as f64 * percent / 100.0).round() as i64
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let txn = state.orm.begin().await?;

    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let product_ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let mut products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    for line in &lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| AppError::BadRequest("Product not available".into()))?;
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if line.quantity > product.quantity {
            return Err(AppError::BadRequest(format!(
                "Not enough stock for product: {}",
                product.name
            )));
        }
    }

    let subtotal = subtotal(lines.iter().filter_map(|line| {
        products
            .get(&line.product_id)
            .map(|p| (p.price, line.quantity))
    }));

    let coupon_code = payload
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let discount = match coupon_code {
        Some(code) => {
            let percent = redeem_for_checkout(&txn, user.user_id, code).await?;
            discount_amount(subtotal, percent)
        }
        None => 0,
    };

    let order_id = Uuid::new_v4();
    let invoice_number = build_invoice_number(order_id);
    let mut orders: Vec<Order> = Vec::with_capacity(lines.len());
    let mut updated_products: Vec<Product> = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let Some(product) = products.remove(&line.product_id) else {
            continue;
        };
        let snapshot = product_from_entity(product.clone());

        let (remaining, status) = StockStatus::reconcile(product.quantity - line.quantity, None);
        let mut active: ProductActive = product.into();
        active.quantity = Set(remaining);
        active.status_stock = Set(status.as_str().to_string());
        let updated = active.update(&txn).await?;
        updated_products.push(product_from_entity(updated));

        let order = OrderActive {
            id: Set(if index == 0 { order_id } else { Uuid::new_v4() }),
            user_id: Set(user.user_id),
            product_id: Set(Some(snapshot.id)),
            image: Set(snapshot.first_image()),
            name: Set(snapshot.name),
            category: Set(snapshot.category),
            quantity: Set(line.quantity),
            price: Set(snapshot.price),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            invoice_number: Set(invoice_number.clone()),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;
        orders.push(order_from_entity(order));
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({
            "invoice_number": invoice_number,
            "orders": orders.len(),
            "subtotal": subtotal,
            "discount": discount,
        }),
    )
    .await;
    tracing::info!(
        user_id = %user.user_id,
        invoice = %invoice_number,
        orders = orders.len(),
        "checkout completed"
    );

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse {
            invoice_number,
            orders,
            updated_products,
            subtotal,
            discount,
            total: subtotal - discount,
        },
        Some(Meta::empty()),
    ))
}

/// Orders still in flight for the caller; received orders drop out.
pub async fn my_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let items: Vec<Order> = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Status.ne(OrderStatus::Received.as_str())),
        )
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn order_history(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let items: Vec<Order> = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// Put the order's product and quantity back into the caller's cart.
pub async fn reorder(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<CartResponse>> {
    let order = find_owned(state, user, id).await?;
    let product_id = order
        .product_id
        .ok_or_else(|| AppError::BadRequest("Product not available for reorder".into()))?;

    let txn = state.orm.begin().await?;
    add_quantity(&txn, user.user_id, product_id, order.quantity).await?;
    let cart = load_cart(&txn, user.user_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_reorder",
        "orders",
        serde_json::json!({ "order_id": id, "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", cart, Some(Meta::empty())))
}

/// Owner confirms delivery of a fulfilled order.
pub async fn receive_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = parse_status(&order.status)?;
    if !current.can_receive() {
        return Err(AppError::BadRequest(format!(
            "Only fulfilled orders can be received (order is {current})"
        )));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Received.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_received",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order received",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = parse_status(&existing.status)?;
    if current.is_terminal() {
        return Err(AppError::BadRequest(format!("Order is already {current}")));
    }
    if !current.can_transition(payload.status, Role::Admin) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {current} to {}",
            payload.status
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(payload.status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_owned(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    match order {
        Some(o) => Ok(o),
        None => Err(AppError::NotFound),
    }
}

fn parse_status(raw: &str) -> AppResult<OrderStatus> {
    raw.parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

fn order_from_entity(model: OrderModel) -> Order {
    let status = model.status.parse().unwrap_or(OrderStatus::Pending);
    Order {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        name: model.name,
        category: model.category,
        image: model.image,
        quantity: model.quantity,
        price: model.price,
        status,
        invoice_number: model.invoice_number,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn build_invoice_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("INV-{}-{}", date, short.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_is_sum_of_price_times_quantity() {
        let lines = [(12_000_i64, 2_i32), (4_550, 1), (99, 10)];
        assert_eq!(subtotal(lines), 24_000 + 4_550 + 990);
        assert_eq!(subtotal(Vec::new()), 0);
    }

    #[test]
    fn discount_rounds_and_clamps() {
        assert_eq!(discount_amount(10_000, 15.0), 1_500);
        assert_eq!(discount_amount(999, 10.0), 100);
        assert_eq!(discount_amount(5_000, 250.0), 5_000);
        assert_eq!(discount_amount(5_000, -5.0), 0);
    }

    #[test]
    fn invoice_number_has_date_and_short_id() {
        let id = Uuid::new_v4();
        let invoice = build_invoice_number(id);
        assert!(invoice.starts_with("INV-"));
        let short = id.to_string()[..8].to_uppercase();
        assert!(invoice.ends_with(&short));
        assert_eq!(invoice.len(), "INV-".len() + 8 + 1 + 8);
    }
}
