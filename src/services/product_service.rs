use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest, WeeklyStockReport},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult, on_unique_violation},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, StockStatus},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder, StockReportQuery},
    state::AppState,
};

const NAME_TAKEN: &str = "Product name already exists";

/// Default page size of the storefront search grid.
const SEARCH_PAGE_SIZE: i64 = 8;

pub async fn list_all(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items: Vec<Product> = Products::find()
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    find_products(state, &query, false, 20).await
}

/// Storefront search: same filters as the listing, but only products that can
/// still be bought.
pub async fn search_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    find_products(state, &query, true, SEARCH_PAGE_SIZE).await
}

async fn find_products(
    state: &AppState,
    query: &ProductQuery,
    in_stock_only: bool,
    default_per_page: i64,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize_with(default_per_page);
    let mut condition = Condition::all();

    if let Some(search) = query.keyword() {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category_filter() {
        condition = condition.add(Expr::col(Column::Category).ilike(category.to_string()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if in_stock_only {
        condition = condition.add(Column::Quantity.gt(0));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    if payload.price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    let taken = Products::find()
        .filter(Column::Name.eq(name.as_str()))
        .one(&state.orm)
        .await?;
    if taken.is_some() {
        return Err(AppError::BadRequest(NAME_TAKEN.into()));
    }

    let (quantity, status) =
        StockStatus::reconcile(payload.quantity.unwrap_or(0), payload.status_stock);

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(Some(payload.description)),
        category: Set(payload.category),
        price: Set(payload.price),
        quantity: Set(quantity),
        status_stock: Set(status.as_str().to_string()),
        images: Set(serde_json::json!(payload.images)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| on_unique_violation(err, NAME_TAKEN))?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if payload.price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }

    let name = match payload.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::BadRequest("name is required".into())),
        Some(name) if name != existing.name => {
            let taken = Products::find()
                .filter(
                    Condition::all()
                        .add(Column::Name.eq(name))
                        .add(Column::Id.ne(id)),
                )
                .one(&state.orm)
                .await?;
            if taken.is_some() {
                return Err(AppError::BadRequest(NAME_TAKEN.into()));
            }
            Some(name.to_string())
        }
        Some(name) => Some(name.to_string()),
        None => None,
    };

    let (quantity, status) = StockStatus::reconcile(
        payload.quantity.unwrap_or(existing.quantity),
        payload.status_stock,
    );

    let mut active: ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    active.quantity = Set(quantity);
    active.status_stock = Set(status.as_str().to_string());

    let product = active
        .update(&state.orm)
        .await
        .map_err(|err| on_unique_violation(err, NAME_TAKEN))?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn weekly_stock_report(
    state: &AppState,
    user: &AuthUser,
    query: StockReportQuery,
) -> AppResult<ApiResponse<WeeklyStockReport>> {
    ensure_admin(user)?;
    let threshold = query
        .threshold
        .filter(|t| *t > 0)
        .unwrap_or(state.config.low_stock_threshold);

    let (total_products, out_of_stock, low_stock): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE quantity = 0 OR status_stock = 'Out of stock'),
            COUNT(*) FILTER (WHERE quantity > 0 AND quantity <= $1)
        FROM products
        "#,
    )
    .bind(threshold)
    .fetch_one(&state.pool)
    .await?;

    let products = Products::find()
        .order_by_asc(Column::Quantity)
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Weekly stock report",
        WeeklyStockReport {
            total_products,
            out_of_stock,
            low_stock,
            low_stock_threshold: threshold,
            products,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    let images: Vec<String> = serde_json::from_value(model.images).unwrap_or_default();
    let status_stock = model
        .status_stock
        .parse::<StockStatus>()
        .unwrap_or_else(|_| StockStatus::for_quantity(model.quantity));
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        category: model.category,
        price: model.price,
        quantity: model.quantity,
        status_stock,
        images,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(quantity: i32, status: &str, images: serde_json::Value) -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            name: "Mango".into(),
            description: None,
            category: "Fruit".into(),
            price: 4500,
            quantity,
            status_stock: status.into(),
            images,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn entity_conversion_reads_images_and_label() {
        let product = product_from_entity(model(
            3,
            "In stock",
            serde_json::json!(["/uploads/products/a.png", "/uploads/products/b.png"]),
        ));
        assert_eq!(product.status_stock, StockStatus::InStock);
        assert_eq!(product.first_image(), "/uploads/products/a.png");
    }

    #[test]
    fn unknown_label_falls_back_to_quantity() {
        let product = product_from_entity(model(0, "???", serde_json::json!(null)));
        assert_eq!(product.status_stock, StockStatus::OutOfStock);
        assert!(product.images.is_empty());
        assert_eq!(product.first_image(), "");
    }
}
