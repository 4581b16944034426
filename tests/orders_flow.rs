use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;
use wholecart::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        coupons::{CollectCouponRequest, UseCouponRequest},
        favorites::ToggleFavoriteRequest,
        orders::{CheckoutRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, UpdateProductRequest},
    },
    entity::users::ActiveModel as UserActive,
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, Product, Role, StockStatus},
    routes::params::StockReportQuery,
    services::{cart_service, coupon_service, favorite_service, order_service, product_service},
    state::AppState,
};

fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            None
        }
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        low_stock_threshold: 10,
    };
    Ok(AppState::new(pool, orm, config))
}

// Rows are keyed by a per-run suffix instead of truncating, so tests can share
// one database and run in parallel.
async fn create_user(state: &AppState, role: Role, tag: &str) -> anyhow::Result<AuthUser> {
    let suffix = Uuid::new_v4().simple().to_string();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(format!("{tag}-{suffix}")),
        email: Set(format!("{tag}-{suffix}@example.com")),
        password_hash: Set("dummy".into()),
        role: Set(role.as_str().into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role,
    })
}

async fn create_product(
    state: &AppState,
    admin: &AuthUser,
    name: &str,
    price: i64,
    quantity: i32,
) -> anyhow::Result<Product> {
    let resp = product_service::create_product(
        state,
        admin,
        CreateProductRequest {
            name: format!("{name} {}", Uuid::new_v4().simple()),
            description: format!("{name} for testing"),
            category: "Pantry".into(),
            price,
            quantity: Some(quantity),
            status_stock: None,
            images: vec![format!("/uploads/products/{name}.png")],
        },
    )
    .await?;
    Ok(resp.data.expect("product data"))
}

fn bad_request_containing(err: &AppError, needle: &str) -> bool {
    matches!(err, AppError::BadRequest(message) if message.contains(needle))
}

#[tokio::test]
async fn cart_checkout_and_order_lifecycle() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let shopper = create_user(&state, Role::User, "shopper").await?;
    let admin = create_user(&state, Role::Admin, "admin").await?;

    let rice = create_product(&state, &admin, "Rice", 1_000, 5).await?;
    let tea = create_product(&state, &admin, "Tea", 250, 10).await?;
    assert_eq!(rice.status_stock, StockStatus::InStock);

    // Adding merges into the existing line and may not pass stock.
    cart_service::add_to_cart(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: rice.id,
            qty: 2,
        },
    )
    .await?;
    let err = cart_service::add_to_cart(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: rice.id,
            qty: 4,
        },
    )
    .await
    .err()
    .expect("adding past stock must fail");
    assert!(bad_request_containing(&err, "available stock"));

    let cart = cart_service::add_to_cart(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: tea.id,
            qty: 3,
        },
    )
    .await?
    .data
    .expect("cart");
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total, 2 * 1_000 + 3 * 250);

    // Checkout turns each line into a pending order.
    let checkout = order_service::checkout(&state, &shopper, CheckoutRequest::default())
        .await?
        .data
        .expect("checkout data");
    assert_eq!(checkout.subtotal, 2 * 1_000 + 3 * 250);
    assert_eq!(checkout.discount, 0);
    assert_eq!(checkout.total, checkout.subtotal);
    assert_eq!(checkout.orders.len(), 2);
    assert!(checkout.orders.iter().all(|o| o.status == OrderStatus::Pending));
    assert!(
        checkout
            .orders
            .iter()
            .all(|o| o.invoice_number == checkout.invoice_number)
    );
    let rice_after = checkout
        .updated_products
        .iter()
        .find(|p| p.id == rice.id)
        .expect("rice updated");
    assert_eq!(rice_after.quantity, 3);

    let cart = cart_service::list_cart(&state, &shopper).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total, 0);

    let rice_order = checkout
        .orders
        .iter()
        .find(|o| o.product_id == Some(rice.id))
        .expect("rice order")
        .clone();
    let tea_order = checkout
        .orders
        .iter()
        .find(|o| o.product_id == Some(tea.id))
        .expect("tea order")
        .clone();
    assert_eq!(rice_order.price, 1_000);
    assert_eq!(rice_order.image, "/uploads/products/Rice.png");

    // Pending orders cannot be received.
    let err = order_service::receive_order(&state, &shopper, rice_order.id)
        .await
        .err()
        .expect("pending order cannot be received");
    assert!(matches!(err, AppError::BadRequest(_)));

    // Only admins move orders forward.
    let err = order_service::update_order_status(
        &state,
        &shopper,
        rice_order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Fulfilled,
        },
    )
    .await
    .err()
    .expect("shopper cannot fulfil");
    assert!(matches!(err, AppError::Forbidden));

    let fulfilled = order_service::update_order_status(
        &state,
        &admin,
        rice_order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Fulfilled,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(fulfilled.status, OrderStatus::Fulfilled);

    let received = order_service::receive_order(&state, &shopper, rice_order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(received.status, OrderStatus::Received);

    let err = order_service::receive_order(&state, &shopper, rice_order.id)
        .await
        .err()
        .expect("double receive must fail");
    assert!(matches!(err, AppError::BadRequest(_)));

    // Received orders leave the active list but stay in history.
    let active = order_service::my_orders(&state, &shopper)
        .await?
        .data
        .expect("orders")
        .items;
    assert!(active.iter().all(|o| o.id != rice_order.id));
    assert!(active.iter().any(|o| o.id == tea_order.id));

    let history = order_service::order_history(&state, &shopper)
        .await?
        .data
        .expect("orders")
        .items;
    assert_eq!(history.len(), 2);
    let in_history = history
        .iter()
        .find(|o| o.id == rice_order.id)
        .expect("received order in history");
    assert_eq!(in_history.status, OrderStatus::Received);

    // Reorder puts the same quantity back in the cart.
    let cart = order_service::reorder(&state, &shopper, rice_order.id)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, rice.id);
    assert_eq!(cart.items[0].quantity, rice_order.quantity);

    // Cancelled is terminal.
    order_service::update_order_status(
        &state,
        &admin,
        tea_order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
        },
    )
    .await?;
    let err = order_service::update_order_status(
        &state,
        &admin,
        tea_order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Fulfilled,
        },
    )
    .await
    .err()
    .expect("cancelled order cannot be fulfilled");
    assert!(matches!(err, AppError::BadRequest(_)));

    let report = product_service::weekly_stock_report(
        &state,
        &admin,
        StockReportQuery { threshold: Some(3) },
    )
    .await?
    .data
    .expect("report");
    assert_eq!(report.low_stock_threshold, 3);
    assert!(report.low_stock >= 1);
    assert!(report.products.iter().any(|p| p.id == rice.id && p.quantity == 3));

    Ok(())
}

#[tokio::test]
async fn checkout_rejects_shortfall_and_applies_coupon() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let shopper = create_user(&state, Role::User, "buyer").await?;
    let admin = create_user(&state, Role::Admin, "owner").await?;
    let beans = create_product(&state, &admin, "Beans", 999, 2).await?;

    let cart = cart_service::add_to_cart(
        &state,
        &shopper,
        AddToCartRequest {
            product_id: beans.id,
            qty: 2,
        },
    )
    .await?
    .data
    .expect("cart");
    let line_id = cart.items[0].id;

    // Stock drops under the cart quantity before checkout.
    product_service::update_product(
        &state,
        &admin,
        beans.id,
        UpdateProductRequest {
            quantity: Some(1),
            ..Default::default()
        },
    )
    .await?;

    let err = order_service::checkout(&state, &shopper, CheckoutRequest::default())
        .await
        .err()
        .expect("shortfall must fail");
    assert!(bad_request_containing(&err, "Not enough stock for product"));

    let cart = cart_service::list_cart(&state, &shopper).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
    let product = product_service::get_product(&state, beans.id)
        .await?
        .data
        .expect("product");
    assert_eq!(product.quantity, 1);

    let err = cart_service::update_quantity(&state, &shopper, line_id, 2)
        .await
        .err()
        .expect("update past stock must fail");
    assert!(bad_request_containing(&err, "available stock"));
    cart_service::update_quantity(&state, &shopper, line_id, 1).await?;

    let code = format!("SAVE10-{}", Uuid::new_v4().simple());
    coupon_service::collect_coupon(
        &state,
        &shopper,
        CollectCouponRequest {
            coupon_code: code.clone(),
            discount: 10.0,
            description: "10% off".into(),
        },
    )
    .await?;
    let err = coupon_service::collect_coupon(
        &state,
        &shopper,
        CollectCouponRequest {
            coupon_code: code.clone(),
            discount: 10.0,
            description: "10% off".into(),
        },
    )
    .await
    .err()
    .expect("second collect must fail");
    assert!(bad_request_containing(&err, "already collected"));

    let checkout = order_service::checkout(
        &state,
        &shopper,
        CheckoutRequest {
            coupon_code: Some(code.clone()),
        },
    )
    .await?
    .data
    .expect("checkout data");
    assert_eq!(checkout.subtotal, 999);
    assert_eq!(checkout.discount, 100);
    assert_eq!(checkout.total, 899);

    let sold_out = &checkout.updated_products[0];
    assert_eq!(sold_out.quantity, 0);
    assert_eq!(sold_out.status_stock, StockStatus::OutOfStock);

    let err = coupon_service::use_coupon(
        &state,
        &shopper,
        UseCouponRequest { coupon_code: code },
    )
    .await
    .err()
    .expect("used coupon cannot be reused");
    assert!(matches!(err, AppError::BadRequest(_)));

    let search = product_service::search_products(
        &state,
        wholecart::routes::params::ProductQuery {
            q: Some(beans.name.clone()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products");
    assert!(search.items.is_empty(), "sold-out products are hidden from search");

    Ok(())
}

#[tokio::test]
async fn favorites_toggle_on_and_off() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let shopper = create_user(&state, Role::User, "fan").await?;
    let admin = create_user(&state, Role::Admin, "curator").await?;
    let oil = create_product(&state, &admin, "Oil", 9_200, 4).await?;

    let toggled = favorite_service::toggle_favorite(
        &state,
        &shopper,
        ToggleFavoriteRequest { product_id: oil.id },
    )
    .await?
    .data
    .expect("toggle");
    assert!(toggled.favorited);

    let favorites = favorite_service::list_favorites(&state, &shopper)
        .await?
        .data
        .expect("favorites")
        .items;
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id, oil.id);
    assert!(favorites[0].in_stock);

    let toggled = favorite_service::toggle_favorite(
        &state,
        &shopper,
        ToggleFavoriteRequest { product_id: oil.id },
    )
    .await?
    .data
    .expect("toggle");
    assert!(!toggled.favorited);

    let err = favorite_service::remove_favorite(&state, &shopper, oil.id)
        .await
        .err()
        .expect("nothing left to remove");
    assert!(matches!(err, AppError::NotFound));

    let err = favorite_service::toggle_favorite(
        &state,
        &shopper,
        ToggleFavoriteRequest {
            product_id: Uuid::new_v4(),
        },
    )
    .await
    .err()
    .expect("unknown product");
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn concurrent_coupon_calls_succeed_once() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;
    let shopper = create_user(&state, Role::User, "racer").await?;

    let code = format!("ONCE-{}", Uuid::new_v4().simple());
    let collect_once = || {
        coupon_service::collect_coupon(
            &state,
            &shopper,
            CollectCouponRequest {
                coupon_code: code.clone(),
                discount: 15.0,
                description: "15% off".into(),
            },
        )
    };
    let (first, second) = tokio::join!(collect_once(), collect_once());
    let collected = vec![first, second];
    assert_eq!(collected.iter().filter(|r| r.is_ok()).count(), 1);
    let err = collected
        .into_iter()
        .find_map(Result::err)
        .expect("one collect must fail");
    assert!(bad_request_containing(&err, "already collected"));

    let use_it = || {
        coupon_service::use_coupon(
            &state,
            &shopper,
            UseCouponRequest {
                coupon_code: code.clone(),
            },
        )
    };
    let (first, second) = tokio::join!(use_it(), use_it());
    let used = vec![first, second];
    assert_eq!(used.iter().filter(|r| r.is_ok()).count(), 1);
    let err = used
        .into_iter()
        .find_map(Result::err)
        .expect("one use must fail");
    assert!(bad_request_containing(&err, "already used"));

    let coupons = coupon_service::list_user_coupons(&state, &shopper)
        .await?
        .data
        .expect("coupons")
        .items;
    assert_eq!(coupons.len(), 1);
    assert!(coupons[0].used);

    Ok(())
}

#[tokio::test]
async fn renaming_a_product_keeps_names_unique() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;
    let admin = create_user(&state, Role::Admin, "editor").await?;

    let flour = create_product(&state, &admin, "Flour", 1_500, 6).await?;
    let salt = create_product(&state, &admin, "Salt", 400, 6).await?;

    let err = product_service::update_product(
        &state,
        &admin,
        salt.id,
        UpdateProductRequest {
            name: Some(format!("  {}  ", flour.name)),
            ..Default::default()
        },
    )
    .await
    .err()
    .expect("taken name must fail");
    assert!(bad_request_containing(&err, "Product name already exists"));

    let err = product_service::update_product(
        &state,
        &admin,
        salt.id,
        UpdateProductRequest {
            name: Some("   ".into()),
            ..Default::default()
        },
    )
    .await
    .err()
    .expect("blank name must fail");
    assert!(bad_request_containing(&err, "name is required"));

    // Keeping its own name, trimmed, is not a clash.
    let renamed = product_service::update_product(
        &state,
        &admin,
        salt.id,
        UpdateProductRequest {
            name: Some(format!(" {} ", salt.name)),
            price: Some(450),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(renamed.name, salt.name);
    assert_eq!(renamed.price, 450);

    Ok(())
}
