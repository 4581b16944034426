use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartItemResponse, CartResponse},
        coupons::{CollectCouponRequest, UseCouponRequest, UserCouponList},
        favorites::{FavoriteDto, FavoriteList, ToggleFavoriteRequest, ToggleFavoriteResponse},
        orders::{CheckoutRequest, CheckoutResponse, OrderList, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest, WeeklyStockReport},
    },
    models::{Order, OrderStatus, Product, Role, StockStatus, UserCoupon},
    response::{ApiResponse, ErrorData, Meta},
    routes::{auth, cart, coupons, favorites, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        products::list_products,
        products::list_all_products,
        products::search_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::weekly_stock_report,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::clear_cart,
        favorites::list_favorites,
        favorites::toggle_favorite,
        favorites::remove_favorite,
        orders::checkout,
        orders::my_orders,
        orders::order_history,
        orders::reorder,
        orders::receive_order,
        orders::list_all_orders,
        orders::update_order_status,
        orders::delete_order,
        coupons::collect_coupon,
        coupons::list_user_coupons,
        coupons::use_coupon
    ),
    components(
        schemas(
            Role,
            StockStatus,
            OrderStatus,
            Product,
            Order,
            UserCoupon,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            WeeklyStockReport,
            AddToCartRequest,
            CartItemResponse,
            CartResponse,
            ToggleFavoriteRequest,
            ToggleFavoriteResponse,
            FavoriteDto,
            FavoriteList,
            CheckoutRequest,
            CheckoutResponse,
            UpdateOrderStatusRequest,
            OrderList,
            CollectCouponRequest,
            UseCouponRequest,
            UserCouponList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::StockReportQuery,
            params::SortOrder,
            params::ProductSortBy,
            health::HealthData,
            Meta,
            ErrorData,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartResponse>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<AuthResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog and stock endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Orders", description = "Checkout and order lifecycle endpoints"),
        (name = "Coupons", description = "Coupon endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
