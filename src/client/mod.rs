//! Typed HTTP client for the storefront API.
//!
//! Every call unwraps the `{ message, data, meta }` envelope and turns non-2xx
//! responses into [`ClientError::Status`] carrying the server's message.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    config::ClientConfig,
    dto::{
        auth::{AuthResponse, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartResponse},
        coupons::{CollectCouponRequest, UseCouponRequest, UserCouponList},
        favorites::{FavoriteList, ToggleFavoriteRequest, ToggleFavoriteResponse},
        orders::{CheckoutRequest, CheckoutResponse, OrderList, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest, WeeklyStockReport},
    },
    models::{Order, OrderStatus, Product, UserCoupon},
    response::{ApiResponse, ErrorData},
};

pub mod cart_state;
pub mod session;

pub use cart_state::{CartBackend, CartStateHolder};
pub use session::{Persona, TokenStore};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no identity token")]
    MissingToken,
    #[error("quantity {requested} exceeds available stock {stock}")]
    ExceedsStock { requested: i32, stock: i32 },
    #[error("response carried no data")]
    MissingData,
    #[error("token storage: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A page of products together with the total match count.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: i64,
}

/// Filters for product listing and search.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProductFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ShopClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ShopClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        self.send(request).await?.data.ok_or(ClientError::MissingData)
    }

    /// Register and keep the returned token for later calls.
    pub async fn register(&mut self, payload: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let auth: AuthResponse = self
            .data(self.request(Method::POST, "/api/auth/register").json(payload))
            .await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    /// Log in and keep the returned token for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let payload = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .data(self.request(Method::POST, "/api/auth/login").json(&payload))
            .await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn all_products(&self) -> Result<Vec<Product>, ClientError> {
        let list: ProductList = self
            .data(self.request(Method::GET, "/api/products/all"))
            .await?;
        Ok(list.items)
    }

    /// Paginated listing including sold-out products.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, ClientError> {
        self.product_page("/api/products", filter).await
    }

    pub async fn search_products(&self, filter: &ProductFilter) -> Result<ProductPage, ClientError> {
        self.product_page("/api/products/search", filter).await
    }

    async fn product_page(&self, path: &str, filter: &ProductFilter) -> Result<ProductPage, ClientError> {
        let response: ApiResponse<ProductList> = self
            .send(self.request(Method::GET, path).query(filter))
            .await?;
        let total = response.meta.as_ref().and_then(|m| m.total);
        let items = response.data.ok_or(ClientError::MissingData)?.items;
        Ok(ProductPage {
            total: total.unwrap_or(items.len() as i64),
            items,
        })
    }

    pub async fn product(&self, id: Uuid) -> Result<Product, ClientError> {
        self.data(self.request(Method::GET, &format!("/api/products/{id}")))
            .await
    }

    pub async fn create_product(&self, payload: &CreateProductRequest) -> Result<Product, ClientError> {
        self.data(self.authed(Method::POST, "/api/products")?.json(payload))
            .await
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        payload: &UpdateProductRequest,
    ) -> Result<Product, ClientError> {
        self.data(
            self.authed(Method::PUT, &format!("/api/products/{id}"))?
                .json(payload),
        )
        .await
    }

    pub async fn delete_product(&self, id: Uuid) -> Result<(), ClientError> {
        self.send::<serde_json::Value>(self.authed(Method::DELETE, &format!("/api/products/{id}"))?)
            .await?;
        Ok(())
    }

    pub async fn cart(&self) -> Result<CartResponse, ClientError> {
        self.data(self.authed(Method::GET, "/api/cart/list")?).await
    }

    pub async fn add_to_cart(&self, product_id: Uuid, qty: i32) -> Result<CartResponse, ClientError> {
        let payload = AddToCartRequest { product_id, qty };
        self.data(self.authed(Method::POST, "/api/cart/add")?.json(&payload))
            .await
    }

    /// Set a cart line to `qty`; zero removes the line.
    pub async fn update_cart_item(&self, item_id: Uuid, qty: i32) -> Result<CartResponse, ClientError> {
        let request = self
            .authed(Method::PUT, &format!("/api/cart/update/{item_id}"))?
            .query(&[("qty", qty)]);
        self.data(request).await
    }

    pub async fn clear_cart(&self) -> Result<(), ClientError> {
        self.send::<serde_json::Value>(self.authed(Method::DELETE, "/api/cart/clear")?)
            .await?;
        Ok(())
    }

    pub async fn favorites(&self) -> Result<FavoriteList, ClientError> {
        self.data(self.authed(Method::GET, "/api/favorites")?).await
    }

    pub async fn toggle_favorite(&self, product_id: Uuid) -> Result<bool, ClientError> {
        let payload = ToggleFavoriteRequest { product_id };
        let resp: ToggleFavoriteResponse = self
            .data(self.authed(Method::POST, "/api/favorites/toggle")?.json(&payload))
            .await?;
        Ok(resp.favorited)
    }

    pub async fn remove_favorite(&self, product_id: Uuid) -> Result<(), ClientError> {
        self.send::<serde_json::Value>(
            self.authed(Method::DELETE, &format!("/api/favorites/{product_id}"))?,
        )
        .await?;
        Ok(())
    }

    pub async fn checkout(&self, coupon_code: Option<&str>) -> Result<CheckoutResponse, ClientError> {
        let payload = CheckoutRequest {
            coupon_code: coupon_code.map(str::to_string),
        };
        self.data(self.authed(Method::POST, "/api/orders/checkout")?.json(&payload))
            .await
    }

    pub async fn my_orders(&self) -> Result<Vec<Order>, ClientError> {
        let list: OrderList = self.data(self.authed(Method::GET, "/api/orders/my")?).await?;
        Ok(list.items)
    }

    pub async fn order_history(&self) -> Result<Vec<Order>, ClientError> {
        let list: OrderList = self
            .data(self.authed(Method::GET, "/api/orders/history")?)
            .await?;
        Ok(list.items)
    }

    pub async fn receive_order(&self, id: Uuid) -> Result<Order, ClientError> {
        self.data(self.authed(Method::PATCH, &format!("/api/orders/{id}/receive"))?)
            .await
    }

    pub async fn reorder(&self, id: Uuid) -> Result<CartResponse, ClientError> {
        self.data(self.authed(Method::POST, &format!("/api/orders/{id}/reorder"))?)
            .await
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>, ClientError> {
        let list: OrderList = self.data(self.authed(Method::GET, "/api/orders")?).await?;
        Ok(list.items)
    }

    pub async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, ClientError> {
        let payload = UpdateOrderStatusRequest { status };
        self.data(
            self.authed(Method::PATCH, &format!("/api/orders/{id}"))?
                .json(&payload),
        )
        .await
    }

    pub async fn delete_order(&self, id: Uuid) -> Result<(), ClientError> {
        self.send::<serde_json::Value>(self.authed(Method::DELETE, &format!("/api/orders/{id}"))?)
            .await?;
        Ok(())
    }

    pub async fn weekly_stock_report(&self) -> Result<WeeklyStockReport, ClientError> {
        self.data(self.authed(Method::GET, "/api/products/reports/weekly-stock")?)
            .await
    }

    pub async fn collect_coupon(&self, payload: &CollectCouponRequest) -> Result<UserCoupon, ClientError> {
        self.data(self.authed(Method::POST, "/api/coupons/collect")?.json(payload))
            .await
    }

    pub async fn coupons(&self) -> Result<Vec<UserCoupon>, ClientError> {
        let list: UserCouponList = self.data(self.authed(Method::GET, "/api/coupons/user")?).await?;
        Ok(list.items)
    }

    pub async fn use_coupon(&self, code: &str) -> Result<UserCoupon, ClientError> {
        let payload = UseCouponRequest {
            coupon_code: code.to_string(),
        };
        self.data(self.authed(Method::PUT, "/api/coupons/use")?.json(&payload))
            .await
    }
}

impl CartBackend for ShopClient {
    fn has_identity(&self) -> bool {
        self.token.is_some()
    }

    async fn load_cart(&self) -> Result<CartResponse, ClientError> {
        self.cart().await
    }

    async fn set_quantity(&self, item_id: Uuid, qty: i32) -> Result<CartResponse, ClientError> {
        self.update_cart_item(item_id, qty).await
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ApiResponse<ErrorData>>(body)
        .ok()
        .and_then(|envelope| envelope.data.map(|d| d.error))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    ClientError::Status {
        status: status.as_u16(),
        message,
    }
}
