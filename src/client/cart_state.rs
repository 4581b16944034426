use std::future::Future;

use uuid::Uuid;

use crate::{
    client::ClientError,
    dto::cart::{CartItemResponse, CartResponse},
};

/// Server calls the cart holder depends on.
pub trait CartBackend {
    /// Whether a bearer token is available for authenticated calls.
    fn has_identity(&self) -> bool;

    fn load_cart(&self) -> impl Future<Output = Result<CartResponse, ClientError>> + Send;

    /// Set a line to an absolute quantity; zero removes it.
    fn set_quantity(
        &self,
        item_id: Uuid,
        qty: i32,
    ) -> impl Future<Output = Result<CartResponse, ClientError>> + Send;
}

/// Working copy of the signed-in user's cart.
///
/// Local state is only ever replaced by a full server response. A failed call
/// leaves the previous `{items, total}` in place. Mutations take `&mut self`,
/// so each one sees the state left by the previous call.
#[derive(Debug)]
pub struct CartStateHolder<B> {
    backend: B,
    cart: CartResponse,
}

impl<B: CartBackend> CartStateHolder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cart: CartResponse::default(),
        }
    }

    pub fn items(&self) -> &[CartItemResponse] {
        &self.cart.items
    }

    /// Total as last reported by the server.
    pub fn total(&self) -> i64 {
        self.cart.total
    }

    pub fn cart(&self) -> &CartResponse {
        &self.cart
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn item(&self, item_id: Uuid) -> Option<&CartItemResponse> {
        self.cart.items.iter().find(|item| item.id == item_id)
    }

    /// Reload the cart from the server. Does nothing without an identity.
    pub async fn fetch_cart(&mut self) -> Result<(), ClientError> {
        if !self.backend.has_identity() {
            tracing::debug!("no identity token, skipping cart fetch");
            return Ok(());
        }
        match self.backend.load_cart().await {
            Ok(cart) => {
                self.cart = cart;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch cart");
                Err(err)
            }
        }
    }

    pub async fn update_cart_item(&mut self, item_id: Uuid, qty: i32) -> Result<(), ClientError> {
        match self.backend.set_quantity(item_id, qty).await {
            Ok(cart) => {
                self.cart = cart;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, %item_id, qty, "failed to update cart item");
                Err(err)
            }
        }
    }

    /// Add one unit. Refused locally when the line is already at its stock.
    pub async fn increase_qty(&mut self, item_id: Uuid) -> Result<(), ClientError> {
        let Some(item) = self.item(item_id) else {
            return Ok(());
        };
        let requested = item.quantity + 1;
        if requested > item.stock {
            tracing::warn!(%item_id, stock = item.stock, "cannot add more than available stock");
            return Err(ClientError::ExceedsStock {
                requested,
                stock: item.stock,
            });
        }
        self.update_cart_item(item_id, requested).await
    }

    /// Remove one unit, never going below one.
    pub async fn decrease_qty(&mut self, item_id: Uuid) -> Result<(), ClientError> {
        let Some(item) = self.item(item_id) else {
            return Ok(());
        };
        let requested = (item.quantity - 1).max(1);
        if requested == item.quantity {
            return Ok(());
        }
        self.update_cart_item(item_id, requested).await
    }

    pub async fn remove_item(&mut self, item_id: Uuid) -> Result<(), ClientError> {
        self.update_cart_item(item_id, 0).await
    }
}
