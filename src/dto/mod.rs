pub mod auth;
pub mod cart;
pub mod coupons;
pub mod favorites;
pub mod orders;
pub mod products;
