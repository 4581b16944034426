pub mod cart_items;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod user_coupons;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use favorites::Entity as Favorites;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use user_coupons::Entity as UserCoupons;
pub use users::Entity as Users;
