use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::UserCoupon;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CollectCouponRequest {
    pub coupon_code: String,
    /// Percent off, in (0, 100].
    pub discount: f64,
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UseCouponRequest {
    pub coupon_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserCouponList {
    #[schema(value_type = Vec<UserCoupon>)]
    pub items: Vec<UserCoupon>,
}
