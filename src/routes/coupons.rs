use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};

use crate::{
    dto::coupons::{CollectCouponRequest, UseCouponRequest, UserCouponList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::UserCoupon,
    response::ApiResponse,
    services::coupon_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/collect", post(collect_coupon))
        .route("/user", get(list_user_coupons))
        .route("/use", put(use_coupon))
}

#[utoipa::path(
    post,
    path = "/api/coupons/collect",
    request_body = CollectCouponRequest,
    responses(
        (status = 200, description = "Coupon collected", body = ApiResponse<UserCoupon>),
        (status = 400, description = "Already collected or invalid discount"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn collect_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CollectCouponRequest>,
) -> AppResult<Json<ApiResponse<UserCoupon>>> {
    let resp = coupon_service::collect_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupons/user",
    responses(
        (status = 200, description = "Coupons collected by current user", body = ApiResponse<UserCouponList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn list_user_coupons(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserCouponList>>> {
    let resp = coupon_service::list_user_coupons(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/coupons/use",
    request_body = UseCouponRequest,
    responses(
        (status = 200, description = "Coupon marked as used", body = ApiResponse<UserCoupon>),
        (status = 400, description = "Coupon not available or already used"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn use_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UseCouponRequest>,
) -> AppResult<Json<ApiResponse<UserCoupon>>> {
    let resp = coupon_service::use_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}
