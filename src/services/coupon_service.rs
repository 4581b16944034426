use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::coupons::{CollectCouponRequest, UseCouponRequest, UserCouponList},
    entity::user_coupons::{
        ActiveModel as CouponActive, Column as CouponCol, Entity as UserCoupons,
        Model as CouponModel,
    },
    error::{AppError, AppResult, on_unique_violation},
    middleware::auth::AuthUser,
    models::UserCoupon,
    response::{ApiResponse, Meta},
    state::AppState,
};

const ALREADY_COLLECTED: &str = "You already collected this coupon";

pub async fn collect_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CollectCouponRequest,
) -> AppResult<ApiResponse<UserCoupon>> {
    let code = payload.coupon_code.trim().to_string();
    if code.is_empty() {
        return Err(AppError::BadRequest("coupon_code is required".into()));
    }
    if !(payload.discount > 0.0 && payload.discount <= 100.0) {
        return Err(AppError::BadRequest(
            "discount must be a percentage in (0, 100]".into(),
        ));
    }

    let already = UserCoupons::find()
        .filter(
            Condition::all()
                .add(CouponCol::UserId.eq(user.user_id))
                .add(CouponCol::Code.eq(code.as_str())),
        )
        .one(&state.orm)
        .await?;
    if already.is_some() {
        return Err(AppError::BadRequest(ALREADY_COLLECTED.into()));
    }

    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        code: Set(code),
        discount: Set(payload.discount),
        description: Set(payload.description),
        used: Set(false),
        collected_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| on_unique_violation(err, ALREADY_COLLECTED))?;

    audit::record(
        &state.pool,
        user.user_id,
        "coupon_collect",
        "user_coupons",
        serde_json::json!({ "code": coupon.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon collected successfully",
        coupon_from_entity(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn list_user_coupons(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UserCouponList>> {
    let items: Vec<UserCoupon> = UserCoupons::find()
        .filter(CouponCol::UserId.eq(user.user_id))
        .order_by_desc(CouponCol::CollectedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(coupon_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        UserCouponList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// Flip an unused coupon to used in one conditional update, so concurrent
/// calls cannot both succeed.
pub async fn use_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: UseCouponRequest,
) -> AppResult<ApiResponse<UserCoupon>> {
    let code = payload.coupon_code.trim();
    let owned = Condition::all()
        .add(CouponCol::UserId.eq(user.user_id))
        .add(CouponCol::Code.eq(code));

    let result = UserCoupons::update_many()
        .col_expr(CouponCol::Used, Expr::value(true))
        .filter(owned.clone().add(CouponCol::Used.eq(false)))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::BadRequest(
            "Coupon not available or already used".into(),
        ));
    }

    let coupon = UserCoupons::find()
        .filter(owned)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    audit::record(
        &state.pool,
        user.user_id,
        "coupon_use",
        "user_coupons",
        serde_json::json!({ "code": coupon.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon applied successfully",
        coupon_from_entity(coupon),
        Some(Meta::empty()),
    ))
}

/// Mark the user's coupon as used and return its percent discount.
pub async fn redeem_for_checkout<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    code: &str,
) -> AppResult<f64> {
    let coupon = UserCoupons::find()
        .filter(
            Condition::all()
                .add(CouponCol::UserId.eq(user_id))
                .add(CouponCol::Code.eq(code)),
        )
        .lock(LockType::Update)
        .one(db)
        .await?;
    let coupon = match coupon {
        Some(c) => c,
        None => return Err(AppError::BadRequest("Coupon not found or invalid".into())),
    };
    if coupon.used {
        return Err(AppError::BadRequest("Coupon has already been used".into()));
    }

    let discount = coupon.discount;
    let mut active: CouponActive = coupon.into();
    active.used = Set(true);
    active.update(db).await?;
    Ok(discount)
}

fn coupon_from_entity(model: CouponModel) -> UserCoupon {
    UserCoupon {
        code: model.code,
        used: model.used,
        collected_at: model.collected_at.with_timezone(&Utc),
        discount: model.discount,
        description: model.description,
    }
}
