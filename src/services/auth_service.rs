use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{AuthResponse, LoginRequest, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::issue_token,
    models::Role,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let RegisterRequest {
        username,
        email,
        password,
    } = payload;
    let username = username.trim().to_string();
    let email = email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "username, email and password are required".into(),
        ));
    }

    let clash = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Email.eq(email.as_str()))
                .add(UserCol::Username.eq(username.as_str())),
        )
        .one(&state.orm)
        .await?;
    if let Some(existing) = clash {
        let message = if existing.email == email {
            "Email is already taken"
        } else {
            "Username is already taken"
        };
        return Err(AppError::BadRequest(message.into()));
    }

    // The very first account administers the shop.
    let role = if Users::find().count(&state.orm).await? == 0 {
        Role::Admin
    } else {
        Role::User
    };

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(hash_password(&password)?),
        role: Set(role.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let token = issue_token(
        &state.config.jwt_secret,
        user.id,
        role,
        state.config.jwt_ttl_hours,
    )?;

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id, "role": role }),
    )
    .await;
    tracing::info!(user_id = %user.id, role = %role, "user registered");

    Ok(ApiResponse::success(
        "User created",
        AuthResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
            token,
        },
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(email.trim().to_lowercase()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let role = user
        .role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let token = issue_token(
        &state.config.jwt_secret,
        user.id,
        role,
        state.config.jwt_ttl_hours,
    )?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
            token,
        },
        Some(Meta::empty()),
    ))
}
