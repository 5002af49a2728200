// src/routes/auth_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::{generate_token, hash_token},
    error::ApiError,
    mailer,
    middleware::auth_context::AuthContext,
    models::{role_to_string, *},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/magic-link", post(request_magic_link))
        .route("/verify", post(verify))
        .route("/me", get(me))
        .route("/logout", post(logout))
        // Convenience: revoke all other sessions but keep the current one
        .route("/logout_all", post(logout_all))
}

/* ============================================================
   POST /auth/magic-link
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct MagicLinkData {
    pub message: String,
    pub email: String,
}

/// Passwordless sign-in, step 1: create the user on first sight, store a
/// hashed one-time token, and email the sign-in link. The response is the
/// same whether or not the address maps to an active account.
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(req): Json<MagicLinkRequest>,
) -> Result<Json<ApiOk<MagicLinkData>>, ApiError> {
    let email = validate_email("email", &req.email)?;

    let ok_response = Json(ApiOk {
        data: MagicLinkData {
            message: "If the address is valid, a sign-in link has been sent.".into(),
            email: email.clone(),
        },
    });

    // First magic-link request creates the account with role patient.
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO app_user (email, role)
        VALUES ($1, 0)
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING user_id, email, role, is_active, created_at
        "#,
    )
    .bind(&email)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    if !user.is_active {
        // Do not leak that the account is disabled.
        tracing::info!(user_id = %user.user_id, "magic link requested for disabled account");
        return Ok(ok_response);
    }

    let token = generate_token();
    let token_hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::minutes(state.magic_link_ttl_minutes);

    sqlx::query(
        r#"
        INSERT INTO login_token (user_id, login_token_hash, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user.user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    let link = format!(
        "{}/auth/callback?token={token}",
        state.frontend_url.trim_end_matches('/')
    );
    let (subject, html) =
        mailer::magic_link_email(&state.clinic_name, &link, state.magic_link_ttl_minutes);
    if let Err(e) = state.mailer.send(&email, &subject, &html).await {
        tracing::warn!(user_id = %user.user_id, "failed to send magic link: {e}");
    }

    Ok(ok_response)
}

/* ============================================================
   POST /auth/verify
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct VerifyData {
    pub access_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub user: UserProfile,
}

#[derive(Debug, sqlx::FromRow)]
struct LoginTokenRow {
    login_token_id: Uuid,
    user_id: Uuid,
}

/// Passwordless sign-in, step 2: exchange the emailed token for a bearer
/// session. Tokens are single use; the conditional UPDATE below is the guard
/// against a link being redeemed twice.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<ApiOk<VerifyData>>, ApiError> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "token is required".into(),
        ));
    }
    let token_hash = hash_token(token);

    let consumed: LoginTokenRow = sqlx::query_as::<_, LoginTokenRow>(
        r#"
        UPDATE login_token lt
        SET consumed_at = now()
        FROM app_user u
        WHERE lt.login_token_hash = $1
          AND lt.consumed_at IS NULL
          AND lt.expires_at > now()
          AND u.user_id = lt.user_id
          AND u.is_active = true
        RETURNING lt.login_token_id, lt.user_id
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_login_token)?;

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, email, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(consumed.user_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let access_token = generate_token();
    let session_hash = hash_token(&access_token);
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token (user_id, session_token_hash, expires_at)
        VALUES ($1, $2, $3)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(user.user_id)
    .bind(&session_hash)
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    tracing::info!(user_id = %user.user_id, login_token_id = %consumed.login_token_id, "magic link redeemed");

    Ok(Json(ApiOk {
        data: VerifyData {
            access_token,
            expires_at: session.expires_at,
            user: UserProfile {
                user_id: user.user_id,
                email: user.email,
                role: role_to_string(user.role),
                created_at: user.created_at,
            },
        },
    }))
}

/* ============================================================
   GET /auth/me
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, email, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    if !user.is_active {
        return Err(ApiError::session_expired());
    }

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        SELECT session_token_id, expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk {
        data: MeData {
            user: UserProfile {
                user_id: user.user_id,
                email: user.email,
                role: role_to_string(user.role),
                created_at: user.created_at,
            },
            session: SessionInfo {
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            },
        },
    }))
}

/* ============================================================
   POST /auth/logout, /auth/logout_all
   ============================================================ */

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

#[derive(Debug, Serialize)]
pub struct LogoutAllData {
    pub ok: bool,
    pub revoked_count: i64,
}

/// Revokes all active sessions for the current user except the one used for
/// this request.
pub async fn logout_all(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<LogoutAllData>>, ApiError> {
    let res = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
          AND session_token_id <> $2
        "#,
    )
    .bind(auth.user_id)
    .bind(auth.session_token_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: LogoutAllData {
            ok: true,
            revoked_count: res.rows_affected() as i64,
        },
    }))
}
