use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{Json, extract::State, http::HeaderMap, http::StatusCode};
use password_hash::rand_core::OsRng;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::constants::*;
use crate::models::{LoginPayload, LoginResponse, PublicUser, RegisterPayload, User};
use crate::utils::{db_error, db_error_with_context, now_rfc3339, validate_string_length};
use crate::{AppState, Db};

fn validate_username(username: &str) -> Result<(), (StatusCode, String)> {
    validate_string_length(username, "Username", MAX_USERNAME_LENGTH)?;
    if username.trim().len() < MIN_USERNAME_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Username must be at least {} characters", MIN_USERNAME_LENGTH),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), (StatusCode, String)> {
    validate_string_length(email, "Email", MAX_EMAIL_LENGTH)?;
    if !email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), (StatusCode, String)> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn extract_user_from_row(row: libsql::Row) -> Result<User, (StatusCode, String)> {
    let id: String = row
        .get(0)
        .map_err(|_| db_error_with_context("invalid user data"))?;
    let username: String = row
        .get(1)
        .map_err(|_| db_error_with_context("invalid user data"))?;
    let email: String = row
        .get(2)
        .map_err(|_| db_error_with_context("invalid user data"))?;
    let password_hash: String = row
        .get(3)
        .map_err(|_| db_error_with_context("invalid user data"))?;

    Ok(User {
        id,
        username,
        email,
        password_hash,
    })
}

/// Pulls the opaque token out of the `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, (StatusCode, String)> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string()))?;

    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string()))
}

/// Resolves the bearer token to its user, rejecting unknown and expired
/// sessions with 401.
pub async fn get_current_user(db: &Db, headers: &HeaderMap) -> Result<User, (StatusCode, String)> {
    let token = bearer_token(headers)?;

    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT u.id, u.username, u.email, u.password_hash, s.expires_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token = ?",
            [token],
        )
        .await
        .map_err(|_| db_error_with_context("failed to look up session"))?;

    let row = rows
        .next()
        .await
        .map_err(|_| db_error())?
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_INVALID_SESSION.to_string()))?;

    let expires_at: String = row.get(4).map_err(|_| db_error())?;
    let expires = time::OffsetDateTime::parse(&expires_at, &Rfc3339)
        .map_err(|_| (StatusCode::UNAUTHORIZED, ERR_INVALID_SESSION.to_string()))?;
    if expires < time::OffsetDateTime::now_utc() {
        return Err((StatusCode::UNAUTHORIZED, ERR_INVALID_SESSION.to_string()));
    }

    extract_user_from_row(row)
}

async fn find_user_by_username(
    db: &Db,
    username: &str,
) -> Result<Option<User>, (StatusCode, String)> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, username, email, password_hash FROM users WHERE username = ?",
            [username],
        )
        .await
        .map_err(|_| db_error_with_context("failed to look up user"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_user_from_row(row)?)),
        None => Ok(None),
    }
}

pub async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    validate_username(&payload.username)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();

    let conn = app_state.db.write().await;

    let mut existing = conn
        .query("SELECT id FROM users WHERE username = ?", [username.as_str()])
        .await
        .map_err(|_| db_error_with_context("failed to check existing username"))?;
    if existing.next().await.map_err(|_| db_error())?.is_some() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username already exists".to_string(),
        ));
    }

    let mut existing = conn
        .query("SELECT id FROM users WHERE email = ?", [email.as_str()])
        .await
        .map_err(|_| db_error_with_context("failed to check existing email"))?;
    if existing.next().await.map_err(|_| db_error())?.is_some() {
        return Err((StatusCode::BAD_REQUEST, "Email already exists".to_string()));
    }

    let user_id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&payload.password)?;
    let created_at = now_rfc3339()?;

    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        (
            user_id.as_str(),
            username.as_str(),
            email.as_str(),
            password_hash.as_str(),
            created_at.as_str(),
        ),
    )
    .await
    .map_err(|_| db_error_with_context("user creation failed"))?;

    tracing::info!(username = %username, "registered new user");

    Ok((
        StatusCode::CREATED,
        Json(PublicUser {
            id: user_id,
            username,
            email,
        }),
    ))
}

pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<(StatusCode, Json<LoginResponse>), (StatusCode, String)> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid username or password".to_string(),
        )
    };

    let user = find_user_by_username(&app_state.db, payload.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = Uuid::new_v4().to_string();
    let created_at = now_rfc3339()?;
    let expires_at = (time::OffsetDateTime::now_utc()
        + time::Duration::days(SESSION_EXPIRY_DAYS))
    .format(&Rfc3339)
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let conn = app_state.db.write().await;
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        (
            token.as_str(),
            user.id.as_str(),
            created_at.as_str(),
            expires_at.as_str(),
        ),
    )
    .await
    .map_err(|_| db_error_with_context("session creation failed"))?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            token,
            user: PublicUser {
                id: user.id,
                username: user.username,
                email: user.email,
            },
        }),
    ))
}

pub async fn me(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = get_current_user(&app_state.db, &headers).await?;
    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}

pub async fn logout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, (StatusCode, String)> {
    // Validate the session before discarding it so a bogus token still 401s
    get_current_user(&app_state.db, &headers).await?;
    let token = bearer_token(&headers)?.to_string();

    let conn = app_state.db.write().await;
    conn.execute("DELETE FROM sessions WHERE token = ?", [token.as_str()])
        .await
        .map_err(|_| db_error_with_context("failed to delete session"))?;

    Ok(StatusCode::NO_CONTENT)
}
