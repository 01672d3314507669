use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;
use uuid::Uuid;

use quad_core::{AccessGate, CommentService, IdentityProvider, PostRepository, VoteService};
use quad_db::Database;
use quad_types::api::{
    Claims, CreateProfileRequest, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    SessionResponse,
};
use quad_types::models::Session;

use crate::error::{ApiError, join_error};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub gate: AccessGate,
    pub posts: PostRepository,
    pub votes: VoteService,
    pub comments: CommentService,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String) -> AppState {
        Arc::new(Self {
            gate: AccessGate::new(db.clone()),
            posts: PostRepository::new(db.clone()),
            votes: VoteService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            db,
            jwt_secret,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 || email.len() > 254 {
        return Err(ApiError::BadRequest("malformed email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }

    let db = state.db.clone();
    let lookup_email = email.clone();
    let existing = tokio::task::spawn_blocking(move || db.get_user_by_email(&lookup_email))
        .await
        .map_err(join_error)?
        .map_err(ApiError::Internal)?;
    if existing.is_some() {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();

    let db = state.db.clone();
    let insert_email = email.clone();
    tokio::task::spawn_blocking(move || {
        db.create_user(&user_id.to_string(), &insert_email, &password_hash)
    })
    .await
    .map_err(join_error)?
    .map_err(ApiError::Internal)?;

    info!("Registered identity {} ({})", user_id, email);

    let token = create_token(&state.jwt_secret, user_id)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || db.get_user_by_email(&email))
        .await
        .map_err(join_error)?
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Core(quad_core::CoreError::Unauthorized))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Core(quad_core::CoreError::Unauthorized))?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {}", e)))?;

    let db = state.db.clone();
    let profile = tokio::task::spawn_blocking(move || db.get_profile(&user.id))
        .await
        .map_err(join_error)?
        .map_err(ApiError::Internal)?;

    let token = create_token(&state.jwt_secret, user_id)?;

    Ok(Json(LoginResponse {
        user_id,
        username: profile.map(|p| p.username),
        token,
    }))
}

/// Completes sign-up: picking a username creates the profile row that
/// unlocks forum features.
pub async fn complete_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::BadRequest(
            "username must be 3-32 characters".into(),
        ));
    }

    let db = state.db.clone();
    let existing = tokio::task::spawn_blocking(move || db.get_profile(&claims.sub.to_string()))
        .await
        .map_err(join_error)?
        .map_err(ApiError::Internal)?;
    if existing.is_some() {
        return Err(ApiError::Conflict("profile is already completed".into()));
    }

    let db = state.db.clone();
    let insert_username = username.clone();
    let result = tokio::task::spawn_blocking(move || {
        db.create_profile(&claims.sub.to_string(), &insert_username)
    })
    .await
    .map_err(join_error)?;

    if let Err(e) = result {
        if quad_db::queries::is_constraint_error(&e) {
            return Err(ApiError::Conflict("username is already taken".into()));
        }
        return Err(ApiError::Internal(e));
    }

    info!("Profile completed for {} as '{}'", claims.sub, username);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "user_id": claims.sub, "username": username })),
    ))
}

/// The server side of a client's mount-time session refresh: confirms the
/// bearer token still maps to a live identity and reports whether forum
/// features are unlocked.
pub async fn session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || db.get_user_by_id(&claims.sub.to_string()))
        .await
        .map_err(join_error)?
        .map_err(ApiError::Internal)?;
    if user.is_none() {
        return Err(ApiError::Core(quad_core::CoreError::Unauthorized));
    }

    let db = state.db.clone();
    let profile = tokio::task::spawn_blocking(move || db.get_profile(&claims.sub.to_string()))
        .await
        .map_err(join_error)?
        .map_err(ApiError::Internal)?;

    let username = profile.map(|p| p.username);
    Ok(Json(SessionResponse {
        user_id: claims.sub,
        forum_enabled: username.is_some(),
        username,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encoding failed: {}", e)))?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Production identity seam for the session store: a session is valid as
/// long as its token decodes and the identity still exists.
pub struct JwtIdentity {
    db: Arc<Database>,
    secret: String,
}

impl JwtIdentity {
    pub fn new(db: Arc<Database>, secret: String) -> Self {
        Self { db, secret }
    }
}

impl IdentityProvider for JwtIdentity {
    fn validate(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let claims = match decode_token(&self.secret, token) {
            Ok(claims) => claims,
            // An expired or malformed token is not an error, just no session.
            Err(_) => return Ok(None),
        };

        match self.db.get_user_by_id(&claims.sub.to_string())? {
            Some(_) => Ok(Some(Session {
                user_id: claims.sub,
                token: token.to_string(),
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quad_core::SessionStore;

    fn test_db() -> Arc<Database> {
        Arc::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn token_round_trip_resolves_to_a_session() {
        let db = test_db();
        let user_id = Uuid::new_v4();
        db.create_user(&user_id.to_string(), "alice@quad.test", "hash")
            .unwrap();

        let token = create_token("test-secret", user_id).unwrap();
        let provider = JwtIdentity::new(db, "test-secret".into());
        let session = provider.validate(&token).unwrap().unwrap();
        assert_eq!(session.user_id, user_id);
    }

    #[test]
    fn garbage_token_is_no_session_not_an_error() {
        let provider = JwtIdentity::new(test_db(), "test-secret".into());
        assert!(provider.validate("not-a-token").unwrap().is_none());
    }

    #[test]
    fn token_for_deleted_identity_is_invalid() {
        let db = test_db();
        let token = create_token("test-secret", Uuid::new_v4()).unwrap();
        let provider = JwtIdentity::new(db, "test-secret".into());
        assert!(provider.validate(&token).unwrap().is_none());
    }

    #[test]
    fn session_store_refresh_through_jwt_identity() {
        let db = test_db();
        let user_id = Uuid::new_v4();
        db.create_user(&user_id.to_string(), "alice@quad.test", "hash")
            .unwrap();
        let token = create_token("test-secret", user_id).unwrap();

        let store = SessionStore::new(Arc::new(JwtIdentity::new(
            db.clone(),
            "test-secret".into(),
        )));
        store.sign_in(Session { user_id, token });
        assert_eq!(store.refresh().unwrap().user_id, user_id);

        // Deleting the identity invalidates the next refresh.
        db.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [user_id.to_string()])?;
            Ok(())
        })
        .unwrap();
        assert!(store.refresh().is_none());
        assert!(store.current().is_none());
    }
}
