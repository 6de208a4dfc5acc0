use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{AuthResponse, LoginInput, ProfileResponse, RegisterInput, User},
    repository::UserStore,
    telemetry::USERS_REGISTERED,
};

pub const MIN_PASSWORD_LEN: usize = 6;
/// Column width of `users.first_name` / `users.last_name`, in characters.
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    jwt_expires_in_hours: i64,
    secure_cookies: bool,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, config: &Config) -> Self {
        Self {
            users,
            jwt_secret: config.jwt_secret.clone(),
            jwt_expires_in_hours: config.jwt_expires_in_hours,
            secure_cookies: config.is_production(),
        }
    }

    #[instrument(name = "auth.register", skip(self, input), fields(first_name = %input.first_name))]
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthResponse> {
        let (first_name, last_name) = validate_names(&input.first_name, &input.last_name)?;
        if input.password.is_empty() {
            return Err(AppError::Validation(
                "First name, last name, and password are required".to_string(),
            ));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        if self
            .users
            .find_by_name(first_name, last_name)
            .await?
            .is_some()
        {
            return Err(duplicate_user());
        }

        let password_hash = hash_password(&input.password)?;
        let user = self
            .users
            .create(first_name, last_name, &password_hash)
            .await
            .map_err(|e| match e.as_database_error() {
                // lost a race with a concurrent registration of the same pair
                Some(db) if db.is_unique_violation() => duplicate_user(),
                _ => AppError::Database(e),
            })?;

        let token = self.generate_token(&user)?;

        USERS_REGISTERED.add(1, &[]);
        tracing::info!(user_id = %user.id, "User registered");

        Ok(AuthResponse {
            user: ProfileResponse::from(&user),
            token,
        })
    }

    #[instrument(name = "auth.login", skip(self, input), fields(first_name = %input.first_name))]
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthResponse> {
        let (first_name, last_name) = validate_names(&input.first_name, &input.last_name)?;
        if input.password.is_empty() {
            return Err(AppError::Validation(
                "First name, last name, and password are required".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_name(first_name, last_name)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        verify_password(&input.password, &user.password_hash)?;

        let token = self.generate_token(&user)?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthResponse {
            user: ProfileResponse::from(&user),
            token,
        })
    }

    #[instrument(name = "auth.get_user", skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))
    }

    #[instrument(name = "auth.validate_token", skip(self, token))]
    pub fn validate_token(&self, token: &str) -> AppResult<Uuid> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims.sub)
    }

    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.jwt_expires_in_hours);

        let claims = Claims {
            sub: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Session cookies are marked `Secure` in production.
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

fn validate_names<'a>(first_name: &'a str, last_name: &'a str) -> AppResult<(&'a str, &'a str)> {
    let first_name = first_name.trim();
    let last_name = last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::Validation(
            "First name, last name, and password are required".to_string(),
        ));
    }
    if first_name.chars().count() > MAX_NAME_LEN || last_name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "First and last name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok((first_name, last_name))
}

fn duplicate_user() -> AppError {
    AppError::Conflict("User with this name already exists".to_string())
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> AppResult<()> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::InvalidCredentials)
}
