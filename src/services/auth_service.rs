//! Authentication service: registration with referral codes, login with
//! optional TOTP second factor, and JWT issuance.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{Config, REFERRAL_CODE_ATTEMPTS, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER};
use crate::domain::{generate_referral_code, NewUser, Password, TotpSecret, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{UnitOfWork, UserRepository};

/// JWT claims payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

/// Input for a new account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Code of the user who invited this one
    pub referral_code: Option<String>,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user
    async fn register(&self, input: Registration) -> AppResult<User>;

    /// Login and return JWT token. `totp_code` is required once 2FA is enabled.
    async fn login(
        &self,
        email: String,
        password: String,
        totp_code: Option<String>,
    ) -> AppResult<TokenResponse>;

    /// Verify JWT token and extract claims
    fn verify_token(&self, token: &str) -> AppResult<Claims>;
}

fn generate_token(user: &User, config: &Config) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

fn verify_token_internal(token: &str, config: &Config) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Check the second factor of a user who has 2FA enabled.
///
/// An accepted code is claimed by its time step, so it cannot be replayed
/// while it is still inside the validity window.
pub(crate) async fn check_totp(
    users: &dyn UserRepository,
    user: &User,
    code: Option<&str>,
) -> AppResult<()> {
    if !user.two_factor_enabled {
        return Ok(());
    }
    let code = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(AppError::TwoFactorRequired)?;
    let secret = user
        .two_factor_secret
        .as_deref()
        .ok_or_else(|| AppError::internal("2FA enabled without a secret"))?;

    let Some(step) = TotpSecret::from_base32(secret)?.verify(code, Utc::now().timestamp()) else {
        tracing::warn!(user_id = %user.id, "Invalid two-factor code");
        return Err(AppError::InvalidTwoFactorCode);
    };
    if !users.claim_totp_step(user.id, step).await? {
        tracing::warn!(user_id = %user.id, step, "Two-factor code reused");
        return Err(AppError::InvalidTwoFactorCode);
    }
    Ok(())
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    config: Config,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(uow: Arc<U>, config: Config) -> Self {
        Self { uow, config }
    }

    async fn unique_referral_code(&self) -> AppResult<String> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = generate_referral_code();
            if !self.uow.users().referral_code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(AppError::internal("Could not generate a unique referral code"))
    }

    /// Soft-deleted accounts keep their email reserved
    async fn ensure_email_free(&self, email: &str) -> AppResult<()> {
        if self
            .uow
            .users()
            .find_by_email_with_deleted(email)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("User"));
        }
        Ok(())
    }

    /// Create an administrator account from the command line.
    pub async fn create_admin(&self, email: &str, name: &str, password: &str) -> AppResult<User> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AppError::validation("Invalid email format"));
        }
        self.ensure_email_free(&email).await?;

        let password_hash = Password::new(password)?.into_string();
        let referral_code = self.unique_referral_code().await?;

        let user = self
            .uow
            .users()
            .create(NewUser {
                email,
                password_hash,
                name: name.trim().to_string(),
                role: UserRole::Admin,
                referral_code,
                referred_by: None,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Administrator created");
        Ok(user)
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn register(&self, input: Registration) -> AppResult<User> {
        let email = input.email.trim().to_lowercase();
        self.ensure_email_free(&email).await?;

        let referred_by = match input
            .referral_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            Some(code) => {
                let referrer = self
                    .uow
                    .users()
                    .find_by_referral_code(&code.to_ascii_uppercase())
                    .await?
                    .ok_or_else(|| AppError::validation("Unknown referral code"))?;
                Some(referrer.id)
            }
            None => None,
        };

        let password_hash = Password::new(&input.password)?.into_string();
        let referral_code = self.unique_referral_code().await?;

        let user = self
            .uow
            .users()
            .create(NewUser {
                email,
                password_hash,
                name: input.name.trim().to_string(),
                role: UserRole::User,
                referral_code,
                referred_by,
            })
            .await?;

        tracing::info!(user_id = %user.id, referred = referred_by.is_some(), "User registered");
        Ok(user)
    }

    async fn login(
        &self,
        email: String,
        password: String,
        totp_code: Option<String>,
    ) -> AppResult<TokenResponse> {
        let user_result = self
            .uow
            .users()
            .find_by_email(&email.trim().to_lowercase())
            .await?;

        // Verify against a dummy hash when the user is unknown so both paths cost the same.
        let dummy_hash = "$argon2id$v=19$m=19456,t=2,p=1$dummysalt123456$dummyhash1234567890123456789012";

        let password_hash = match &user_result {
            Some(user) => user.password_hash.as_str(),
            None => dummy_hash,
        };
        let password_valid = Password::from_hash(password_hash.to_string()).verify(&password);

        let user = match user_result {
            Some(user) if password_valid => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        check_totp(self.uow.users().as_ref(), &user, totp_code.as_deref()).await?;

        generate_token(&user, &self.config)
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        verify_token_internal(token, &self.config)
    }
}
