//! Two-factor authentication management.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{TotpSecret, User};
use crate::errors::{AppError, AppResult};
use crate::infra::{UnitOfWork, UserRepository};

/// Secret handed to the user while setting up an authenticator app.
#[derive(Debug, Serialize, ToSchema)]
pub struct TwoFactorSetup {
    /// Base32 secret for manual entry
    #[schema(example = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP")]
    pub secret: String,
    /// `otpauth://` URI to render as a QR code
    pub otpauth_url: String,
}

#[async_trait]
pub trait SecurityService: Send + Sync {
    /// Generate and store a new secret; 2FA stays off until confirmed
    async fn setup_two_factor(&self, user_id: Uuid) -> AppResult<TwoFactorSetup>;

    /// Confirm the pending secret with a code from the app
    async fn enable_two_factor(&self, user_id: Uuid, code: String) -> AppResult<()>;

    async fn disable_two_factor(&self, user_id: Uuid, code: String) -> AppResult<()>;
}

pub struct SecurityManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> SecurityManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}

async fn verify_stored_code(users: &dyn UserRepository, user: &User, code: &str) -> AppResult<()> {
    let secret = user
        .two_factor_secret
        .as_deref()
        .ok_or_else(|| AppError::invalid_state("Two-factor setup has not been started"))?;

    let step = TotpSecret::from_base32(secret)?.verify(code, Utc::now().timestamp());
    let accepted = match step {
        Some(step) => users.claim_totp_step(user.id, step).await?,
        None => false,
    };
    if !accepted {
        tracing::warn!(user_id = %user.id, "Invalid two-factor code");
        return Err(AppError::InvalidTwoFactorCode);
    }
    Ok(())
}

#[async_trait]
impl<U: UnitOfWork> SecurityService for SecurityManager<U> {
    async fn setup_two_factor(&self, user_id: Uuid) -> AppResult<TwoFactorSetup> {
        let mut user = self.load(user_id).await?;
        if user.two_factor_enabled {
            return Err(AppError::invalid_state("Two-factor authentication is already enabled"));
        }

        let secret = TotpSecret::generate();
        let encoded = secret.to_base32();
        user.two_factor_secret = Some(encoded.clone());
        user.updated_at = Utc::now();
        self.uow.users().save_two_factor(&user).await?;

        Ok(TwoFactorSetup {
            otpauth_url: secret.provisioning_uri(&user.email)?,
            secret: encoded,
        })
    }

    async fn enable_two_factor(&self, user_id: Uuid, code: String) -> AppResult<()> {
        let mut user = self.load(user_id).await?;
        if user.two_factor_enabled {
            return Err(AppError::invalid_state("Two-factor authentication is already enabled"));
        }
        verify_stored_code(self.uow.users().as_ref(), &user, &code).await?;

        user.two_factor_enabled = true;
        user.updated_at = Utc::now();
        self.uow.users().save_two_factor(&user).await?;

        tracing::info!(user_id = %user_id, "Two-factor authentication enabled");
        Ok(())
    }

    async fn disable_two_factor(&self, user_id: Uuid, code: String) -> AppResult<()> {
        let mut user = self.load(user_id).await?;
        if !user.two_factor_enabled {
            return Err(AppError::invalid_state("Two-factor authentication is not enabled"));
        }
        verify_stored_code(self.uow.users().as_ref(), &user, &code).await?;

        user.two_factor_enabled = false;
        user.two_factor_secret = None;
        user.updated_at = Utc::now();
        self.uow.users().save_two_factor(&user).await?;

        tracing::info!(user_id = %user_id, "Two-factor authentication disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::fixtures;
    use crate::services::test_support::TestUnitOfWork;

    fn with_users(user: User) -> TestUnitOfWork {
        let mut uow = TestUnitOfWork::new();
        uow.users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        uow
    }

    #[tokio::test]
    async fn test_setup_stores_secret_without_enabling() {
        let mut uow = with_users(fixtures::user());
        uow.users
            .expect_save_two_factor()
            .withf(|u| u.two_factor_secret.is_some() && !u.two_factor_enabled)
            .times(1)
            .returning(|_| Ok(()));

        let service = SecurityManager::new(uow.build());
        let setup = service.setup_two_factor(Uuid::new_v4()).await.unwrap();
        assert!(setup.otpauth_url.starts_with("otpauth://totp/"));
        assert!(setup.otpauth_url.contains(&setup.secret));
    }

    #[tokio::test]
    async fn test_setup_when_enabled_is_invalid_state() {
        let mut user = fixtures::user();
        user.two_factor_enabled = true;
        user.two_factor_secret = Some(TotpSecret::generate().to_base32());

        let mut uow = with_users(user);
        uow.users.expect_save_two_factor().never();

        let service = SecurityManager::new(uow.build());
        let err = service.setup_two_factor(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_enable_with_valid_code() {
        let secret = TotpSecret::generate();
        let mut user = fixtures::user();
        user.two_factor_secret = Some(secret.to_base32());

        let mut uow = with_users(user);
        uow.users
            .expect_claim_totp_step()
            .times(1)
            .returning(|_, _| Ok(true));
        uow.users
            .expect_save_two_factor()
            .withf(|u| u.two_factor_enabled)
            .times(1)
            .returning(|_| Ok(()));

        let service = SecurityManager::new(uow.build());
        let code = secret.code_at(Utc::now().timestamp()).unwrap();
        assert!(service.enable_two_factor(Uuid::new_v4(), code).await.is_ok());
    }

    #[tokio::test]
    async fn test_disable_with_used_code_is_rejected() {
        let secret = TotpSecret::generate();
        let mut user = fixtures::user();
        user.two_factor_enabled = true;
        user.two_factor_secret = Some(secret.to_base32());

        let mut uow = with_users(user);
        uow.users
            .expect_claim_totp_step()
            .times(1)
            .returning(|_, _| Ok(false));
        uow.users.expect_save_two_factor().never();

        let service = SecurityManager::new(uow.build());
        let code = secret.code_at(Utc::now().timestamp()).unwrap();
        let err = service
            .disable_two_factor(Uuid::new_v4(), code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTwoFactorCode));
    }

    #[tokio::test]
    async fn test_enable_without_setup() {
        let uow = with_users(fixtures::user());
        let service = SecurityManager::new(uow.build());
        let err = service
            .enable_two_factor(Uuid::new_v4(), "123456".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_disable_with_wrong_code() {
        let mut user = fixtures::user();
        user.two_factor_enabled = true;
        user.two_factor_secret = Some(TotpSecret::generate().to_base32());

        let mut uow = with_users(user);
        uow.users.expect_save_two_factor().never();

        let service = SecurityManager::new(uow.build());
        let err = service
            .disable_two_factor(Uuid::new_v4(), "12345".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTwoFactorCode));
    }
}
