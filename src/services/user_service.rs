//! User service - Handles user-related business logic.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ReferralSummary, User};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::types::PaginationParams;

/// User service trait for dependency injection.
///
/// By default, operations exclude soft-deleted users.
/// Use `*_with_deleted` variants to include them.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Get active user by ID (excludes soft-deleted)
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// Get user by ID including soft-deleted
    async fn get_user_with_deleted(&self, id: Uuid) -> AppResult<User>;

    /// Page of users, newest first
    async fn list_users(
        &self,
        params: PaginationParams,
        include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)>;

    /// Soft delete user (sets deleted_at timestamp)
    async fn delete_user(&self, id: Uuid) -> AppResult<()>;

    /// Restore a soft-deleted user
    async fn restore_user(&self, id: Uuid) -> AppResult<User>;

    /// Users who registered with this user's referral code
    async fn referrals(&self, id: Uuid) -> AppResult<Vec<ReferralSummary>>;
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn get_user_with_deleted(&self, id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id_with_deleted(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn list_users(
        &self,
        params: PaginationParams,
        include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)> {
        self.uow.users().list(&params, include_deleted).await
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        let user = self.get_user(id).await?;
        if user.is_admin() {
            return Err(AppError::invalid_state("Admin accounts cannot be deleted"));
        }
        self.uow.users().delete(id).await?;
        tracing::info!(user_id = %id, "User soft deleted");
        Ok(())
    }

    async fn restore_user(&self, id: Uuid) -> AppResult<User> {
        let user = self.get_user_with_deleted(id).await?;
        if !user.is_deleted() {
            return Err(AppError::invalid_state("User is not deleted"));
        }
        let restored = self.uow.users().restore(id).await?;
        tracing::info!(user_id = %id, "User restored");
        Ok(restored)
    }

    async fn referrals(&self, id: Uuid) -> AppResult<Vec<ReferralSummary>> {
        let referred = self.uow.users().list_referrals(id).await?;
        Ok(referred.into_iter().map(ReferralSummary::from).collect())
    }
}
