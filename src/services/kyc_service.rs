//! KYC submission and admin review.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{KycDetails, KycRecord, KycStatus, User};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// A submission waiting in the review queue.
#[derive(Debug, Serialize, ToSchema)]
pub struct KycSubmission {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub kyc: KycRecord,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for KycSubmission {
    fn from(user: User) -> Self {
        Self {
            kyc: user.kyc_record(),
            user_id: user.id,
            email: user.email,
            name: user.name,
            updated_at: user.updated_at,
        }
    }
}

#[async_trait]
pub trait KycService: Send + Sync {
    async fn status(&self, user_id: Uuid) -> AppResult<KycRecord>;

    async fn submit(&self, user_id: Uuid, details: KycDetails) -> AppResult<KycRecord>;

    async fn approve(&self, admin_id: Uuid, user_id: Uuid) -> AppResult<KycRecord>;

    async fn reject(&self, admin_id: Uuid, user_id: Uuid, reason: String) -> AppResult<KycRecord>;

    /// Oldest submissions first
    async fn list_pending(&self) -> AppResult<Vec<KycSubmission>>;
}

pub struct KycManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> KycManager<U> {
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

    async fn save(&self, mut user: User) -> AppResult<KycRecord> {
        user.updated_at = Utc::now();
        self.uow.users().save_kyc(&user).await?;
        Ok(user.kyc_record())
    }
}

fn validate_details(details: &KycDetails) -> AppResult<()> {
    if details.full_name.is_empty() {
        return Err(AppError::validation("Full name is required"));
    }
    if !(4..=64).contains(&details.document_number.len())
        || !details
            .document_number
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(AppError::validation("Document number is invalid"));
    }
    if details.country.len() != 2 || !details.country.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AppError::validation("Country must be a two-letter code"));
    }
    Ok(())
}

#[async_trait]
impl<U: UnitOfWork> KycService for KycManager<U> {
    async fn status(&self, user_id: Uuid) -> AppResult<KycRecord> {
        Ok(self.load(user_id).await?.kyc_record())
    }

    async fn submit(&self, user_id: Uuid, details: KycDetails) -> AppResult<KycRecord> {
        let mut user = self.load(user_id).await?;
        user.kyc_status.ensure_can_submit()?;

        let details = details.normalized();
        validate_details(&details)?;

        user.kyc = Some(details);
        user.kyc_status = KycStatus::Pending;
        user.kyc_rejection_reason = None;

        let record = self.save(user).await?;
        tracing::info!(user_id = %user_id, "KYC submitted");
        Ok(record)
    }

    async fn approve(&self, admin_id: Uuid, user_id: Uuid) -> AppResult<KycRecord> {
        let mut user = self.load(user_id).await?;
        user.kyc_status.ensure_reviewable()?;

        user.kyc_status = KycStatus::Approved;
        user.kyc_rejection_reason = None;

        let record = self.save(user).await?;
        tracing::info!(user_id = %user_id, admin_id = %admin_id, "KYC approved");
        Ok(record)
    }

    async fn reject(&self, admin_id: Uuid, user_id: Uuid, reason: String) -> AppResult<KycRecord> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::validation("A rejection reason is required"));
        }

        let mut user = self.load(user_id).await?;
        user.kyc_status.ensure_reviewable()?;

        user.kyc_status = KycStatus::Rejected;
        user.kyc_rejection_reason = Some(reason);

        let record = self.save(user).await?;
        tracing::info!(user_id = %user_id, admin_id = %admin_id, "KYC rejected");
        Ok(record)
    }

    async fn list_pending(&self) -> AppResult<Vec<KycSubmission>> {
        let users = self.uow.users().list_pending_kyc().await?;
        Ok(users.into_iter().map(KycSubmission::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::fixtures;
    use crate::domain::DocumentType;
    use crate::services::test_support::TestUnitOfWork;

    fn details() -> KycDetails {
        KycDetails {
            full_name: "  Jane   Doe ".into(),
            document_type: DocumentType::Passport,
            document_number: "x1234567".into(),
            country: "ng".into(),
        }
    }

    fn service_for(user: User, expect_save: bool) -> KycManager<crate::services::test_support::BuiltUnitOfWork> {
        let mut uow = TestUnitOfWork::new();
        uow.users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        if expect_save {
            uow.users.expect_save_kyc().times(1).returning(|_| Ok(()));
        } else {
            uow.users.expect_save_kyc().never();
        }
        uow.users.expect_save_address().never();
        uow.users.expect_save_two_factor().never();
        KycManager::new(uow.build())
    }

    #[tokio::test]
    async fn test_submit_normalizes_and_marks_pending() {
        let service = service_for(fixtures::user(), true);
        let record = service.submit(Uuid::new_v4(), details()).await.unwrap();

        assert_eq!(record.status, KycStatus::Pending);
        let stored = record.details.unwrap();
        assert_eq!(stored.full_name, "Jane Doe");
        assert_eq!(stored.document_number, "X1234567");
        assert_eq!(stored.country, "NG");
    }

    #[tokio::test]
    async fn test_resubmit_after_rejection() {
        let mut user = fixtures::user();
        user.kyc_status = KycStatus::Rejected;
        user.kyc_rejection_reason = Some("blurry".into());

        let service = service_for(user, true);
        let record = service.submit(Uuid::new_v4(), details()).await.unwrap();
        assert_eq!(record.status, KycStatus::Pending);
        assert!(record.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_submit_while_pending_is_invalid_state() {
        let mut user = fixtures::user();
        user.kyc_status = KycStatus::Pending;

        let service = service_for(user, false);
        let err = service.submit(Uuid::new_v4(), details()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_country() {
        let service = service_for(fixtures::user(), false);
        let mut bad = details();
        bad.country = "NGA".into();
        let err = service.submit(Uuid::new_v4(), bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_approve_only_pending() {
        let service = service_for(fixtures::user(), false);
        let err = service
            .approve(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let mut pending = fixtures::user();
        pending.kyc_status = KycStatus::Pending;
        let service = service_for(pending, true);
        let record = service.approve(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert_eq!(record.status, KycStatus::Approved);
    }

    #[tokio::test]
    async fn test_reject_records_reason() {
        let mut pending = fixtures::user();
        pending.kyc_status = KycStatus::Pending;

        let service = service_for(pending, true);
        let record = service
            .reject(Uuid::new_v4(), Uuid::new_v4(), " expired document ".into())
            .await
            .unwrap();
        assert_eq!(record.status, KycStatus::Rejected);
        assert_eq!(record.rejection_reason.as_deref(), Some("expired document"));
    }
}
