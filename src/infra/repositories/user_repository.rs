//! User repository with soft delete support.
//!
//! Balance columns are only written inside a unit of work, through
//! [`save_balances`], after the row has been locked. Every other write
//! touches the columns of a single concern, so KYC review, two-factor
//! changes and address checks never overwrite each other.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::{AddressStatus, KycStatus, NewUser, User};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
///
/// By default, all query methods exclude soft-deleted records.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find active user by ID (excludes soft-deleted)
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find user by ID including soft-deleted
    async fn find_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find active user by email address
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Find user by email including soft-deleted
    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>>;

    /// Find active user owning a referral code
    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<User>>;

    async fn referral_code_exists(&self, code: &str) -> AppResult<bool>;

    /// Insert a user with empty balances
    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Write the KYC status, details and rejection reason.
    async fn save_kyc(&self, user: &User) -> AppResult<()>;

    /// Write the two-factor secret and enabled flag.
    async fn save_two_factor(&self, user: &User) -> AppResult<()>;

    /// Write the withdrawal address, network, status and rejection reason.
    async fn save_address(&self, user: &User) -> AppResult<()>;

    /// Decide a pending address. Only applies while `address` is still the
    /// pending one; returns `false` when it was replaced or already decided.
    async fn settle_address(
        &self,
        user_id: Uuid,
        address: &str,
        status: AddressStatus,
        reason: Option<String>,
    ) -> AppResult<bool>;

    /// Record a used TOTP step. `false` if this or a later step was already used.
    async fn claim_totp_step(&self, user_id: Uuid, step: i64) -> AppResult<bool>;

    /// Soft delete user by ID (sets deleted_at timestamp)
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Restore a soft-deleted user
    async fn restore(&self, id: Uuid) -> AppResult<User>;

    /// Page of users, newest first
    async fn list(
        &self,
        params: &PaginationParams,
        include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)>;

    /// Users who signed up with this user's code
    async fn list_referrals(&self, referrer_id: Uuid) -> AppResult<Vec<User>>;

    /// Users waiting for KYC review, oldest submission first
    async fn list_pending_kyc(&self) -> AppResult<Vec<User>>;
}

/// SeaORM implementation of [`UserRepository`].
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(result.map(User::from))
    }

    async fn find_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .filter(user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(result.map(User::from))
    }

    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        Ok(result.map(User::from))
    }

    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::ReferralCode.eq(code))
            .filter(user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        Ok(result.map(User::from))
    }

    async fn referral_code_exists(&self, code: &str) -> AppResult<bool> {
        let count = UserEntity::find()
            .filter(user::Column::ReferralCode.eq(code))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let now = Utc::now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            name: Set(new_user.name),
            role: Set(new_user.role.to_string()),
            referral_code: Set(new_user.referral_code),
            referred_by: Set(new_user.referred_by),
            balance_nsl: Set(Default::default()),
            balance_usdt: Set(Default::default()),
            vip_level: Set(0),
            kyc_status: Set(KycStatus::None.as_str().to_string()),
            kyc_full_name: Set(None),
            kyc_document_type: Set(None),
            kyc_document_number: Set(None),
            kyc_country: Set(None),
            kyc_rejection_reason: Set(None),
            two_factor_secret: Set(None),
            two_factor_enabled: Set(false),
            two_factor_last_step: Set(None),
            withdrawal_address: Set(None),
            withdrawal_network: Set(None),
            address_status: Set(AddressStatus::None.as_str().to_string()),
            address_rejection_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };

        let model = active_model.insert(&self.db).await?;
        Ok(User::from(model))
    }

    async fn save_kyc(&self, user: &User) -> AppResult<()> {
        let kyc = user.kyc.as_ref();
        let result = UserEntity::update_many()
            .col_expr(user::Column::KycStatus, user.kyc_status.as_str().into())
            .col_expr(user::Column::KycFullName, kyc.map(|k| k.full_name.clone()).into())
            .col_expr(
                user::Column::KycDocumentType,
                kyc.map(|k| k.document_type.as_str().to_string()).into(),
            )
            .col_expr(
                user::Column::KycDocumentNumber,
                kyc.map(|k| k.document_number.clone()).into(),
            )
            .col_expr(user::Column::KycCountry, kyc.map(|k| k.country.clone()).into())
            .col_expr(
                user::Column::KycRejectionReason,
                user.kyc_rejection_reason.clone().into(),
            )
            .col_expr(user::Column::UpdatedAt, Utc::now().into())
            .filter(user::Column::Id.eq(user.id))
            .filter(user::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn save_two_factor(&self, user: &User) -> AppResult<()> {
        let result = UserEntity::update_many()
            .col_expr(user::Column::TwoFactorSecret, user.two_factor_secret.clone().into())
            .col_expr(user::Column::TwoFactorEnabled, user.two_factor_enabled.into())
            .col_expr(user::Column::UpdatedAt, Utc::now().into())
            .filter(user::Column::Id.eq(user.id))
            .filter(user::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn save_address(&self, user: &User) -> AppResult<()> {
        let result = UserEntity::update_many()
            .col_expr(user::Column::WithdrawalAddress, user.withdrawal_address.clone().into())
            .col_expr(
                user::Column::WithdrawalNetwork,
                user.withdrawal_network.map(|n| n.as_str().to_string()).into(),
            )
            .col_expr(user::Column::AddressStatus, user.address_status.as_str().into())
            .col_expr(
                user::Column::AddressRejectionReason,
                user.address_rejection_reason.clone().into(),
            )
            .col_expr(user::Column::UpdatedAt, Utc::now().into())
            .filter(user::Column::Id.eq(user.id))
            .filter(user::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn settle_address(
        &self,
        user_id: Uuid,
        address: &str,
        status: AddressStatus,
        reason: Option<String>,
    ) -> AppResult<bool> {
        let result = UserEntity::update_many()
            .col_expr(user::Column::AddressStatus, status.as_str().into())
            .col_expr(user::Column::AddressRejectionReason, reason.into())
            .col_expr(user::Column::UpdatedAt, Utc::now().into())
            .filter(user::Column::Id.eq(user_id))
            .filter(user::Column::DeletedAt.is_null())
            .filter(user::Column::AddressStatus.eq(AddressStatus::Pending.as_str()))
            .filter(user::Column::WithdrawalAddress.eq(address))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn claim_totp_step(&self, user_id: Uuid, step: i64) -> AppResult<bool> {
        let result = UserEntity::update_many()
            .col_expr(user::Column::TwoFactorLastStep, Some(step).into())
            .filter(user::Column::Id.eq(user_id))
            .filter(
                Condition::any()
                    .add(user::Column::TwoFactorLastStep.is_null())
                    .add(user::Column::TwoFactorLastStep.lt(step)),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let existing = UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        let now = Utc::now();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);

        active.update(&self.db).await?;
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> AppResult<User> {
        let existing = UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_not_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::validation("User is not deleted or does not exist"))?;

        let mut active: ActiveModel = existing.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(User::from(model))
    }

    async fn list(
        &self,
        params: &PaginationParams,
        include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)> {
        let mut query = UserEntity::find().order_by_desc(user::Column::CreatedAt);
        if !include_deleted {
            query = query.filter(user::Column::DeletedAt.is_null());
        }

        let paginator = query.paginate(&self.db, params.limit());
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.page() - 1).await?;

        Ok((models.into_iter().map(User::from).collect(), total))
    }

    async fn list_referrals(&self, referrer_id: Uuid) -> AppResult<Vec<User>> {
        let models = UserEntity::find()
            .filter(user::Column::ReferredBy.eq(referrer_id))
            .filter(user::Column::DeletedAt.is_null())
            .order_by_desc(user::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(User::from).collect())
    }

    async fn list_pending_kyc(&self) -> AppResult<Vec<User>> {
        let models = UserEntity::find()
            .filter(user::Column::KycStatus.eq(KycStatus::Pending.as_str()))
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::UpdatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(User::from).collect())
    }
}

/// Load an active user with `SELECT ... FOR UPDATE`.
pub(crate) async fn lock_user<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<User>> {
    let result = UserEntity::find_by_id(id)
        .filter(user::Column::DeletedAt.is_null())
        .lock_exclusive()
        .one(db)
        .await?;

    Ok(result.map(User::from))
}

/// Write balances and VIP level of a locked user.
pub(crate) async fn save_balances<C: ConnectionTrait>(db: &C, locked: &User) -> AppResult<()> {
    let result = UserEntity::update_many()
        .col_expr(user::Column::BalanceNsl, locked.balance_nsl.into())
        .col_expr(user::Column::BalanceUsdt, locked.balance_usdt.into())
        .col_expr(user::Column::VipLevel, locked.vip_level.into())
        .col_expr(user::Column::UpdatedAt, Utc::now().into())
        .filter(user::Column::Id.eq(locked.id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
