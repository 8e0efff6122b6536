//! User domain entity and related types.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::address::{AddressStatus, Network};
use super::kyc::{KycDetails, KycRecord, KycStatus};
use super::money::Wallet;
use crate::config::{REFERRAL_CODE_ALPHABET, REFERRAL_CODE_LENGTH, ROLE_ADMIN, ROLE_USER};
use crate::errors::{AppError, AppResult};

/// User roles enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    /// Check if this role has admin privileges
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Check if this role can access a required role
    pub fn can_access(&self, required: &UserRole) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::User => matches!(required, UserRole::User),
        }
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s {
            ROLE_ADMIN => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => ROLE_ADMIN.to_string(),
            UserRole::User => ROLE_USER.to_string(),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "{}", ROLE_ADMIN),
            UserRole::User => write!(f, "{}", ROLE_USER),
        }
    }
}

/// Random referral code from the unambiguous alphabet.
pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LENGTH)
        .map(|_| REFERRAL_CODE_ALPHABET[rng.gen_range(0..REFERRAL_CODE_ALPHABET.len())] as char)
        .collect()
}

/// User domain entity
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub balance_nsl: Decimal,
    pub balance_usdt: Decimal,
    pub vip_level: i32,
    pub kyc_status: KycStatus,
    pub kyc: Option<KycDetails>,
    pub kyc_rejection_reason: Option<String>,
    /// Base32 TOTP secret; present but disabled between setup and enable
    pub two_factor_secret: Option<String>,
    pub two_factor_enabled: bool,
    pub withdrawal_address: Option<String>,
    pub withdrawal_network: Option<Network>,
    pub address_status: AddressStatus,
    pub address_rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete timestamp (None = active, Some = deleted)
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Check if user has admin role
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Check if user is soft deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn wallet(&self) -> Wallet {
        Wallet::new(self.balance_nsl, self.balance_usdt)
    }

    pub fn set_wallet(&mut self, wallet: Wallet) {
        self.balance_nsl = wallet.nsl;
        self.balance_usdt = wallet.usdt;
        self.updated_at = Utc::now();
    }

    /// VIP level only ever goes up.
    pub fn raise_vip_level(&mut self, level: i32) {
        if level > self.vip_level {
            self.vip_level = level;
            self.updated_at = Utc::now();
        }
    }

    pub fn ensure_kyc_approved(&self) -> AppResult<()> {
        if !self.kyc_status.is_approved() {
            return Err(AppError::invalid_state("KYC must be approved before withdrawing"));
        }
        Ok(())
    }

    /// Verified address snapshot for a withdrawal.
    pub fn verified_address(&self) -> AppResult<(Network, String)> {
        match (self.address_status, self.withdrawal_network, &self.withdrawal_address) {
            (AddressStatus::Verified, Some(network), Some(address)) => {
                Ok((network, address.clone()))
            }
            _ => Err(AppError::invalid_state(
                "A verified withdrawal address is required",
            )),
        }
    }

    pub fn address_info(&self) -> AddressInfo {
        AddressInfo {
            status: self.address_status,
            network: self.withdrawal_network,
            address: self.withdrawal_address.clone(),
            rejection_reason: self.address_rejection_reason.clone(),
        }
    }

    pub fn kyc_record(&self) -> KycRecord {
        KycRecord {
            status: self.kyc_status,
            details: self.kyc.clone(),
            rejection_reason: self.kyc_rejection_reason.clone(),
        }
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
}

/// Withdrawal address as shown to its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AddressInfo {
    pub status: AddressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    /// Unique user identifier
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// User email address
    #[schema(example = "user@example.com")]
    pub email: String,
    /// User display name
    #[schema(example = "John Doe")]
    pub name: String,
    /// User role
    #[schema(example = "user")]
    pub role: String,
    /// Code others use to sign up under this user
    #[schema(example = "K7M2Q9XA")]
    pub referral_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<Uuid>,
    #[schema(value_type = String, example = "120.5")]
    pub balance_nsl: Decimal,
    #[schema(value_type = String, example = "40")]
    pub balance_usdt: Decimal,
    pub vip_level: i32,
    pub kyc_status: KycStatus,
    pub two_factor_enabled: bool,
    pub address: AddressInfo,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let address = user.address_info();
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role.to_string(),
            referral_code: user.referral_code,
            referred_by: user.referred_by,
            balance_nsl: user.balance_nsl,
            balance_usdt: user.balance_usdt,
            vip_level: user.vip_level,
            kyc_status: user.kyc_status,
            two_factor_enabled: user.two_factor_enabled,
            address,
            created_at: user.created_at,
            deleted_at: user.deleted_at,
        }
    }
}

/// A user who signed up with someone's referral code.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReferralSummary {
    pub id: Uuid,
    pub name: String,
    pub vip_level: i32,
    pub joined_at: DateTime<Utc>,
}

impl From<User> for ReferralSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            vip_level: user.vip_level,
            joined_at: user.created_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A plain active user with empty balances.
    pub fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            password_hash: "hash".to_string(),
            name: "Test User".to_string(),
            role: UserRole::User,
            referral_code: "ABCD2345".to_string(),
            referred_by: None,
            balance_nsl: Decimal::ZERO,
            balance_usdt: Decimal::ZERO,
            vip_level: 0,
            kyc_status: KycStatus::None,
            kyc: None,
            kyc_rejection_reason: None,
            two_factor_secret: None,
            two_factor_enabled: false,
            withdrawal_address: None,
            withdrawal_network: None,
            address_status: AddressStatus::None,
            address_rejection_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
