//! Withdrawal address verification pipeline.
//!
//! A submitted address is checked locally, stored as pending, and then
//! checked against the withdrawal rules Binance publishes for the network.
//! Without a gateway (manual mode), or when Binance cannot be reached, it
//! stays pending until an admin verifies or rejects it.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{AddressInfo, AddressStatus, Network, User, WithdrawalAddress};
use crate::errors::{AppError, AppResult};
use crate::infra::{ExchangeGateway, UnitOfWork};

#[async_trait]
pub trait AddressService: Send + Sync {
    async fn submit_address(
        &self,
        user_id: Uuid,
        network: Network,
        address: String,
    ) -> AppResult<AddressInfo>;

    async fn verify_address(&self, admin_id: Uuid, user_id: Uuid) -> AppResult<AddressInfo>;

    async fn reject_address(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        reason: String,
    ) -> AppResult<AddressInfo>;
}

/// Outcome of the exchange check.
#[derive(Debug, PartialEq, Eq)]
enum ExchangeVerdict {
    Verified,
    Rejected(String),
    Undecided,
}

pub struct AddressManager<U: UnitOfWork> {
    uow: Arc<U>,
    gateway: Option<Arc<dyn ExchangeGateway>>,
}

impl<U: UnitOfWork> AddressManager<U> {
    pub fn new(uow: Arc<U>, gateway: Option<Arc<dyn ExchangeGateway>>) -> Self {
        Self { uow, gateway }
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Apply a decision to the pending address. `None` when the address
    /// was replaced or decided in the meantime.
    async fn settle(
        &self,
        user: &User,
        status: AddressStatus,
        reason: Option<String>,
    ) -> AppResult<Option<AddressInfo>> {
        let address = user.withdrawal_address.as_deref().unwrap_or_default();
        let settled = self
            .uow
            .users()
            .settle_address(user.id, address, status, reason.clone())
            .await?;
        if !settled {
            return Ok(None);
        }

        let mut info = user.address_info();
        info.status = status;
        info.rejection_reason = reason;
        Ok(Some(info))
    }

    async fn check_with_exchange(
        &self,
        gateway: &dyn ExchangeGateway,
        candidate: &WithdrawalAddress,
    ) -> ExchangeVerdict {
        let rule = match gateway.network_rule(candidate.network).await {
            Ok(Some(rule)) => rule,
            Ok(None) => {
                return ExchangeVerdict::Rejected(format!(
                    "{} is not supported by the exchange",
                    candidate.network
                ))
            }
            Err(e) => {
                tracing::warn!(network = %candidate.network, error = %e, "Address check deferred");
                return ExchangeVerdict::Undecided;
            }
        };

        if !rule.withdraw_enabled {
            return ExchangeVerdict::Rejected(format!(
                "Withdrawals on {} are currently disabled",
                candidate.network
            ));
        }

        match candidate.matches_exchange_pattern(&rule.address_regex) {
            Ok(true) => ExchangeVerdict::Verified,
            Ok(false) => ExchangeVerdict::Rejected(
                "Address does not match the exchange format for this network".to_string(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Address check deferred");
                ExchangeVerdict::Undecided
            }
        }
    }
}

fn changed_during_review() -> AppError {
    AppError::invalid_state("The withdrawal address changed during review")
}

#[async_trait]
impl<U: UnitOfWork> AddressService for AddressManager<U> {
    async fn submit_address(
        &self,
        user_id: Uuid,
        network: Network,
        address: String,
    ) -> AppResult<AddressInfo> {
        let candidate = WithdrawalAddress::parse(network, &address)?;
        let mut user = self.load(user_id).await?;

        user.withdrawal_network = Some(candidate.network);
        user.withdrawal_address = Some(candidate.address.clone());
        user.address_status = AddressStatus::Pending;
        user.address_rejection_reason = None;
        user.updated_at = Utc::now();
        self.uow.users().save_address(&user).await?;

        let Some(gateway) = &self.gateway else {
            tracing::info!(user_id = %user_id, network = %network, "Address awaiting manual review");
            return Ok(user.address_info());
        };

        let (status, reason) = match self.check_with_exchange(gateway.as_ref(), &candidate).await {
            ExchangeVerdict::Verified => (AddressStatus::Verified, None),
            ExchangeVerdict::Rejected(reason) => (AddressStatus::Rejected, Some(reason)),
            ExchangeVerdict::Undecided => return Ok(user.address_info()),
        };

        match self.settle(&user, status, reason).await? {
            Some(info) => {
                tracing::info!(user_id = %user_id, network = %network, status = %status.as_str(), "Address checked");
                Ok(info)
            }
            None => {
                tracing::info!(user_id = %user_id, "Address replaced before the check finished");
                Ok(self.load(user_id).await?.address_info())
            }
        }
    }

    async fn verify_address(&self, admin_id: Uuid, user_id: Uuid) -> AppResult<AddressInfo> {
        let user = self.load(user_id).await?;
        user.address_status.ensure_reviewable()?;

        let info = self
            .settle(&user, AddressStatus::Verified, None)
            .await?
            .ok_or_else(changed_during_review)?;
        tracing::info!(user_id = %user_id, admin_id = %admin_id, "Address verified manually");
        Ok(info)
    }

    async fn reject_address(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        reason: String,
    ) -> AppResult<AddressInfo> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::validation("A rejection reason is required"));
        }

        let user = self.load(user_id).await?;
        user.address_status.ensure_reviewable()?;

        let info = self
            .settle(&user, AddressStatus::Rejected, Some(reason))
            .await?
            .ok_or_else(changed_during_review)?;
        tracing::info!(user_id = %user_id, admin_id = %admin_id, "Address rejected manually");
        Ok(info)
    }
}
