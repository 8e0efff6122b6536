//! VIP product catalog and purchases.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::LedgerSettings;
use crate::domain::money::percent_of;
use crate::domain::{
    Currency, Investment, NewTransaction, Product, ProductChanges, ProductDraft, Transaction,
    TransactionKind,
};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// Result of buying a product.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Purchase {
    pub investment: Investment,
    pub transaction: Transaction,
    /// Bonus credited to the referrer, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub referral_bonus: Option<Decimal>,
}

#[async_trait]
pub trait ProductService: Send + Sync {
    /// Products open for purchase, by VIP level
    async fn list_products(&self) -> AppResult<Vec<Product>>;

    /// Every product including inactive ones
    async fn list_all(&self) -> AppResult<Vec<Product>>;

    async fn create_product(&self, draft: ProductDraft) -> AppResult<Product>;

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product>;

    async fn deactivate_product(&self, id: Uuid) -> AppResult<Product>;

    async fn purchase(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Purchase>;

    async fn investments(&self, user_id: Uuid) -> AppResult<Vec<Investment>>;
}

pub struct ProductManager<U: UnitOfWork> {
    uow: Arc<U>,
    referral_bonus_percent: Decimal,
}

impl<U: UnitOfWork> ProductManager<U> {
    pub fn new(uow: Arc<U>, ledger: &LedgerSettings) -> Self {
        Self {
            uow,
            referral_bonus_percent: ledger.referral_bonus_percent,
        }
    }

    async fn load(&self, id: Uuid) -> AppResult<Product> {
        self.uow
            .products()
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn ensure_level_free(&self, vip_level: i32, except: Option<Uuid>) -> AppResult<()> {
        if self
            .uow
            .products()
            .vip_level_taken(vip_level, except)
            .await?
        {
            return Err(AppError::conflict(format!("Product for VIP level {}", vip_level)));
        }
        Ok(())
    }
}

#[async_trait]
impl<U: UnitOfWork> ProductService for ProductManager<U> {
    async fn list_products(&self) -> AppResult<Vec<Product>> {
        self.uow.products().list(true).await
    }

    async fn list_all(&self) -> AppResult<Vec<Product>> {
        self.uow.products().list(false).await
    }

    async fn create_product(&self, draft: ProductDraft) -> AppResult<Product> {
        draft.validate()?;
        self.ensure_level_free(draft.vip_level, None).await?;

        let product = self.uow.products().create(draft).await?;
        tracing::info!(product_id = %product.id, vip_level = product.vip_level, "Product created");
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product> {
        if changes.is_empty() {
            return Err(AppError::validation("No changes supplied"));
        }
        changes.validate()?;

        let mut product = self.load(id).await?;
        if let Some(level) = changes.vip_level.filter(|l| *l != product.vip_level) {
            self.ensure_level_free(level, Some(id)).await?;
        }
        changes.apply(&mut product);

        let updated = self.uow.products().update(&product).await?;
        tracing::info!(product_id = %id, "Product updated");
        Ok(updated)
    }

    async fn deactivate_product(&self, id: Uuid) -> AppResult<Product> {
        let mut product = self.load(id).await?;
        if !product.is_active {
            return Ok(product);
        }
        ProductChanges {
            is_active: Some(false),
            ..Default::default()
        }
        .apply(&mut product);

        let updated = self.uow.products().update(&product).await?;
        tracing::info!(product_id = %id, "Product deactivated");
        Ok(updated)
    }

    async fn purchase(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Purchase> {
        let product = self.load(product_id).await?;
        product.ensure_purchasable()?;

        if self
            .uow
            .investments()
            .has_active(user_id, product_id)
            .await?
        {
            return Err(AppError::conflict("Active investment in this product"));
        }

        let bonus_percent = self.referral_bonus_percent;

        let purchase = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let now = Utc::now();
                    let mut buyer = ctx.users().lock(user_id).await?;
                    if ctx.investments().has_active(user_id, product.id).await? {
                        return Err(AppError::conflict("Active investment in this product"));
                    }
                    let mut wallet = buyer.wallet();
                    wallet.debit(Currency::Nsl, product.price_nsl)?;
                    buyer.set_wallet(wallet);
                    buyer.raise_vip_level(product.vip_level);
                    ctx.users().save_balances(&buyer).await?;

                    let investment = ctx
                        .investments()
                        .create(Investment::start(user_id, &product, now))
                        .await
                        .map_err(|e| e.unique_as_conflict("Active investment in this product"))?;

                    let transaction = ctx
                        .transactions()
                        .create(
                            NewTransaction::new(
                                user_id,
                                TransactionKind::Purchase,
                                Currency::Nsl,
                                product.price_nsl,
                            )
                            .related_to(investment.id)
                            .with_note(format!("VIP {} - {}", product.vip_level, product.name)),
                        )
                        .await?;

                    // Referral links always point to an older account, so
                    // buyer-then-referrer lock order cannot cycle.
                    let mut referral_bonus = None;
                    let bonus = percent_of(product.price_nsl, bonus_percent);
                    if let Some(referrer_id) = buyer.referred_by.filter(|_| bonus > Decimal::ZERO) {
                        if let Some(mut referrer) = ctx.users().lock_if_active(referrer_id).await? {
                            let mut wallet = referrer.wallet();
                            wallet.credit(Currency::Nsl, bonus)?;
                            referrer.set_wallet(wallet);
                            ctx.users().save_balances(&referrer).await?;

                            ctx.transactions()
                                .create(
                                    NewTransaction::new(
                                        referrer_id,
                                        TransactionKind::ReferralBonus,
                                        Currency::Nsl,
                                        bonus,
                                    )
                                    .related_to(user_id)
                                    .with_note(format!("Referral purchase of VIP {}", product.vip_level)),
                                )
                                .await?;
                            referral_bonus = Some(bonus);
                        }
                    }

                    Ok(Purchase {
                        investment,
                        transaction,
                        referral_bonus,
                    })
                })
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            product_id = %product_id,
            investment_id = %purchase.investment.id,
            amount = %purchase.transaction.amount,
            referral_bonus = ?purchase.referral_bonus,
            "Product purchased"
        );
        Ok(purchase)
    }

    async fn investments(&self, user_id: Uuid) -> AppResult<Vec<Investment>> {
        self.uow.investments().list_by_user(user_id).await
    }
}
