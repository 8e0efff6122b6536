//! VIP product repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::product::{self, ActiveModel, Entity as ProductEntity};
use crate::domain::{Product, ProductDraft};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>>;

    /// Products ordered by VIP level
    async fn list(&self, active_only: bool) -> AppResult<Vec<Product>>;

    /// Whether another product already uses this VIP level
    async fn vip_level_taken(&self, vip_level: i32, except: Option<Uuid>) -> AppResult<bool>;

    async fn create(&self, draft: ProductDraft) -> AppResult<Product>;

    /// Persist every editable field of an existing product
    async fn update(&self, product: &Product) -> AppResult<Product>;
}

/// SeaORM implementation of [`ProductRepository`].
pub struct ProductStore {
    db: DatabaseConnection,
}

impl ProductStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for ProductStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        let result = ProductEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Product::from))
    }

    async fn list(&self, active_only: bool) -> AppResult<Vec<Product>> {
        let mut query = ProductEntity::find().order_by_asc(product::Column::VipLevel);
        if active_only {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        let models = query.all(&self.db).await?;
        Ok(models.into_iter().map(Product::from).collect())
    }

    async fn vip_level_taken(&self, vip_level: i32, except: Option<Uuid>) -> AppResult<bool> {
        let mut query = ProductEntity::find().filter(product::Column::VipLevel.eq(vip_level));
        if let Some(id) = except {
            query = query.filter(product::Column::Id.ne(id));
        }
        Ok(query.count(&self.db).await? > 0)
    }

    async fn create(&self, draft: ProductDraft) -> AppResult<Product> {
        let now = Utc::now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(draft.name.trim().to_string()),
            vip_level: Set(draft.vip_level),
            price_nsl: Set(draft.price_nsl),
            daily_income_nsl: Set(draft.daily_income_nsl),
            duration_days: Set(draft.duration_days),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await?;
        Ok(Product::from(model))
    }

    async fn update(&self, changed: &Product) -> AppResult<Product> {
        let existing = ProductEntity::find_by_id(changed.id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.name = Set(changed.name.clone());
        active.vip_level = Set(changed.vip_level);
        active.price_nsl = Set(changed.price_nsl);
        active.daily_income_nsl = Set(changed.daily_income_nsl);
        active.duration_days = Set(changed.duration_days);
        active.is_active = Set(changed.is_active);
        active.updated_at = Set(changed.updated_at);

        let model = active.update(&self.db).await?;
        Ok(Product::from(model))
    }
}
