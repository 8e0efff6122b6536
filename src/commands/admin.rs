//! Admin command - Operator bootstrap tasks.
//!
//! ```bash
//! ADMIN_PASSWORD=... salon-money admin create-admin --email ops@example.com
//! salon-money admin seed-products
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::cli::args::{AdminAction, AdminArgs};
use crate::config::Config;
use crate::domain::ProductDraft;
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, Persistence};
use crate::services::{Authenticator, ProductService, ServiceContainer, Services};

/// Execute the admin command
pub async fn execute(args: AdminArgs, config: Config) -> AppResult<()> {
    let db = Database::connect(&config)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;

    match args.action {
        AdminAction::CreateAdmin {
            email,
            name,
            password,
        } => {
            let uow = Arc::new(Persistence::new(db.get_connection()));
            let admin = Authenticator::new(uow, config)
                .create_admin(&email, &name, &password)
                .await?;
            println!("Created admin {} ({})", admin.email, admin.id);
        }
        AdminAction::SeedProducts => {
            let services = Services::from_connection(db.get_connection(), None, config, None);
            let created = seed_products(services.products().as_ref()).await?;
            println!("Seeded {} product(s).", created);
        }
    }

    Ok(())
}

/// Default VIP ladder.
pub fn default_products() -> Vec<ProductDraft> {
    [
        (1, 100, 35, 30),
        (2, 200, 75, 30),
        (3, 500, 200, 45),
        (4, 1000, 420, 60),
        (5, 2000, 900, 90),
    ]
    .into_iter()
    .map(|(level, price, income_tenths, days)| ProductDraft {
        name: format!("VIP {}", level),
        vip_level: level,
        price_nsl: Decimal::from(price),
        daily_income_nsl: Decimal::new(income_tenths, 1),
        duration_days: days,
    })
    .collect()
}

/// Create each default product, skipping levels that already have one.
async fn seed_products(products: &dyn ProductService) -> AppResult<usize> {
    let mut created = 0;
    for draft in default_products() {
        let level = draft.vip_level;
        match products.create_product(draft).await {
            Ok(product) => {
                tracing::info!(product_id = %product.id, vip_level = level, "Product seeded");
                created += 1;
            }
            Err(AppError::Conflict(_)) => {
                tracing::info!(vip_level = level, "VIP level already has a product, skipped");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}
