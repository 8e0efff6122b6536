//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.
//!
//! All services use the Unit of Work for repository access; every balance
//! change runs inside one of its database transactions.

mod address_service;
mod approval_service;
mod auth_service;
pub mod container;
mod income_service;
mod kyc_service;
mod product_service;
mod rate_service;
mod security_service;
mod user_service;
mod wallet_service;

#[cfg(test)]
mod test_support;

// Service Container
pub use container::{parallel, ServiceContainer, Services};

// Service traits and implementations
pub use address_service::{AddressManager, AddressService};
pub use approval_service::{ApprovalManager, ApprovalService};
pub use auth_service::{AuthService, Authenticator, Claims, Registration, TokenResponse};
pub use income_service::{IncomeManager, IncomeService};
pub use kyc_service::{KycManager, KycService, KycSubmission};
pub use product_service::{ProductManager, ProductService, Purchase};
pub use rate_service::{MarketPrice, RateManager, RateService, RateSnapshot};
pub use security_service::{SecurityManager, SecurityService, TwoFactorSetup};
pub use user_service::{UserManager, UserService};
pub use wallet_service::{WalletManager, WalletService, WalletSummary};

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
