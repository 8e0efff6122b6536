//! Domain layer - ledger rules and business entities.
//!
//! Nothing here touches the database, Redis, or the exchange. Services load
//! entities, apply these rules, and persist the result.

pub mod address;
pub mod exchange_rate;
pub mod investment;
pub mod kyc;
pub mod money;
pub mod password;
pub mod product;
pub mod transaction;
pub mod two_factor;
pub mod user;

pub use address::{AddressStatus, Network, WithdrawalAddress};
pub use exchange_rate::ExchangeRate;
pub use investment::{Investment, InvestmentStatus, NewInvestment, PayoutSummary};
pub use kyc::{DocumentType, KycDetails, KycRecord, KycStatus};
pub use money::{Currency, Wallet};
pub use password::Password;
pub use product::{Product, ProductChanges, ProductDraft};
pub use transaction::{
    FeeSchedule, NewTransaction, Quote, Transaction, TransactionFilter, TransactionKind,
    TransactionStatus,
};
pub use two_factor::TotpSecret;
pub use user::{
    generate_referral_code, AddressInfo, NewUser, ReferralSummary, User, UserResponse, UserRole,
};
