//! Withdrawal address value object and verification status.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

static TRON_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").expect("valid TRON address pattern")
});

static EVM_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid EVM address pattern"));

/// Chains USDT can be withdrawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Trc20,
    Bep20,
    Erc20,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Trc20 => "TRC20",
            Network::Bep20 => "BEP20",
            Network::Erc20 => "ERC20",
        }
    }

    /// Network identifier used by the Binance capital API.
    pub fn binance_code(&self) -> &'static str {
        match self {
            Network::Trc20 => "TRX",
            Network::Bep20 => "BSC",
            Network::Erc20 => "ETH",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Network::Trc20 => &TRON_ADDRESS,
            Network::Bep20 | Network::Erc20 => &EVM_ADDRESS,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRC20" => Ok(Network::Trc20),
            "BEP20" => Ok(Network::Bep20),
            "ERC20" => Ok(Network::Erc20),
            other => Err(AppError::validation(format!("Unsupported network: {}", other))),
        }
    }
}

/// Where a user's withdrawal address stands in the verification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AddressStatus {
    None,
    Pending,
    Verified,
    Rejected,
}

impl AddressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressStatus::None => "none",
            AddressStatus::Pending => "pending",
            AddressStatus::Verified => "verified",
            AddressStatus::Rejected => "rejected",
        }
    }

    pub fn ensure_reviewable(&self) -> AppResult<()> {
        if *self != AddressStatus::Pending {
            return Err(AppError::invalid_state("Withdrawal address is not awaiting verification"));
        }
        Ok(())
    }
}

impl From<&str> for AddressStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => AddressStatus::Pending,
            "verified" => AddressStatus::Verified,
            "rejected" => AddressStatus::Rejected,
            _ => AddressStatus::None,
        }
    }
}

/// A syntactically valid address on a known network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WithdrawalAddress {
    pub network: Network,
    pub address: String,
}

impl WithdrawalAddress {
    /// Validate the address format for the network.
    pub fn parse(network: Network, address: &str) -> AppResult<Self> {
        let address = address.trim();
        if !network.pattern().is_match(address) {
            return Err(AppError::validation(format!(
                "Address is not a valid {} address",
                network
            )));
        }
        Ok(Self {
            network,
            address: address.to_string(),
        })
    }

    /// Check against a pattern published by the exchange for this network.
    pub fn matches_exchange_pattern(&self, pattern: &str) -> AppResult<bool> {
        if pattern.is_empty() {
            return Ok(true);
        }
        let regex = Regex::new(pattern)
            .map_err(|e| AppError::external(format!("Invalid address pattern from exchange: {}", e)))?;
        Ok(regex.is_match(&self.address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRON: &str = "TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE";
    const EVM: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_parse_tron_address() {
        let parsed = WithdrawalAddress::parse(Network::Trc20, TRON).unwrap();
        assert_eq!(parsed.address, TRON);
        assert!(WithdrawalAddress::parse(Network::Trc20, EVM).is_err());
    }

    #[test]
    fn test_parse_evm_address_on_both_evm_networks() {
        assert!(WithdrawalAddress::parse(Network::Bep20, EVM).is_ok());
        assert!(WithdrawalAddress::parse(Network::Erc20, EVM).is_ok());
        assert!(WithdrawalAddress::parse(Network::Erc20, TRON).is_err());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let parsed = WithdrawalAddress::parse(Network::Bep20, &format!("  {} ", EVM)).unwrap();
        assert_eq!(parsed.address, EVM);
    }

    #[test]
    fn test_rejects_short_and_ambiguous_tron_addresses() {
        assert!(WithdrawalAddress::parse(Network::Trc20, "TQn9Y2khEsLJW1Ch").is_err());
        // base58 excludes 0, O, I and l
        assert!(WithdrawalAddress::parse(Network::Trc20, "TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLS0").is_err());
    }

    #[test]
    fn test_exchange_pattern_match() {
        let address = WithdrawalAddress::parse(Network::Trc20, TRON).unwrap();
        assert!(address.matches_exchange_pattern("^T[1-9A-HJ-NP-Za-km-z]{33}$").unwrap());
        assert!(!address.matches_exchange_pattern("^0x[0-9a-fA-F]{40}$").unwrap());
        assert!(address.matches_exchange_pattern("").unwrap());
        assert!(address.matches_exchange_pattern("([").is_err());
    }

    #[test]
    fn test_network_codes() {
        assert_eq!("trc20".parse::<Network>().unwrap(), Network::Trc20);
        assert_eq!(Network::Bep20.binance_code(), "BSC");
        assert!("SOL".parse::<Network>().is_err());
    }

    #[test]
    fn test_only_pending_addresses_are_reviewable() {
        assert!(AddressStatus::Pending.ensure_reviewable().is_ok());
        assert!(AddressStatus::Verified.ensure_reviewable().is_err());
        assert_eq!(AddressStatus::from("bogus"), AddressStatus::None);
    }
}
