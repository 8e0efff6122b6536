//! Binance REST gateway.
//!
//! Binance is the price and withdrawal oracle for USDT: it publishes the
//! address rules per network, confirms deposits by transaction id, and
//! executes withdrawals. Private endpoints are signed with HMAC-SHA256 over
//! the query string.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::{
    BinanceSettings, BINANCE_COIN, BINANCE_DEPOSIT_CREDITED_LOCKED, BINANCE_DEPOSIT_SUCCESS,
    BINANCE_RECV_WINDOW_MS, BINANCE_TIMEOUT_SECONDS,
};
use crate::domain::Network;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

type HmacSha256 = Hmac<Sha256>;

/// Withdrawal rules Binance publishes for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRule {
    pub withdraw_enabled: bool,
    pub address_regex: String,
}

/// A deposit as recorded by Binance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRecord {
    pub amount: Decimal,
    pub status: i32,
}

impl DepositRecord {
    /// Funds have arrived on the exchange account.
    pub fn is_credited(&self) -> bool {
        self.status == BINANCE_DEPOSIT_SUCCESS || self.status == BINANCE_DEPOSIT_CREDITED_LOCKED
    }
}

/// Exchange operations the ledger relies on.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// USDT withdrawal rules for a network, `None` when Binance does not list it
    async fn network_rule(&self, network: Network) -> AppResult<Option<NetworkRule>>;

    /// USDT deposit with the given transaction id
    async fn find_deposit(&self, reference: &str) -> AppResult<Option<DepositRecord>>;

    /// Submit a USDT withdrawal and return the exchange withdrawal id
    async fn submit_withdrawal(
        &self,
        client_id: Uuid,
        network: Network,
        address: &str,
        amount: Decimal,
    ) -> AppResult<String>;

    /// Last traded price of a symbol such as `BTCUSDT`
    async fn market_price(&self, symbol: &str) -> AppResult<Decimal>;
}

/// Signed Binance REST client.
pub struct BinanceClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinConfig {
    coin: String,
    #[serde(default)]
    network_list: Vec<NetworkConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkConfig {
    network: String,
    #[serde(default)]
    withdraw_enable: bool,
    #[serde(default)]
    address_regex: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositHistoryEntry {
    amount: Decimal,
    coin: String,
    status: i32,
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

impl BinanceClient {
    /// Build a client, or `None` when credentials are missing (manual mode).
    pub fn from_settings(settings: &BinanceSettings) -> AppResult<Option<Self>> {
        let Some((key, secret)) = settings.credentials() else {
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(BINANCE_TIMEOUT_SECONDS))
            .build()?;

        Ok(Some(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: key.to_string(),
            api_secret: secret.to_string(),
        }))
    }

    fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> AppResult<RequestBuilder> {
        let query = signed_query(&self.api_secret, params, Utc::now().timestamp_millis())?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        Ok(self
            .http
            .request(method, url)
            .header("X-MBX-APIKEY", &self.api_key))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> AppResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => format!("{} ({})", err.msg, err.code),
                Err(_) => format!("HTTP {}", status),
            };
            tracing::warn!(path, %status, "Binance request failed: {}", message);
            return Err(AppError::external(message));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(path, "Unexpected Binance response: {}", e);
            AppError::external("Unexpected response from exchange")
        })
    }
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    async fn network_rule(&self, network: Network) -> AppResult<Option<NetworkRule>> {
        let path = "/sapi/v1/capital/config/getall";
        let request = self.signed_request(Method::GET, path, &[])?;
        let coins: Vec<CoinConfig> = self.send(request, path).await?;
        Ok(select_network_rule(coins, network))
    }

    async fn find_deposit(&self, reference: &str) -> AppResult<Option<DepositRecord>> {
        let path = "/sapi/v1/capital/deposit/hisrec";
        let params = [
            ("coin", BINANCE_COIN.to_string()),
            ("txId", reference.to_string()),
        ];
        let request = self.signed_request(Method::GET, path, &params)?;
        let entries: Vec<DepositHistoryEntry> = self.send(request, path).await?;
        Ok(select_deposit(entries, reference))
    }

    async fn submit_withdrawal(
        &self,
        client_id: Uuid,
        network: Network,
        address: &str,
        amount: Decimal,
    ) -> AppResult<String> {
        let path = "/sapi/v1/capital/withdraw/apply";
        let params = [
            ("coin", BINANCE_COIN.to_string()),
            ("network", network.binance_code().to_string()),
            ("address", address.to_string()),
            ("amount", amount.normalize().to_string()),
            ("withdrawOrderId", client_id.simple().to_string()),
        ];
        let request = self.signed_request(Method::POST, path, &params)?;
        let response: WithdrawResponse = self.send(request, path).await?;

        tracing::info!(
            transaction_id = %client_id,
            external_id = %response.id,
            %amount,
            "Binance withdrawal submitted"
        );
        Ok(response.id)
    }

    async fn market_price(&self, symbol: &str) -> AppResult<Decimal> {
        let path = "/api/v3/ticker/price";
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::validation("Invalid market symbol"));
        }
        let request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&[("symbol", symbol)]);
        let ticker: TickerPrice = self.send(request, path).await?;
        Ok(ticker.price)
    }
}

/// Hex HMAC-SHA256 of `query` keyed by the API secret.
fn sign_query(secret: &str, query: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid Binance secret: {}", e)))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Form-encode `params` with receive window and timestamp, then append the
/// signature of exactly that string. The result is sent as is.
fn signed_query(secret: &str, params: &[(&str, String)], timestamp_ms: i64) -> AppResult<String> {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
        .append_pair("recvWindow", &BINANCE_RECV_WINDOW_MS.to_string())
        .append_pair("timestamp", &timestamp_ms.to_string())
        .finish();
    let signature = sign_query(secret, &query)?;
    Ok(format!("{}&signature={}", query, signature))
}

fn select_network_rule(coins: Vec<CoinConfig>, network: Network) -> Option<NetworkRule> {
    coins
        .into_iter()
        .find(|c| c.coin.eq_ignore_ascii_case(BINANCE_COIN))?
        .network_list
        .into_iter()
        .find(|n| n.network.eq_ignore_ascii_case(network.binance_code()))
        .map(|n| NetworkRule {
            withdraw_enabled: n.withdraw_enable,
            address_regex: n.address_regex,
        })
}

fn select_deposit(entries: Vec<DepositHistoryEntry>, reference: &str) -> Option<DepositRecord> {
    entries
        .into_iter()
        .find(|e| e.tx_id == reference && e.coin.eq_ignore_ascii_case(BINANCE_COIN))
        .map(|e| DepositRecord {
            amount: e.amount,
            status: e.status,
        })
}
