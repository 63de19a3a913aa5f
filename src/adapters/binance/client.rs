//! Binance Spot API Client
//!
//! HTTP client for the Binance spot REST API.
//! Serves market data (order book, average price), LIMIT GTC order placement,
//! open orders and account balances.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use thiserror::Error;

use super::types::{
    AccountResponse, ApiErrorResponse, AvgPriceResponse, DepthResponse, OpenOrder, OrderResponse,
    ERROR_INVALID_SYMBOL,
};
use crate::config::BinanceSection;
use crate::domain::trade::{OrderId, OrderRequest};
use crate::ports::{
    BalanceError, BalancePort, ExecutionError, ExecutionPort, MarketDataError, MarketDataPort,
    OrderRejected,
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum BinanceError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Binance error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("Unexpected status {0}")]
    Status(StatusCode),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Empty order book for {0}")]
    EmptyOrderBook(String),
    #[error("API credentials missing")]
    MissingCredentials,
}

/// Binance client configuration
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Send orders to /api/v3/order/test (validated, never executed)
    pub test_orders: bool,
    pub recv_window_ms: u64,
    pub timeout: Duration,
    /// Retries for read-only requests
    pub max_retries: u32,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            api_key: None,
            api_secret: None,
            test_orders: true,
            recv_window_ms: 5000,
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

impl From<&BinanceSection> for BinanceConfig {
    fn from(section: &BinanceSection) -> Self {
        Self {
            base_url: section.base_url.trim_end_matches('/').to_string(),
            api_key: section.get_api_key(),
            api_secret: section.get_api_secret(),
            test_orders: section.test_orders,
            recv_window_ms: section.recv_window_ms,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BinanceClient {
    config: BinanceConfig,
    http: Client,
}

impl BinanceClient {
    pub fn new() -> Result<Self, BinanceError> {
        Self::with_config(BinanceConfig::default())
    }

    pub fn with_config(config: BinanceConfig) -> Result<Self, BinanceError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn is_test_mode(&self) -> bool {
        self.config.test_orders
    }

    /// Highest bid from the top 5 levels of the book
    pub async fn get_highest_bid(&self, symbol: &str) -> Result<f64, BinanceError> {
        let depth: DepthResponse = self
            .public_get("/api/v3/depth", &[("symbol", symbol), ("limit", "5")])
            .await?;
        let best = depth
            .bids
            .first()
            .ok_or_else(|| BinanceError::EmptyOrderBook(symbol.to_string()))?;
        parse_number(&best[0])
    }

    pub async fn get_average_price(&self, symbol: &str) -> Result<f64, BinanceError> {
        let avg: AvgPriceResponse = self
            .public_get("/api/v3/avgPrice", &[("symbol", symbol)])
            .await?;
        parse_number(&avg.price)
    }

    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, BinanceError> {
        self.signed(Method::GET, "/api/v3/openOrders", &[("symbol", symbol.to_string())], true)
            .await
    }

    pub async fn get_free_balance(&self, asset: &str) -> Result<Option<f64>, BinanceError> {
        let account: AccountResponse =
            self.signed(Method::GET, "/api/v3/account", &[], true).await?;
        account
            .balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .map(|b| parse_number(&b.free))
            .transpose()
    }

    /// Place a LIMIT GTC order. Never retried, a retry could double the order.
    pub async fn create_order(&self, request: &OrderRequest) -> Result<OrderId, BinanceError> {
        let params = vec![
            ("symbol", request.pair.clone()),
            ("side", request.side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", format_decimal(request.quantity)),
            ("price", format_decimal(request.price)),
        ];

        if self.config.test_orders {
            let _: serde_json::Value = self
                .signed(Method::POST, "/api/v3/order/test", &params, false)
                .await?;
            let id = format!("test-{}", chrono::Utc::now().timestamp_millis());
            tracing::info!("Test order accepted for {} ({})", request.pair, id);
            return Ok(OrderId::new(id));
        }

        let response: OrderResponse = self
            .signed(Method::POST, "/api/v3/order", &params, false)
            .await?;
        Ok(OrderId::new(response.order_id.to_string()))
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BinanceError> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .execute_with_retry(|| Ok(self.http.get(&url).query(query)))
            .await?;
        self.handle_response(response).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        retry: bool,
    ) -> Result<T, BinanceError> {
        let api_key = self.config.api_key.as_deref().ok_or(BinanceError::MissingCredentials)?;
        let api_secret = self
            .config
            .api_secret
            .as_deref()
            .ok_or(BinanceError::MissingCredentials)?;

        let build = || -> Result<reqwest::RequestBuilder, BinanceError> {
            let mut query: Vec<String> =
                params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            query.push(format!("recvWindow={}", self.config.recv_window_ms));
            query.push(format!("timestamp={}", chrono::Utc::now().timestamp_millis()));
            let payload = query.join("&");
            let signature = sign(api_secret, &payload)?;
            let url = format!(
                "{}{}?{}&signature={}",
                self.config.base_url, path, payload, signature
            );
            Ok(self
                .http
                .request(method.clone(), url)
                .header("X-MBX-APIKEY", api_key))
        };

        // each attempt is re-signed with a fresh timestamp
        let response = if retry {
            self.execute_with_retry(build).await?
        } else {
            build()?.send().await?
        };

        self.handle_response(response).await
    }

    /// Execute request with retry logic and rate limit handling
    async fn execute_with_retry<F>(&self, request_fn: F) -> Result<reqwest::Response, BinanceError>
    where
        F: Fn() -> Result<reqwest::RequestBuilder, BinanceError>,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match request_fn()?.send().await {
                Ok(response) if should_retry(response.status()) => {
                    let status = response.status();
                    tracing::warn!(
                        "Binance returned {}, retrying (attempt {}/{})",
                        status,
                        attempt + 1,
                        self.config.max_retries
                    );
                    last_error = Some(BinanceError::Status(status));
                    tokio::time::sleep(backoff(status, attempt)).await;
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    last_error = Some(BinanceError::HttpError(e));
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BinanceError::ParseError("max retries exceeded".into())))
    }

    /// Handle API response and deserialize
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, BinanceError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(err) => BinanceError::Api {
                    code: err.code,
                    msg: err.msg,
                },
                Err(_) => BinanceError::Status(status),
            });
        }

        serde_json::from_str(&body).map_err(|e| BinanceError::ParseError(e.to_string()))
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(status: StatusCode, attempt: u32) -> Duration {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Duration::from_secs(2u64.pow(attempt + 1)) // 2s, 4s, 8s
    } else {
        Duration::from_millis(500 * (attempt as u64 + 1))
    }
}

/// HMAC-SHA256 of the query string, hex encoded
pub fn sign(secret: &str, payload: &str) -> Result<String, BinanceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BinanceError::ParseError(format!("invalid API secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Plain decimal string with at most 8 fractional digits (no exponent)
pub fn format_decimal(value: f64) -> String {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(8).normalize().to_string())
        .unwrap_or_else(|| "0".to_string())
}

fn parse_number(raw: &str) -> Result<f64, BinanceError> {
    raw.parse::<f64>()
        .map_err(|e| BinanceError::ParseError(format!("bad number '{}': {}", raw, e)))
}

fn market_error(pair: &str, err: BinanceError) -> MarketDataError {
    match err {
        BinanceError::Api { code, .. } if code == ERROR_INVALID_SYMBOL => {
            MarketDataError::UnknownPair(pair.to_string())
        }
        BinanceError::EmptyOrderBook(_) => MarketDataError::EmptyOrderBook(pair.to_string()),
        BinanceError::ParseError(msg) => MarketDataError::Parse(msg),
        other => MarketDataError::RestError(other.to_string()),
    }
}

#[async_trait]
impl MarketDataPort for BinanceClient {
    async fn best_bid(&self, pair: &str) -> Result<f64, MarketDataError> {
        self.get_highest_bid(pair).await.map_err(|e| market_error(pair, e))
    }

    async fn average_price(&self, pair: &str) -> Result<f64, MarketDataError> {
        self.get_average_price(pair).await.map_err(|e| market_error(pair, e))
    }
}

#[async_trait]
impl ExecutionPort for BinanceClient {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, OrderRejected> {
        self.create_order(request).await.map_err(|e| match e {
            BinanceError::Api { code, msg } => OrderRejected::new(format!("{} (code {})", msg, code)),
            other => OrderRejected::new(other.to_string()),
        })
    }

    async fn open_orders(&self, pair: &str) -> Result<Vec<OrderId>, ExecutionError> {
        let orders = self
            .get_open_orders(pair)
            .await
            .map_err(|e| ExecutionError::ApiError(e.to_string()))?;
        Ok(orders
            .into_iter()
            .map(|o| OrderId::new(o.order_id.to_string()))
            .collect())
    }
}

#[async_trait]
impl BalancePort for BinanceClient {
    async fn balance(&self, asset: &str) -> Result<f64, BalanceError> {
        match self.get_free_balance(asset).await {
            Ok(Some(free)) => Ok(free),
            Ok(None) => Err(BalanceError::UnknownAsset(asset.to_string())),
            Err(e) => Err(BalanceError::ApiError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = BinanceClient::new();
        assert!(client.is_ok());
        assert!(client.unwrap().is_test_mode());
    }

    #[test]
    fn test_signature_matches_reference_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(2.0), "2");
        assert_eq!(format_decimal(0.00000123), "0.00000123");
        assert_eq!(format_decimal(0.1234567891), "0.12345679");
        assert_eq!(format_decimal(57.49999999999999), "57.5");
    }

    #[test]
    fn test_market_error_mapping() {
        let err = market_error(
            "NOPE",
            BinanceError::Api {
                code: ERROR_INVALID_SYMBOL,
                msg: "Invalid symbol.".into(),
            },
        );
        assert_eq!(err, MarketDataError::UnknownPair("NOPE".into()));
    }

    #[tokio::test]
    async fn test_signed_request_requires_credentials() {
        let client = BinanceClient::new().unwrap();
        let result = client.get_open_orders("DOGEUSDT").await;
        assert!(matches!(result, Err(BinanceError::MissingCredentials)));
    }

    #[test]
    fn test_config_from_section() {
        let section = BinanceSection {
            api_key: "k".into(),
            api_secret: "s".into(),
            base_url: "https://testnet.binance.vision/".into(),
            test_orders: false,
            recv_window_ms: 10_000,
        };
        let config = BinanceConfig::from(&section);
        assert_eq!(config.base_url, "https://testnet.binance.vision");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert!(!config.test_orders);
    }
}
