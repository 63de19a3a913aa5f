//! Binance REST payloads

use serde::Deserialize;

/// GET /api/v3/depth
#[derive(Debug, Clone, Deserialize)]
pub struct DepthResponse {
    /// [price, quantity], best first
    pub bids: Vec<[String; 2]>,
    #[serde(default)]
    pub asks: Vec<[String; 2]>,
}

/// GET /api/v3/avgPrice
#[derive(Debug, Clone, Deserialize)]
pub struct AvgPriceResponse {
    /// Averaging window in minutes
    #[serde(default)]
    pub mins: u32,
    pub price: String,
}

/// POST /api/v3/order (ACK/RESULT/FULL all carry these)
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub symbol: String,
    #[serde(rename = "orderId")]
    pub order_id: u64,
}

/// Element of GET /api/v3/openOrders
#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrder {
    pub symbol: String,
    #[serde(rename = "orderId")]
    pub order_id: u64,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub status: String,
}

/// GET /api/v3/account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: String,
    #[serde(default)]
    pub locked: String,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

/// "Invalid symbol."
pub const ERROR_INVALID_SYMBOL: i64 = -1121;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_depth() {
        let body = r#"{"lastUpdateId":1027024,"bids":[["4.00000000","431.00000000"],["3.99","1"]],"asks":[["4.00000200","12.00000000"]]}"#;
        let depth: DepthResponse = serde_json::from_str(body).unwrap();
        assert_eq!(depth.bids[0][0], "4.00000000");
        assert_eq!(depth.bids.len(), 2);
    }

    #[test]
    fn test_parse_open_orders() {
        let body = r#"[{"symbol":"LTCBTC","orderId":1,"orderListId":-1,"clientOrderId":"myOrder1","price":"0.1","origQty":"1.0","executedQty":"0.0","status":"NEW","timeInForce":"GTC","type":"LIMIT","side":"BUY"}]"#;
        let orders: Vec<OpenOrder> = serde_json::from_str(body).unwrap();
        assert_eq!(orders[0].order_id, 1);
        assert_eq!(orders[0].side, "BUY");
    }

    #[test]
    fn test_parse_account() {
        let body = r#"{"makerCommission":15,"balances":[{"asset":"BTC","free":"4723846.89208129","locked":"0.00000000"},{"asset":"USDT","free":"1000.5","locked":"0"}]}"#;
        let account: AccountResponse = serde_json::from_str(body).unwrap();
        assert_eq!(account.balances[1].asset, "USDT");
        assert_eq!(account.balances[1].free, "1000.5");
    }

    #[test]
    fn test_parse_error() {
        let err: ApiErrorResponse =
            serde_json::from_str(r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap();
        assert_eq!(err.code, ERROR_INVALID_SYMBOL);
    }
}
