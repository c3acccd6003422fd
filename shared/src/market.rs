//! Market Data Gateway.
//!
//! CoinGecko serves spot prices and market snapshots, Binance serves klines.
//! Every outbound call goes through the bounded retry wrapper; a symbol
//! missing from a batched price response is reported by omission from the
//! returned map, never as an error for the whole batch.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::retry::{with_retry, DEFAULT_ATTEMPTS, DEFAULT_DELAY};

const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
const BINANCE_API_URL: &str = "https://api.binance.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Short tickers users actually type, mapped to CoinGecko coin ids. Anything
/// not listed here is passed through unchanged and treated as a coin id.
const SYMBOL_ALIASES: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("bnb", "binancecoin"),
    ("sol", "solana"),
    ("xrp", "ripple"),
    ("ada", "cardano"),
    ("doge", "dogecoin"),
    ("dot", "polkadot"),
    ("ltc", "litecoin"),
    ("link", "chainlink"),
];

pub fn normalize_symbol(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    SYMBOL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, id)| (*id).to_string())
        .unwrap_or(lowered)
}

/// Binance spot pair for a user-supplied symbol or coin id, e.g.
/// "btc" or "bitcoin" -> "BTCUSDT".
pub fn to_binance_pair(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    let short = SYMBOL_ALIASES
        .iter()
        .find(|(_, id)| *id == lowered)
        .map(|(alias, _)| *alias)
        .unwrap_or(lowered.as_str());
    let upper = short.to_ascii_uppercase();
    if upper.ends_with("USDT") {
        upper
    } else {
        format!("{}USDT", upper)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSnapshot {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Kline {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
}

impl Kline {
    fn from_row(row: &[serde_json::Value]) -> Result<Self, GatewayError> {
        fn price(value: Option<&serde_json::Value>) -> Option<f64> {
            match value? {
                serde_json::Value::String(s) => s.parse().ok(),
                serde_json::Value::Number(n) => n.as_f64(),
                _ => None,
            }
        }
        fn millis(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
            DateTime::from_timestamp_millis(value?.as_i64()?)
        }

        let malformed = || GatewayError::Decode("malformed kline row".to_string());
        Ok(Kline {
            open_time: millis(row.first()).ok_or_else(malformed)?,
            open: price(row.get(1)).ok_or_else(malformed)?,
            high: price(row.get(2)).ok_or_else(malformed)?,
            low: price(row.get(3)).ok_or_else(malformed)?,
            close: price(row.get(4)).ok_or_else(malformed)?,
            volume: price(row.get(5)).ok_or_else(malformed)?,
            close_time: millis(row.get(6)).ok_or_else(malformed)?,
        })
    }

    pub fn change_pct(&self) -> f64 {
        if self.open == 0.0 {
            0.0
        } else {
            (self.close - self.open) / self.open * 100.0
        }
    }
}

pub struct MarketClient {
    http: reqwest::Client,
}

impl MarketClient {
    pub fn new() -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
            .build()?;
        Ok(Self { http })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, GatewayError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Batched price lookup. Keys of the returned map are the symbols as
    /// passed in; symbols the remote does not know are simply absent.
    pub async fn get_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>, GatewayError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            COINGECKO_API_URL,
            ids.join(",")
        );
        let raw: HashMap<String, HashMap<String, f64>> =
            with_retry("coingecko simple/price", DEFAULT_ATTEMPTS, DEFAULT_DELAY, || {
                let url = url.clone();
                async move { self.get_json(&url).await }
            })
            .await?;
        Ok(project_prices(symbols, &ids, &raw))
    }

    pub async fn get_price(&self, symbol: &str) -> Result<Option<f64>, GatewayError> {
        let prices = self.get_prices(&[symbol.to_string()]).await?;
        Ok(prices.into_values().next())
    }

    pub async fn get_top_markets(&self, n: usize) -> Result<Vec<MarketSnapshot>, GatewayError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1",
            COINGECKO_API_URL, n
        );
        with_retry("coingecko coins/markets", DEFAULT_ATTEMPTS, DEFAULT_DELAY, || {
            let url = url.clone();
            async move { self.get_json(&url).await }
        })
        .await
    }

    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Kline>, GatewayError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            BINANCE_API_URL,
            to_binance_pair(symbol),
            interval,
            limit.min(1000)
        );
        let rows: Vec<Vec<serde_json::Value>> =
            with_retry("binance klines", DEFAULT_ATTEMPTS, DEFAULT_DELAY, || {
                let url = url.clone();
                async move { self.get_json(&url).await }
            })
            .await?;
        rows.iter().map(|row| Kline::from_row(row)).collect()
    }

    /// Startup availability probe. Logs and moves on; the bot starts either way.
    pub async fn startup_check(&self) {
        let apis = [
            ("CoinGecko", format!("{}/ping", COINGECKO_API_URL)),
            ("Binance", format!("{}/api/v3/ping", BINANCE_API_URL)),
        ];
        for (name, url) in apis {
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("{} API is available", name);
                }
                Ok(response) => {
                    warn!("{} API responding but with status {}", name, response.status());
                }
                Err(err) => {
                    warn!("{} API unavailable: {}", name, err);
                }
            }
        }
    }
}

fn project_prices(
    symbols: &[String],
    ids: &[String],
    raw: &HashMap<String, HashMap<String, f64>>,
) -> HashMap<String, f64> {
    let mut prices = HashMap::new();
    for (symbol, id) in symbols.iter().zip(ids.iter()) {
        if let Some(quote) = raw.get(id).and_then(|quotes| quotes.get("usd")) {
            prices.insert(symbol.clone(), *quote);
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_aliases_and_passes_through_ids() {
        assert_eq!(normalize_symbol("BTC"), "bitcoin");
        assert_eq!(normalize_symbol(" eth "), "ethereum");
        assert_eq!(normalize_symbol("bitcoin"), "bitcoin");
        assert_eq!(normalize_symbol("some-altcoin"), "some-altcoin");
    }

    #[test]
    fn builds_binance_pairs() {
        assert_eq!(to_binance_pair("btc"), "BTCUSDT");
        assert_eq!(to_binance_pair("bitcoin"), "BTCUSDT");
        assert_eq!(to_binance_pair("ETHUSDT"), "ETHUSDT");
        assert_eq!(to_binance_pair("pepe"), "PEPEUSDT");
    }

    #[test]
    fn parses_kline_row() {
        let row = vec![
            json!(1700000000000i64),
            json!("42000.5"),
            json!("42100.0"),
            json!("41900.0"),
            json!("42050.0"),
            json!("12.5"),
            json!(1700000059999i64),
        ];
        let kline = Kline::from_row(&row).unwrap();
        assert_eq!(kline.open, 42000.5);
        assert_eq!(kline.close, 42050.0);
        assert!(kline.change_pct() > 0.0);
    }

    #[test]
    fn rejects_malformed_kline_row() {
        let row = vec![json!(1700000000000i64), json!("not-a-number")];
        assert!(Kline::from_row(&row).is_err());
    }

    #[test]
    fn missing_symbols_are_omitted_not_errors() {
        let symbols = vec!["btc".to_string(), "unknowncoin".to_string()];
        let ids = vec!["bitcoin".to_string(), "unknowncoin".to_string()];
        let mut raw = HashMap::new();
        raw.insert(
            "bitcoin".to_string(),
            HashMap::from([("usd".to_string(), 50000.0)]),
        );

        let prices = project_prices(&symbols, &ids, &raw);
        assert_eq!(prices.get("btc"), Some(&50000.0));
        assert!(!prices.contains_key("unknowncoin"));
    }
}
