//! Payment Gateway Client for the Crypto Pay API (@CryptoBot).
//!
//! A transport failure on either call means "unknown, retry later"; callers
//! must never read it as "not paid".

use std::time::Duration;

use serde::Deserialize;

use crate::error::GatewayError;
use crate::retry::{with_retry, DEFAULT_ATTEMPTS, DEFAULT_DELAY};

const CRYPTO_PAY_API_URL: &str = "https://pay.crypt.bot/api";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Invoices expire an hour after creation.
const INVOICE_EXPIRES_IN_SECS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Created and awaiting payment.
    Active,
    Paid,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub invoice_id: i64,
    pub status: InvoiceStatus,
    pub amount: String,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default, alias = "bot_invoice_url")]
    pub pay_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InvoiceItems {
    items: Vec<Invoice>,
}

pub struct CryptoPayClient {
    http: reqwest::Client,
    token: String,
}

impl CryptoPayClient {
    pub fn new(token: String) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { http, token })
    }

    async fn unwrap_response<T>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status()));
        }
        let body: ApiResponse<T> = response.json().await?;
        if !body.ok {
            return Err(GatewayError::Decode("remote reported ok=false".to_string()));
        }
        body.result
            .ok_or_else(|| GatewayError::Decode("missing result".to_string()))
    }

    pub async fn create_invoice(
        &self,
        amount: f64,
        asset: &str,
        description: &str,
    ) -> Result<Invoice, GatewayError> {
        let endpoint = format!("{}/createInvoice", CRYPTO_PAY_API_URL);
        let body = serde_json::json!({
            "asset": asset,
            "amount": format!("{:.2}", amount),
            "description": description,
            "hidden_message": "Thank you for your payment!",
            "expires_in": INVOICE_EXPIRES_IN_SECS,
        });

        with_retry("crypto-pay createInvoice", DEFAULT_ATTEMPTS, DEFAULT_DELAY, || {
            let endpoint = endpoint.clone();
            let body = body.clone();
            async move {
                let response = self
                    .http
                    .post(&endpoint)
                    .header("Crypto-Pay-API-Token", &self.token)
                    .json(&body)
                    .send()
                    .await?;
                Self::unwrap_response(response).await
            }
        })
        .await
    }

    /// Looks an invoice up by id. `Ok(None)` means the remote no longer knows
    /// the invoice; an `Err` means its state could not be determined.
    pub async fn get_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, GatewayError> {
        let endpoint = format!(
            "{}/getInvoices?invoice_ids={}",
            CRYPTO_PAY_API_URL, invoice_id
        );

        let result: InvoiceItems =
            with_retry("crypto-pay getInvoices", DEFAULT_ATTEMPTS, DEFAULT_DELAY, || {
                let endpoint = endpoint.clone();
                async move {
                    let response = self
                        .http
                        .get(&endpoint)
                        .header("Crypto-Pay-API-Token", &self.token)
                        .send()
                        .await?;
                    Self::unwrap_response(response).await
                }
            })
            .await?;

        Ok(result.items.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_status_deserializes_known_and_unknown_values() {
        let paid: InvoiceStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(paid, InvoiceStatus::Paid);
        let active: InvoiceStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(active, InvoiceStatus::Active);
        let other: InvoiceStatus = serde_json::from_str("\"mystery\"").unwrap();
        assert_eq!(other, InvoiceStatus::Unknown);
    }

    #[test]
    fn invoice_accepts_either_pay_url_field() {
        let legacy: Invoice = serde_json::from_str(
            r#"{"invoice_id":1,"status":"active","amount":"29.99","pay_url":"https://t.me/x"}"#,
        )
        .unwrap();
        assert_eq!(legacy.pay_url.as_deref(), Some("https://t.me/x"));

        let current: Invoice = serde_json::from_str(
            r#"{"invoice_id":2,"status":"active","amount":"29.99","bot_invoice_url":"https://t.me/y"}"#,
        )
        .unwrap();
        assert_eq!(current.pay_url.as_deref(), Some("https://t.me/y"));
    }
}
