use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;

/// Remote order as created on the payment gateway. Amounts are in minor
/// units (paise) because that is what the gateway speaks.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// Metadata the gateway holds about a completed payment. Fetched best-effort
/// after signature verification; all fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayPaymentDetails {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub wallet: Option<String>,
}

/// Seam to the payment gateway, mirroring the two REST calls the workflow
/// needs. Production uses [`RazorpayClient`]; tests swap in a double.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a remote order the hosted checkout widget can collect against.
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError>;

    /// Fetch the gateway's record of a payment (method/bank/wallet metadata).
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPaymentDetails, AppError>;
}

/// Razorpay Orders/Payments REST client (HTTP basic auth with key id/secret).
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(base_url: &str, key_id: &str, key_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let resp = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "gateway order creation failed ({status}): {body}"
            )));
        }

        Ok(resp.json::<GatewayOrder>().await?)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPaymentDetails, AppError> {
        let resp = self
            .http
            .get(format!("{}/payments/{payment_id}", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "gateway payment fetch failed ({})",
                resp.status()
            )));
        }

        Ok(resp.json::<GatewayPaymentDetails>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_order_deserializes_from_api_shape() {
        let body = r#"{
            "id": "order_NXhj4rkO0Zv9Qy",
            "entity": "order",
            "amount": 49900,
            "amount_paid": 0,
            "currency": "INR",
            "receipt": "ORD-17000000000000001",
            "status": "created"
        }"#;
        let order: GatewayOrder = serde_json::from_str(body).unwrap();
        assert_eq!(order.id, "order_NXhj4rkO0Zv9Qy");
        assert_eq!(order.amount, 49900);
        assert_eq!(order.currency, "INR");
        assert_eq!(order.status, "created");
    }

    #[test]
    fn payment_details_tolerate_missing_metadata() {
        let body = r#"{"id": "pay_abc", "status": "captured"}"#;
        let details: GatewayPaymentDetails = serde_json::from_str(body).unwrap();
        assert_eq!(details.id, "pay_abc");
        assert_eq!(details.status.as_deref(), Some("captured"));
        assert!(details.method.is_none());
        assert!(details.bank.is_none());
        assert!(details.wallet.is_none());
    }
}
