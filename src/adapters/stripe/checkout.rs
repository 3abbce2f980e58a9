use crate::ports::{CheckoutGateway, CheckoutRequest, CheckoutSession, PortError, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
}

/// 金額を最小通貨単位（セント）に変換する
fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| format!("amount {} cannot be expressed in minor units", amount).into())
}

/// Stripe Checkout の CheckoutGateway 実装
///
/// reqwestでREST APIを直接呼ぶ（form-urlencoded + Bearer認証）。
pub struct StripeCheckoutGateway {
    http: reqwest::Client,
    api_base: Url,
    secret_key: String,
    currency: String,
}

impl StripeCheckoutGateway {
    pub fn new(api_base: Url, secret_key: String, currency: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            secret_key,
            currency,
        }
    }

    /// `{api_base}/v1/checkout/sessions[/{id}[/{action}]]`
    fn sessions_url(&self, session_id: Option<&str>, action: Option<&str>) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| "Stripe API base URL cannot have a path")?
            .pop_if_empty()
            .extend(["v1", "checkout", "sessions"])
            .extend(session_id)
            .extend(action);
        Ok(url)
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let body = resp.text().await.unwrap_or_default();

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .ok();

        tracing::error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            context,
            "stripe api request failed"
        );

        Err(PortError::from(format!(
            "Stripe API request failed: {} (status {})",
            context, status
        )))
    }
}

#[async_trait]
impl CheckoutGateway for StripeCheckoutGateway {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let unit_amount = to_minor_units(request.amount)?;
        let body: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.currency.clone()),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.clone(),
            ),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ];

        let resp = self
            .http
            .post(self.sessions_url(None, None)?)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        let session: SessionResponse = resp.json().await?;
        let url = session
            .url
            .ok_or("Stripe Checkout session URL is missing")?;

        Ok(CheckoutSession {
            session_id: session.id,
            url,
        })
    }

    async fn expire_session(&self, session_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.sessions_url(Some(session_id), Some("expire"))?)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        Self::ensure_success(resp, "expire checkout session").await?;
        Ok(())
    }

    async fn is_session_paid(&self, session_id: &str) -> Result<bool> {
        let resp = self
            .http
            .get(self.sessions_url(Some(session_id), None)?)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve checkout session").await?;

        let session: SessionResponse = resp.json().await?;
        Ok(session.payment_status.as_deref() == Some("paid"))
    }
}
