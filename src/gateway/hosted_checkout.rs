use super::{
    CreatedPayment, GatewayKind, GatewayStatus, PaymentGateway, PaymentOrder, VerifiedPayment,
    from_minor_units, to_minor_units,
};
use crate::error::GatewayError;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

const MAX_DETAIL_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HostedCheckoutConfig {
    pub base_url: String,
    pub api_key: String,
    pub return_url: String,
    pub timeout: Duration,
}

/// Redirect-based provider speaking a checkout-session JSON API.
///
/// `create_payment` opens a session and hands back the provider's hosted page;
/// settlement is only known after `verify_payment` reads the session back.
pub struct HostedCheckoutGateway {
    config: HostedCheckoutConfig,
    client: reqwest::Client,
}

impl HostedCheckoutGateway {
    pub fn new(config: HostedCheckoutConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable {
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.config.base_url.trim_end_matches('/'))
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                code: format!("HTTP_{}", status.as_u16()),
                detail: body.chars().take(MAX_DETAIL_CHARS).collect(),
            });
        }
        response.json().await.map_err(|e| GatewayError::Malformed {
            detail: e.to_string(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unreachable {
            detail: e.to_string(),
        }
    }
}

/// Maps the provider's session status vocabulary onto ours.
fn session_status(raw: &str) -> GatewayStatus {
    match raw {
        "complete" | "paid" | "succeeded" => GatewayStatus::Settled,
        "open" | "processing" | "requires_action" => GatewayStatus::Pending,
        _ => GatewayStatus::Failed,
    }
}

fn required_str<'a>(body: &'a Value, field: &str) -> Result<&'a str, GatewayError> {
    body.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Malformed {
            detail: format!("session response missing '{field}'"),
        })
}

fn parse_created(body: Value) -> Result<CreatedPayment, GatewayError> {
    let transaction_id = required_str(&body, "id")?.to_string();
    let status = session_status(required_str(&body, "status")?);
    let redirect_url = body.get("url").and_then(Value::as_str).map(str::to_string);
    if status == GatewayStatus::Pending && redirect_url.is_none() {
        return Err(GatewayError::Malformed {
            detail: "open session without redirect url".to_string(),
        });
    }
    let reference = body
        .get("payment_reference")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(CreatedPayment {
        transaction_id,
        reference,
        status,
        redirect_url,
        provider_response: body,
    })
}

fn parse_verified(body: Value) -> Result<VerifiedPayment, GatewayError> {
    let status = session_status(required_str(&body, "status")?);
    let amount = body
        .get("amount_total")
        .and_then(Value::as_i64)
        .map(from_minor_units)
        .ok_or_else(|| GatewayError::Malformed {
            detail: "session response missing 'amount_total'".to_string(),
        })?;

    Ok(VerifiedPayment {
        status,
        amount,
        provider_response: body,
    })
}

#[async_trait]
impl PaymentGateway for HostedCheckoutGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::HostedCheckout
    }

    async fn create_payment(&self, order: &PaymentOrder) -> Result<CreatedPayment, GatewayError> {
        let body = json!({
            "amount_total": to_minor_units(order.amount)?,
            "currency": order.currency.to_ascii_lowercase(),
            "description": order.description,
            "client_reference_id": order.payment_id.to_string(),
            "customer_name": order.payer.name,
            "customer_email": order.payer.email,
            "return_url": self.config.return_url,
        });

        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        parse_created(Self::read_json(response).await?)
    }

    async fn verify_payment(&self, transaction_id: &str) -> Result<VerifiedPayment, GatewayError> {
        let response = self
            .client
            .get(format!("{}/{}", self.sessions_url(), transaction_id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        parse_verified(Self::read_json(response).await?)
    }
}
