//! Commerce gateway HTTP client.
//!
//! One client serves all three collaborator roles (coupons, shipping
//! rates, order submission) against the gateway's JSON endpoints.
//! Shipping quotes are cached per destination with `moka` (5-minute TTL);
//! coupon and order calls are never cached.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::cart::CartItem;
use crate::config::GatewayConfig;
use crate::session::Address;
use crate::submit::OrderPayload;

use super::{
    CollaboratorError, CouponKind, CouponResolution, CouponService, OrderGateway, OrderReceipt,
    ShippingOption, ShippingRates,
};

/// Shipping quotes are valid for this long per destination.
const QUOTE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Client for the commerce gateway collaborators.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayClientInner>,
}

struct GatewayClientInner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    rates_cache: Cache<String, Vec<ShippingOption>>,
}

impl GatewayClient {
    /// Create a new gateway client.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        let rates_cache = Cache::builder()
            .max_capacity(100)
            .time_to_live(QUOTE_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(GatewayClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.expose_secret().to_string(),
                rates_cache,
            }),
        }
    }

    /// POST a JSON body and decode a JSON response.
    #[instrument(skip(self, body), fields(path = %path))]
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, CollaboratorError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.inner.base_url);
        let response = self
            .inner
            .client
            .post(&url)
            .header("X-Api-Key", &self.inner.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CollaboratorError::RateLimited(retry_after));
        }

        // Read the body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "gateway returned non-success status"
            );
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "failed to parse gateway response"
            );
            CollaboratorError::Parse(e)
        })
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Serialize)]
struct CouponRequest<'a> {
    code: &'a str,
    cart_subtotal: Decimal,
}

#[derive(Deserialize)]
struct CouponResponse {
    valid: bool,
    discount: Option<Decimal>,
    #[serde(rename = "type")]
    kind: Option<CouponKind>,
    message: Option<String>,
}

#[derive(Serialize)]
struct RatesRequest<'a> {
    address: &'a Address,
    items: &'a [CartItem],
}

#[derive(Deserialize)]
struct RatesResponse {
    methods: Vec<ShippingOption>,
}

// =============================================================================
// Collaborator Implementations
// =============================================================================

impl CouponService for GatewayClient {
    async fn resolve(
        &self,
        code: &str,
        cart_subtotal: Decimal,
    ) -> Result<CouponResolution, CollaboratorError> {
        let response: CouponResponse = self
            .post("/coupons/validate", &CouponRequest {
                code,
                cart_subtotal,
            })
            .await?;

        if response.valid
            && let (Some(discount), Some(kind)) = (response.discount, response.kind)
        {
            debug!(code, %discount, "coupon resolved");
            return Ok(CouponResolution { discount, kind });
        }
        Err(CollaboratorError::CouponRejected(
            response
                .message
                .unwrap_or_else(|| "This coupon code is not valid".to_string()),
        ))
    }
}

impl ShippingRates for GatewayClient {
    async fn quote(
        &self,
        address: &Address,
        items: &[CartItem],
    ) -> Result<Vec<ShippingOption>, CollaboratorError> {
        let cache_key = format!("{}:{}", address.country, address.postal_code);

        if let Some(methods) = self.inner.rates_cache.get(&cache_key).await {
            debug!("cache hit for shipping quote");
            return Ok(methods);
        }

        let response: RatesResponse = self
            .post("/shipping/rates", &RatesRequest { address, items })
            .await?;

        self.inner
            .rates_cache
            .insert(cache_key, response.methods.clone())
            .await;
        Ok(response.methods)
    }
}

impl OrderGateway for GatewayClient {
    async fn submit_order(&self, payload: &OrderPayload) -> Result<OrderReceipt, CollaboratorError> {
        let receipt: OrderReceipt = self.post("/orders", payload).await?;
        debug!(order_id = %receipt.order_id, "order accepted by gateway");
        Ok(receipt)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_response_shapes() {
        let valid: CouponResponse = serde_json::from_str(
            r#"{"valid": true, "discount": "10.00", "type": "fixed"}"#,
        )
        .unwrap();
        assert!(valid.valid);
        assert_eq!(valid.discount.unwrap(), Decimal::new(1000, 2));
        assert_eq!(valid.kind.unwrap(), CouponKind::Fixed);

        let invalid: CouponResponse =
            serde_json::from_str(r#"{"valid": false, "message": "Expired"}"#).unwrap();
        assert!(!invalid.valid);
        assert_eq!(invalid.message.as_deref(), Some("Expired"));
    }

    #[test]
    fn test_rates_response_shape() {
        let response: RatesResponse = serde_json::from_str(
            r#"{"methods": [{
                "id": "standard",
                "label": "Standard Shipping",
                "price": "5.99",
                "delivery_window": {"min_days": 3, "max_days": 5}
            }]}"#,
        )
        .unwrap();
        assert_eq!(response.methods.len(), 1);
        let standard = response.methods.first().unwrap();
        assert_eq!(standard.price, Decimal::new(599, 2));
    }
}
