//! One-way notifications to the loyalty and promotions subsystems, fired on
//! payment completion. Fire-and-forget: delivery failures are logged and
//! never propagate back into the payment path.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tracing::{debug, warn};

#[async_trait]
pub trait RewardsSink: Send + Sync {
    async fn credit_loyalty_points(&self, order_id: &str, amount: &BigDecimal);

    async fn consume_promotion(&self, order_id: &str);
}

/// Posts to the loyalty and promotions services over HTTP. Either target may
/// be left unconfigured, in which case the corresponding call is skipped.
pub struct HttpRewardsSink {
    client: reqwest::Client,
    loyalty_url: Option<String>,
    promotions_url: Option<String>,
}

impl HttpRewardsSink {
    pub fn new(loyalty_url: Option<String>, promotions_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            loyalty_url,
            promotions_url,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("LOYALTY_SERVICE_URL").ok(),
            std::env::var("PROMOTIONS_SERVICE_URL").ok(),
        )
    }

    fn post_in_background(&self, url: String, what: &'static str, payload: serde_json::Value) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(url = %url, "{} dispatched", what);
                }
                Ok(resp) => {
                    warn!(url = %url, status = %resp.status(), "{} rejected downstream", what);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "{} delivery failed", what);
                }
            }
        });
    }
}

#[async_trait]
impl RewardsSink for HttpRewardsSink {
    async fn credit_loyalty_points(&self, order_id: &str, amount: &BigDecimal) {
        let Some(url) = self.loyalty_url.clone() else {
            debug!(order_id = %order_id, "loyalty sink not configured, skipping credit");
            return;
        };
        self.post_in_background(
            url,
            "loyalty credit",
            serde_json::json!({
                "order_id": order_id,
                "amount": amount.to_string(),
            }),
        );
    }

    async fn consume_promotion(&self, order_id: &str) {
        let Some(url) = self.promotions_url.clone() else {
            debug!(order_id = %order_id, "promotions sink not configured, skipping usage mark");
            return;
        };
        self.post_in_background(
            url,
            "promotion usage",
            serde_json::json!({ "order_id": order_id }),
        );
    }
}
