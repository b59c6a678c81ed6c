//! 客戶屬性查詢：每筆記錄呼叫一次外部 API，取出到期日屬性。
//!
//! 任何失敗（連線、逾時、非 2xx、格式錯誤、找不到屬性）都只會讓該筆記錄回傳 `None`。

use crate::config::toml_config::EnrichmentConfig;
use crate::domain::ports::AttributeLookup;
use crate::utils::error::{ExportError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;

#[derive(Debug, Deserialize)]
struct AttributeValuesResponse {
    data: Vec<AttributeValue>,
}

#[derive(Debug, Deserialize)]
struct AttributeValue {
    attribute_id: Value,
    #[serde(default)]
    attribute_value: Value,
}

/// 屬性 ID 可能是數字或數字字串
fn id_matches(value: &Value, expected: u64) -> bool {
    match value {
        Value::Number(n) => {
            n.as_u64() == Some(expected) || n.as_f64() == Some(expected as f64)
        }
        Value::String(s) => s.trim().parse::<u64>().ok() == Some(expected),
        _ => false,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_attribute(body: &AttributeValuesResponse, attribute_id: u64) -> Option<String> {
    body.data
        .iter()
        .find(|attr| id_matches(&attr.attribute_id, attribute_id))
        .and_then(|attr| value_as_text(&attr.attribute_value))
}

enum FetchFailure {
    /// 連線錯誤或 5xx，允許重試
    Transient(String),
    Permanent(String),
}

impl FetchFailure {
    fn into_error(self) -> ExportError {
        let message = match self {
            Self::Transient(m) | Self::Permanent(m) => m,
        };
        ExportError::EnrichmentUnavailable { message }
    }
}

pub struct AttributeClient {
    settings: EnrichmentConfig,
    client: OnceCell<Client>,
}

impl AttributeClient {
    pub fn new(settings: EnrichmentConfig) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    /// 一次性的初始化關卡；啟動時先等待一次，之後所有查詢共用同一個 client
    pub async fn ready(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                tracing::debug!(
                    "Initializing attribute client (timeout {}s)",
                    self.settings.timeout_seconds
                );
                Client::builder()
                    .timeout(self.timeout())
                    .build()
                    .map_err(|e| ExportError::EnrichmentUnavailable {
                        message: format!("failed to build HTTP client: {}", e),
                    })
            })
            .await
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_seconds)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/stores/{}/v3/customers/attribute-values",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.store_hash
        )
    }

    async fn fetch_once(&self, client: &Client, customer_id: &str) -> std::result::Result<Option<String>, FetchFailure> {
        let response = client
            .get(self.endpoint())
            .query(&[("customer_id:in", customer_id)])
            .header("X-Auth-Token", &self.settings.auth_token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| FetchFailure::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchFailure::Transient(format!("server responded {}", status)));
        }
        if !status.is_success() {
            return Err(FetchFailure::Permanent(format!("server responded {}", status)));
        }

        let body: AttributeValuesResponse = response
            .json()
            .await
            .map_err(|e| FetchFailure::Permanent(format!("malformed response: {}", e)))?;

        Ok(extract_attribute(&body, self.settings.attribute_id))
    }

    /// 查詢並在允許時以指數退避重試；預設不重試
    pub async fn fetch(&self, customer_id: &str) -> Result<Option<String>> {
        let client = self.ready().await?;
        let mut delay = Duration::from_millis(self.settings.retry_delay_ms);
        let mut attempt = 0;

        loop {
            match self.fetch_once(client, customer_id).await {
                Ok(value) => return Ok(value),
                Err(FetchFailure::Transient(message)) if attempt < self.settings.retry_attempts => {
                    attempt += 1;
                    tracing::debug!(
                        "🔁 Retrying lookup for customer {} ({}/{}) after {:?}: {}",
                        customer_id,
                        attempt,
                        self.settings.retry_attempts,
                        delay,
                        message
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(failure) => return Err(failure.into_error()),
            }
        }
    }
}

#[async_trait]
impl AttributeLookup for AttributeClient {
    async fn lookup(&self, customer_id: &str) -> Option<String> {
        let customer_id = customer_id.trim();
        if customer_id.is_empty() {
            return None;
        }

        match self.fetch(customer_id).await {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                tracing::debug!("No attribute {} for customer {}", self.settings.attribute_id, customer_id);
                None
            }
            Err(e) => {
                tracing::warn!("⚠️ Lookup for customer {} degraded to N/A: {}", customer_id, e);
                None
            }
        }
    }
}
