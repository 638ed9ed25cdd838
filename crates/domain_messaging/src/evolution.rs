//! Evolution API adapter
//!
//! Talks to a self-hosted Evolution API gateway over REST. Includes:
//!
//! - Connection pooling via reqwest
//! - Automatic retry with exponential backoff on transient failures
//! - Circuit breaker pattern for fault tolerance
//! - Request tracing
//!
//! Gateway errors are mapped to `PortError` variants:
//! - 404 -> `PortError::NotFound`
//! - 401/403 -> `PortError::Unauthorized`
//! - 429 -> `PortError::RateLimited`
//! - 5xx -> `PortError::ServiceUnavailable`
//! - Timeouts -> `PortError::Timeout`
//! - Other -> `PortError::Internal`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use core_kernel::{
    AdapterHealth, CircuitBreakerConfig, DomainPort, HealthCheckResult, HealthCheckable, PortError,
};
use crate::phone::PhoneNumber;
use crate::port::{MessagingPort, SendReceipt};

const ADAPTER_ID: &str = "evolution-api";

/// Configuration for the Evolution API adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Gateway base URL, e.g. `https://whatsapp.loja.com.br`
    pub base_url: String,
    /// Global or instance API key, sent in the `apikey` header
    pub api_key: String,
    /// Default instance used for notifications
    pub instance: String,
    pub timeout_secs: u64,
    /// Attempts after the first one for transient failures
    pub retry_attempts: u32,
    pub initial_backoff_ms: u64,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            instance: "atacarejo".to_string(),
            timeout_secs: 15,
            retry_attempts: 3,
            initial_backoff_ms: 500,
            circuit_breaker: Some(CircuitBreakerConfig {
                failure_threshold: 5,
                success_threshold: 2,
                reset_timeout_secs: 60,
            }),
        }
    }
}

/// Circuit breaker state for fault tolerance
#[derive(Debug)]
struct CircuitBreaker {
    config: CircuitBreakerConfig,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    is_open: AtomicBool,
    last_failure_time: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
            last_failure_time: RwLock::new(None),
        }
    }

    async fn is_available(&self) -> bool {
        if !self.is_open.load(Ordering::Relaxed) {
            return true;
        }

        // Half-open once the reset timeout has elapsed
        let last_failure = self.last_failure_time.read().await;
        matches!(
            *last_failure,
            Some(time) if time.elapsed() > Duration::from_secs(self.config.reset_timeout_secs)
        )
    }

    fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if !self.is_open.load(Ordering::Relaxed) {
            return;
        }
        let success = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
        if success >= self.config.success_threshold as u64 {
            self.is_open.store(false, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }
    }

    async fn record_failure(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.failure_threshold as u64 {
            if !self.is_open.swap(true, Ordering::Relaxed) {
                warn!(adapter = ADAPTER_ID, failures, "circuit breaker opened");
            }
            *self.last_failure_time.write().await = Some(Instant::now());
        }
    }
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendTextResponse {
    key: Option<MessageKey>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageKey {
    id: Option<String>,
}

/// Evolution API adapter implementing [`MessagingPort`]
#[derive(Debug)]
pub struct EvolutionApiAdapter {
    config: EvolutionConfig,
    client: reqwest::Client,
    circuit_breaker: Option<CircuitBreaker>,
}

impl EvolutionApiAdapter {
    pub fn new(config: EvolutionConfig) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PortError::internal(format!("failed to build HTTP client: {e}")))?;
        let circuit_breaker = config.circuit_breaker.clone().map(CircuitBreaker::new);

        Ok(Self {
            config,
            client,
            circuit_breaker,
        })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Checks if the circuit breaker is open (blocking requests)
    pub async fn is_circuit_open(&self) -> bool {
        match &self.circuit_breaker {
            Some(cb) => !cb.is_available().await,
            None => false,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_once<T, R>(&self, path: &str, body: &T) -> Result<R, PortError>
    where
        T: Serialize + Sync,
        R: for<'de> Deserialize<'de> + Default,
    {
        let response = self
            .client
            .post(self.url(path))
            .header("apikey", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(path, e))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.map_transport_error(path, e))?;
            if bytes.is_empty() {
                return Ok(R::default());
            }
            return serde_json::from_slice(&bytes).map_err(|e| PortError::Transformation {
                message: format!("unexpected gateway response: {e}"),
            });
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let text = response.text().await.unwrap_or_default();
        Err(map_status(status, path, &text, retry_after))
    }

    /// POSTs with retry, backoff and circuit breaking
    async fn post<T, R>(&self, path: &str, body: &T) -> Result<R, PortError>
    where
        T: Serialize + Sync,
        R: for<'de> Deserialize<'de> + Default,
    {
        if let Some(cb) = &self.circuit_breaker {
            if !cb.is_available().await {
                return Err(PortError::ServiceUnavailable {
                    service: format!("{ADAPTER_ID} (circuit open)"),
                });
            }
        }

        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);
        let mut attempt = 0;
        loop {
            match self.post_once(path, body).await {
                Ok(value) => {
                    if let Some(cb) = &self.circuit_breaker {
                        cb.record_success();
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if error.is_transient() {
                        if let Some(cb) = &self.circuit_breaker {
                            cb.record_failure().await;
                        }
                    }
                    if !error.is_transient() || attempt >= self.config.retry_attempts {
                        return Err(error);
                    }
                    attempt += 1;
                    let wait = match &error {
                        PortError::RateLimited { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs).max(backoff)
                        }
                        _ => backoff,
                    };
                    warn!(path, attempt, wait_ms = wait.as_millis() as u64, error = %error, "retrying gateway call");
                    tokio::time::sleep(wait).await;
                    backoff = backoff.saturating_mul(2);
                }
            }
        }
    }

    fn map_transport_error(&self, path: &str, error: reqwest::Error) -> PortError {
        if error.is_timeout() {
            PortError::Timeout {
                operation: path.to_string(),
                duration_ms: self.config.timeout_secs * 1000,
            }
        } else if error.is_connect() {
            PortError::Connection {
                message: format!("cannot reach {ADAPTER_ID}"),
                source: Some(Box::new(error)),
            }
        } else {
            PortError::Internal {
                message: format!("{ADAPTER_ID} request failed"),
                source: Some(Box::new(error)),
            }
        }
    }
}

fn map_status(status: StatusCode, path: &str, body: &str, retry_after: Option<u64>) -> PortError {
    match status {
        StatusCode::NOT_FOUND => PortError::not_found("gateway resource", path),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized {
            message: format!("gateway rejected the API key ({status})"),
        },
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            PortError::validation(format!("gateway refused the message: {body}"))
        }
        s if s.is_server_error() => PortError::ServiceUnavailable {
            service: format!("{ADAPTER_ID} ({s})"),
        },
        s => PortError::internal(format!("unexpected gateway status {s}: {body}")),
    }
}

impl DomainPort for EvolutionApiAdapter {}

#[async_trait]
impl MessagingPort for EvolutionApiAdapter {
    #[instrument(skip(self, text), fields(to = %to.digits()))]
    async fn send_text(
        &self,
        instance: &str,
        to: &PhoneNumber,
        text: &str,
    ) -> Result<SendReceipt, PortError> {
        let request = SendTextRequest {
            number: to.digits(),
            text,
        };
        let response: SendTextResponse = self
            .post(&format!("message/sendText/{instance}"), &request)
            .await?;
        let receipt = SendReceipt {
            external_id: response.key.and_then(|k| k.id),
            status: response.status,
        };
        debug!(external_id = ?receipt.external_id, "message accepted by gateway");
        Ok(receipt)
    }
}

#[async_trait]
impl HealthCheckable for EvolutionApiAdapter {
    /// Queries the gateway root, which answers with its version
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();

        if self.is_circuit_open().await {
            return HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Degraded,
                latency_ms: 0,
                message: Some("Circuit breaker is open".to_string()),
                checked_at: Utc::now(),
            };
        }

        let result = self
            .client
            .get(self.url(""))
            .header("apikey", &self.config.api_key)
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let (status, message) = match result {
            Ok(response) if response.status().is_success() => (AdapterHealth::Healthy, None),
            Ok(response) => (
                AdapterHealth::Degraded,
                Some(format!("gateway answered {}", response.status())),
            ),
            Err(e) => (AdapterHealth::Unhealthy, Some(e.to_string())),
        };

        HealthCheckResult {
            adapter_id: ADAPTER_ID.to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EvolutionConfig::default();
        assert_eq!(config.retry_attempts, 3);
        assert!(config.circuit_breaker.is_some());
    }

    #[test]
    fn test_status_mapping() {
        assert!(map_status(StatusCode::NOT_FOUND, "x", "", None).is_not_found());
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "x", "", None),
            PortError::Unauthorized { .. }
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "x", "", Some(7)),
            PortError::RateLimited { retry_after_secs: 7 }
        ));
        assert!(map_status(StatusCode::BAD_GATEWAY, "x", "", None).is_transient());
        assert!(!map_status(StatusCode::BAD_REQUEST, "x", "", None).is_transient());
    }

    #[tokio::test]
    async fn test_breaker_opens_after_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout_secs: 3600,
        });
        cb.record_failure().await;
        assert!(cb.is_available().await);
        cb.record_failure().await;
        assert!(!cb.is_available().await);
    }

    #[tokio::test]
    async fn test_url_joining() {
        let adapter = EvolutionApiAdapter::new(EvolutionConfig {
            base_url: "http://gw.local/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(adapter.url("message/sendText/loja"), "http://gw.local/message/sendText/loja");
        assert!(!adapter.is_circuit_open().await);
    }
}
