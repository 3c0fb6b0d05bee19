//! Outbound webhook delivery.
//!
//! Two retry layers exist. The transport layer retries inside a single
//! [`WebhookSender::send`] when the target answers with a retryable status
//! (429, 500, 502, 503, 504 by default) and the method is POST, PUT or
//! PATCH. The caller-visible layer, [`WebhookSender::send_with_retry`],
//! repeats whole `send` calls until one succeeds.
//!
//! The layers nest: with `max_retries = 3` and `max_attempts = 3` a target
//! that keeps answering 503 sees up to 12 requests. Both layers share one
//! [`Deadline`] per logical delivery (`SenderConfig::max_elapsed`, 60s by
//! default), and no retry of either layer is scheduled past it.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER, USER_AGENT};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::delivery::{BatchDeliveryResult, DeliveryResult};
use crate::envelope::Payload;
use crate::error::{WebhookError, WebhookResult};
use crate::retry::{Deadline, ExponentialBackoff, LinearBackoff, RetryStrategy};

/// Header carrying the shared secret, in wire form.
const SECRET_HEADER_NAME: HeaderName = HeaderName::from_static("x-webhook-secret");

/// Default `User-Agent` sent with every delivery.
pub const DEFAULT_USER_AGENT: &str = concat!("webhook-relay/", env!("CARGO_PKG_VERSION"));

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transport-level retries inside one `send`.
    pub max_retries: u32,
    /// Backoff factor shared by both retry layers.
    pub retry_backoff: Duration,
    /// Longest transport-level delay, `Retry-After` included.
    pub max_retry_delay: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Statuses that trigger a transport-level retry.
    pub retry_statuses: Vec<u16>,
    /// Methods eligible for transport-level retry.
    pub retry_methods: Vec<Method>,
    /// Pause between consecutive targets of a batch.
    pub batch_delay: Duration,
    /// Ceiling on the wall-clock time of one logical delivery.
    pub max_elapsed: Option<Duration>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(120),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry_statuses: vec![429, 500, 502, 503, 504],
            retry_methods: vec![Method::POST, Method::PUT, Method::PATCH],
            batch_delay: Duration::from_millis(100),
            max_elapsed: Some(Duration::from_secs(60)),
        }
    }
}

impl SenderConfig {
    /// Creates a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transport-level retry count.
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Sets the backoff factor.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Caps any single transport retry wait, including `Retry-After`.
    pub fn max_retry_delay(mut self, max: Duration) -> Self {
        self.max_retry_delay = max;
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the pause between batch targets.
    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Sets the delivery deadline. `None` removes the ceiling.
    pub fn max_elapsed(mut self, limit: Option<Duration>) -> Self {
        self.max_elapsed = limit;
        self
    }

    fn transport_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new()
            .base(self.retry_backoff)
            .max_delay(self.max_retry_delay)
            .max_attempts(self.max_retries)
    }

    fn deadline(&self) -> Deadline {
        self.max_elapsed
            .map(Deadline::after)
            .unwrap_or_else(Deadline::unbounded)
    }
}

/// Per-call options for a delivery.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Extra headers; they win over the defaults.
    pub headers: Vec<(String, String)>,
    /// Shared secret sent as `X-Webhook-Secret` and `Authorization: Bearer`.
    pub secret: Option<String>,
    /// HTTP method.
    pub method: Method,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            secret: None,
            method: Method::POST,
        }
    }
}

impl SendOptions {
    /// Creates options for a plain POST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the shared secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the shared secret if one is given.
    pub fn maybe_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Sets the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// HTTP client delivering payloads to webhook targets.
///
/// Never returns an error from a delivery: every failure is captured in the
/// [`DeliveryResult`].
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    config: SenderConfig,
}

impl WebhookSender {
    /// Creates a sender.
    pub fn new(config: SenderConfig) -> WebhookResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WebhookError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Delivers `data` to `url` once, with transport-level retries.
    pub async fn send(&self, url: &str, data: &Payload, options: &SendOptions) -> DeliveryResult {
        let deadline = self.config.deadline();
        self.send_within(url, data, options, &deadline).await
    }

    /// Delivers `data` to every URL in order, one after another.
    ///
    /// A failure never stops the batch; there is one result per URL.
    pub async fn send_batch<U>(&self, urls: &[U], data: &Payload, options: &SendOptions) -> Vec<BatchDeliveryResult>
    where
        U: AsRef<str>,
    {
        info!(targets = urls.len(), "Sending webhook batch");

        let mut results = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            if index > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let url = url.as_ref();
            let result = self.send(url, data, options).await;
            results.push(BatchDeliveryResult::new(url, result));
        }

        let succeeded = results.iter().filter(|r| r.success()).count();
        info!(succeeded, targets = urls.len(), "Webhook batch finished");

        results
    }

    /// Repeats `send` until it succeeds or `max_attempts` calls were made.
    ///
    /// The wait after attempt `n` is `retry_backoff * n`. Returns the last
    /// attempt's result when every attempt fails. `max_attempts` of zero is
    /// treated as one.
    pub async fn send_with_retry(
        &self,
        url: &str,
        data: &Payload,
        options: &SendOptions,
        max_attempts: u32,
    ) -> DeliveryResult {
        let max_attempts = max_attempts.max(1);
        let deadline = self.config.deadline();
        let policy = LinearBackoff::new()
            .base(self.config.retry_backoff)
            .max_attempts(max_attempts);

        let mut attempt = 1;
        loop {
            info!(url, attempt, max_attempts, "Webhook delivery attempt");
            let result = self.send_within(url, data, options, &deadline).await;

            if result.success {
                info!(url, attempt, "Webhook delivered");
                return result;
            }

            if attempt >= max_attempts {
                error!(url, attempts = max_attempts, error = ?result.error, "Webhook delivery failed on every attempt");
                return result;
            }

            let Some(delay) = policy.next_delay(attempt - 1) else {
                return result;
            };

            if !deadline.allows(delay) {
                warn!(url, attempt, "Delivery deadline reached, giving up");
                return result;
            }

            warn!(url, attempt, delay_ms = delay.as_millis() as u64, "Webhook delivery failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn send_within(
        &self,
        url: &str,
        data: &Payload,
        options: &SendOptions,
        deadline: &Deadline,
    ) -> DeliveryResult {
        let start = Instant::now();

        let (headers, body) = match self.prepare(data, options) {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(url, error = %err, "Could not build webhook request");
                return DeliveryResult::from_error(&err, start.elapsed(), 0);
            }
        };

        info!(url, method = %options.method, "Sending webhook");
        debug!(url, payload = %serde_json::Value::Object(data.clone()), "Webhook payload");

        let policy = self.config.transport_policy();
        let retryable_method = self.config.retry_methods.contains(&options.method);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .request(options.method.clone(), url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    let err = WebhookError::from(err);
                    error!(url, error = %err, "Webhook request failed");
                    return DeliveryResult::from_error(&err, start.elapsed(), attempts);
                }
            };

            let status = response.status().as_u16();

            if retryable_method && self.config.retry_statuses.contains(&status) {
                if let Some(delay) = policy.next_delay(attempts - 1) {
                    let delay = retry_after(status, response.headers())
                        .map(|wait| wait.min(self.config.max_retry_delay))
                        .unwrap_or(delay);

                    if deadline.allows(delay) {
                        warn!(url, status, retry = attempts, delay_ms = delay.as_millis() as u64, "Retryable status, retrying");
                        drop(response);
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    debug!(url, status, "Delivery deadline reached, not retrying");
                }
            }

            let text = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    let err = WebhookError::from(err);
                    error!(url, status, error = %err, "Failed to read webhook response");
                    return DeliveryResult::from_error(&err, start.elapsed(), attempts);
                }
            };

            let result = DeliveryResult::from_response(status, &text, start.elapsed(), attempts);
            if result.success {
                info!(url, status, elapsed = result.elapsed_seconds, "Webhook response");
            } else {
                warn!(url, status, elapsed = result.elapsed_seconds, "Webhook rejected");
            }
            return result;
        }
    }

    fn prepare(&self, data: &Payload, options: &SendOptions) -> WebhookResult<(HeaderMap, Bytes)> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, header_value(&self.config.user_agent)?);

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WebhookError::ConfigError(format!("invalid header name {name:?}: {e}")))?;
            headers.insert(name, header_value(value)?);
        }

        if let Some(secret) = &options.secret {
            headers.insert(SECRET_HEADER_NAME, header_value(secret)?);
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {secret}"))?);
        }

        let body = serde_json::to_vec(data)?;
        Ok((headers, Bytes::from(body)))
    }
}

fn header_value(value: &str) -> WebhookResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| WebhookError::ConfigError(format!("invalid header value: {e}")))
}

/// Reads a `Retry-After` given in seconds on 429 and 503 responses.
fn retry_after(status: u16, headers: &HeaderMap) -> Option<Duration> {
    if status != 429 && status != 503 {
        return None;
    }

    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
