// crates/network/src/client.rs
//! HTTP client for the shared document, with per-direction circuit breakers

use crate::error::{NetworkError, NetworkResult};
use crate::store::{PullOutcome, PushOutcome, RemoteStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{DATE, ETAG, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use timershare_core::{ClockSkewEstimator, ETag, SyncDocument};
use timershare_resilience::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};

/// HTTP client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Endpoint serving the shared document
    pub endpoint: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Bearer token sent with writes
    pub write_token: Option<String>,
    /// Breaker settings, applied to each direction
    pub circuit_breaker_config: CircuitBreakerConfig,
}

impl ClientConfig {
    /// Creates a configuration for `endpoint` with default timeouts
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Sets both timeouts
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    /// Sets the write token
    pub fn with_write_token(mut self, token: Option<String>) -> Self {
        self.write_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Sets the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the breaker settings
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            user_agent: format!("TimerShare/{}", env!("CARGO_PKG_VERSION")),
            write_token: None,
            circuit_breaker_config: CircuitBreakerConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("write_token", &self.write_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Conditional GET/POST client for the shared document
#[derive(Debug, Clone)]
pub struct HttpSyncClient {
    inner: ReqwestClient,
    config: ClientConfig,
    clock: Arc<ClockSkewEstimator>,
    read_breaker: CircuitBreaker,
    write_breaker: CircuitBreaker,
}

impl HttpSyncClient {
    /// Creates a new client
    pub fn new(config: ClientConfig, clock: Arc<ClockSkewEstimator>) -> NetworkResult<Self> {
        reqwest::Url::parse(&config.endpoint)
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", config.endpoint, e)))?;

        let inner = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let read_breaker =
            CircuitBreaker::new(config.circuit_breaker_config.clone()).with_name("read");
        let write_breaker =
            CircuitBreaker::new(config.circuit_breaker_config.clone()).with_name("write");

        Ok(Self {
            inner,
            config,
            clock,
            read_breaker,
            write_breaker,
        })
    }

    /// Returns the configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Read breaker state
    pub fn read_breaker(&self) -> BreakerSnapshot {
        self.read_breaker.snapshot()
    }

    /// Write breaker state
    pub fn write_breaker(&self) -> BreakerSnapshot {
        self.write_breaker.snapshot()
    }

    async fn fetch(&self, known: Option<&ETag>) -> NetworkResult<PullOutcome> {
        let mut request = self
            .inner
            .get(&self.config.endpoint)
            .header(DATE, http_date(self.clock.now()));
        if let Some(etag) = known {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = request.send().await?;
        self.observe_date(&response);

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(PullOutcome::Unchanged);
        }
        if status != StatusCode::OK {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let etag = etag_of(&response);
        let body = response.text().await?;
        let document = SyncDocument::from_json(&body)?;
        Ok(PullOutcome::Updated { document, etag })
    }

    async fn store(
        &self,
        document: &SyncDocument,
        expected: Option<&ETag>,
    ) -> NetworkResult<PushOutcome> {
        let mut request = self
            .inner
            .post(&self.config.endpoint)
            .header(DATE, http_date(self.clock.now()))
            .json(document);
        if let Some(etag) = expected {
            request = request.header(IF_MATCH, etag.as_str());
        }
        if let Some(token) = &self.config.write_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        self.observe_date(&response);

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(PushOutcome::Accepted {
                etag: etag_of(&response),
            }),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => Ok(PushOutcome::Conflict),
            other => Err(NetworkError::Status(other.as_u16())),
        }
    }

    fn observe_date(&self, response: &Response) {
        let header = response.headers().get(DATE).and_then(|v| v.to_str().ok());
        self.clock.observe(header);
    }
}

#[async_trait]
impl RemoteStore for HttpSyncClient {
    async fn pull(&self, known: Option<&ETag>) -> PullOutcome {
        if let Err(e) = self.read_breaker.can_proceed() {
            log::debug!("GET skipped: {}", e);
            return PullOutcome::Failed(e.into());
        }

        match self.fetch(known).await {
            Ok(outcome) => {
                self.read_breaker.record_success();
                outcome
            }
            Err(e) => {
                self.read_breaker.record_failure();
                log::warn!(
                    "GET failed ({}/{}): {}",
                    self.read_breaker.failure_count(),
                    self.config.circuit_breaker_config.failure_threshold(),
                    e
                );
                PullOutcome::Failed(e)
            }
        }
    }

    async fn push(&self, document: &SyncDocument, expected: Option<&ETag>) -> PushOutcome {
        if let Err(e) = self.write_breaker.can_proceed() {
            log::debug!("POST skipped: {}", e);
            return PushOutcome::Failed(e.into());
        }

        match self.store(document, expected).await {
            Ok(PushOutcome::Conflict) => {
                log::debug!("POST rejected: version conflict");
                PushOutcome::Conflict
            }
            Ok(outcome) => {
                self.write_breaker.record_success();
                outcome
            }
            Err(e) => {
                self.write_breaker.record_failure();
                log::warn!(
                    "POST failed ({}/{}): {}",
                    self.write_breaker.failure_count(),
                    self.config.circuit_breaker_config.failure_threshold(),
                    e
                );
                PushOutcome::Failed(e)
            }
        }
    }

    fn debug_metrics(&self) -> String {
        format!("CB[r={},w={}]", self.read_breaker(), self.write_breaker())
    }
}

/// Formats an instant as an RFC 1123 HTTP date
fn http_date(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn etag_of(response: &Response) -> Option<ETag> {
    ETag::from_header(response.headers().get(ETAG).and_then(|v| v.to_str().ok()))
}
