//! HTTP readiness probe.

use std::fmt;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, ClientBuilder, Method, StatusCode, Url};

use crate::error::WaitError;
use crate::wait::condition::Condition;

/// Lowest accepted status by default.
pub const DEFAULT_MIN_STATUS: u16 = 200;
/// Highest accepted status by default.
pub const DEFAULT_MAX_STATUS: u16 = 399;
/// Method used when none is configured.
pub const DEFAULT_HTTP_METHOD: &str = "HEAD";

/// Connect and read timeout of a single ping.
const HTTP_PING_TIMEOUT: Duration = Duration::from_millis(500);
/// Extra attempts after a transport failure within one check.
const HTTP_CLIENT_RETRIES: u32 = 0;

static STATUS_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*\.\.+\s*(\d+)$").expect("valid regex"));

/// Inclusive range of accepted response statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl StatusRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn single(status: u16) -> Self {
        Self::new(status, status)
    }

    pub fn contains(&self, status: u16) -> bool {
        (self.min..=self.max).contains(&status)
    }
}

impl Default for StatusRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_STATUS, DEFAULT_MAX_STATUS)
    }
}

impl FromStr for StatusRange {
    type Err = WaitError;

    /// Accepts a single code (`"302"`) or a range (`"200..399"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || WaitError::Configuration {
            reason: format!("invalid status pattern '{s}', expected 'NNN' or 'NNN..NNN'"),
        };

        let range = match STATUS_RANGE.captures(s) {
            Some(caps) => {
                let min = caps[1].parse().map_err(|_| invalid())?;
                let max = caps[2].parse().map_err(|_| invalid())?;
                Self::new(min, max)
            }
            None => Self::single(s.parse().map_err(|_| invalid())?),
        };

        if range.min > range.max {
            return Err(invalid());
        }
        Ok(range)
    }
}

impl fmt::Display for StatusRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..{}", self.min, self.max)
        }
    }
}

/// Pings a URL and is satisfied by a response status inside the accepted
/// range.
///
/// Connection failures and timeouts only mean "not yet". A
/// `501 Not Implemented` means the method itself is wrong, so it aborts the
/// wait with a configuration error instead.
pub struct HttpPing {
    /// As configured, for descriptions.
    raw_url: String,
    url: Url,
    method: Method,
    statuses: StatusRange,
    client: Mutex<Option<Client>>,
}

impl HttpPing {
    /// Ping `url` with `HEAD`, accepting 200..399.
    pub fn new(url: &str) -> Result<Self, WaitError> {
        let raw_url = url.to_string();
        let url = Url::parse(url).map_err(|e| WaitError::Configuration {
            reason: format!("invalid ping URL '{url}': {e}"),
        })?;

        Ok(Self {
            raw_url,
            url,
            method: Method::HEAD,
            statuses: StatusRange::default(),
            client: Mutex::new(None),
        })
    }

    /// Use another HTTP method (case-insensitive).
    pub fn with_method(mut self, method: &str) -> Result<Self, WaitError> {
        self.method = Method::from_bytes(method.trim().to_uppercase().as_bytes()).map_err(|_| {
            WaitError::Configuration {
                reason: format!("invalid HTTP method '{method}'"),
            }
        })?;
        Ok(self)
    }

    pub fn with_statuses(mut self, statuses: StatusRange) -> Self {
        self.statuses = statuses;
        self
    }

    /// Accept statuses given as `"302"` or `"200..399"`.
    pub fn with_status_pattern(self, pattern: &str) -> Result<Self, WaitError> {
        Ok(self.with_statuses(pattern.parse()?))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn statuses(&self) -> StatusRange {
        self.statuses
    }

    /// The shared client, created on first use.
    fn client(&self) -> Result<Client, WaitError> {
        let mut slot = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = build_client(
            Client::builder()
                .connect_timeout(HTTP_PING_TIMEOUT)
                .timeout(HTTP_PING_TIMEOUT),
        )?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Judge a response status.
    fn evaluate(&self, status: StatusCode) -> Result<bool, WaitError> {
        if status == StatusCode::NOT_IMPLEMENTED {
            return Err(WaitError::Configuration {
                reason: format!(
                    "Invalid or not supported HTTP method '{}' for checking {}",
                    self.method, self.raw_url
                ),
            });
        }
        Ok(self.statuses.contains(status.as_u16()))
    }
}

fn build_client(builder: ClientBuilder) -> Result<Client, WaitError> {
    builder.build().map_err(|e| WaitError::Configuration {
        reason: format!("failed to create HTTP client: {e}"),
    })
}

#[async_trait]
impl Condition for HttpPing {
    async fn check(&self) -> Result<bool, WaitError> {
        let client = self.client()?;
        let mut retries = HTTP_CLIENT_RETRIES;

        let response = loop {
            match client
                .request(self.method.clone(), self.url.clone())
                .send()
                .await
            {
                Ok(response) => break response,
                Err(e) => {
                    tracing::trace!("Ping to {} failed: {}", self.url, e);
                    if retries == 0 {
                        return Ok(false);
                    }
                    retries -= 1;
                }
            }
        };

        let status = response.status();
        tracing::trace!("Ping to {} answered {}", self.url, status);
        self.evaluate(status)
    }

    fn describe(&self) -> String {
        format!("http ping to '{}' with method '{}'", self.raw_url, self.method)
    }

    fn after(&self) {
        self.client
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}
