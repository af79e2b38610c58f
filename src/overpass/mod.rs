pub mod config;
pub mod error;
pub mod limiter;
pub mod queries;
pub mod retry;
pub mod types;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use config::OverpassConfig;
use error::{OverpassError, OverpassResult};
use limiter::RateLimiter;
use retry::{with_retry, Attempt, RetryError, RetryPolicy};
use types::OverpassResponse;

/// Rejected response bodies are cut to this many characters.
const BODY_EXCERPT_CHARS: usize = 500;

/// Anything that can run an Overpass QL query. The pipeline depends on this
/// rather than on the HTTP client directly.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> OverpassResult<OverpassResponse>;
}

/// Rate-limited, retrying Overpass HTTP client.
///
/// Must be `init()`ed before use and `close()`d on shutdown; calls outside
/// that window fail with [`OverpassError::NotInitialized`].
pub struct OverpassClient {
    config: OverpassConfig,
    http: RwLock<Option<reqwest::Client>>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl OverpassClient {
    pub fn new(config: OverpassConfig) -> Self {
        let limiter = RateLimiter::per_second(config.rps_limit);
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_backoff);
        Self {
            config,
            http: RwLock::new(None),
            limiter,
            retry,
        }
    }

    pub async fn init(&self) -> OverpassResult<()> {
        let mut http = self.http.write().await;
        if http.is_some() {
            warn!("OverpassClient.init() called but already initialized");
            return Ok(());
        }

        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()?;
        *http = Some(client);

        info!(
            base_url = %self.config.base_url,
            timeout_s = self.config.timeout.as_secs_f64(),
            rps_limit = self.config.rps_limit,
            "OverpassClient initialized"
        );
        Ok(())
    }

    pub async fn close(&self) {
        let mut http = self.http.write().await;
        if http.take().is_none() {
            warn!("OverpassClient.close() called but not initialized");
            return;
        }
        info!("OverpassClient closed");
    }

    #[cfg(test)]
    pub async fn is_initialized(&self) -> bool {
        self.http.read().await.is_some()
    }

    async fn require_http(&self) -> OverpassResult<reqwest::Client> {
        self.http
            .read()
            .await
            .clone()
            .ok_or(OverpassError::NotInitialized)
    }

    /// Run an Overpass QL query and return the parsed JSON response.
    pub async fn execute(&self, query: &str) -> OverpassResult<OverpassResponse> {
        let http = self.require_http().await?;
        let url = self.config.endpoint();
        let (http, url) = (&http, url.as_str());

        let result = with_retry(&self.retry, move |attempt| async move {
            self.limiter.acquire().await;
            debug!(attempt, url, "HTTP POST");
            send_once(http, url, query).await
        })
        .await;

        match result {
            Ok(resp) => Ok(resp),
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(attempts, error = %last, "Overpass connection/timeout error");
                Err(OverpassError::Unavailable {
                    attempts,
                    reason: last.to_string(),
                })
            }
            Err(RetryError::Terminal(err)) => {
                error!(error = %err, "Overpass request failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for OverpassClient {
    async fn execute(&self, query: &str) -> OverpassResult<OverpassResponse> {
        OverpassClient::execute(self, query).await
    }
}

/// One POST to the interpreter, classified for the retry loop.
async fn send_once(
    http: &reqwest::Client,
    url: &str,
    query: &str,
) -> Attempt<OverpassResponse, OverpassError> {
    // Overpass expects the query in the `data` form field.
    let resp = match http.post(url).form(&[("data", query)]).send().await {
        Ok(resp) => resp,
        Err(e) => return classify_transport(e),
    };

    let status = resp.status();
    let text = match resp.text().await {
        Ok(text) => text,
        Err(e) => return classify_transport(e),
    };

    if !status.is_success() {
        return Attempt::Terminal(OverpassError::Rejected {
            status: status.as_u16(),
            body: excerpt(&text),
        });
    }
    debug!(url, status = status.as_u16(), bytes = text.len(), "HTTP POST done");

    match parse_response(&text) {
        Ok(parsed) => Attempt::Success(parsed),
        Err(e) => Attempt::Terminal(e),
    }
}

fn classify_transport(e: reqwest::Error) -> Attempt<OverpassResponse, OverpassError> {
    let err = OverpassError::Transport(e);
    if err.is_transient() {
        Attempt::Retryable(err)
    } else {
        Attempt::Terminal(err)
    }
}

fn parse_response(text: &str) -> OverpassResult<OverpassResponse> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| OverpassError::Malformed(format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(OverpassError::Malformed(format!(
            "expected a JSON object, got: {}",
            excerpt(text)
        )));
    }
    serde_json::from_value(value)
        .map_err(|e| OverpassError::Malformed(format!("unexpected shape: {}", e)))
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT_CHARS).collect()
}
