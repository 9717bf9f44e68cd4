use restful_rust_core::operation::{Method, Outcome, Request, Transport};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// [`Transport`] over `reqwest`
///
/// Request URLs are paths appended to the base URL. `GET` and `DELETE` send
/// their params as a query string, other methods as a JSON body.
///
/// Outcomes:
/// - 2xx: `Ok(body)`, where an empty body is `null`
/// - other statuses: `Err({"status": code, "body": body})`
/// - network failures: `Err({"message": error})`
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    /// Transport against `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend unavailable).
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("github-profile/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Authenticate every request with a bearer token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: Request) -> Outcome {
        let url = format!("{}{}", self.base_url, request.url);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url).query(&request.params),
            Method::Delete => self.client.delete(&url).query(&request.params),
            Method::Put => self.client.put(&url).json(&request.params),
            Method::Patch => self.client.patch(&url).json(&request.params),
            Method::Post => self.client.post(&url).json(&request.params),
        };
        builder = builder.header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "GitHub request failed");
            json!({"message": e.to_string()})
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read GitHub response");
            json!({"status": status.as_u16(), "message": e.to_string()})
        })?;
        let body = parse_body(&text);

        debug!(status = status.as_u16(), "GitHub responded");
        if status.is_success() {
            Ok(body)
        } else {
            Err(json!({"status": status.as_u16(), "body": body}))
        }
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: Request) -> Pin<Box<dyn Future<Output = Outcome> + Send + '_>> {
        Box::pin(self.send(request))
    }
}

/// JSON body, `null` when empty, the raw text when not JSON
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
