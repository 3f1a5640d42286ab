//! HTTP backends: a JSON control-plane provider and a webhook alert channel.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime.
//!
//! Control-plane routes, relative to the configured endpoint:
//!
//! | call | route |
//! |---|---|
//! | `list_resources` | `GET /resources?kind=..&state=..` |
//! | `get_cost` | `GET /spend?start=..&end=..` |
//! | `stop_instance` | `POST /instances/{id}/stop` `{"force": bool}` |
//! | `terminate_instance` | `POST /instances/{id}/terminate` |
//! | `terminate_instances` | `POST /instances/terminate` `{"ids": [..]}` |
//! | `cancel_spot_requests` | `POST /spot-requests/cancel` `{"ids": [..]}` |
//! | `delete_volume` | `DELETE /volumes/{id}` |
//! | `delete_snapshot` | `DELETE /snapshots/{id}` |
//! | `write_tags` | `POST /resources/{id}/tags` `{"tags": {..}}` |

use async_trait::async_trait;
use costguard_core::{
    Alert, Resource, ResourceKind, ResourceState, SpendSnapshot, SpendWindow, TagSet,
    DEFAULT_CURRENCY,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use ureq::typestate::WithoutBody;

use crate::error::ProviderError;
use crate::traits::{AlertChannel, CloudProvider};

// ──────────────────────────────────────────────
// Request plumbing
// ──────────────────────────────────────────────

enum Method {
    Get,
    Delete,
    Post(serde_json::Value),
}

struct Request {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    /// Resource the request targets, for `NotFound`/`Rejected` errors.
    target: String,
}

impl Request {
    fn new(method: Method, url: String, target: impl Into<String>) -> Self {
        Request {
            method,
            url,
            query: Vec::new(),
            target: target.into(),
        }
    }

    fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

fn with_query_and_auth(
    mut builder: ureq::RequestBuilder<WithoutBody>,
    query: &[(String, String)],
    auth: Option<&str>,
) -> ureq::RequestBuilder<WithoutBody> {
    for (k, v) in query {
        builder = builder.query(k, v);
    }
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder
}

fn send(request: &Request, token: Option<&str>) -> Result<String, ureq::Error> {
    let agent = ureq::Agent::new_with_defaults();
    let auth = token.map(|t| format!("Bearer {}", t));
    let mut response = match &request.method {
        Method::Get => {
            with_query_and_auth(agent.get(&request.url), &request.query, auth.as_deref()).call()?
        }
        Method::Delete => with_query_and_auth(
            agent.delete(&request.url),
            &request.query,
            auth.as_deref(),
        )
        .call()?,
        Method::Post(body) => {
            let mut builder = agent.post(&request.url);
            if let Some(auth) = auth.as_deref() {
                builder = builder.header("Authorization", auth);
            }
            builder.send_json(body)?
        }
    };
    response.body_mut().read_to_string()
}

/// Map a transport or status error onto the provider taxonomy.
///
/// 404 is `NotFound`; 429 and 5xx are transient; any other 4xx is a
/// rejection of the targeted resource.
fn map_error(err: ureq::Error, target: &str) -> ProviderError {
    match err {
        ureq::Error::StatusCode(404) => ProviderError::NotFound {
            id: target.to_string(),
        },
        ureq::Error::StatusCode(code) if code == 429 || code >= 500 => {
            ProviderError::Unavailable(format!("HTTP {} for {}", code, target))
        }
        ureq::Error::StatusCode(code) => ProviderError::Rejected {
            id: target.to_string(),
            message: format!("HTTP {}", code),
        },
        other => ProviderError::Unavailable(other.to_string()),
    }
}

/// Decode a response body; an empty body decodes as JSON `null`.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text)
        .map_err(|e| ProviderError::Unavailable(format!("malformed provider response: {}", e)))
}

async fn execute<T>(request: Request, token: Option<String>) -> Result<T, ProviderError>
where
    T: DeserializeOwned + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let body = send(&request, token.as_deref()).map_err(|e| map_error(e, &request.target))?;
        decode(&body)
    })
    .await
    .map_err(|e| ProviderError::Unavailable(format!("task join error: {}", e)))?
}

// ──────────────────────────────────────────────
// HttpProvider
// ──────────────────────────────────────────────

#[derive(Deserialize)]
struct SpendBody {
    amount: Decimal,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Deserialize)]
struct CancelBody {
    cancelled: usize,
}

/// Cloud provider reached over a JSON control-plane API.
pub struct HttpProvider {
    base_url: String,
    token: Option<String>,
}

impl HttpProvider {
    /// Create a provider for `endpoint`, reading a bearer token from the
    /// `token_env` environment variable if it is set.
    pub fn new(endpoint: &str, token_env: &str) -> Self {
        HttpProvider {
            base_url: endpoint.trim_end_matches('/').to_string(),
            token: std::env::var(token_env).ok().filter(|t| !t.is_empty()),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn run<T>(&self, request: Request) -> Result<T, ProviderError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        execute(request, self.token.clone()).await
    }
}

fn rfc3339(at: time::OffsetDateTime) -> Result<String, ProviderError> {
    at.format(&Rfc3339)
        .map_err(|e| ProviderError::Unavailable(format!("cannot format timestamp: {}", e)))
}

#[async_trait]
impl CloudProvider for HttpProvider {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        states: &[ResourceState],
    ) -> Result<Vec<Resource>, ProviderError> {
        let mut request = Request::new(Method::Get, self.url("resources"), kind.as_str())
            .query("kind", kind.as_str());
        for state in states {
            request = request.query("state", state.as_str());
        }
        self.run(request).await
    }

    async fn get_cost(&self, window: &SpendWindow) -> Result<SpendSnapshot, ProviderError> {
        let request = Request::new(Method::Get, self.url("spend"), "spend")
            .query("start", rfc3339(window.start)?)
            .query("end", rfc3339(window.end)?);
        let body: SpendBody = self.run(request).await?;
        let currency = body
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        Ok(SpendSnapshot::new(*window, body.amount, currency))
    }

    async fn stop_instance(&self, id: &str, force: bool) -> Result<(), ProviderError> {
        let url = self.url(&format!("instances/{}/stop", id));
        self.run(Request::new(Method::Post(json!({ "force": force })), url, id))
            .await
    }

    async fn terminate_instance(&self, id: &str) -> Result<(), ProviderError> {
        let url = self.url(&format!("instances/{}/terminate", id));
        self.run(Request::new(Method::Post(json!({})), url, id)).await
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<(), ProviderError> {
        let url = self.url("instances/terminate");
        self.run(Request::new(
            Method::Post(json!({ "ids": ids })),
            url,
            ids.join(","),
        ))
        .await
    }

    async fn cancel_spot_requests(&self, ids: &[String]) -> Result<usize, ProviderError> {
        let url = self.url("spot-requests/cancel");
        let body: CancelBody = self
            .run(Request::new(
                Method::Post(json!({ "ids": ids })),
                url,
                ids.join(","),
            ))
            .await?;
        Ok(body.cancelled)
    }

    async fn delete_volume(&self, id: &str) -> Result<(), ProviderError> {
        let url = self.url(&format!("volumes/{}", id));
        self.run(Request::new(Method::Delete, url, id)).await
    }

    async fn delete_snapshot(&self, id: &str) -> Result<(), ProviderError> {
        let url = self.url(&format!("snapshots/{}", id));
        self.run(Request::new(Method::Delete, url, id)).await
    }

    async fn write_tags(&self, id: &str, tags: &TagSet) -> Result<(), ProviderError> {
        let url = self.url(&format!("resources/{}/tags", id));
        self.run(Request::new(Method::Post(json!({ "tags": tags })), url, id))
            .await
    }
}

// ──────────────────────────────────────────────
// WebhookAlertChannel
// ──────────────────────────────────────────────

/// Posts alerts as JSON `{topic, severity, subject, message}` to a webhook.
pub struct WebhookAlertChannel {
    url: String,
}

impl WebhookAlertChannel {
    pub fn new(url: impl Into<String>) -> Self {
        WebhookAlertChannel { url: url.into() }
    }
}

#[async_trait]
impl AlertChannel for WebhookAlertChannel {
    async fn publish(&self, topic: &str, alert: &Alert) -> Result<(), ProviderError> {
        let body = json!({
            "topic": topic,
            "severity": alert.severity,
            "subject": alert.subject,
            "message": alert.message,
        });
        let request = Request::new(Method::Post(body), self.url.clone(), topic);
        let _: serde_json::Value = execute(request, None).await?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let provider = HttpProvider::new("http://cp.local/v1/", "COSTGUARD_TEST_UNSET_TOKEN");
        assert_eq!(
            provider.url("/instances/i-1/stop"),
            "http://cp.local/v1/instances/i-1/stop"
        );
        assert_eq!(provider.url("spend"), "http://cp.local/v1/spend");
    }

    #[test]
    fn unset_token_env_means_no_token() {
        let provider = HttpProvider::new("http://cp.local", "COSTGUARD_TEST_UNSET_TOKEN");
        assert_eq!(provider.token, None);
        let provider = provider.with_token("abc");
        assert_eq!(provider.token.as_deref(), Some("abc"));
    }

    #[test]
    fn status_codes_map_to_taxonomy() {
        assert_eq!(
            map_error(ureq::Error::StatusCode(404), "i-1"),
            ProviderError::NotFound { id: "i-1".into() }
        );
        assert!(matches!(
            map_error(ureq::Error::StatusCode(503), "i-1"),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            map_error(ureq::Error::StatusCode(429), "i-1"),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            map_error(ureq::Error::StatusCode(403), "i-1"),
            ProviderError::Rejected { .. }
        ));
    }

    #[test]
    fn empty_body_decodes_as_unit() {
        let unit: () = decode("").unwrap();
        assert_eq!(unit, ());
        assert!(decode::<Vec<Resource>>("{not json").is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let provider = HttpProvider::new("http://127.0.0.1:1", "COSTGUARD_TEST_UNSET_TOKEN");
        let err = provider
            .list_resources(ResourceKind::ComputeInstance, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
