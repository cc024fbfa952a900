//! Activity endpoint client

use std::future::Future;

use activity_proto::config::EndpointConfig;
use activity_proto::protocol::{ActivityQuery, ActivityResponse, XHR_HEADER};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Something that can fetch the activity fragment once.
///
/// Non-2xx answers are not errors at this level; they come back as an
/// [`ActivityResponse`] so the caller can read the error body.
pub trait ActivitySource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<ActivityResponse, FetchError>> + Send;
}

/// `GET {base_url}{path}?type=html[&username=…]` over reqwest.
pub struct HttpActivitySource {
    client: reqwest::Client,
    url: String,
    query: ActivityQuery,
    send_xhr_header: bool,
}

impl HttpActivitySource {
    pub fn new(cfg: &EndpointConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.request_timeout())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            url: cfg.url(),
            query: ActivityQuery::new(cfg.username.clone()),
            send_xhr_header: cfg.send_xhr_header,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ActivitySource for HttpActivitySource {
    async fn fetch(&self) -> Result<ActivityResponse, FetchError> {
        let mut request = self
            .client
            .get(&self.url)
            .header("Accept", "text/html")
            .query(&self.query.pairs());
        if self.send_xhr_header {
            request = request.header(XHR_HEADER.0, XHR_HEADER.1);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        debug!("[http] {} -> {}", self.url, status);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: self.url.clone() }
            } else {
                FetchError::Body {
                    url: self.url.clone(),
                    source: e,
                }
            }
        })?;

        Ok(ActivityResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

impl HttpActivitySource {
    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout { url: self.url.clone() }
        } else {
            FetchError::Request {
                url: self.url.clone(),
                source: e,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{Html, IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn endpoint(base_url: String, username: Option<&str>) -> EndpointConfig {
        EndpointConfig {
            base_url,
            username: username.map(str::to_string),
            request_timeout_secs: 5,
            ..EndpointConfig::default()
        }
    }

    async fn echo(Query(params): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
        let user = params.get("username").cloned().unwrap_or_default();
        let kind = params.get("type").cloned().unwrap_or_default();
        let xhr = headers
            .get("x-requested-with")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Html(format!("<p data-type=\"{kind}\" data-user=\"{user}\" data-xhr=\"{xhr}\"></p>"))
            .into_response()
    }

    #[tokio::test]
    async fn test_query_and_header_are_sent() {
        let base = serve(Router::new().route("/api/me", get(echo))).await;
        let source = HttpActivitySource::new(&endpoint(base, Some("dj shadow & co"))).unwrap();

        let resp = source.fetch().await.unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("data-type=\"html\""));
        assert!(resp.body.contains("data-user=\"dj shadow & co\""));
        assert!(resp.body.contains("data-xhr=\"XMLHttpRequest\""));
    }

    #[tokio::test]
    async fn test_xhr_header_can_be_disabled() {
        let base = serve(Router::new().route("/api/me", get(echo))).await;
        let mut cfg = endpoint(base, None);
        cfg.send_xhr_header = false;
        let source = HttpActivitySource::new(&cfg).unwrap();

        let resp = source.fetch().await.unwrap();
        assert!(resp.body.contains("data-xhr=\"\""));
        assert!(resp.body.contains("data-user=\"\""));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        async fn unavailable() -> impl IntoResponse {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "unavailable" })),
            )
        }
        let base = serve(Router::new().route("/api/me", get(unavailable))).await;
        let source = HttpActivitySource::new(&endpoint(base, None)).unwrap();

        let resp = source.fetch().await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(!resp.is_success());
        assert_eq!(resp.reason.as_deref(), Some("Service Unavailable"));
        assert_eq!(resp.error_message(), "unavailable");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpActivitySource::new(&endpoint(format!("http://{}", addr), None)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }), "got {err:?}");
    }
}
