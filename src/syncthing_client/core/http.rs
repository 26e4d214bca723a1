use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::TrackerError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Authenticated access to one Syncthing REST API.
#[derive(Clone)]
pub struct HttpClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl HttpClient {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| TrackerError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Raw JSON from `endpoint` with the given query parameters.
    /// Bodies nested deeper than 128 levels are rejected as malformed.
    pub async fn fetch<Q>(&self, endpoint: &str, params: &Q) -> Result<Value, TrackerError>
    where
        Q: Serialize + ?Sized,
    {
        self.get_json_with_query(endpoint, params).await
    }

    pub async fn get_json<T>(&self, path: &str) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
    {
        self.get_json_with_query(path, &()).await
    }

    pub async fn get_json_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.http.get(self.url(path)).query(query);
        self.send_json(path, request).await
    }

    /// Same as [`get_json_with_query`](Self::get_json_with_query) with a
    /// per-request timeout, for long polls that outlast the default.
    pub async fn get_json_with_timeout<T, Q>(
        &self,
        path: &str,
        query: &Q,
        timeout: Duration,
    ) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.http.get(self.url(path)).query(query).timeout(timeout);
        self.send_json(path, request).await
    }

    pub async fn post<Q>(&self, path: &str, query: &Q) -> Result<(), TrackerError>
    where
        Q: Serialize + ?Sized,
    {
        let request = self.http.post(self.url(path)).query(query);
        self.send(path, request).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send_json<T>(&self, path: &str, request: RequestBuilder) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(path, request).await?;
        let body = response
            .bytes()
            .await
            .map_err(TrackerError::NetworkUnavailable)?;
        serde_json::from_slice(&body).map_err(|source| TrackerError::MalformedResponse {
            endpoint: path.to_string(),
            source,
        })
    }

    async fn send(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, TrackerError> {
        let response = request
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(TrackerError::NetworkUnavailable)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TrackerError::AuthenticationFailed {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(TrackerError::HttpStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HttpClient {
        HttpClient::new(Url::parse(&server.uri()).unwrap(), "secret").unwrap()
    }

    #[tokio::test]
    async fn fetch_sends_key_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/db/status"))
            .and(query_param("folder", "docs"))
            .and(header("X-API-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "idle"})))
            .expect(1)
            .mount(&server)
            .await;

        let value = client_for(&server)
            .await
            .fetch("/rest/db/status", &[("folder", "docs")])
            .await
            .unwrap();
        assert_eq!(value, json!({"state": "idle"}));
    }

    #[tokio::test]
    async fn rejected_key_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .get_json::<Value>("/rest/system/status")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::AuthenticationFailed { status: 403, .. }
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .get_json::<Value>("/rest/system/upgrade")
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::HttpStatus { status: 500, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invalid_body_is_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .get_json::<Value>("/rest/config")
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::MalformedResponse { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn nesting_beyond_decoder_limit_is_malformed() {
        let depth = 200;
        let body = format!("{}0{}", "{\"d\":".repeat(depth), "}".repeat(depth));
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch("/rest/db/browse", &[("folder", "deep")])
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();

        let client = HttpClient::new(url, "").unwrap();
        let err = client.get_json::<Value>("/rest/config").await.unwrap_err();
        assert!(matches!(err, TrackerError::NetworkUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn post_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/db/scan"))
            .and(query_param("folder", "docs"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .post("/rest/db/scan", &[("folder", "docs")])
            .await
            .unwrap();
    }
}
