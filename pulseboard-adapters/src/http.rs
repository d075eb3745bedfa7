//! HTTP connection gateway.
//!
//! Delivers payloads through an external connection management API that keeps
//! the sockets itself (API-gateway style): `POST {endpoint}/@connections/{id}`
//! with the payload as the body. A `410 Gone` response means the connection no
//! longer exists and should be evicted.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulseboard_adapters::http::HttpGateway;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::builder()
//!     .endpoint("https://abc123.execute-api.eu-west-1.amazonaws.com/prod")
//!     .timeout(Duration::from_secs(5))
//!     .build()?;
//! # let _ = gateway;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use pulseboard_fanout::{ConnectionGateway, DeliveryError};
use pulseboard_types::ConnectionId;

use crate::AdapterError;

/// Gateway backed by a connection management HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpGateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> HttpGatewayBuilder {
        HttpGatewayBuilder::default()
    }

    /// `{endpoint}/@connections/{id}`, with the id percent-encoded as one segment.
    fn connection_url(&self, connection_id: &ConnectionId) -> Result<Url, DeliveryError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| DeliveryError::transient(connection_id, "endpoint cannot take a path"))?
            .pop_if_empty()
            .push("@connections")
            .push(connection_id.as_str());
        Ok(url)
    }
}

/// Map a response status to a delivery outcome.
fn classify(connection_id: &ConnectionId, status: StatusCode) -> Result<(), DeliveryError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::GONE {
        Err(DeliveryError::Gone(connection_id.clone()))
    } else {
        Err(DeliveryError::transient(
            connection_id,
            format!("API returned status {}", status),
        ))
    }
}

#[async_trait]
impl ConnectionGateway for HttpGateway {
    async fn post(&self, connection_id: &ConnectionId, payload: &[u8]) -> Result<(), DeliveryError> {
        let mut request = self
            .client
            .post(self.connection_url(connection_id)?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::transient(connection_id, e.to_string()))?;

        classify(connection_id, response.status())
    }
}

/// Builder for HttpGateway.
#[derive(Debug, Default)]
pub struct HttpGatewayBuilder {
    endpoint: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpGatewayBuilder {
    /// Set the management API base URL (default: "http://localhost:3001").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Send this bearer token with every request.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the per-request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<HttpGateway, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder().timeout(timeout).build()?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:3001".to_string());
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| AdapterError::Parse(format!("endpoint {}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(AdapterError::Parse(format!(
                "endpoint {} cannot take a path",
                endpoint
            )));
        }

        Ok(HttpGateway {
            client,
            endpoint,
            token: self.token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let gateway = HttpGateway::builder().build().unwrap();
        assert_eq!(gateway.endpoint.as_str(), "http://localhost:3001/");
        assert!(gateway.token.is_none());
    }

    #[test]
    fn test_builder_custom() {
        let gateway = HttpGateway::builder()
            .endpoint("https://api.example.com/prod/")
            .token("secret")
            .build()
            .unwrap();

        assert_eq!(gateway.endpoint.as_str(), "https://api.example.com/prod");
        assert_eq!(gateway.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_connection_url() {
        let gateway = HttpGateway::builder()
            .endpoint("https://api.example.com/prod")
            .build()
            .unwrap();

        let url = |id: &str| {
            gateway
                .connection_url(&ConnectionId::from(id))
                .unwrap()
                .to_string()
        };

        assert_eq!(
            url("Ab1/cD="),
            "https://api.example.com/prod/@connections/Ab1%2FcD="
        );
        assert_eq!(
            url("50% off#1?x y"),
            "https://api.example.com/prod/@connections/50%25%20off%231%3Fx%20y"
        );
    }

    #[test]
    fn connection_url_on_bare_host() {
        let gateway = HttpGateway::builder().build().unwrap();
        let url = gateway.connection_url(&ConnectionId::from("c1")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3001/@connections/c1");
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let err = HttpGateway::builder()
            .endpoint("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));

        let err = HttpGateway::builder()
            .endpoint("mailto:ops@example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[test]
    fn gone_status_means_evict() {
        let id = ConnectionId::from("c1");
        assert!(classify(&id, StatusCode::OK).is_ok());
        assert!(classify(&id, StatusCode::GONE).unwrap_err().is_gone());

        let err = classify(&id, StatusCode::INTERNAL_SERVER_ERROR).unwrap_err();
        assert!(!err.is_gone());
        assert!(err.to_string().contains("500"));
    }
}
