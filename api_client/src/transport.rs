use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::{ApiClientError, RpcMethod};

pub const DEFAULT_PACKAGE: &str = "abelanav2";
pub const DEFAULT_INTERFACE: &str = "Abelana";

/// Carries an encoded request to the server and returns the encoded reply.
///
/// `auth_token` is attached as the call's credential when present; calls
/// without a token are still sent and the server decides.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        method: RpcMethod,
        request: Vec<u8>,
        auth_token: Option<&str>,
    ) -> Result<Vec<u8>, ApiClientError>;
}

/// JSON-over-HTTP transport. Each method is a `POST` to
/// `{base_url}/{package}.{interface}/{method}`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    package: String,
    interface: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            package: DEFAULT_PACKAGE.to_string(),
            interface: DEFAULT_INTERFACE.to_string(),
        }
    }

    pub fn with_service(mut self, package: impl Into<String>, interface: impl Into<String>) -> Self {
        self.package = package.into();
        self.interface = interface.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ApiClientError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiClientError::Other(e.to_string()))?;
        Ok(self)
    }

    pub fn method_url(&self, method: RpcMethod) -> String {
        format!("{}/{}.{}/{}", self.base_url, self.package, self.interface, method.as_str())
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, request, auth_token)))]
    async fn call(
        &self,
        method: RpcMethod,
        request: Vec<u8>,
        auth_token: Option<&str>,
    ) -> Result<Vec<u8>, ApiClientError> {
        let url = self.method_url(method);
        tracing::debug!(method = method.as_str(), bytes = request.len(), "dispatching call");

        let mut builder = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(request);
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            builder = builder.header(AUTHORIZATION, token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiClientError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiClientError::ServerError { status: status.as_u16(), body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiClientError::RequestError(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let transport = HttpTransport::new("http://localhost:50051/");
        assert_eq!(
            transport.method_url(RpcMethod::PhotoStream),
            "http://localhost:50051/abelanav2.Abelana/PhotoStream"
        );
        let transport = transport.with_service("pkg", "Svc");
        assert_eq!(transport.method_url(RpcMethod::SignIn), "http://localhost:50051/pkg.Svc/SignIn");
    }
}
