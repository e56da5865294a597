//! Capability implementations backed by real collaborators

use std::sync::Arc;
use std::time::Duration;

use ae_core::{codes, ErrorData, Event};
use ae_data::http::is_json_content_type;
use ae_data::{EmailData, HttpRequestData, HttpResponseData};
use ae_event_bus::EventBus;
use ae_providers::{EmailSender, EventPublisher, HttpClient};
use async_trait::async_trait;
use reqwest::{header, Client, Method, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::EngineResult;

// ==================== HTTP ====================

/// Outbound HTTP through reqwest
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> EngineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn parse_response(response: Response) -> Result<HttpResponseData, reqwest::Error> {
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let raw_body = response.text().await?;
        let content = if raw_body.is_empty() {
            None
        } else if content_type.as_deref().is_some_and(is_json_content_type) {
            Some(serde_json::from_str(&raw_body).unwrap_or(Value::String(raw_body)))
        } else {
            Some(Value::String(raw_body))
        };

        Ok(HttpResponseData {
            http_status_code: status.as_u16(),
            headers,
            content_type,
            content,
        })
    }
}

fn request_failed(url: &str, message: impl Into<String>) -> ErrorData {
    ErrorData::new(codes::PROVIDER_HTTP_FAILED, "HTTP request failed", message, 502)
        .with_detail(format!("URL: {}", url))
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        request: HttpRequestData,
        cancellation: &CancellationToken,
    ) -> Result<HttpResponseData, ErrorData> {
        let method = Method::from_bytes(request.http_verb.as_bytes()).map_err(|_| {
            request_failed(
                &request.url,
                format!("'{}' is not a valid HTTP verb.", request.http_verb),
            )
        })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(content) = &request.content {
            let content_type = request.content_type.as_deref().unwrap_or("application/json");
            let body = match content {
                Value::String(text) if !is_json_content_type(content_type) => text.clone(),
                other => other.to_string(),
            };
            builder = builder.header(header::CONTENT_TYPE, content_type).body(body);
        }

        debug!(verb = %request.http_verb, url = %request.url, "Sending outbound request");
        let response = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(ErrorData::cancelled()),
            response = builder.send() => response,
        };
        let response = response.map_err(|e| request_failed(&request.url, e.to_string()))?;
        Self::parse_response(response)
            .await
            .map_err(|e| request_failed(&request.url, e.to_string()))
    }
}

// ==================== Events ====================

/// Publishes raised events on the in-process bus
#[derive(Clone)]
pub struct EventBusPublisher {
    bus: Arc<EventBus>,
}

impl EventBusPublisher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl EventPublisher for EventBusPublisher {
    async fn publish(&self, event: Event) -> Result<(), ErrorData> {
        let delivered = self.bus.fire(event);
        debug!(delivered, "Published event");
        Ok(())
    }
}

// ==================== Email ====================

/// Writes emails to the log instead of delivering them
///
/// Used by `ae-run`, which has no mail transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: EmailData) -> Result<(), ErrorData> {
        info!(
            from = %email.from,
            to = ?email.to,
            subject = %email.subject,
            "Email not delivered, no transport configured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::{DeploymentEnvironment, TenantContext};
    use serde_json::json;

    #[tokio::test]
    async fn test_publisher_fires_on_bus() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe_all();
        let publisher = EventBusPublisher::new(bus);

        let ctx = TenantContext::new("acme", "motor", DeploymentEnvironment::Development);
        publisher
            .publish(Event::custom("quoteReviewed", json!({"id": 1}), ctx))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.custom_event_alias.as_deref(), Some("quoteReviewed"));
    }

    #[tokio::test]
    async fn test_invalid_verb_fails_before_sending() {
        let client = ReqwestHttpClient::new(Duration::from_secs(1)).unwrap();
        let err = client
            .send(
                HttpRequestData::new("NOT A VERB", "http://127.0.0.1:9/x"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::PROVIDER_HTTP_FAILED);
        assert!(err
            .additional_details
            .contains(&"URL: http://127.0.0.1:9/x".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let client = ReqwestHttpClient::new(Duration::from_secs(1)).unwrap();
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let err = client
            .send(HttpRequestData::new("GET", "http://10.255.255.1/x"), &cancellation)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::CANCELLED);
    }
}
