use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    config::Settings,
    error::{Error, PlaygroundResult},
    models::{EvaluationOutcome, EvaluationRequest, RawEvaluationResponse, VersionResponse},
};

pub const EXPRESSION_PATH: &str = "/api/v1/feel/evaluate";
pub const UNARY_TESTS_PATH: &str = "/api/v1/feel-unary-tests/evaluate";
pub const VERSION_PATH: &str = "/api/v1/version";

pub const UNKNOWN_VERSION: &str = "?";

/// Remote evaluation of expressions.
#[mockall::automock]
#[async_trait]
pub trait EvaluationService: Send + Sync {
    /// Sends one request and decodes the answer into a tagged outcome.
    ///
    /// Engine-side failures are `Ok(EvaluationOutcome::Failure(..))`; `Err` is
    /// reserved for requests that did not complete.
    async fn evaluate(&self, request: &EvaluationRequest) -> PlaygroundResult<EvaluationOutcome>;

    /// Version of the engine behind the service, if it reports one.
    async fn engine_version(&self) -> PlaygroundResult<Option<String>>;
}

/// HTTP client for the playground evaluation service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.api_url, settings.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout.as_millis())
        } else {
            Error::from(err)
        }
    }

    #[tracing::instrument(skip(self, body))]
    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> PlaygroundResult<EvaluationOutcome> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "*/*")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!("Response {} from {}", status, url);

        decode_evaluation_response(status, &text)
    }
}

/// Classifies a response body; an `error` field wins over the status code.
fn decode_evaluation_response(
    status: StatusCode,
    body: &str,
) -> PlaygroundResult<EvaluationOutcome> {
    match serde_json::from_str::<RawEvaluationResponse>(body) {
        Ok(raw) if raw.error.is_some() || status.is_success() => Ok(raw.into()),
        Err(e) if status.is_success() => Err(Error::Decode(e.to_string())),
        _ => {
            warn!("Evaluation service returned {}", status);
            Err(Error::Status {
                status: status.as_u16(),
                body: body.to_string(),
            })
        }
    }
}

#[async_trait]
impl EvaluationService for ApiClient {
    async fn evaluate(&self, request: &EvaluationRequest) -> PlaygroundResult<EvaluationOutcome> {
        match request {
            EvaluationRequest::Expression(body) => self.post(EXPRESSION_PATH, body).await,
            EvaluationRequest::UnaryTests(body) => self.post(UNARY_TESTS_PATH, body).await,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn engine_version(&self) -> PlaygroundResult<Option<String>> {
        let response = self
            .client
            .get(self.endpoint(VERSION_PATH))
            .header(ACCEPT, "*/*")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status() {
            status if status.is_success() => {
                let version = response
                    .json::<VersionResponse>()
                    .await
                    .map_err(|e| self.transport_error(e))?;
                Ok(version.feel_engine_version)
            }
            status => Err(Error::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Engine version of `service`, `?` when it is unknown or unreachable.
pub async fn engine_version_or_unknown(service: &dyn EvaluationService) -> String {
    match service.engine_version().await {
        Ok(Some(version)) => version,
        Ok(None) => UNKNOWN_VERSION.to_string(),
        Err(e) => {
            warn!("Failed to load engine version: {}", e);
            UNKNOWN_VERSION.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpressionRequest, FailureKind, UnaryTestsRequest};
    use mockito::Matcher;
    use serde_json::{Map, Value, json};

    fn expression_request(expression: &str, context: Value) -> EvaluationRequest {
        EvaluationRequest::Expression(ExpressionRequest {
            expression: expression.to_string(),
            context: context.as_object().cloned().unwrap_or_default(),
            metadata: json!({"page": "test"}).as_object().cloned().unwrap(),
        })
    }

    #[tokio::test]
    async fn test_evaluate_posts_wire_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", EXPRESSION_PATH)
            .match_header("accept", "*/*")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "expression": "x + y",
                "context": {"x": 2, "y": 3},
                "metadata": {"page": "test"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": 5, "warnings": []}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Duration::from_secs(5));
        let outcome = client
            .evaluate(&expression_request("x + y", json!({"x": 2, "y": 3})))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            outcome,
            EvaluationOutcome::Success {
                value: json!(5),
                warnings: vec![]
            }
        );
    }

    #[tokio::test]
    async fn test_unary_tests_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", UNARY_TESTS_PATH)
            .match_body(Matcher::PartialJson(json!({"inputValue": 3})))
            .with_status(200)
            .with_body(r#"{"result": true, "warnings": []}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/", server.url()), Duration::from_secs(5));
        let outcome = client
            .evaluate(&EvaluationRequest::UnaryTests(UnaryTestsRequest {
                expression: "< 5".to_string(),
                input_value: json!(3),
                context: Map::new(),
                metadata: Map::new(),
            }))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(matches!(outcome, EvaluationOutcome::Success { value: Value::Bool(true), .. }));
    }

    #[tokio::test]
    async fn test_error_body_is_evaluation_failure_even_on_4xx() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", EXPRESSION_PATH)
            .with_status(400)
            .with_body(r#"{"error": "failed to parse expression '1+' at 1:5", "warnings": []}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Duration::from_secs(5));
        let outcome = client
            .evaluate(&expression_request("1+", json!({})))
            .await
            .unwrap();

        let EvaluationOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, FailureKind::Evaluation);
        assert_eq!(failure.line, Some(1));
        assert_eq!(failure.position, Some(5));
    }

    #[tokio::test]
    async fn test_server_error_without_body_is_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", EXPRESSION_PATH)
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Duration::from_secs(5));
        let err = client
            .evaluate(&expression_request("1", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Status { status: 502, .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Nothing listens on port 9 of localhost
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2));
        let err = client
            .evaluate(&expression_request("1", json!({})))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_engine_version() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", VERSION_PATH)
            .with_status(200)
            .with_body(r#"{"feelEngineVersion": "1.17.0"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Duration::from_secs(5));
        assert_eq!(
            client.engine_version().await.unwrap(),
            Some("1.17.0".to_string())
        );
    }

    #[test]
    fn test_decode_success_with_invalid_body() {
        let err = decode_evaluation_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
