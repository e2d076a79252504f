//! In-memory client for an [`App`].

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use serde::Serialize;

use covenant_server::App;

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Sends requests straight into an [`App`] without binding a port.
///
/// Requests pass through routing, validation, the handler and the error
/// boundary exactly as they would behind the server.
#[derive(Debug, Clone)]
#[must_use]
pub struct TestClient {
    app: Arc<App>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Wraps an app.
    pub fn new(app: App) -> Self {
        Self {
            app: Arc::new(app),
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The wrapped app.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::patch(uri))
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::delete(uri))
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    async fn dispatch(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let response = self.app.handle(request.into_http_request()?).await;
        TestResponse::from_http(response).await
    }
}

/// A request builder bound to a [`TestClient`].
#[derive(Debug)]
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, mut builder: TestRequestBuilder) -> Self {
        for (name, value) in &client.default_headers {
            builder = builder.header(name, value);
        }
        Self { client, builder }
    }

    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Appends a query pair.
    pub fn query(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.query(key, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the response cannot be read.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Sends the request.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be built or the response cannot be read.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.dispatch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{Contract, HandlerResponse, Handlers, Input, Operation, RequestContext, Schema};
    use covenant_server::EndpointConfig;
    use http::StatusCode;
    use serde_json::json;

    fn client() -> TestClient {
        let contract = Contract::builder()
            .operation(
                "echo",
                Operation::post("/echo/:id")
                    .path_params(Schema::object().field("id", Schema::string()))
                    .build(),
            )
            .build()
            .unwrap();
        let handlers = Handlers::new().handler_sync("echo", |input: Input, ctx: RequestContext| {
            Ok(HandlerResponse::ok(json!({
                "id": input.params["id"],
                "query": input.query,
                "body": input.body,
                "tenant": ctx.header("x-tenant"),
            })))
        });
        let mut app = App::new();
        app.mount(&contract, handlers, EndpointConfig::new()).unwrap();
        TestClient::new(app).with_default_header("x-tenant", "acme")
    }

    #[tokio::test]
    async fn test_round_trip_through_app() {
        let response = client()
            .post("/echo/7")
            .query("tag", "a")
            .json(&json!({"n": 1}))
            .send()
            .await;

        response.assert_status(StatusCode::OK).assert_json_eq(&json!({
            "id": "7",
            "query": {"tag": "a"},
            "body": {"n": 1},
            "tenant": "acme",
        }));
    }

    #[tokio::test]
    async fn test_unrouted_request() {
        let response = client().get("/missing").send().await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_try_send_reports_build_errors() {
        let result =
            tokio_test::block_on(client().get("/echo/1").header("bad header", "x").try_send());
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, TestError::InvalidHeader(_)));
    }
}
