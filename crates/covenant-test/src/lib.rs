//! In-memory HTTP testing for covenant apps.
//!
//! [`TestClient`] feeds requests straight into an
//! [`App`](covenant_server::App), so tests exercise routing, validation,
//! handlers and the error boundary without binding a port.
//!
//! ```rust,ignore
//! use covenant_test::TestClient;
//! use http::StatusCode;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_get_thing() {
//!     let client = TestClient::new(app());
//!
//!     let response = client
//!         .get("/things/42")
//!         .query("array", "x")
//!         .header("x-api-key", "secret")
//!         .send()
//!         .await;
//!
//!     response
//!         .assert_status(StatusCode::OK)
//!         .assert_json_eq(&json!({"id": "42"}));
//! }
//! ```

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
