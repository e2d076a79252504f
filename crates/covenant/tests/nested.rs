//! Nested contracts, typed handlers and the error boundary.

use covenant::prelude::*;
use covenant_test::TestClient;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct UserParams {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

#[derive(Debug, Serialize)]
struct User {
    id: String,
    name: String,
}

fn contract() -> Contract {
    let users = Contract::builder()
        .path_prefix("/users")
        .operation(
            "get",
            Operation::get("/:id")
                .path_params(Schema::object().field("id", Schema::string().min_length(2)))
                .response(200, Schema::object().field("id", Schema::string()).field("name", Schema::string()))
                .build(),
        )
        .operation(
            "create",
            Operation::post("")
                .body(Schema::object().field("name", Schema::string().min_length(1)))
                .response(201, Schema::object().field("id", Schema::string()).field("name", Schema::string()))
                .build(),
        )
        .build()
        .unwrap();

    Contract::builder()
        .path_prefix("/api")
        .router("users", users)
        .operation("conflict", Operation::get("/conflict").build())
        .operation("crash", Operation::get("/crash").build())
        .build()
        .unwrap()
}

fn handlers() -> Handlers {
    let users = Handlers::new()
        .handler(
            "get",
            |input: Input<UserParams>, ctx: RequestContext| async move {
                assert_eq!(ctx.operation_id(), Some("users.get"));
                if input.params.id == "missing" {
                    return Err(HandlerError::from(HttpError::not_found("no such user")));
                }
                HandlerResponse::json(
                    StatusCode::OK,
                    &User {
                        id: input.params.id,
                        name: "Ada".to_string(),
                    },
                )
            },
        )
        .handler(
            "create",
            |input: Input<Value, Value, Value, NewUser>, _ctx: RequestContext| async move {
                HandlerResponse::json(
                    StatusCode::CREATED,
                    &User {
                        id: "u1".to_string(),
                        name: input.body.name,
                    },
                )
            },
        );

    Handlers::new()
        .router("users", users)
        .handler_sync("conflict", |_input: Input, _ctx: RequestContext| {
            Err::<HandlerResponse, _>(
                HttpError::conflict("already exists")
                    .with_body(json!({"message": "already exists", "code": "DUPLICATE"}))
                    .into(),
            )
        })
        .handler_sync("crash", |_input: Input, _ctx: RequestContext| {
            Err::<HandlerResponse, _>(HandlerError::other(std::io::Error::other(
                "database unreachable",
            )))
        })
}

fn client() -> TestClient {
    let mut app = App::new();
    app.mount(&contract(), handlers(), EndpointConfig::new())
        .unwrap();
    TestClient::new(app)
}

// ==================== Nesting Tests ====================

#[test]
fn test_nested_paths_are_prefixed() {
    let client = client();
    let paths: Vec<&str> = client.app().routes().iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, ["/api/users/:id", "/api/users", "/api/conflict", "/api/crash"]);
}

#[test]
fn test_handler_where_router_expected() {
    let handlers = Handlers::new()
        .handler_sync("users", |_input: Input, _ctx: RequestContext| {
            Ok(HandlerResponse::empty(StatusCode::OK))
        })
        .handler_sync("conflict", |_input: Input, _ctx: RequestContext| {
            Ok(HandlerResponse::empty(StatusCode::OK))
        })
        .handler_sync("crash", |_input: Input, _ctx: RequestContext| {
            Ok(HandlerResponse::empty(StatusCode::OK))
        });
    let err = App::new()
        .mount(&contract(), handlers, EndpointConfig::new())
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ShapeMismatch { .. }));
}

#[tokio::test]
async fn test_typed_nested_handler() {
    let response = client().get("/api/users/u42").send().await;
    response
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({"id": "u42", "name": "Ada"}));
}

#[tokio::test]
async fn test_path_param_validation() {
    let response = client().get("/api/users/x").send().await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json_value().unwrap();
    assert!(body["errors"]["pathParams"]["id"].is_array());
    assert_eq!(body["errors"]["body"], Value::Null);
}

#[tokio::test]
async fn test_typed_body() {
    let response = client()
        .post("/api/users")
        .json(&json!({"name": "Grace"}))
        .send()
        .await;
    response
        .assert_status(StatusCode::CREATED)
        .assert_json_eq(&json!({"id": "u1", "name": "Grace"}));
}

#[tokio::test]
async fn test_body_validation_failure() {
    let response = client()
        .post("/api/users")
        .json(&json!({"name": ""}))
        .send()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json_value().unwrap();
    assert!(body["errors"]["body"]["name"].is_array());
}

// ==================== Error Boundary Tests ====================

#[tokio::test]
async fn test_http_error_renders_itself() {
    let response = client().get("/api/users/missing").send().await;
    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_json_eq(&json!({"message": "no such user"}));
}

#[tokio::test]
async fn test_http_error_with_body() {
    let response = client().get("/api/conflict").send().await;
    response
        .assert_status(StatusCode::CONFLICT)
        .assert_json_eq(&json!({"message": "already exists", "code": "DUPLICATE"}));
}

#[tokio::test]
async fn test_unstructured_error_becomes_500() {
    let response = client().get("/api/crash").send().await;
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_json_eq(&json!({"message": "database unreachable"}));
}
