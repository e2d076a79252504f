//! End-to-end behaviour of a small "things" service.

use covenant::prelude::*;
use covenant::server::OPERATION_ID_KEY;
use covenant_test::TestClient;
use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
struct ThingParams {
    id: String,
}

fn contract() -> Contract {
    Contract::builder()
        .operation(
            "deleteThing",
            Operation::delete("/things/:id")
                .summary("Delete a thing")
                .response(200, Schema::null())
                .build(),
        )
        .operation(
            "getThing",
            Operation::get("/things/:id")
                .summary("Get a thing")
                .query(
                    Schema::object()
                        .field("array_brackets[]", Schema::array(Schema::string()).optional())
                        .field("not_array", Schema::string().optional())
                        .field("array", Schema::array(Schema::string()).optional()),
                )
                .response(
                    200,
                    Schema::object()
                        .field("id", Schema::string())
                        .field("env", Schema::any().optional())
                        .field("auth_token", Schema::string().optional())
                        .field("operationId", Schema::string())
                        .field("status", Schema::string())
                        .field("validatedQueryParams", Schema::any().optional())
                        .field("rawQuery", Schema::any().optional())
                        .field("rawQueries", Schema::any().optional())
                        .field("pathParams", Schema::any().optional()),
                )
                .build(),
        )
        .operation(
            "createThing",
            Operation::post("/things")
                .summary("Create a thing")
                .body(
                    Schema::object().field(
                        "data",
                        Schema::array(
                            Schema::object()
                                .field("name", Schema::string())
                                .field("other", Schema::number()),
                        ),
                    ),
                )
                .response(200, Schema::object().field("ok", Schema::boolean()))
                .response(
                    400,
                    Schema::object()
                        .field("message", Schema::string())
                        .field("banana", Schema::string()),
                )
                .build(),
        )
        .operation(
            "getSyncReturn",
            Operation::get("/sync")
                .summary("Sometimes you don't need to wait")
                .response(200, status_schema())
                .build(),
        )
        .operation(
            "getEarlyReturn",
            Operation::get("/early")
                .summary("Sometimes you gotta return early")
                .response(200, status_schema())
                .build(),
        )
        .operation(
            "headersRequired",
            Operation::get("/headers")
                .headers(Schema::object().field("x-thing", Schema::string()))
                .response(200, Schema::literal("ok"))
                .build(),
        )
        .operation(
            "invalidResponse",
            Operation::get("/invalid-response")
                .response(200, Schema::object().field("ok", Schema::boolean()))
                .build(),
        )
        .build()
        .unwrap()
}

fn status_schema() -> Schema {
    Schema::object()
        .field("id", Schema::string())
        .field("env", Schema::any().optional())
        .field("auth_token", Schema::string().optional())
        .field("status", Schema::string())
}

fn env(ctx: &RequestContext) -> Value {
    ctx.bindings()
        .get("ENABLE_RESPONSE_VALIDATION")
        .cloned()
        .unwrap_or(Value::Null)
}

fn handlers() -> Handlers {
    Handlers::new()
        .handler_sync("deleteThing", |_input: Input, _ctx: RequestContext| {
            Ok(HandlerResponse::empty(StatusCode::OK))
        })
        .handler(
            "getThing",
            |input: Input<ThingParams>, ctx: RequestContext| async move {
                let auth_token = ctx.get("auth_token");
                ctx.set("auth_token", "lul");
                let path_params: Map<String, Value> = ctx
                    .path_params()
                    .map(|(name, value)| (name.to_string(), Value::from(value)))
                    .collect();
                Ok(HandlerResponse::ok(json!({
                    "id": input.params.id,
                    "auth_token": auth_token,
                    "operationId": ctx.get(OPERATION_ID_KEY),
                    "status": "ok",
                    "validatedQueryParams": input.query,
                    "rawQuery": ctx.raw_query(),
                    "rawQueries": ctx.raw_queries(),
                    "pathParams": path_params,
                })))
            },
        )
        .handler("createThing", |_input: Input, _ctx: RequestContext| async move {
            Ok(HandlerResponse::ok(json!({ "ok": true })))
        })
        .handler_sync("getSyncReturn", |_input: Input, ctx: RequestContext| {
            ctx.set("auth_token", "lul");
            Ok(HandlerResponse::ok(json!({
                "id": "sync",
                "env": env(&ctx),
                "auth_token": ctx.get("auth_token"),
                "status": "ok",
            })))
        })
        .handler_sync("getEarlyReturn", |_input: Input, ctx: RequestContext| {
            ctx.set("auth_token", "lul");
            let body = json!({
                "id": "early",
                "env": env(&ctx),
                "auth_token": ctx.get("auth_token"),
                "status": "ok",
            });
            Ok(ctx.json(StatusCode::OK, &body))
        })
        .handler("headersRequired", |_input: Input, _ctx: RequestContext| async move {
            Ok(HandlerResponse::ok("ok"))
        })
        .handler("invalidResponse", |_input: Input, _ctx: RequestContext| async move {
            Ok(HandlerResponse::ok(json!({ "ok": "notaboolean" })))
        })
}

fn endpoint_config() -> EndpointConfig {
    EndpointConfig::new()
        .log_initialization(true)
        .response_validation(|ctx| {
            ctx.bindings()
                .get_bool("ENABLE_RESPONSE_VALIDATION")
                .unwrap_or(true)
        })
        .request_validation_error_handler(|issues| {
            StructuredResponse::new(StatusCode::BAD_REQUEST, json!({ "errors": issues.formatted() }))
        })
        .response_validation_error_handler(|issues| {
            StructuredResponse::new(
                StatusCode::BAD_REQUEST,
                json!({ "errors": covenant::core::format_issues(issues).to_value() }),
            )
        })
}

fn client_with(bindings: Bindings) -> TestClient {
    let mut app = App::new().with_bindings(bindings);
    app.mount(&contract(), handlers(), endpoint_config()).unwrap();
    TestClient::new(app)
}

fn client() -> TestClient {
    client_with(Bindings::new())
}

// ==================== Registration Tests ====================

#[test]
fn test_routes_registered_in_declaration_order() {
    let client = client();
    let routes: Vec<String> = client
        .app()
        .routes()
        .iter()
        .map(|route| format!("{} {}", route.method, route.path))
        .collect();
    assert_eq!(
        routes,
        [
            "DELETE /things/:id",
            "GET /things/:id",
            "POST /things",
            "GET /sync",
            "GET /early",
            "GET /headers",
            "GET /invalid-response",
        ]
    );
}

#[test]
fn test_missing_handler_registers_nothing() {
    let partial = Handlers::new().handler_sync("deleteThing", |_input: Input, _ctx: RequestContext| {
        Ok(HandlerResponse::empty(StatusCode::OK))
    });
    let mut app = App::new();
    let err = app.mount(&contract(), partial, endpoint_config()).unwrap_err();
    assert!(matches!(err, RegistrationError::MissingHandler { ref operation } if operation == "getThing"));
    assert!(app.routes().is_empty());
}

// ==================== Request Tests ====================

#[tokio::test]
async fn test_get_thing_normalizes_query_arrays() {
    let response = client()
        .get("/things/42?array=x&array=y&array_brackets%5B%5D=z&not_array=n&extra=1")
        .send()
        .await;

    response.assert_status(StatusCode::OK);
    let body = response.json_value().unwrap();
    assert_eq!(body["id"], "42");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["operationId"], "getThing");
    assert_eq!(body["auth_token"], Value::Null);
    assert_eq!(body["pathParams"], json!({"id": "42"}));
    assert_eq!(
        body["validatedQueryParams"],
        json!({"array_brackets[]": ["z"], "not_array": "n", "array": ["x", "y"]})
    );
    assert_eq!(
        body["rawQuery"],
        "array=x&array=y&array_brackets%5B%5D=z&not_array=n&extra=1"
    );
    assert_eq!(
        body["rawQueries"],
        json!({
            "array": ["x", "y"],
            "array_brackets[]": ["z"],
            "not_array": ["n"],
            "extra": ["1"],
        })
    );
}

#[tokio::test]
async fn test_single_value_declared_array_is_promoted() {
    let response = client().get("/things/1").query("array", "only").send().await;
    let body = response.json_value().unwrap();
    assert_eq!(body["validatedQueryParams"], json!({"array": ["only"]}));
}

#[tokio::test]
async fn test_context_is_per_request() {
    let client = client();
    for _ in 0..2 {
        let body = client.get("/things/7").send().await.json_value().unwrap();
        assert_eq!(body["auth_token"], Value::Null);
    }
}

#[tokio::test]
async fn test_delete_with_null_response_is_empty_200() {
    let response = client().delete("/things/42").send().await;
    response.assert_status(StatusCode::OK).assert_empty();
    assert!(response.content_type().is_none());
}

#[tokio::test]
async fn test_create_thing() {
    let response = client()
        .post("/things")
        .json(&json!({"data": [{"name": "a", "other": 1}]}))
        .send()
        .await;
    response
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({"ok": true}));
}

#[tokio::test]
async fn test_create_thing_with_invalid_body() {
    let response = client()
        .post("/things")
        .json(&json!({"data": [{"name": 1}]}))
        .send()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json_value().unwrap();
    assert_eq!(
        body["errors"]["body"],
        json!({"data": {"0": {
            "name": ["Expected string, received number"],
            "other": ["Required"],
        }}})
    );
    assert_eq!(body["errors"]["pathParams"], Value::Null);
    assert_eq!(body["errors"]["query"], Value::Null);
    assert_eq!(body["errors"]["headers"], Value::Null);
}

#[tokio::test]
async fn test_create_thing_with_malformed_json() {
    let response = client()
        .post("/things")
        .content_type("application/json")
        .body("{\"data\": [")
        .send()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json_value().unwrap();
    assert!(!body["errors"]["body"].is_null());
}

#[tokio::test]
async fn test_missing_required_header() {
    let response = client().get("/headers").send().await;

    response.assert_status(StatusCode::BAD_REQUEST).assert_json_eq(&json!({
        "errors": {
            "pathParams": null,
            "query": null,
            "headers": {"x-thing": ["Required"]},
            "body": null,
        }
    }));
}

#[tokio::test]
async fn test_required_header_present() {
    let response = client().get("/headers").header("X-Thing", "yes").send().await;
    response
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!("ok"));
}

#[tokio::test]
async fn test_sync_handler() {
    let response = client().get("/sync").send().await;
    response.assert_status(StatusCode::OK).assert_json_eq(&json!({
        "id": "sync",
        "env": null,
        "auth_token": "lul",
        "status": "ok",
    }));
}

#[tokio::test]
async fn test_early_return() {
    let client = client_with(Bindings::new().with("ENABLE_RESPONSE_VALIDATION", true));
    let response = client.get("/early").send().await;
    response.assert_status(StatusCode::OK).assert_json_eq(&json!({
        "id": "early",
        "env": true,
        "auth_token": "lul",
        "status": "ok",
    }));
}

// ==================== Response Validation Tests ====================

#[tokio::test]
async fn test_invalid_response_is_rejected_by_default() {
    let response = client().get("/invalid-response").send().await;
    response.assert_status(StatusCode::BAD_REQUEST).assert_json_eq(&json!({
        "errors": {"ok": ["Expected boolean, received string"]}
    }));
}

#[tokio::test]
async fn test_invalid_response_passes_when_validation_disabled() {
    let client = client_with(Bindings::new().with("ENABLE_RESPONSE_VALIDATION", false));
    let response = client.get("/invalid-response").send().await;
    response
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({"ok": "notaboolean"}));
}

// ==================== Routing Tests ====================

#[tokio::test]
async fn test_unknown_route() {
    let response = client().get("/nope").send().await;
    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_json_eq(&json!({"message": "Not Found"}));
}

#[tokio::test]
async fn test_wrong_method_lists_allowed() {
    let response = client().put("/things/1").send().await;
    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    let allow = response.header_str("allow").unwrap();
    assert!(allow.contains("GET"));
    assert!(allow.contains("DELETE"));
}
