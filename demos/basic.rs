//! Minimal route-schema example: a JSON user API guarded by route schemas.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl 'http://localhost:3000/api/users?limit=10'
//!   curl 'http://localhost:3000/api/users?limit=lots'            # 400
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","email":"alice@example.com"}'
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' -d '{}'              # 400
//!   curl -X PUT http://localhost:3000/api/users/42 \
//!        -H 'content-type: application/json' -d '{"name":""}'     # 400

use http::StatusCode;
use route_schema::{Request, Response, RouteSchema, Router, Server};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), route_schema::Error> {
    tracing_subscriber::fmt::init();

    let schema = RouteSchema::builder()
        .prefix("/api")
        .error_aggregation(true)
        .body_error_prefix("body")
        .query_error_prefix("query")
        .build()?;

    schema.load_schema_json(
        r#"[
            {
                "route": "/users",
                "method": "GET",
                "schema": {
                    "type": "object",
                    "properties": { "limit": { "type": "string", "pattern": "^[0-9]+$" } }
                }
            },
            {
                "route": "/users",
                "method": "POST",
                "schema": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name":  { "type": "string", "minLength": 1 },
                        "email": { "type": "string" }
                    }
                }
            },
            {
                "route": "/users/:id",
                "method": "PUT",
                "schema": "{\"type\":\"object\",\"properties\":{\"name\":{\"type\":\"string\",\"minLength\":1}}}"
            }
        ]"#,
    )?;

    let mut app = Router::with_prefix("/api")
        .get("/users", list_users)
        .post("/users", create_user)
        .put("/users/:id", update_user);
    schema.attach_to_router(&mut app);

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /api/users
async fn list_users(req: Request) -> Response {
    let limit = req.query_json()["limit"].as_str().unwrap_or("20").to_owned();
    Response::json(format!(r#"{{"users":[],"limit":{limit}}}"#).into_bytes())
}

// POST /api/users
//
// Reaching the handler means the body already satisfied the schema.
async fn create_user(req: Request) -> Response {
    let name = req.body_json()["name"].as_str().unwrap_or_default().to_owned();
    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/api/users/99")
        .json(json!({"id": "99", "name": name}).to_string().into_bytes())
}

// PUT /api/users/:id
async fn update_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
}
