//! Router-level tests: session login and the JSON envelope

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use backoffice::routes::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Client {
    app: Router,
    cookie: Option<String>,
}

impl Client {
    async fn new() -> Self {
        let (state, _) = common::setup().await;
        Self {
            app: create_router(state),
            cookie: None,
        }
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(&mut self) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/login",
                Some(json!({"loginAccount": "admin", "password": common::PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(self.cookie.is_some());
    }
}

#[tokio::test]
async fn health_is_public() {
    let mut client = Client::new().await;
    let (status, body) = client.send(Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], true);
}

#[tokio::test]
async fn session_required() {
    let mut client = Client::new().await;
    let (status, body) = client.send(Method::GET, "/api/departments", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = client
        .send(
            Method::POST,
            "/api/login",
            Some(json!({"loginAccount": "admin", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    client.login().await;
    let (status, body) = client.send(Method::GET, "/api/users/current", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["loginAccount"], "admin");
    assert_eq!(body["data"]["isAdmin"], true);

    let (status, _) = client.send(Method::POST, "/api/logout", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = client.send(Method::GET, "/api/users/current", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ledger_flow_over_http() {
    let mut client = Client::new().await;
    client.login().await;

    let (status, body) = client
        .send(Method::POST, "/api/departments", Some(json!({"name": "Sales"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["path"], "Sales");
    let dept_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = client
        .send(
            Method::POST,
            "/api/team-accounts",
            Some(json!({"name": "Sales fund", "departmentId": dept_id, "initialBalance": 1500})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"].as_f64(), Some(1500.0));
    let account_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = client
        .send(
            Method::POST,
            "/api/finance",
            Some(json!({"teamId": account_id, "type": "expense", "amount": 200.5})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["approvalStatus"], "pending");
    let finance_id = body["data"]["id"].as_i64().unwrap();

    let approve = format!("/api/finance/{}/approve", finance_id);
    let (status, body) = client
        .send(Method::PUT, &approve, Some(json!({"status": "approved"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["approvalStatus"], "approved");

    let (status, body) = client
        .send(Method::PUT, &approve, Some(json!({"status": "rejected"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = client
        .send(Method::GET, &format!("/api/team-accounts/{}", account_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"].as_f64(), Some(1299.5));

    let (status, body) = client
        .send(
            Method::GET,
            &format!("/api/team-accounts/{}/records?page=1&pageSize=1", account_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["data"][0]["amount"].as_f64(), Some(-200.5));

    let (status, _) = client
        .send(
            Method::PUT,
            &format!("/api/team-accounts/{}", account_id),
            Some(json!({"balance": 99999})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = client
        .send(Method::GET, &format!("/api/team-accounts/{}/verify", account_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["consistent"], true);
}

#[tokio::test]
async fn unknown_records_are_not_found() {
    let mut client = Client::new().await;
    client.login().await;
    let (status, body) = client.send(Method::GET, "/api/finance/4242", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = client.send(Method::DELETE, "/api/departments/4242", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
