#![allow(dead_code)]

use api::{app, auth::generate_jwt, state::AppState};
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
};
use db::models::{class, enrollment, enrollment::Role};
use db::test_utils::setup_test_db;
use serde_json::{Value, json};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tower::ServiceExt;
use util::config::AppConfig;

pub const CLASS_LAT: f64 = 40.7128;
pub const CLASS_LNG: f64 = -74.0060;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn token(&self, user_id: i64, admin: bool) -> String {
        generate_jwt(&self.state, user_id, admin).unwrap().0
    }

    /// Sends `req` from `ip` and returns the status, headers and JSON body.
    pub async fn send(&self, mut req: Request<Body>, ip: [u8; 4]) -> (StatusCode, Response<()>, Value) {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), 43210);
        req.extensions_mut().insert(ConnectInfo(addr));

        let response = self.router.clone().oneshot(req).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (parts.status, Response::from_parts(parts, ()), json)
    }

    pub async fn class_with_attendee(&self, instructor_id: i64, attendee_id: i64) -> class::Model {
        let db = self.state.db();
        let class = class::Model::create(db, "Physics 101", instructor_id, CLASS_LAT, CLASS_LNG)
            .await
            .unwrap();
        enrollment::Model::enroll(db, class.id, attendee_id, Role::Attendee)
            .await
            .unwrap();
        class
    }

    /// Opens a 30 minute session on `class_id` as `instructor_id` and returns its `data`.
    pub async fn open_session(&self, instructor_id: i64, class_id: i64) -> Value {
        let token = self.token(instructor_id, false);
        let (status, _, json) = self
            .send(
                json_request(
                    "POST",
                    &format!("/api/classes/{class_id}/attendance/sessions"),
                    Some(&token),
                    Some(json!({ "durationMinutes": 30 })),
                ),
                [192, 0, 2, 1],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"].clone()
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn make_test_app_with(config: AppConfig) -> TestApp {
    let db = setup_test_db().await;
    let state = AppState::new(db, &config);
    TestApp {
        router: app(state.clone()),
        state,
    }
}

pub async fn make_test_app() -> TestApp {
    make_test_app_with(AppConfig::default()).await
}
