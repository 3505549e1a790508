#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use db::models::{attendance_record, security_event};
    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
    use serde_json::{Value, json};
    use util::config::{AppConfig, RateLimitSetting};

    use crate::helpers::app::{CLASS_LAT, CLASS_LNG, TestApp, json_request};
    use crate::helpers::{make_test_app, make_test_app_with};

    const INSTRUCTOR: i64 = 1;
    const ATTENDEE: i64 = 50;
    const IP: [u8; 4] = [198, 51, 100, 9];

    fn mark_body(session_token: &str, lat: f64, lng: f64) -> Value {
        json!({ "sessionToken": session_token, "location": { "lat": lat, "lng": lng } })
    }

    async fn count_events(app: &TestApp, event_type: &str) -> u64 {
        security_event::Entity::find()
            .filter(security_event::Column::EventType.eq(event_type))
            .count(app.state.db())
            .await
            .unwrap()
    }

    // ---------------------------
    // create_session
    // ---------------------------

    #[tokio::test]
    async fn test_create_session_as_instructor() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;

        let data = app.open_session(INSTRUCTOR, class.id).await;
        assert_eq!(data["classId"], class.id);
        assert_eq!(data["active"], true);
        assert_eq!(data["token"].as_str().unwrap().len(), 64);
        let remaining = data["remainingSeconds"].as_i64().unwrap();
        assert!((1790..=1800).contains(&remaining));

        assert_eq!(data["descriptor"]["sessionToken"], data["token"]);
        assert_eq!(data["descriptor"]["className"], "Physics 101");
        let wire: Value = serde_json::from_str(data["qrPayload"].as_str().unwrap()).unwrap();
        assert_eq!(wire["location"]["lat"], CLASS_LAT);
        assert_eq!(count_events(&app, "session_created").await, 1);
    }

    #[tokio::test]
    async fn test_create_session_rejects_out_of_range_duration() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let token = app.token(INSTRUCTOR, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    &format!("/api/classes/{}/attendance/sessions", class.id),
                    Some(&token),
                    Some(json!({ "durationMinutes": 3 })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["data"]["kind"], "invalid_duration");
    }

    #[tokio::test]
    async fn test_create_session_forbidden_for_attendee() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let token = app.token(ATTENDEE, false);

        let (status, _, _) = app
            .send(
                json_request(
                    "POST",
                    &format!("/api/classes/{}/attendance/sessions", class.id),
                    Some(&token),
                    Some(json!({ "durationMinutes": 30 })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_create_session_unknown_class() {
        let app = make_test_app().await;
        let token = app.token(INSTRUCTOR, false);

        let (status, _, _) = app
            .send(
                json_request(
                    "POST",
                    "/api/classes/999/attendance/sessions",
                    Some(&token),
                    Some(json!({ "durationMinutes": 30 })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ---------------------------
    // mark_attendance
    // ---------------------------

    #[tokio::test]
    async fn test_mark_attendance_success_then_duplicate() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let session = app.open_session(INSTRUCTOR, class.id).await;
        let session_token = session["token"].as_str().unwrap();
        let token = app.token(ATTENDEE, false);

        let (status, headers, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(mark_body(session_token, 40.71281, -74.00601)),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["message"], "Attendance recorded");
        assert!(json["data"]["distance"].as_f64().unwrap() < 2.0);
        assert_eq!(json["data"]["className"], "Physics 101");
        assert_eq!(headers.headers()["x-ratelimit-remaining"], "9");

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(mark_body(session_token, CLASS_LAT, CLASS_LNG)),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["data"]["kind"], "already_marked");

        let records = attendance_record::Entity::find().count(app.state.db()).await.unwrap();
        assert_eq!(records, 1);
    }

    #[tokio::test]
    async fn test_mark_attendance_too_far_reports_distance() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let session = app.open_session(INSTRUCTOR, class.id).await;
        let token = app.token(ATTENDEE, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(mark_body(session["token"].as_str().unwrap(), 40.7137, CLASS_LNG)),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["data"]["kind"], "too_far");
        let distance = json["data"]["distance"].as_f64().unwrap();
        assert!(distance > 90.0 && distance < 110.0);
        assert_eq!(json["data"]["toleranceMeters"], 50.0);
        assert!(json["message"].as_str().unwrap().contains("allowed: 50 m"));
    }

    #[tokio::test]
    async fn test_mark_attendance_not_enrolled() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let session = app.open_session(INSTRUCTOR, class.id).await;
        let token = app.token(77, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(mark_body(session["token"].as_str().unwrap(), CLASS_LAT, CLASS_LNG)),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["data"]["kind"], "not_enrolled");
        assert_eq!(json["message"], "You are not enrolled in Physics 101");
    }

    #[tokio::test]
    async fn test_mark_attendance_invalid_coordinates() {
        let app = make_test_app().await;
        let token = app.token(ATTENDEE, false);

        let (status, _, json) = app
            .send(
                json_request("POST", "/api/attendance/mark", Some(&token), Some(mark_body("x", 123.0, 0.0))),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["data"]["kind"], "invalid_coordinates");
    }

    #[tokio::test]
    async fn test_mark_attendance_requires_token() {
        let app = make_test_app().await;

        let (status, _, _) = app
            .send(
                json_request("POST", "/api/attendance/mark", None, Some(mark_body("x", 0.0, 0.0))),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(count_events(&app, "authentication_failed").await, 0);

        let (status, _, json) = app
            .send(
                json_request("POST", "/api/attendance/mark", Some("garbage"), Some(mark_body("x", 0.0, 0.0))),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Invalid or expired token");
        assert_eq!(count_events(&app, "authentication_failed").await, 1);
    }

    #[tokio::test]
    async fn test_repeated_bad_tokens_raise_suspicious_activity() {
        let app = make_test_app().await;
        for _ in 0..5 {
            app.send(
                json_request("GET", "/api/security/statistics", Some("garbage"), None),
                IP,
            )
            .await;
        }
        assert_eq!(count_events(&app, "authentication_failed").await, 5);
        assert_eq!(count_events(&app, "suspicious_activity").await, 1);
    }

    #[tokio::test]
    async fn test_mark_attendance_rate_limited() {
        let mut config = AppConfig::default();
        config.rate_limit_attendance = RateLimitSetting::new(60_000, 2);
        let app = make_test_app_with(config).await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let session = app.open_session(INSTRUCTOR, class.id).await;
        let session_token = session["token"].as_str().unwrap();
        let token = app.token(ATTENDEE, false);

        for expected in [StatusCode::OK, StatusCode::CONFLICT] {
            let (status, _, _) = app
                .send(
                    json_request(
                        "POST",
                        "/api/attendance/mark",
                        Some(&token),
                        Some(mark_body(session_token, CLASS_LAT, CLASS_LNG)),
                    ),
                    IP,
                )
                .await;
            assert_eq!(status, expected);
        }

        let (status, headers, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(mark_body(session_token, CLASS_LAT, CLASS_LNG)),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["data"]["kind"], "rate_limited");
        assert!(headers.headers().contains_key("retry-after"));
        assert_eq!(headers.headers()["x-ratelimit-remaining"], "0");

        // the limited request never reached the marking transaction
        assert_eq!(count_events(&app, "attendance_rejected").await, 1);
        assert_eq!(count_events(&app, "rate_limit_exceeded").await, 1);

        // other clients keep their own budget
        let (status, _, _) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(mark_body(session_token, CLASS_LAT, CLASS_LNG)),
                ),
                [203, 0, 113, 1],
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_mark_attendance_unreadable_body_keeps_envelope() {
        let app = make_test_app().await;
        let token = app.token(ATTENDEE, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(json!({ "sessionToken": "abc", "location": { "lat": "x", "lng": 0.0 } })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["data"]["kind"], "invalid_request");
        assert_eq!(count_events(&app, "attendance_rejected").await, 1);
    }

    #[tokio::test]
    async fn test_create_session_unreadable_body_keeps_envelope() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let token = app.token(INSTRUCTOR, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    &format!("/api/classes/{}/attendance/sessions", class.id),
                    Some(&token),
                    Some(json!({ "durationMinutes": "thirty" })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["data"]["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_rate_limited_marks_count_as_attempts() {
        let mut config = AppConfig::default();
        config.rate_limit_attendance = RateLimitSetting::new(60_000, 1);
        config.threshold_attendance_attempts = 3;
        let app = make_test_app_with(config).await;
        let token = app.token(ATTENDEE, false);

        let mut statuses = Vec::new();
        for _ in 0..4 {
            let (status, _, _) = app
                .send(
                    json_request(
                        "POST",
                        "/api/attendance/mark",
                        Some(&token),
                        Some(mark_body("no-such-session", CLASS_LAT, CLASS_LNG)),
                    ),
                    IP,
                )
                .await;
            statuses.push(status);
        }

        assert_eq!(statuses[0], StatusCode::NOT_FOUND);
        assert!(statuses[1..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(count_events(&app, "rate_limit_exceeded").await, 3);
        assert_eq!(count_events(&app, "suspicious_activity").await, 1);
    }

    // ---------------------------
    // scan_descriptor
    // ---------------------------

    #[tokio::test]
    async fn test_scan_returns_authoritative_descriptor() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(INSTRUCTOR, ATTENDEE).await;
        let session = app.open_session(INSTRUCTOR, class.id).await;
        let token = app.token(ATTENDEE, false);

        // the client tampered with the location; the store wins
        let mut scanned: Value = serde_json::from_str(session["qrPayload"].as_str().unwrap()).unwrap();
        scanned["location"]["lat"] = json!(0.0);

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/scan",
                    Some(&token),
                    Some(json!({ "descriptor": scanned.to_string() })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["descriptor"]["location"]["lat"], CLASS_LAT);
        assert_eq!(json["data"]["toleranceMeters"], 50.0);
    }

    #[tokio::test]
    async fn test_scan_rejects_malformed_descriptor() {
        let app = make_test_app().await;
        let token = app.token(ATTENDEE, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/scan",
                    Some(&token),
                    Some(json!({ "descriptor": "{\"sessionToken\":\"\"}" })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["data"]["kind"], "malformed_descriptor");
    }

    #[tokio::test]
    async fn test_scan_unknown_session() {
        let app = make_test_app().await;
        let token = app.token(ATTENDEE, false);
        let raw = json!({
            "sessionToken": "deadbeef",
            "classId": 1,
            "className": "X",
            "location": { "lat": 1.0, "lng": 2.0 },
            "expiresAt": "2030-01-01T00:00:00Z",
        });

        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/scan",
                    Some(&token),
                    Some(json!({ "descriptor": raw.to_string() })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["data"]["kind"], "session_not_found");
    }
}
