#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::helpers::app::json_request;
    use crate::helpers::make_test_app;

    const IP: [u8; 4] = [198, 51, 100, 30];

    #[tokio::test]
    async fn test_extend_session_pushes_expiry() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let session = app.open_session(1, class.id).await;
        let token = app.token(1, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "PUT",
                    &format!("/api/attendance/sessions/{}/extend", session["token"].as_str().unwrap()),
                    Some(&token),
                    Some(json!({ "additionalMinutes": 15 })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["message"], "Attendance session extended");
        let remaining = json["data"]["remainingSeconds"].as_i64().unwrap();
        assert!(remaining > 44 * 60 && remaining <= 45 * 60);
        assert_eq!(json["data"]["descriptor"]["expiresAt"], json["data"]["expiresAt"]);
    }

    #[tokio::test]
    async fn test_extend_session_rejects_bad_minutes() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let session = app.open_session(1, class.id).await;
        let token = app.token(1, false);
        let uri = format!("/api/attendance/sessions/{}/extend", session["token"].as_str().unwrap());

        for minutes in [0, -5, 10_000] {
            let (status, _, json) = app
                .send(
                    json_request("PUT", &uri, Some(&token), Some(json!({ "additionalMinutes": minutes }))),
                    IP,
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "minutes = {minutes}");
            assert_eq!(json["data"]["kind"], "invalid_duration");
        }
    }

    #[tokio::test]
    async fn test_extend_session_forbidden_for_non_owner() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let session = app.open_session(1, class.id).await;
        let token = app.token(50, false);

        let (status, _, _) = app
            .send(
                json_request(
                    "PUT",
                    &format!("/api/attendance/sessions/{}/extend", session["token"].as_str().unwrap()),
                    Some(&token),
                    Some(json!({ "additionalMinutes": 15 })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_extend_unknown_session() {
        let app = make_test_app().await;
        let token = app.token(1, false);

        let (status, _, _) = app
            .send(
                json_request(
                    "PUT",
                    "/api/attendance/sessions/nope/extend",
                    Some(&token),
                    Some(json!({ "additionalMinutes": 15 })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
