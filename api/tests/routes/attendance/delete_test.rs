#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::helpers::app::{CLASS_LAT, CLASS_LNG, json_request};
    use crate::helpers::make_test_app;

    const IP: [u8; 4] = [198, 51, 100, 40];

    #[tokio::test]
    async fn test_end_session_then_end_again() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let session = app.open_session(1, class.id).await;
        let session_token = session["token"].as_str().unwrap();
        let token = app.token(1, false);
        let uri = format!("/api/attendance/sessions/{session_token}");

        let (status, _, json) = app.send(json_request("DELETE", &uri, Some(&token), None), IP).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["active"], false);
        assert_eq!(json["message"], "Attendance session ended");

        let (status, _, json) = app.send(json_request("DELETE", &uri, Some(&token), None), IP).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["data"]["kind"], "already_inactive");
    }

    #[tokio::test]
    async fn test_ended_session_refuses_marks_and_extensions() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let session = app.open_session(1, class.id).await;
        let session_token = session["token"].as_str().unwrap();
        let instructor = app.token(1, false);

        let (status, _, _) = app
            .send(
                json_request("DELETE", &format!("/api/attendance/sessions/{session_token}"), Some(&instructor), None),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let attendee = app.token(50, false);
        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&attendee),
                    Some(json!({
                        "sessionToken": session_token,
                        "location": { "lat": CLASS_LAT, "lng": CLASS_LNG },
                    })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(json["data"]["kind"], "session_ended");

        let (status, _, json) = app
            .send(
                json_request(
                    "PUT",
                    &format!("/api/attendance/sessions/{session_token}/extend"),
                    Some(&instructor),
                    Some(json!({ "additionalMinutes": 5 })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(json["data"]["kind"], "session_ended");

        let (status, _, _) = app
            .send(
                json_request(
                    "GET",
                    &format!("/api/classes/{}/attendance/sessions/active", class.id),
                    Some(&instructor),
                    None,
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_end_session_requires_auth() {
        let app = make_test_app().await;
        let (status, _, _) = app
            .send(json_request("DELETE", "/api/attendance/sessions/abc", None, None), IP)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
