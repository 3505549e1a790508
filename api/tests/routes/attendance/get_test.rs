#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::helpers::app::json_request;
    use crate::helpers::make_test_app;

    const IP: [u8; 4] = [198, 51, 100, 20];

    #[tokio::test]
    async fn test_get_active_session_returns_newest() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let first = app.open_session(1, class.id).await;
        let second = app.open_session(1, class.id).await;
        let token = app.token(1, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "GET",
                    &format!("/api/classes/{}/attendance/sessions/active", class.id),
                    Some(&token),
                    None,
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["token"], second["token"]);
        assert_ne!(json["data"]["token"], first["token"]);
    }

    #[tokio::test]
    async fn test_creating_a_session_ends_the_previous_one() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let first = app.open_session(1, class.id).await;
        app.open_session(1, class.id).await;

        let token = app.token(50, false);
        let (status, _, json) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&token),
                    Some(serde_json::json!({
                        "sessionToken": first["token"],
                        "location": { "lat": 40.7128, "lng": -74.0060 },
                    })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(json["data"]["kind"], "session_ended");
    }

    #[tokio::test]
    async fn test_get_active_session_none_open() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let token = app.token(1, false);

        let (status, _, json) = app
            .send(
                json_request(
                    "GET",
                    &format!("/api/classes/{}/attendance/sessions/active", class.id),
                    Some(&token),
                    None,
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["data"]["kind"], "session_not_found");
    }

    #[tokio::test]
    async fn test_get_active_session_admin_allowed_attendee_forbidden() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        app.open_session(1, class.id).await;
        let uri = format!("/api/classes/{}/attendance/sessions/active", class.id);

        let admin = app.token(999, true);
        let (status, _, _) = app.send(json_request("GET", &uri, Some(&admin), None), IP).await;
        assert_eq!(status, StatusCode::OK);

        let attendee = app.token(50, false);
        let (status, _, _) = app.send(json_request("GET", &uri, Some(&attendee), None), IP).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
