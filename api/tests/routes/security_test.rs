#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::helpers::app::{CLASS_LAT, json_request};
    use crate::helpers::make_test_app;

    const IP: [u8; 4] = [198, 51, 100, 50];

    #[tokio::test]
    async fn test_statistics_forbidden_for_non_admin() {
        let app = make_test_app().await;
        let token = app.token(5, false);

        let (status, _, json) = app
            .send(json_request("GET", "/api/security/statistics", Some(&token), None), IP)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Admin access required");
    }

    #[tokio::test]
    async fn test_statistics_summarise_recent_events() {
        let app = make_test_app().await;
        let class = app.class_with_attendee(1, 50).await;
        let session = app.open_session(1, class.id).await;

        // ~100 km north of the class: rejected and flagged as spoofing
        let attendee = app.token(50, false);
        let (status, _, _) = app
            .send(
                json_request(
                    "POST",
                    "/api/attendance/mark",
                    Some(&attendee),
                    Some(json!({
                        "sessionToken": session["token"],
                        "location": { "lat": CLASS_LAT + 0.9, "lng": -74.0060 },
                    })),
                ),
                IP,
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let admin = app.token(999, true);
        let (status, _, json) = app
            .send(json_request("GET", "/api/security/statistics?hours=2", Some(&admin), None), IP)
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");

        let data = &json["data"];
        assert_eq!(data["lookback_hours"], 2);
        assert_eq!(data["by_type"]["session_created"], 1);
        assert_eq!(data["by_type"]["attendance_rejected"], 1);
        assert_eq!(data["by_type"]["possible_location_spoofing"], 1);
        assert_eq!(data["by_hour"].as_array().unwrap().len(), 24);
        assert!(data["flagged_actors"].as_array().unwrap().contains(&json!(50)));
        assert!(
            data["top_clients"]
                .as_array()
                .unwrap()
                .iter()
                .any(|c| c["client_id"] == "198.51.100.50")
        );
    }

    #[tokio::test]
    async fn test_statistics_clamps_lookback() {
        let app = make_test_app().await;
        let admin = app.token(999, true);

        let (status, _, json) = app
            .send(json_request("GET", "/api/security/statistics?hours=100000", Some(&admin), None), IP)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["lookback_hours"], 720);
        assert_eq!(json["data"]["total"], 0);
    }
}
