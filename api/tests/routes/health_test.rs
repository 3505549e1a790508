#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::helpers::{app::json_request, make_test_app};

    #[tokio::test]
    async fn test_health_check() {
        let app = make_test_app().await;
        let (status, headers, json) = app.send(json_request("GET", "/api/health", None, None), [127, 0, 0, 1]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "OK");
        assert_eq!(headers.headers()["x-ratelimit-remaining"], "299");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = make_test_app().await;
        let (status, _, _) = app.send(json_request("GET", "/api/nope", None, None), [127, 0, 0, 1]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
