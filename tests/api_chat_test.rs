//! Integration tests for the chat and conversation log API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Router,
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::{body_to_string, completion_body, test_app, test_app_with};

    fn peer(ip: &str) -> ConnectInfo<SocketAddr> {
        ConnectInfo(format!("{}:40000", ip).parse().unwrap())
    }

    async fn post_chat(app: &Router, client: &str, message: &str) -> (StatusCode, Value) {
        post_chat_forwarded(app, client, None, message).await
    }

    /// Post a chat message from peer `client`, optionally with an
    /// `X-Forwarded-For` header
    async fn post_chat_forwarded(
        app: &Router,
        client: &str,
        forwarded_for: Option<&str>,
        message: &str,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .uri("/api/chat")
            .method("POST")
            .header("content-type", "application/json")
            .extension(peer(client));
        if let Some(forwarded_for) = forwarded_for {
            request = request.header("x-forwarded-for", forwarded_for);
        }
        let response = app
            .clone()
            .oneshot(
                request
                    .body(Body::from(json!({ "message": message }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = body_to_string(response.into_body()).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn get_messages(app: &Router, query: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/messages{}", query))
                    .extension(peer("198.51.100.1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = body_to_string(response.into_body()).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    fn roles_and_contents(messages: &Value) -> Vec<(String, String)> {
        messages
            .as_array()
            .unwrap()
            .iter()
            .map(|m| {
                (
                    m["role"].as_str().unwrap().to_string(),
                    m["content"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    /// Tests a message is relayed and both turns are logged
    #[tokio::test]
    #[serial]
    async fn it_relays_message_and_logs_exchange() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-api-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "llama-3.1-8b-instant",
                "messages": [
                    {"role": "system", "content": "You are Ada's portfolio assistant."},
                    {"role": "user", "content": "What languages do you use?"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Mostly Rust and SQL."))
            .expect(1)
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let (status, body) = post_chat(&test.router, "203.0.113.1", "  What languages do you use?  ").await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": "Mostly Rust and SQL." }));

        let (status, messages) = get_messages(&test.router, "?order=asc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            roles_and_contents(&messages),
            vec![
                ("user".to_string(), "What languages do you use?".to_string()),
                ("assistant".to_string(), "Mostly Rust and SQL.".to_string()),
            ]
        );
        let first_id = messages[0]["id"].as_i64().unwrap();
        let second_id = messages[1]["id"].as_i64().unwrap();
        assert!(first_id < second_id);
        assert!(messages[0]["timestamp"].is_string());
    }

    /// Tests an empty message is rejected before anything is logged
    #[tokio::test]
    #[serial]
    async fn it_rejects_empty_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let (status, body) = post_chat(&test.router, "203.0.113.1", "").await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "reply": "Message cannot be empty." }));

        let (_, messages) = get_messages(&test.router, "").await;
        assert_eq!(messages, json!([]));
    }

    /// Tests a message over the length limit is rejected
    #[tokio::test]
    #[serial]
    async fn it_rejects_too_long_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let (status, body) = post_chat(&test.router, "203.0.113.1", &"a".repeat(501)).await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["reply"].as_str().unwrap().contains("500 characters"));

        let (_, messages) = get_messages(&test.router, "").await;
        assert_eq!(messages, json!([]));
    }

    /// Tests missing message field returns 422
    #[tokio::test]
    #[serial]
    async fn it_returns_422_for_missing_message() {
        let test = test_app("http://127.0.0.1:9").await;

        let response = test
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/chat")
                    .method("POST")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "text": "Hello" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    /// Tests a second request inside the cooldown is throttled
    #[tokio::test]
    #[serial]
    async fn it_throttles_rapid_requests() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Hello!"))
            .expect(1)
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let (status, _) = post_chat(&test.router, "203.0.113.1", "Hi").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_chat(&test.router, "203.0.113.1", "Hi again").await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["reply"].is_string());

        // Only the first exchange was logged
        let (_, messages) = get_messages(&test.router, "").await;
        assert_eq!(messages.as_array().unwrap().len(), 2);
    }

    /// Tests a client can't dodge the rate limit by rotating
    /// `X-Forwarded-For` when no proxy is trusted
    #[tokio::test]
    #[serial]
    async fn it_ignores_forwarded_for_from_untrusted_clients() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Hello!"))
            .expect(1)
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let mut statuses = Vec::new();
        for i in 0..5 {
            let forwarded_for = format!("1.2.3.{}", i);
            let (status, _) = post_chat_forwarded(
                &test.router,
                "192.0.2.9",
                Some(&forwarded_for),
                &format!("Hi {}", i),
            )
            .await;
            statuses.push(status);
        }

        mock.assert_async().await;
        assert_eq!(
            statuses,
            vec![
                StatusCode::OK,
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::TOO_MANY_REQUESTS,
            ]
        );
    }

    /// Tests clients behind a trusted proxy are told apart by the
    /// address the proxy appended, not by what they sent themselves
    #[tokio::test]
    #[serial]
    async fn it_uses_last_forwarded_entry_behind_trusted_proxy() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Hello!"))
            .create_async()
            .await;
        let test = test_app_with(&server.url(), |config| config.trust_forwarded_for = true).await;
        let proxy = "10.0.0.1";

        let (status, _) =
            post_chat_forwarded(&test.router, proxy, Some("1.2.3.0, 203.0.113.5"), "Hi").await;
        assert_eq!(status, StatusCode::OK);
        // Same real client with a spoofed first entry
        let (status, _) =
            post_chat_forwarded(&test.router, proxy, Some("1.2.3.1, 203.0.113.5"), "Hi again").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        // A different client behind the same proxy
        let (status, _) =
            post_chat_forwarded(&test.router, proxy, Some("203.0.113.6"), "Hello").await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Tests an identical message is answered from the cache
    #[tokio::test]
    #[serial]
    async fn it_serves_repeated_message_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("I build backend systems."))
            .expect(1)
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let (_, first) = post_chat(&test.router, "203.0.113.1", "What do you do?").await;
        let (status, second) = post_chat(&test.router, "203.0.113.2", "What do you do? ").await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, second);

        let (_, messages) = get_messages(&test.router, "").await;
        assert_eq!(messages.as_array().unwrap().len(), 4);
    }

    /// Tests a 200 response without choices is replaced by the fallback reply
    #[tokio::test]
    #[serial]
    async fn it_falls_back_on_malformed_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"model overloaded"}}"#)
            .expect(2)
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let (status, body) = post_chat(&test.router, "203.0.113.1", "Hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": "Error connecting to AI" }));

        // Fallback replies aren't cached so this goes upstream again
        let (_, body) = post_chat(&test.router, "203.0.113.2", "Hello").await;
        assert_eq!(body, json!({ "reply": "Error connecting to AI" }));
        mock.assert_async().await;

        let (_, messages) = get_messages(&test.router, "?order=asc").await;
        assert_eq!(
            roles_and_contents(&messages)[..2],
            [
                ("user".to_string(), "Hello".to_string()),
                ("assistant".to_string(), "Error connecting to AI".to_string()),
            ]
        );
    }

    /// Tests upstream errors never leak to the client
    #[tokio::test]
    #[serial]
    async fn it_hides_upstream_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("Traceback (most recent call last): secret internals")
            .create_async()
            .await;
        let test = test_app(&server.url()).await;

        let (status, body) = post_chat(&test.router, "203.0.113.1", "Hello").await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": "Error connecting to AI" }));
    }

    /// Tests a missing API key fails fast without calling upstream
    #[tokio::test]
    #[serial]
    async fn it_falls_back_when_api_key_missing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;
        let test = test_app_with(&server.url(), |config| config.llm_api_key = None).await;

        let (status, body) = post_chat(&test.router, "203.0.113.1", "Hello").await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": "Error connecting to AI" }));
    }

    /// Tests an upstream that never answers times out into the fallback
    #[tokio::test]
    #[serial]
    async fn it_falls_back_on_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _upstream = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        });
        let test = test_app_with(&format!("http://{}", addr), |config| {
            config.llm_timeout_secs = 1
        })
        .await;

        let (status, body) = post_chat(&test.router, "203.0.113.1", "Hello").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": "Error connecting to AI" }));
        let (_, messages) = get_messages(&test.router, "?order=asc").await;
        assert_eq!(
            roles_and_contents(&messages),
            vec![
                ("user".to_string(), "Hello".to_string()),
                ("assistant".to_string(), "Error connecting to AI".to_string()),
            ]
        );
    }

    /// Tests listing messages newest first with a limit
    #[tokio::test]
    #[serial]
    async fn it_lists_messages_newest_first() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Reply"))
            .create_async()
            .await;
        let test = test_app(&server.url()).await;
        post_chat(&test.router, "203.0.113.1", "First").await;
        post_chat(&test.router, "203.0.113.2", "Second").await;

        let (status, messages) = get_messages(&test.router, "?limit=3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            roles_and_contents(&messages),
            vec![
                ("assistant".to_string(), "Reply".to_string()),
                ("user".to_string(), "Second".to_string()),
                ("assistant".to_string(), "Reply".to_string()),
            ]
        );
    }

    /// Tests history reads have their own rate limit
    #[tokio::test]
    #[serial]
    async fn it_throttles_history_reads() {
        let test = test_app_with("http://127.0.0.1:9", |config| {
            config.history_rate_limit = 2
        })
        .await;

        assert_eq!(get_messages(&test.router, "").await.0, StatusCode::OK);
        assert_eq!(get_messages(&test.router, "").await.0, StatusCode::OK);
        let (status, body) = get_messages(&test.router, "").await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].is_string());
    }

    /// Tests clearing the log
    #[tokio::test]
    #[serial]
    async fn it_clears_messages() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Hello!"))
            .create_async()
            .await;
        let test = test_app(&server.url()).await;
        post_chat(&test.router, "203.0.113.1", "Hi").await;

        let response = test
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/messages")
                    .method("DELETE")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        assert_eq!(body, r#"{"status":"cleared"}"#);

        let (_, messages) = get_messages(&test.router, "").await;
        assert_eq!(messages, json!([]));
    }
}
