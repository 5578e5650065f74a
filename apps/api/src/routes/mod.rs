pub mod chat;
pub mod health;
pub mod page;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page::handle_index))
        .route("/health", get(health::health_handler))
        // Static data for the sidebar
        .route("/api/v1/profile", get(page::handle_get_profile))
        .route("/api/v1/sidebar", get(page::handle_get_sidebar))
        .route("/api/v1/quick-actions", get(page::handle_list_quick_actions))
        // Conversation
        .route("/api/v1/chat", get(chat::handle_get_transcript))
        .route("/api/v1/chat/messages", post(chat::handle_send_message))
        .route(
            "/api/v1/chat/quick-actions/:id",
            post(chat::handle_quick_action),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::chat::ChatService;
    use crate::config::{Config, DEFAULT_GEMINI_BASE_URL, DEFAULT_MODEL};
    use crate::llm_client::ChatBackend;
    use crate::profile::ProfileRecord;
    use crate::render::MarkdownRenderer;
    use crate::session::tests::ScriptedBackend;
    use crate::session::SessionManager;

    async fn app(backend: Option<Arc<dyn ChatBackend>>) -> Router {
        let profile = Arc::new(ProfileRecord::embedded().unwrap());
        let sessions = SessionManager::new(
            backend,
            "GEMINI_API_KEY",
            DEFAULT_MODEL.to_string(),
            profile.clone(),
        );
        let chat = Arc::new(ChatService::new(
            sessions,
            Arc::new(MarkdownRenderer::new()),
            profile.clone(),
        ));
        let _ = chat.initialize().await;

        build_router(AppState {
            chat,
            profile,
            config: Config {
                gemini_api_key: None,
                gemini_model: DEFAULT_MODEL.to_string(),
                gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                port: 8080,
                rust_log: "info".to_string(),
            },
        })
    }

    async fn scripted_app(fragments: &[&str]) -> Router {
        app(Some(Arc::new(ScriptedBackend::replying(fragments)))).await
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = scripted_app(&[]).await.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["chat_available"], true);
    }

    #[tokio::test]
    async fn test_index_page_is_served() {
        let response = scripted_app(&[]).await.oneshot(get_req("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("<html"));
        assert!(page.contains("shares one conversation"));
        assert!(page.contains("expires_in_ms"));
    }

    #[tokio::test]
    async fn test_profile_and_quick_actions() {
        let app = scripted_app(&[]).await;

        let profile = body_json(app.clone().oneshot(get_req("/api/v1/profile")).await.unwrap()).await;
        assert_eq!(profile["personalInfo"]["name"], "Sumit Chauhan");

        let actions =
            body_json(app.oneshot(get_req("/api/v1/quick-actions")).await.unwrap()).await;
        assert_eq!(actions.as_array().unwrap().len(), 3);
        assert_eq!(actions[2]["id"], "role_pitch");
        assert_eq!(actions[2]["requires_role"], true);
    }

    #[tokio::test]
    async fn test_sidebar() {
        let response = scripted_app(&[]).await.oneshot(get_req("/api/v1/sidebar")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Sumit Chauhan");
        assert!(body["links"].as_array().unwrap().iter().any(|l| l["label"] == "github"));
        assert!(!body["best_projects"].as_array().unwrap().is_empty());
        assert_eq!(body["quick_actions"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_send_message_streams_events() {
        let app = scripted_app(&["Sumit ", "uses Flask."]).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/chat/messages",
                serde_json::json!({ "text": "What's your experience with Flask?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let body = body_text(response).await;
        let turn = body.find("event: turn").unwrap();
        let fragment = body.find("event: fragment").unwrap();
        let done = body.find("event: done").unwrap();
        assert!(turn < fragment && fragment < done);

        let transcript = body_json(app.oneshot(get_req("/api/v1/chat")).await.unwrap()).await;
        let turns = transcript["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2]["content"], "Sumit uses Flask.");
        assert_eq!(transcript["reply_in_progress"], false);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let response = scripted_app(&[])
            .await
            .oneshot(post_json(
                "/api/v1/chat/messages",
                serde_json::json!({ "text": "   " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_chat_unavailable_without_credential() {
        let app = app(None).await;

        let transcript = body_json(app.clone().oneshot(get_req("/api/v1/chat")).await.unwrap()).await;
        assert_eq!(transcript["chat_available"], false);
        assert!(transcript["banner"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Initialization failed"));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/chat/messages",
                serde_json::json!({ "text": "Hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // the rest of the page still works
        let profile = app.oneshot(get_req("/api/v1/profile")).await.unwrap();
        assert_eq!(profile.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_quick_action_role_pitch() {
        let app = scripted_app(&["Pitch."]).await;

        let missing = app
            .clone()
            .oneshot(post_json(
                "/api/v1/chat/quick-actions/role_pitch",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/chat/quick-actions/role_pitch",
                serde_json::json!({ "role": "Senior Python Developer" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_text(response).await;

        let transcript = body_json(app.oneshot(get_req("/api/v1/chat")).await.unwrap()).await;
        assert_eq!(
            transcript["turns"][1]["content"],
            "Generate a concise, tailored pitch statement for the role of \"Senior Python Developer\"."
        );
    }

    #[tokio::test]
    async fn test_unknown_quick_action() {
        let response = scripted_app(&[])
            .await
            .oneshot(post_json(
                "/api/v1/chat/quick-actions/tell_a_joke",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
