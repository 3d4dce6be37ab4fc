use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::traits::ChatApi;
use super::types::{ApiError, ChatReply, ChatRequest, ErrorBody, HistoryEntry, RenameRequest};
use crate::models::Session;
use crate::services::credentials::CredentialProvider;

/// `ChatApi` over the backend's JSON REST endpoints.
pub struct HttpChatApi {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpChatApi {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> Result<Self, ApiError> {
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| ApiError::InvalidResponse(format!("Bad base URL {}: {}", base_url, e)))?;

        Ok(Self {
            client: Client::new(),
            base_url,
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidResponse(format!("Bad endpoint {}: {}", path, e)))
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match self.credentials.bearer_token().await {
            Ok(Some(token)) => Ok(request.bearer_auth(token)),
            Ok(None) => Err(ApiError::Unauthorized),
            Err(e) => Err(ApiError::Credentials(format!("{:#}", e))),
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = self.authorize(request).await?;
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                message: Self::parse_error_message(&body),
            });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn parse_error_message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: serde_json::Value::String(message),
            }) => message,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => "Request failed".to_string(),
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatReply, ApiError> {
        let url = self.endpoint("api/chat")?;
        tracing::debug!(session_id = ?request.session_id, "POST {}", url);
        let response = self.execute(self.client.post(url).json(&request)).await?;
        Self::read_json(response).await
    }

    async fn list_conversations(&self) -> Result<Vec<Session>, ApiError> {
        let url = self.endpoint("api/chat/conversations")?;
        let response = self.execute(self.client.get(url)).await?;
        Self::read_json(response).await
    }

    async fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        let mut url = self.endpoint("api/chat/history")?;
        url.query_pairs_mut().append_pair("session_id", session_id);
        let response = self.execute(self.client.get(url)).await?;
        Self::read_json(response).await
    }

    async fn rename_conversation(&self, session_id: &str, title: &str) -> Result<(), ApiError> {
        let mut url = self.endpoint("api/chat/conversations/")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidResponse("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(session_id);
        self.execute(self.client.patch(url).json(&RenameRequest { title }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::credentials::StaticCredential;
    use mockito::Matcher;

    struct SignedOut;

    #[async_trait]
    impl CredentialProvider for SignedOut {
        async fn bearer_token(&self) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    fn api_for(server: &mockito::Server) -> HttpChatApi {
        HttpChatApi::new(&server.url(), Arc::new(StaticCredential::new("tok"))).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_posts_body_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Json(serde_json::json!({"message": "hi"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"session_id":"s1","assistant_response":"Hello","results":[]}"#)
            .create_async()
            .await;

        let reply = api_for(&server)
            .send_message(ChatRequest {
                message: "hi".to_string(),
                session_id: None,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.session_id().as_deref(), Some("s1"));
        assert_eq!(reply.text(), "Hello");
    }

    #[tokio::test]
    async fn test_history_passes_session_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/chat/history")
            .match_query(Matcher::UrlEncoded("session_id".into(), "s 2".into()))
            .with_status(200)
            .with_body(r#"[{"message":"Hi","response":"Hello!"}]"#)
            .create_async()
            .await;

        let entries = api_for(&server).history("s 2").await.unwrap();
        mock.assert_async().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].response.as_deref(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_rename_patches_conversation_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/api/chat/conversations/abc")
            .match_body(Matcher::Json(serde_json::json!({"title": "Legs"})))
            .with_status(200)
            .with_body(r#"{"session_id":"abc","title":"Legs"}"#)
            .create_async()
            .await;

        api_for(&server)
            .rename_conversation("abc", "Legs")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_maps_to_request_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/chat/conversations")
            .with_status(500)
            .with_body(r#"{"detail":"database down"}"#)
            .create_async()
            .await;

        match api_for(&server).list_conversations().await {
            Err(ApiError::RequestFailed { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "database down");
            }
            other => panic!("Expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/chat/conversations")
            .with_status(401)
            .create_async()
            .await;

        assert!(matches!(
            api_for(&server).list_conversations().await,
            Err(ApiError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_skips_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/chat/conversations")
            .expect(0)
            .create_async()
            .await;

        let api = HttpChatApi::new(&server.url(), Arc::new(SignedOut)).unwrap();
        assert!(matches!(
            api.list_conversations().await,
            Err(ApiError::Unauthorized)
        ));
        mock.assert_async().await;
    }

    #[test]
    fn test_base_url_with_prefix_keeps_prefix() {
        let api = HttpChatApi::new(
            "http://coach.example/backend",
            Arc::new(StaticCredential::new("tok")),
        )
        .unwrap();
        assert_eq!(
            api.endpoint("api/chat").unwrap().as_str(),
            "http://coach.example/backend/api/chat"
        );
    }
}
