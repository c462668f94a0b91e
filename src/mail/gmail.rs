//! Gmail REST v1 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::TokenSource;
use crate::error::MailError;
use crate::mail::types::{LabelList, Message, MessagePage};
use crate::mail::{ListRequest, MailProvider};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail client configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// Mailbox owner; `me` means the authenticated user.
    pub user_id: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            user_id: "me".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Gmail REST client.
pub struct GmailClient {
    config: GmailConfig,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
}

impl GmailClient {
    pub fn new(config: GmailConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            tokens,
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/users/{}/{path}",
            self.config.base_url.trim_end_matches('/'),
            self.config.user_id
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        not_found_id: Option<&str>,
    ) -> Result<T, MailError> {
        let token = self.tokens.access_token().await?;

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body, not_found_id));
        }

        resp.json::<T>()
            .await
            .map_err(|e| MailError::Decode(e.to_string()))
    }
}

/// Map a non-success HTTP status to a `MailError`.
fn status_error(status: StatusCode, body: String, id: Option<&str>) -> MailError {
    match (status, id) {
        (StatusCode::UNAUTHORIZED, _) => MailError::AuthExpired,
        (StatusCode::NOT_FOUND, Some(id)) => MailError::NotFound { id: id.to_string() },
        _ => MailError::Api {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Query parameters for a list request. `labelIds` repeats per label.
fn list_params(request: &ListRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", request.query.clone()),
        ("maxResults", request.max_results.to_string()),
    ];
    params.extend(
        request
            .label_ids
            .iter()
            .map(|label| ("labelIds", label.clone())),
    );
    if let Some(ref token) = request.page_token {
        params.push(("pageToken", token.clone()));
    }
    params
}

#[async_trait]
impl MailProvider for GmailClient {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn check_access(&self) -> Result<(), MailError> {
        let labels: LabelList = self.get_json(&self.api_url("labels"), &[], None).await?;
        let ids: Vec<&str> = labels.labels.iter().map(|l| l.id.as_str()).collect();
        debug!(count = ids.len(), labels = ?ids, "Gmail access verified");
        Ok(())
    }

    async fn list_messages(&self, request: &ListRequest) -> Result<MessagePage, MailError> {
        self.get_json(&self.api_url("messages"), &list_params(request), None)
            .await
    }

    async fn get_message(&self, id: &str) -> Result<Message, MailError> {
        let url = self.api_url(&format!("messages/{id}"));
        self.get_json(&url, &[("format", "full".to_string())], Some(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    fn client(base_url: &str) -> GmailClient {
        let config = GmailConfig {
            user_id: "dipam@example.com".into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(2),
        };
        GmailClient::new(config, Arc::new(StaticToken::new("t"))).unwrap()
    }

    #[test]
    fn api_url_includes_user() {
        let gmail = client("https://gmail.googleapis.com/gmail/v1/");
        assert_eq!(
            gmail.api_url("messages/abc"),
            "https://gmail.googleapis.com/gmail/v1/users/dipam@example.com/messages/abc"
        );
    }

    #[test]
    fn list_params_repeat_labels_and_carry_token() {
        let request = ListRequest {
            query: "(meeting OR Zoom) after:1".into(),
            label_ids: vec!["INBOX".into(), "CATEGORY_PERSONAL".into()],
            max_results: 50,
            page_token: Some("next".into()),
        };
        let params = list_params(&request);
        assert!(params.contains(&("q", "(meeting OR Zoom) after:1".to_string())));
        assert!(params.contains(&("maxResults", "50".to_string())));
        assert_eq!(params.iter().filter(|(k, _)| *k == "labelIds").count(), 2);
        assert!(params.contains(&("pageToken", "next".to_string())));
    }

    #[test]
    fn first_page_has_no_token_param() {
        let request = ListRequest {
            query: String::new(),
            label_ids: vec![],
            max_results: 1,
            page_token: None,
        };
        assert!(list_params(&request).iter().all(|(k, _)| *k != "pageToken"));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new(), None),
            MailError::AuthExpired
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new(), Some("m1")),
            MailError::NotFound { id } if id == "m1"
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "nope".into(), None),
            MailError::Api { status: 404, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, String::new(), Some("m1")),
            MailError::Api { status: 500, .. }
        ));
    }

    fn mock_client(server: &mockito::ServerGuard) -> GmailClient {
        let config = GmailConfig {
            user_id: "me".into(),
            base_url: format!("{}/gmail/v1", server.url()),
            timeout: Duration::from_secs(2),
        };
        GmailClient::new(config, Arc::new(StaticToken::new("ya29.test"))).unwrap()
    }

    #[tokio::test]
    async fn list_sends_bearer_labels_and_page_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/gmail/v1/users/me/messages")
            .match_header("authorization", "Bearer ya29.test")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".into(), "(meeting OR Zoom) after:1".into()),
                mockito::Matcher::UrlEncoded("labelIds".into(), "INBOX".into()),
                mockito::Matcher::UrlEncoded("labelIds".into(), "CATEGORY_PERSONAL".into()),
                mockito::Matcher::UrlEncoded("maxResults".into(), "50".into()),
                mockito::Matcher::UrlEncoded("pageToken".into(), "t1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"messages": [{"id": "msg_001", "threadId": "thr_001"},
                                 {"id": "msg_002", "threadId": "thr_001"}],
                    "nextPageToken": "t2", "resultSizeEstimate": 4}"#,
            )
            .create_async()
            .await;

        let request = ListRequest {
            query: "(meeting OR Zoom) after:1".into(),
            label_ids: vec!["INBOX".into(), "CATEGORY_PERSONAL".into()],
            max_results: 50,
            page_token: Some("t1".into()),
        };
        let page = mock_client(&server).list_messages(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].id, "msg_001");
        assert_eq!(page.messages[0].thread_id, "thr_001");
        assert_eq!(page.next_page_token.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn get_message_decodes_full_format() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/gmail/v1/users/me/messages/msg_001")
            .match_header("authorization", "Bearer ya29.test")
            .match_query(mockito::Matcher::UrlEncoded("format".into(), "full".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "msg_001",
                    "threadId": "thr_001",
                    "snippet": "Let's meet",
                    "labelIds": ["INBOX"],
                    "internalDate": "1731401723000",
                    "payload": {
                        "partId": "",
                        "mimeType": "text/plain",
                        "filename": "",
                        "headers": [
                            {"name": "Subject", "value": "Sync on Tuesday"},
                            {"name": "Date", "value": "Tue, 8 Jul 2025 09:00:00 +0000"}
                        ],
                        "body": {"size": 11, "data": "SGVsbG8gV29ybGQ="}
                    }
                }"#,
            )
            .create_async()
            .await;

        let message = mock_client(&server).get_message("msg_001").await.unwrap();

        mock.assert_async().await;
        assert_eq!(message.id, "msg_001");
        assert_eq!(message.subject(), "Sync on Tuesday");
        assert_eq!(message.date(), "Tue, 8 Jul 2025 09:00:00 +0000");
        let payload = message.payload.expect("payload");
        assert_eq!(crate::mail::body::extract_body(&payload), "Hello World");
    }

    #[tokio::test]
    async fn unauthorized_response_is_auth_expired() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gmail/v1/users/me/labels")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#)
            .create_async()
            .await;

        let result = mock_client(&server).check_access().await;
        assert!(matches!(result, Err(MailError::AuthExpired)));
    }

    #[tokio::test]
    async fn missing_message_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gmail/v1/users/me/messages/gone")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": {"code": 404, "message": "Requested entity was not found."}}"#)
            .create_async()
            .await;

        let result = mock_client(&server).get_message("gone").await;
        assert!(matches!(result, Err(MailError::NotFound { id }) if id == "gone"));
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gmail/v1/users/me/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{not json")
            .create_async()
            .await;

        let request = ListRequest {
            query: String::new(),
            label_ids: vec![],
            max_results: 1,
            page_token: None,
        };
        let result = mock_client(&server).list_messages(&request).await;
        assert!(matches!(result, Err(MailError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let gmail = client("http://127.0.0.1:9/gmail/v1");
        let result = gmail.get_message("abc").await;
        assert!(matches!(result, Err(MailError::Transport(_))));
    }
}
