//! HTTP client for the docshare API.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::models::{
    AccessChangeRequest, AccessLevel, DocId, Document, DocumentDraft, DocumentUpdate, Group,
    GroupId, LoginResponse, Subject, User, UserId,
};

/// Errors that can occur while talking to the server.
#[derive(Debug)]
pub enum ClientError {
    /// The request never got a response
    HttpError(String),
    /// The server answered with an error body
    ServerError {
        status: StatusCode,
        error: String,
        message: String,
    },
    /// The response body was not what we expected
    DecodeError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::HttpError(e) => write!(f, "HTTP error: {}", e),
            ClientError::ServerError {
                status,
                error,
                message,
            } => write!(f, "Server error ({}, {}): {}", status, error, message),
            ClientError::DecodeError(e) => write!(f, "Unexpected response: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

pub struct ApiClient {
    http: reqwest::Client,
    server_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(server_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.server_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        Err(ClientError::ServerError {
            status,
            error: body["error"].as_str().unwrap_or("unknown").to_string(),
            message: body["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::DecodeError(e.to_string()))
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<User, ClientError> {
        let body = json!({ "login": login, "password": password });
        self.fetch(self.request(Method::POST, "/register").json(&body))
            .await
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = json!({ "login": login, "password": password });
        self.fetch(self.request(Method::POST, "/login").json(&body))
            .await
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.fetch(self.request(Method::GET, "/users/me")).await
    }

    pub async fn rename_me(&self, login: &str) -> Result<User, ClientError> {
        let body = json!({ "login": login });
        self.fetch(self.request(Method::PUT, "/users/me").json(&body))
            .await
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>, ClientError> {
        self.fetch(self.request(Method::GET, "/docs")).await
    }

    pub async fn create_document(&self, draft: &DocumentDraft) -> Result<Document, ClientError> {
        self.fetch(self.request(Method::POST, "/docs").json(draft))
            .await
    }

    pub async fn get_document(&self, id: DocId) -> Result<Document, ClientError> {
        self.fetch(self.request(Method::GET, &format!("/docs/{}", id)))
            .await
    }

    pub async fn edit_document(
        &self,
        id: DocId,
        update: &DocumentUpdate,
    ) -> Result<Document, ClientError> {
        self.fetch(
            self.request(Method::PUT, &format!("/docs/{}", id))
                .json(update),
        )
        .await
    }

    pub async fn delete_document(&self, id: DocId) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, &format!("/docs/{}", id)))
            .await?;
        Ok(())
    }

    pub async fn change_access(
        &self,
        id: DocId,
        subject: Subject,
        access: AccessLevel,
    ) -> Result<Document, ClientError> {
        let body = AccessChangeRequest { subject, access };
        self.fetch(
            self.request(Method::POST, &format!("/docs/{}/access", id))
                .json(&body),
        )
        .await
    }

    pub async fn launch_inspection(&self, id: DocId) -> Result<(), ClientError> {
        self.send(self.request(Method::POST, &format!("/docs/{}/inspection", id)))
            .await?;
        Ok(())
    }

    pub async fn create_group(&self, name: &str) -> Result<Group, ClientError> {
        let body = json!({ "name": name });
        self.fetch(self.request(Method::POST, "/groups").json(&body))
            .await
    }

    pub async fn rename_group(&self, id: GroupId, name: &str) -> Result<Group, ClientError> {
        let body = json!({ "name": name });
        self.fetch(
            self.request(Method::PUT, &format!("/groups/{}", id))
                .json(&body),
        )
        .await
    }

    pub async fn delete_group(&self, id: GroupId) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, &format!("/groups/{}", id)))
            .await?;
        Ok(())
    }

    pub async fn add_member(&self, id: GroupId, member: UserId) -> Result<(), ClientError> {
        let body = json!({ "member_id": member });
        self.send(
            self.request(Method::PUT, &format!("/groups/{}/members", id))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn remove_member(&self, id: GroupId, member: UserId) -> Result<(), ClientError> {
        self.send(self.request(
            Method::DELETE,
            &format!("/groups/{}/members/{}", id, member),
        ))
        .await?;
        Ok(())
    }

    pub async fn members(
        &self,
        id: GroupId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<User>, ClientError> {
        self.fetch(self.request(
            Method::GET,
            &format!("/groups/{}/members?offset={}&limit={}", id, offset, limit),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{inspection_queue, PipelineConfig};
    use crate::server::{router, AppState};
    use crate::store::MemoryStore;
    use crate::auth::TokenIssuer;
    use chrono::TimeDelta;
    use std::sync::Arc;

    /// Serves the API on an ephemeral port. Nothing drains the inspection
    /// queue, which is fine for a handful of documents.
    async fn serve() -> String {
        let (queue, intake) = inspection_queue(&PipelineConfig::default());
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            queue,
            TokenIssuer::new("test-secret", TimeDelta::hours(1)),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _intake = intake;
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_round_trip_against_server() {
        let url = serve().await;
        let anonymous = ApiClient::new(url.clone(), None);

        let ann = anonymous.register("ann", "pw").await.unwrap();
        let session = anonymous.login("ann", "pw").await.unwrap();
        assert_eq!(session.user, ann);

        let client = ApiClient::new(format!("{}/", url), Some(session.token));
        let doc = client
            .create_document(&DocumentDraft {
                text: "notes".to_string(),
                lang: "text".to_string(),
                access: AccessLevel::None,
            })
            .await
            .unwrap();

        let fetched = client.get_document(doc.id).await.unwrap();
        assert_eq!(fetched.access, AccessLevel::Absolute);
        assert_eq!(client.list_documents().await.unwrap().len(), 1);

        match anonymous.get_document(doc.id).await {
            Err(ClientError::ServerError { status, error, .. }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(error, "no_access");
            }
            other => panic!("expected a server error, got {:?}", other),
        }
    }
}
