use crate::error::{ClientError, Result};
use crate::host::UiHost;
use crate::models::{
    Ack, ChatMessage, ChatReply, ChatRequest, LoginRequest, NewSessionResponse, PasswordChange,
    Preferences, PreferencesResponse, PreferencesUpdate, ProfileUpdate, RegisterRequest,
    SessionSummary, UploadFile, UploadResponse,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const AUTH_PATH: &str = "/auth";
/// Alert text for an expired session; the display text of `ClientError::SessionExpired`.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Single multipart part named `file`.
    File(UploadFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(Self {
            method: Method::Post,
            path: path.into(),
            body: RequestBody::Json(body),
        })
    }

    pub fn post_file(path: impl Into<String>, file: UploadFile) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: RequestBody::File(file),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body, or `Value::Null` when the body was not JSON.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server's `error` field, if any.
    pub fn error_message(&self) -> Option<String> {
        self.body
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

// Trait defining how requests reach the backend
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

// --- reqwest implementation ---

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// The client keeps a cookie store: the backend authenticates every call
    /// with the session cookie it set at login.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request.path);
        log::debug!("{:?} {}", request.method, url);

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::File(file) => {
                let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.name);
                if !file.mime.is_empty() {
                    part = part.mime_str(&file.mime)?;
                }
                builder.multipart(reqwest::multipart::Form::new().part("file", part))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        if !(200..300).contains(&status) {
            log::warn!("{} returned status {}", url, status);
        }
        Ok(ApiResponse { status, body })
    }
}

/// Typed wrappers over every backend endpoint.
///
/// A 401 from any wrapped endpoint alerts the host, navigates to `/auth`, and
/// yields `Ok(None)`. Other non-2xx statuses become `ClientError::Server`
/// carrying the server's `error` text or an endpoint-specific fallback.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    host: Arc<dyn UiHost>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, host: Arc<dyn UiHost>) -> Self {
        Self { transport, host }
    }

    pub fn host(&self) -> &Arc<dyn UiHost> {
        &self.host
    }

    /// Sends without any status interpretation. Used by the login and
    /// registration forms, where 401 and 409 carry form-level meaning.
    pub async fn raw(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.transport.send(request).await
    }

    fn session_expired(&self, path: &str) {
        let err = ClientError::SessionExpired;
        log::warn!("{}: {}, redirecting to {}", path, err, AUTH_PATH);
        self.host.alert(&err.to_string());
        self.host.navigate(AUTH_PATH);
    }

    async fn call<R: DeserializeOwned>(
        &self,
        request: ApiRequest,
        fallback: impl FnOnce(u16) -> String,
    ) -> Result<Option<R>> {
        let path = request.path.clone();
        let response = self.transport.send(request).await.map_err(|e| {
            log::error!("Request to {} failed: {}", path, e);
            e
        })?;

        if response.status == 401 {
            self.session_expired(&path);
            return Ok(None);
        }
        if !response.is_success() {
            let message = response
                .error_message()
                .unwrap_or_else(|| fallback(response.status));
            log::error!("{} failed with status {}: {}", path, response.status, message);
            return Err(ClientError::server(response.status, message));
        }

        serde_json::from_value(response.body)
            .map(Some)
            .map_err(|e| ClientError::Decode(format!("{}: {}", path, e)))
    }

    pub async fn create_session(&self) -> Result<Option<NewSessionResponse>> {
        let request = ApiRequest::post_json("/api/new-session", &serde_json::json!({}))?;
        self.call(request, |status| format!("Failed to create session: {}", status))
            .await
    }

    pub async fn list_sessions(&self) -> Result<Option<Vec<SessionSummary>>> {
        self.call(ApiRequest::get("/api/sessions"), |status| {
            format!("Failed to get sessions: {}", status)
        })
        .await
    }

    pub async fn history(&self, session_id: &str) -> Result<Option<Vec<ChatMessage>>> {
        let path = format!("/api/history?session_id={}", urlencoding::encode(session_id));
        self.call(ApiRequest::get(path), |status| {
            format!("Failed to get history: {}", status)
        })
        .await
    }

    pub async fn send_chat(
        &self,
        session_id: &str,
        message: &str,
        preferences: &Preferences,
    ) -> Result<Option<ChatReply>> {
        let body = ChatRequest {
            message,
            session_id,
            user_preferences: preferences,
        };
        let request = ApiRequest::post_json("/api/chat", &body)?;
        self.call(request, |_| "Failed to send message".to_string())
            .await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<Option<Ack>> {
        let request = ApiRequest::post_json(
            "/api/delete-session",
            &serde_json::json!({ "session_id": session_id }),
        )?;
        self.call(request, |status| format!("Failed to delete session: {}", status))
            .await
    }

    pub async fn update_title(&self, session_id: &str, title: &str) -> Result<Option<Ack>> {
        let request = ApiRequest::post_json(
            "/api/update-title",
            &serde_json::json!({ "session_id": session_id, "title": title }),
        )?;
        self.call(request, |_| "Failed to update title".to_string())
            .await
    }

    pub async fn get_preferences(&self) -> Result<Option<PreferencesResponse>> {
        self.call(ApiRequest::get("/api/get-preferences"), |_| {
            "Failed to get preferences".to_string()
        })
        .await
    }

    pub async fn update_preferences(&self, update: &PreferencesUpdate) -> Result<Option<Ack>> {
        let request = ApiRequest::post_json("/api/update-preferences", update)?;
        self.call(request, |_| "Failed to update preferences".to_string())
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Option<Ack>> {
        let request = ApiRequest::post_json("/api/update-profile", update)?;
        self.call(request, |_| "Failed to update profile".to_string())
            .await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<Option<Ack>> {
        let request = ApiRequest::post_json("/api/change-password", change)?;
        self.call(request, |_| "Failed to change password".to_string())
            .await
    }

    pub async fn login(&self, login: &LoginRequest) -> Result<ApiResponse> {
        self.raw(ApiRequest::post_json("/api/login", login)?).await
    }

    pub async fn register(&self, register: &RegisterRequest) -> Result<ApiResponse> {
        self.raw(ApiRequest::post_json("/api/register", register)?)
            .await
    }

    pub async fn upload_image(&self, file: UploadFile) -> Result<Option<UploadResponse>> {
        self.call(ApiRequest::post_file("/api/upload/image", file), |status| {
            format!("Upload failed: {}", status)
        })
        .await
    }

    pub async fn upload_document(&self, file: UploadFile) -> Result<Option<UploadResponse>> {
        self.call(
            ApiRequest::post_file("/api/upload/document", file),
            |status| format!("Upload failed: {}", status),
        )
        .await
    }

    /// Topic key to localised topic name.
    pub async fn math_topics(&self, lang: &str) -> Result<Option<BTreeMap<String, String>>> {
        let path = format!("/api/math_topics/{}", urlencoding::encode(lang));
        self.call(ApiRequest::get(path), |status| {
            format!("Failed to get math topics: {}", status)
        })
        .await
    }
}
