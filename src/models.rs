use serde::{Deserialize, Serialize};

// Wire types for the MathMentor REST backend. Field names follow the server's
// JSON exactly; anything the client does not need is left out.

/// One row of `/api/sessions`, newest first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry of `/api/history`, in sequence order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NewSessionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a str,
    pub user_preferences: &'a Preferences,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Generic `{success, error}` acknowledgement used by most mutating endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub math_topics: Vec<String>,
}

pub fn default_language() -> String {
    "zh".to_string()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: default_language(),
            math_topics: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PreferencesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub preferences: Option<Preferences>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `/api/update-preferences`. The server reads `preferred_language`
/// here while it returns `language` everywhere else.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PreferencesUpdate {
    pub preferred_language: String,
    pub math_topics: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub language: String,
}

/// The user record remembered locally under the `user` key.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UserRecord {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub file_url: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// A file handed to the client for upload: name, MIME type and contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Builds a file whose MIME type is guessed from its name, the way a
    /// browser fills `File.type`.
    pub fn from_name(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = mime_guess::from_path(&name)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        Self { name, mime, bytes }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}
