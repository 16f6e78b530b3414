//! Login and registration forms.
//!
//! Both flows return an [`AuthFormView`] describing what the form should show:
//! per-field errors, a form-level message, and whether the password input is
//! cleared. On success the user record is remembered locally under
//! [`USER_KEY`] and the host is sent to `/` after the redirect delay.

use crate::api::ApiClient;
use crate::error::{ClientError, Field, Result};
use crate::models::{LoginRequest, RegisterRequest, UserRecord};
use crate::storage::{set_json, LocalStore};
use crate::validate::{is_valid_email, is_valid_password, is_valid_username};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const USER_KEY: &str = "user";
pub const HOME_PATH: &str = "/";

const LOGIN_INVALID_EMAIL: &str = "please enter a valid email address";
const LOGIN_BAD_CREDENTIALS: &str = "email or password error";
const LOGIN_SUCCESS: &str = "login success, redirecting...";
const LOGIN_FAILED: &str = "login failed, please try again";

const REGISTER_INVALID_EMAIL: &str = "Please enter a valid email address";
const REGISTER_INVALID_USERNAME: &str = "Username must be 2-30 characters long and can only contain letters, numbers, underscores, and Chinese characters";
const REGISTER_INVALID_PASSWORD: &str =
    "Password must be at least 6 characters long and contain both letters and numbers";
const REGISTER_PASSWORD_MISMATCH: &str = "The passwords you entered do not match";
const REGISTER_EMAIL_EXISTS: &str = "this email is already registered";
const REGISTER_USERNAME_EXISTS: &str = "this username is already taken";
const REGISTER_SUCCESS: &str = "registration successful, redirecting...";
const REGISTER_FAILED: &str = "registration failed, please try again";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl FormMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthFormView {
    pub field_errors: BTreeMap<Field, String>,
    pub message: Option<FormMessage>,
    pub clear_password: bool,
    /// The host was sent to the home page.
    pub redirected: bool,
}

impl AuthFormView {
    pub fn field_error(&self, field: Field) -> Option<&str> {
        self.field_errors.get(&field).map(String::as_str)
    }

    fn set_field(&mut self, field: Field, message: &str) {
        self.field_errors.insert(field, message.to_string());
    }

    fn fail(&mut self, text: impl Into<String>) {
        self.message = Some(FormMessage::error(text));
    }

    fn reject(&mut self, err: ClientError) {
        match err {
            ClientError::Validation { field, message } => {
                self.field_errors.insert(field, message);
            }
            other => self.fail(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub language: String,
}

pub struct AuthForms {
    api: ApiClient,
    store: Arc<dyn LocalStore>,
    redirect_delay: Duration,
    submitting: AtomicBool,
}

impl AuthForms {
    pub fn new(api: ApiClient, store: Arc<dyn LocalStore>, redirect_delay: Duration) -> Self {
        Self {
            api,
            store,
            redirect_delay,
            submitting: AtomicBool::new(false),
        }
    }

    pub async fn login(&self, input: &LoginInput) -> AuthFormView {
        let mut view = AuthFormView::default();
        if let Err(e) = validate_login(input) {
            view.reject(e);
            return view;
        }

        let request = LoginRequest {
            email: input.email.clone(),
            password: input.password.clone(),
        };
        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Login error: {}", e);
                view.fail(LOGIN_FAILED);
                return view;
            }
        };

        if response.is_success() && response.body.is_null() {
            log::error!("Login response was not JSON");
            view.fail(LOGIN_FAILED);
        } else if response.is_success() {
            let user: Option<UserRecord> = response
                .body
                .get("user")
                .cloned()
                .and_then(|user| serde_json::from_value(user).ok());
            match &user {
                Some(user) => {
                    log::info!("Logged in as {}", user.email);
                    self.remember(user).await;
                }
                None => log::info!("Logged in as {}", input.email),
            }
            view.message = Some(FormMessage::success(LOGIN_SUCCESS));
            self.redirect(&mut view).await;
        } else if response.status == 401 {
            view.set_field(Field::Email, LOGIN_BAD_CREDENTIALS);
            view.set_field(Field::Password, LOGIN_BAD_CREDENTIALS);
            view.clear_password = true;
        } else {
            view.fail(response.error_message().unwrap_or_else(|| LOGIN_FAILED.to_string()));
        }
        view
    }

    /// Ignored (empty view) while a previous registration is still running.
    pub async fn register(&self, input: &RegisterInput) -> AuthFormView {
        if self.submitting.swap(true, Ordering::SeqCst) {
            log::warn!("Registration already in progress");
            return AuthFormView::default();
        }
        let view = self.submit_registration(input).await;
        self.submitting.store(false, Ordering::SeqCst);
        view
    }

    async fn submit_registration(&self, input: &RegisterInput) -> AuthFormView {
        let mut view = AuthFormView::default();
        if let Err(e) = validate_registration(input) {
            view.reject(e);
            return view;
        }

        let request = RegisterRequest {
            email: input.email.clone(),
            username: input.username.clone(),
            password: input.password.clone(),
            language: input.language.clone(),
        };
        let response = match self.api.register(&request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Registration error: {}", e);
                view.fail("Registration failed, please try again");
                return view;
            }
        };
        log::debug!("Register response: {}", response.status);

        match response.status {
            200 => {
                let user = merged_user(input, response.body.get("user"));
                log::info!("Registered {}", user.email);
                self.remember(&user).await;
                view.message = Some(FormMessage::success(REGISTER_SUCCESS));
                self.redirect(&mut view).await;
            }
            409 => match response.error_message().as_deref() {
                Some("email_exists") => view.set_field(Field::Email, REGISTER_EMAIL_EXISTS),
                Some("username_exists") => {
                    view.set_field(Field::Username, REGISTER_USERNAME_EXISTS)
                }
                other => view.fail(format!("registration failed: {}", other.unwrap_or_default())),
            },
            _ => view.fail(
                response
                    .error_message()
                    .unwrap_or_else(|| REGISTER_FAILED.to_string()),
            ),
        }
        view
    }

    async fn remember(&self, user: &UserRecord) {
        if let Err(e) = set_json(self.store.as_ref(), USER_KEY, user).await {
            log::warn!("Could not remember user locally: {}", e);
        }
    }

    async fn redirect(&self, view: &mut AuthFormView) {
        tokio::time::sleep(self.redirect_delay).await;
        self.api.host().navigate(HOME_PATH);
        view.redirected = true;
    }
}

fn require(valid: bool, field: Field, message: &str) -> Result<()> {
    if valid {
        Ok(())
    } else {
        Err(ClientError::validation(field, message))
    }
}

fn validate_login(input: &LoginInput) -> Result<()> {
    require(is_valid_email(&input.email), Field::Email, LOGIN_INVALID_EMAIL)
}

/// Stops at the first failing field, in form order.
fn validate_registration(input: &RegisterInput) -> Result<()> {
    require(is_valid_email(&input.email), Field::Email, REGISTER_INVALID_EMAIL)?;
    require(
        is_valid_username(&input.username),
        Field::Username,
        REGISTER_INVALID_USERNAME,
    )?;
    require(
        is_valid_password(&input.password),
        Field::Password,
        REGISTER_INVALID_PASSWORD,
    )?;
    require(
        input.password == input.confirm_password,
        Field::ConfirmPassword,
        REGISTER_PASSWORD_MISMATCH,
    )
}

/// The submitted fields, overridden by whatever the server returned.
fn merged_user(input: &RegisterInput, server_user: Option<&Value>) -> UserRecord {
    let base = UserRecord {
        email: input.email.clone(),
        username: input.username.clone(),
        language: Some(input.language.clone()),
        preferences: None,
    };
    let mut merged = json!({
        "email": input.email,
        "username": input.username,
        "language": input.language,
    });
    if let (Some(Value::Object(fields)), Value::Object(target)) = (server_user, &mut merged) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).unwrap_or(base)
}
