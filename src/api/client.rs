//! HTTP client for the contacts REST backend, using blocking reqwest.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::api::{ApiError, ApiResult, ContactRepository};
use crate::contact::{compose_name, normalize_links, Contact, ContactDraft};
use crate::session::{Session, User};

pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, session: Session) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn register(&mut self, username: &str, email: &str, password: &str) -> Result<User> {
        let body = serde_json::json!({ "username": username, "email": email, "password": password });
        let envelope: Envelope<AuthData> = self.send(Method::POST, "/auth/register", Some(body))?;
        self.accept_auth(envelope, "Registration failed")
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<User> {
        let body = serde_json::json!({ "email": email, "password": password });
        let envelope: Envelope<AuthData> = self.send(Method::POST, "/auth/login", Some(body))?;
        self.accept_auth(envelope, "Login failed")
    }

    fn accept_auth(&mut self, envelope: Envelope<AuthData>, fallback: &str) -> Result<User> {
        let message = envelope.message.clone();
        let data = envelope
            .data
            .filter(|_| envelope.success)
            .ok_or_else(|| anyhow!(message.clone().unwrap_or_else(|| fallback.to_string())))?;
        let token = data
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!(message.unwrap_or_else(|| fallback.to_string())))?;
        let user = data.user.map(BackendUser::into_user);
        self.session.sign_in(token, user.clone())?;
        tracing::info!("signed in");
        user.ok_or_else(|| anyhow!("server did not return the signed-in user"))
    }

    /// Fetch the profile and refresh the stored copy.
    pub fn profile(&mut self) -> Result<User> {
        let envelope: Envelope<UserData> = self.send(Method::GET, "/auth/profile", None)?;
        let user = envelope
            .data
            .and_then(|data| data.user)
            .map(BackendUser::into_user)
            .ok_or_else(|| anyhow!(envelope.message.unwrap_or_else(|| "Profile unavailable".into())))?;
        self.session.update_user(user)?;
        self.session
            .user()
            .cloned()
            .ok_or_else(|| anyhow!("not logged in"))
    }

    pub fn update_profile(&mut self, username: &str, email: &str) -> Result<User> {
        let body = serde_json::json!({ "username": username, "email": email });
        let envelope: Envelope<UserData> = self.send(Method::PUT, "/auth/profile", Some(body))?;
        if !envelope.success {
            bail!(envelope.message.unwrap_or_else(|| "Profile update failed".into()));
        }
        let user = envelope
            .data
            .and_then(|data| data.user)
            .map(BackendUser::into_user)
            .ok_or_else(|| anyhow!("server did not return the updated profile"))?;
        self.session.update_user(user)?;
        self.session
            .user()
            .cloned()
            .ok_or_else(|| anyhow!("not logged in"))
    }

    /// Returns the server's confirmation message.
    pub fn change_password(&mut self, current: &str, new: &str) -> Result<String> {
        let body = serde_json::json!({ "currentPassword": current, "newPassword": new });
        let envelope: Envelope<Value> = self.send(Method::PUT, "/auth/change-password", Some(body))?;
        if !envelope.success {
            bail!(envelope.message.unwrap_or_else(|| "Password change failed".into()));
        }
        Ok(envelope
            .message
            .unwrap_or_else(|| "Password changed successfully.".into()))
    }

    pub fn logout(&mut self) -> Result<()> {
        self.session.clear()
    }

    fn send<T: DeserializeOwned>(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<Envelope<T>> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "api request");

        let mut request = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");
        let had_token = match self.session.token() {
            Some(token) => {
                request = request.bearer_auth(token);
                true
            }
            None => false,
        };
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().map_err(|err| {
            tracing::warn!(%url, error = %err, "request failed");
            ApiError::Network(err)
        })?;
        let status = response.status();

        // A 401 without a token is a rejected login, reported like any other status.
        if status == StatusCode::UNAUTHORIZED && had_token {
            tracing::warn!(%url, "token rejected, clearing session");
            if let Err(err) = self.session.clear() {
                tracing::warn!(error = %err, "failed to clear expired session");
            }
            return Err(ApiError::Unauthorized);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));
        if !is_json {
            let text = response.text().unwrap_or_default();
            let text = text.trim();
            let message = if text.is_empty() {
                format!("Server error: {}", status.as_u16())
            } else {
                text.to_string()
            };
            return Err(ApiError::UnexpectedBody(message));
        }

        let value: Value = response
            .json()
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&value, status),
            });
        }
        serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

impl ContactRepository for ApiClient {
    fn list(&mut self) -> ApiResult<Vec<Contact>> {
        let envelope: Envelope<ContactsData> = self.send(Method::GET, "/contact", None)?;
        if !envelope.success {
            return Ok(Vec::new());
        }
        let now = now_millis();
        let contacts = envelope
            .data
            .and_then(|data| data.contacts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| {
                let contact = record.into_contact(now);
                if contact.is_none() {
                    tracing::warn!("skipping contact without an id");
                }
                contact
            })
            .collect::<Vec<_>>();
        tracing::debug!(count = contacts.len(), "loaded contacts");
        Ok(contacts)
    }

    fn get(&mut self, id: &str) -> ApiResult<Option<Contact>> {
        let path = format!("/contact/{}", id);
        match self.send::<ContactData>(Method::GET, &path, None) {
            Ok(envelope) => Ok(envelope
                .data
                .filter(|_| envelope.success)
                .and_then(|data| data.contact)
                .and_then(|record| record.into_contact(now_millis()))),
            Err(ApiError::Status { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create(&mut self, draft: &ContactDraft) -> ApiResult<Contact> {
        let body = payload(draft)?;
        let envelope: Envelope<ContactData> = self.send(Method::POST, "/contact", Some(body))?;
        saved_contact(envelope)
    }

    fn update(&mut self, id: &str, draft: &ContactDraft) -> ApiResult<Contact> {
        let body = payload(draft)?;
        let path = format!("/contact/{}", id);
        match self.send::<ContactData>(Method::PUT, &path, Some(body)) {
            Ok(envelope) => saved_contact(envelope),
            Err(ApiError::Status { status: 404, .. }) => Err(ApiError::NotFound(id.to_string())),
            Err(err) => Err(err),
        }
    }

    fn delete(&mut self, id: &str) -> ApiResult<bool> {
        let path = format!("/contact/{}", id);
        match self.send::<Value>(Method::DELETE, &path, None) {
            Ok(envelope) => Ok(envelope.success),
            Err(ApiError::Status { status: 404, .. }) => Err(ApiError::NotFound(id.to_string())),
            Err(err) => Err(err),
        }
    }
}

fn error_message(value: &Value, status: StatusCode) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}

fn saved_contact(envelope: Envelope<ContactData>) -> ApiResult<Contact> {
    if !envelope.success {
        return Err(ApiError::Decode(
            envelope
                .message
                .unwrap_or_else(|| "the server did not save the contact".into()),
        ));
    }
    envelope
        .data
        .and_then(|data| data.contact)
        .and_then(|record| record.into_contact(now_millis()))
        .ok_or_else(|| ApiError::Decode("response did not include the saved contact".into()))
}

fn payload(draft: &ContactDraft) -> ApiResult<Value> {
    serde_json::to_value(ContactPayload::from(draft)).map_err(|err| ApiError::Decode(err.to_string()))
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ContactsData {
    contacts: Option<Vec<BackendContact>>,
}

#[derive(Debug, Deserialize)]
struct ContactData {
    contact: Option<BackendContact>,
}

#[derive(Debug, Deserialize)]
struct AuthData {
    token: Option<String>,
    user: Option<BackendUser>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: Option<BackendUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendUser {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    username: Option<String>,
    email: Option<String>,
    profile_picture: Option<String>,
}

impl BackendUser {
    fn into_user(self) -> User {
        User {
            id: self.mongo_id.or(self.id).unwrap_or_default(),
            username: self.username.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            profile_picture: self.profile_picture.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendContact {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    profile_picture: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    address: Option<String>,
    notes: Option<String>,
    social_media: Option<Vec<String>>,
    starred: Option<bool>,
    created_at: Option<Value>,
}

impl BackendContact {
    /// The one place backend shapes become a canonical `Contact`.
    fn into_contact(self, now: i64) -> Option<Contact> {
        let id = self.mongo_id.or(self.id).filter(|id| !id.is_empty())?;
        let first_name = self.first_name.unwrap_or_default();
        let last_name = self.last_name.unwrap_or_default();
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => compose_name(&first_name, &last_name),
        };
        Some(Contact {
            id,
            name,
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            profile_picture: self.profile_picture.unwrap_or_default(),
            company: self.company.unwrap_or_default(),
            job_title: self.job_title.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            social_media: normalize_links(self.social_media.unwrap_or_default()),
            starred: self.starred.unwrap_or(false),
            created_at: coerce_timestamp(self.created_at.as_ref(), now),
            first_name,
            last_name,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_picture: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    social_media: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    starred: Option<bool>,
}

impl<'a> From<&'a ContactDraft> for ContactPayload<'a> {
    fn from(draft: &'a ContactDraft) -> Self {
        Self {
            first_name: draft.first_name.as_deref(),
            last_name: draft.last_name.as_deref(),
            email: draft.email.as_deref(),
            phone: draft.phone.as_deref(),
            profile_picture: draft.profile_picture.as_deref(),
            company: draft.company.as_deref(),
            job_title: draft.job_title.as_deref(),
            address: draft.address.as_deref(),
            notes: draft.notes.as_deref(),
            social_media: draft.social_media.as_deref(),
            starred: draft.starred,
        }
    }
}

// =============================================================================
// Timestamps
// =============================================================================

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Epoch milliseconds from a number, a numeric string or an ISO-8601 date.
/// Missing values become `now`; values that cannot be read become `None`.
fn coerce_timestamp(value: Option<&Value>, now: i64) -> Option<i64> {
    match value {
        None | Some(Value::Null) => Some(now),
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Some(Value::String(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Some(now);
            }
            if let Ok(millis) = text.parse::<i64>() {
                return Some(millis);
            }
            if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
                return Some((parsed.unix_timestamp_nanos() / 1_000_000) as i64);
            }
            let date_only = format_description!("[year]-[month]-[day]");
            Date::parse(text, &date_only)
                .ok()
                .map(|date| date.midnight().assume_utc().unix_timestamp() * 1000)
        }
        Some(_) => None,
    }
}
