//! Contact persistence and account API.
//!
//! This module provides:
//! - `ContactRepository`, the seam the store and importer talk to
//! - `ApiClient`, the HTTP implementation against the REST backend
//! - `ApiError`, the failure kinds callers branch on

pub mod client;
#[cfg(test)]
pub mod memory;

use thiserror::Error;

use crate::contact::{Contact, ContactDraft};

pub use client::ApiClient;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The token was rejected; the stored session has been cleared.
    #[error("Session expired. Please log in again.")]
    Unauthorized,
    #[error("Failed to connect to server.")]
    Network(#[source] reqwest::Error),
    #[error("{message}")]
    Status { status: u16, message: String },
    /// The server answered with something other than JSON.
    #[error("{0}")]
    UnexpectedBody(String),
    #[error("unexpected response from server: {0}")]
    Decode(String),
    #[error("contact {0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Backing store for contacts. It assigns `id` and `created_at` on create
/// and is the source of truth for both.
pub trait ContactRepository {
    fn list(&mut self) -> ApiResult<Vec<Contact>>;

    /// `Ok(None)` when the contact does not exist.
    fn get(&mut self, id: &str) -> ApiResult<Option<Contact>>;

    fn create(&mut self, draft: &ContactDraft) -> ApiResult<Contact>;

    /// Partial update: only the fields `draft` defines are sent.
    fn update(&mut self, id: &str, draft: &ContactDraft) -> ApiResult<Contact>;

    fn delete(&mut self, id: &str) -> ApiResult<bool>;
}
