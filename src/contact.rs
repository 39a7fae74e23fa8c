//! Canonical contact record and the draft shape used for create/update.
//!
//! `Contact` is what the rest of the program sees after the API boundary has
//! normalized a backend record. `ContactDraft` carries form or CSV input where
//! every field is optional: `None` means "not provided", which matters for
//! partial updates and for merging into an existing record.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const MIN_PHONE_DIGITS: usize = 10;
pub const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Display name, derived from first and last name unless the store sent one.
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_picture: String,
    pub company: String,
    pub job_title: String,
    pub address: String,
    pub notes: String,
    pub social_media: Vec<String>,
    pub starred: bool,
    /// Epoch milliseconds. `None` when the store sent a timestamp that could
    /// not be parsed; such contacts order before every dated one.
    pub created_at: Option<i64>,
}

impl Contact {
    /// Name used for ordering and grouping: first name, else the display name.
    pub fn sort_name(&self) -> &str {
        let first = self.first_name.trim();
        if first.is_empty() {
            self.name.trim()
        } else {
            first
        }
    }

    /// Bucket key for directory-style grouping.
    pub fn initial(&self) -> String {
        match self.sort_name().chars().next() {
            Some(ch) => ch.to_uppercase().collect(),
            None => "Unknown".to_string(),
        }
    }

    pub fn phone_key(&self) -> String {
        normalize_phone(&self.phone)
    }

    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            "(no name)"
        } else {
            name
        }
    }
}

/// trim(first + " " + last)
pub fn compose_name(first: &str, last: &str) -> String {
    format!("{} {}", first, last).trim().to_string()
}

/// Strip everything but ASCII digits. Used as the de-duplication key.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn is_valid_phone(phone: &str) -> bool {
    let digits = normalize_phone(phone).len();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL.get_or_init(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern is valid"));
    re.is_match(email)
}

/// Trim links and drop the empty ones.
pub fn normalize_links<I, S>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    links
        .into_iter()
        .map(|link| link.as_ref().trim().to_string())
        .filter(|link| !link.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FirstName,
    LastName,
    Email,
    Phone,
    ProfilePicture,
    Company,
    JobTitle,
    Address,
    SocialMedia,
    Notes,
    Starred,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::FirstName => "First Name",
            Field::LastName => "Last Name",
            Field::Email => "Email",
            Field::Phone => "Phone",
            Field::ProfilePicture => "Profile Picture",
            Field::Company => "Company",
            Field::JobTitle => "Job Title",
            Field::Address => "Address",
            Field::SocialMedia => "Social Media Links",
            Field::Notes => "Notes",
            Field::Starred => "Starred",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn for_field(&self, field: Field) -> Option<&FieldError> {
        self.0.iter().find(|err| err.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub social_media: Option<Vec<String>>,
    pub starred: Option<bool>,
}

impl ContactDraft {
    /// A fully defined draft holding every field of `contact`.
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            first_name: Some(contact.first_name.clone()),
            last_name: Some(contact.last_name.clone()),
            email: Some(contact.email.clone()),
            phone: Some(contact.phone.clone()),
            profile_picture: Some(contact.profile_picture.clone()),
            company: Some(contact.company.clone()),
            job_title: Some(contact.job_title.clone()),
            address: Some(contact.address.clone()),
            notes: Some(contact.notes.clone()),
            social_media: Some(contact.social_media.clone()),
            starred: Some(contact.starred),
        }
    }

    pub fn starred(starred: bool) -> Self {
        Self {
            starred: Some(starred),
            ..Self::default()
        }
    }

    pub fn phone_key(&self) -> String {
        self.phone.as_deref().map(normalize_phone).unwrap_or_default()
    }

    /// Name the draft would display as, if first or last name is provided.
    pub fn composed_name(&self) -> Option<String> {
        if self.first_name.is_none() && self.last_name.is_none() {
            return None;
        }
        Some(compose_name(
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or(""),
        ))
    }

    /// Trim text fields and drop empty social links.
    pub fn normalized(mut self) -> Self {
        for value in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.email,
            &mut self.phone,
            &mut self.profile_picture,
            &mut self.company,
            &mut self.job_title,
            &mut self.address,
        ]
        .into_iter()
        .flatten()
        {
            *value = value.trim().to_string();
        }
        if let Some(links) = self.social_media.take() {
            self.social_media = Some(normalize_links(links));
        }
        self
    }

    /// Checks applied before a create or a full edit is submitted.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        let first = self.first_name.as_deref().unwrap_or("").trim();
        if first.is_empty() {
            errors.push(FieldError::new(Field::FirstName, "First Name is required."));
        }

        let email = self.email.as_deref().unwrap_or("").trim();
        if !email.is_empty() && !is_valid_email(email) {
            errors.push(FieldError::new(Field::Email, "Invalid email."));
        }

        let phone = self.phone.as_deref().unwrap_or("").trim();
        if phone.is_empty() {
            errors.push(FieldError::new(Field::Phone, "Phone is required."));
        } else if !is_valid_phone(phone) {
            errors.push(FieldError::new(
                Field::Phone,
                format!(
                    "Invalid phone (expected {}-{} digits).",
                    MIN_PHONE_DIGITS, MAX_PHONE_DIGITS
                ),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Shallow overlay: every field this draft provides replaces the one in
    /// `base`. Identity and creation time always stay with `base`.
    pub fn overlay(&self, base: &Contact) -> Contact {
        fn pick(incoming: &Option<String>, existing: &str) -> String {
            incoming.clone().unwrap_or_else(|| existing.to_string())
        }

        let first_name = pick(&self.first_name, &base.first_name);
        let last_name = pick(&self.last_name, &base.last_name);
        let name = if self.first_name.is_some() || self.last_name.is_some() {
            compose_name(&first_name, &last_name)
        } else {
            base.name.clone()
        };

        Contact {
            id: base.id.clone(),
            name,
            email: pick(&self.email, &base.email),
            phone: pick(&self.phone, &base.phone),
            profile_picture: pick(&self.profile_picture, &base.profile_picture),
            company: pick(&self.company, &base.company),
            job_title: pick(&self.job_title, &base.job_title),
            address: pick(&self.address, &base.address),
            notes: pick(&self.notes, &base.notes),
            social_media: self
                .social_media
                .clone()
                .unwrap_or_else(|| base.social_media.clone()),
            starred: self.starred.unwrap_or(base.starred),
            created_at: base.created_at,
            first_name,
            last_name,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, first: &str, last: &str, phone: &str, created_at: i64) -> Contact {
    Contact {
        id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        name: compose_name(first, last),
        email: String::new(),
        phone: phone.to_string(),
        profile_picture: String::new(),
        company: String::new(),
        job_title: String::new(),
        address: String::new(),
        notes: String::new(),
        social_media: Vec::new(),
        starred: false,
        created_at: Some(created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> ContactDraft {
        ContactDraft {
            first_name: Some("Maria".into()),
            last_name: Some("Santos".into()),
            phone: Some("0917-123-4567".into()),
            email: Some("maria@example.com".into()),
            ..ContactDraft::default()
        }
    }

    #[test]
    fn compose_name_trims_missing_last_name() {
        assert_eq!(compose_name("Ana", ""), "Ana");
        assert_eq!(compose_name("Ana", "Reyes"), "Ana Reyes");
        assert_eq!(compose_name("", ""), "");
    }

    #[test]
    fn normalize_phone_keeps_digits_only() {
        assert_eq!(normalize_phone("+63 (917) 123-4567"), "639171234567");
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("n/a"), "");
    }

    #[test]
    fn phone_validation_uses_digit_count() {
        assert!(is_valid_phone("0917-123-4567"));
        assert!(is_valid_phone("+63 917 123 4567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("1234567890123456"));
    }

    #[test]
    fn email_validation_requires_local_and_domain() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no at sign.com"));
        assert!(!is_valid_email("two words@x.com"));
    }

    #[test]
    fn validate_accepts_complete_draft() {
        assert!(valid_draft().validate().is_ok());
    }

    #[test]
    fn validate_reports_each_field() {
        let draft = ContactDraft {
            first_name: Some("   ".into()),
            email: Some("broken".into()),
            phone: Some("123".into()),
            ..ContactDraft::default()
        };
        let errors = draft.validate().unwrap_err();
        assert!(errors.for_field(Field::FirstName).is_some());
        assert!(errors.for_field(Field::Email).is_some());
        assert!(errors.for_field(Field::Phone).is_some());
        assert!(errors.for_field(Field::Company).is_none());
    }

    #[test]
    fn validate_allows_missing_email() {
        let mut draft = valid_draft();
        draft.email = None;
        assert!(draft.validate().is_ok());
        draft.email = Some(String::new());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn overlay_keeps_identity_and_creation_time() {
        let base = sample("id-1", "Old", "Name", "0917-000-0000", 100);
        let draft = ContactDraft {
            first_name: Some("New".into()),
            company: Some("Acme".into()),
            ..ContactDraft::default()
        };
        let merged = draft.overlay(&base);
        assert_eq!(merged.id, "id-1");
        assert_eq!(merged.created_at, Some(100));
        assert_eq!(merged.first_name, "New");
        assert_eq!(merged.last_name, "Name");
        assert_eq!(merged.name, "New Name");
        assert_eq!(merged.company, "Acme");
        assert_eq!(merged.phone, "0917-000-0000");
    }

    #[test]
    fn normalized_drops_empty_links_and_trims() {
        let draft = ContactDraft {
            first_name: Some("  Jo ".into()),
            social_media: Some(vec![" https://a ".into(), "".into(), "  ".into()]),
            ..ContactDraft::default()
        }
        .normalized();
        assert_eq!(draft.first_name.as_deref(), Some("Jo"));
        assert_eq!(draft.social_media, Some(vec!["https://a".to_string()]));
    }

    #[test]
    fn initial_falls_back_to_unknown() {
        let mut contact = sample("1", "", "", "", 0);
        assert_eq!(contact.initial(), "Unknown");
        contact.name = "zed".into();
        assert_eq!(contact.initial(), "Z");
        contact.first_name = "élodie".into();
        assert_eq!(contact.initial(), "É");
    }
}
