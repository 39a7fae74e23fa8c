//! Duplicate detection on save. Two contacts are the same person when their
//! phone numbers reduce to the same digits.

use crate::contact::{normalize_phone, Contact, ContactDraft};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Create,
    Update { id: String },
    /// An existing record shares the phone key. Needs the user's confirmation
    /// before `target_id` absorbs the submission.
    Merge {
        target_id: String,
        editing_id: Option<String>,
    },
}

/// First contact whose phone reduces to the same digits as `phone`, skipping
/// the record being edited. A phone with no digits never matches.
pub fn find_duplicate<'a>(
    existing: &'a [Contact],
    phone: &str,
    editing_id: Option<&str>,
) -> Option<&'a Contact> {
    let key = normalize_phone(phone);
    if key.is_empty() {
        return None;
    }
    existing
        .iter()
        .filter(|contact| Some(contact.id.as_str()) != editing_id)
        .find(|contact| contact.phone_key() == key)
}

pub fn resolve(existing: &[Contact], incoming: &ContactDraft, editing_id: Option<&str>) -> Resolution {
    let phone = incoming.phone.as_deref().unwrap_or("");
    if let Some(duplicate) = find_duplicate(existing, phone, editing_id) {
        return Resolution::Merge {
            target_id: duplicate.id.clone(),
            editing_id: editing_id.map(str::to_string),
        };
    }
    match editing_id {
        Some(id) => Resolution::Update { id: id.to_string() },
        None => Resolution::Create,
    }
}

/// Shallow overlay of `incoming` onto `existing`: defined fields win, but
/// `id` and `created_at` stay with `existing`.
pub fn merge_contact(existing: &Contact, incoming: &ContactDraft) -> Contact {
    incoming.overlay(existing)
}
