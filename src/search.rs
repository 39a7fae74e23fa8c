use std::cmp::Ordering;

use deunicode::deunicode;

use crate::contact::Contact;

/// Fold a name for ordering: accents and other scripts transliterated to
/// ASCII, then lowercased, so "Élodie" sorts next to "elodie".
pub fn collation_key(s: &str) -> String {
    deunicode(s.trim()).to_lowercase()
}

/// Case- and accent-insensitive name comparison. Names that fold to the same
/// key compare equal, which keeps a stable sort's input order for them.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a).cmp(&collation_key(b))
}

/// Lowercased, trimmed query. `None` means "match everything".
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Case-insensitive substring match over the searchable text fields. The
/// phone is compared as typed, so "0917123" does not match "0917-123".
pub fn matches(contact: &Contact, normalized_query: &str) -> bool {
    let text_fields = [
        &contact.name,
        &contact.first_name,
        &contact.last_name,
        &contact.email,
        &contact.company,
        &contact.job_title,
    ];
    text_fields
        .iter()
        .any(|field| field.to_lowercase().contains(normalized_query))
        || contact.phone.to_lowercase().contains(normalized_query)
}
