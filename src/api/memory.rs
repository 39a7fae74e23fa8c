//! In-memory `ContactRepository` for store and import tests.

use std::collections::HashSet;

use crate::api::{ApiError, ApiResult, ContactRepository};
use crate::contact::{Contact, ContactDraft};

#[derive(Debug, Default)]
pub struct MemoryRepository {
    pub contacts: Vec<Contact>,
    pub(crate) next_id: u64,
    pub(crate) clock: i64,
    /// Phones (as typed) the fake server refuses to store.
    pub reject_phones: HashSet<String>,
    /// Every call fails with 401 while set.
    pub expired: bool,
    pub calls: Vec<String>,
}

impl MemoryRepository {
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        let clock = contacts
            .iter()
            .filter_map(|contact| contact.created_at)
            .max()
            .unwrap_or(0);
        Self {
            contacts,
            clock,
            ..Self::default()
        }
    }

    fn check(&mut self, call: String) -> ApiResult<()> {
        self.calls.push(call);
        if self.expired {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

impl ContactRepository for MemoryRepository {
    fn list(&mut self) -> ApiResult<Vec<Contact>> {
        self.check("list".into())?;
        Ok(self.contacts.clone())
    }

    fn get(&mut self, id: &str) -> ApiResult<Option<Contact>> {
        self.check(format!("get {id}"))?;
        Ok(self.contacts.iter().find(|c| c.id == id).cloned())
    }

    fn create(&mut self, draft: &ContactDraft) -> ApiResult<Contact> {
        self.check("create".into())?;
        if let Some(phone) = &draft.phone {
            if self.reject_phones.contains(phone) {
                return Err(ApiError::Status {
                    status: 400,
                    message: format!("phone {phone} rejected"),
                });
            }
        }
        self.next_id += 1;
        self.clock += 1;
        let base = Contact {
            id: format!("new-{}", self.next_id),
            first_name: String::new(),
            last_name: String::new(),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            profile_picture: String::new(),
            company: String::new(),
            job_title: String::new(),
            address: String::new(),
            notes: String::new(),
            social_media: Vec::new(),
            starred: false,
            created_at: Some(self.clock),
        };
        let contact = draft.overlay(&base);
        self.contacts.push(contact.clone());
        Ok(contact)
    }

    fn update(&mut self, id: &str, draft: &ContactDraft) -> ApiResult<Contact> {
        self.check(format!("update {id}"))?;
        let slot = self
            .contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        *slot = draft.overlay(slot);
        Ok(slot.clone())
    }

    fn delete(&mut self, id: &str) -> ApiResult<bool> {
        self.check(format!("delete {id}"))?;
        let before = self.contacts.len();
        self.contacts.retain(|c| c.id != id);
        if self.contacts.len() == before {
            return Err(ApiError::NotFound(id.to_string()));
        }
        Ok(true)
    }
}
