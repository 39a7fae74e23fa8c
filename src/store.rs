//! Owner of the in-memory contact collection, the list view state and the
//! selection. Front ends call into the store and listen for `StoreEvent`s;
//! they never edit the collection themselves.
//!
//! The collection only changes after the repository call it mirrors has
//! succeeded, so a failed request leaves the list exactly as it was.
//!
//! One mutation at a time: while a request is running or a merge proposal
//! waits for an answer, every other mutation fails with `StoreError::Busy`.

use thiserror::Error;

use crate::api::{ApiError, ContactRepository};
use crate::contact::{Contact, ContactDraft, ValidationErrors};
use crate::events::{Subscribers, SubscriptionId};
use crate::import::{self, ImportOptions, ImportProgress, ImportReport};
use crate::merge::{self, Resolution};
use crate::view::{self, ContactView, ViewState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    CollectionReplaced,
    ContactSaved(String),
    ContactRemoved(String),
    SelectionChanged(Option<String>),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("another change is still being saved")]
    Busy,
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("contact {0} is not loaded")]
    UnknownContact(String),
}

impl StoreError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Api(ApiError::Unauthorized))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A save that collided with an existing phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeProposal {
    pub target: Contact,
    pub draft: ContactDraft,
    /// Record being edited when the collision happened.
    pub editing_id: Option<String>,
}

impl MergeProposal {
    /// What `target` would look like after merging.
    pub fn preview(&self) -> Contact {
        merge::merge_contact(&self.target, &self.draft)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(String),
    Updated(String),
    Merged(String),
    NeedsConfirmation(MergeProposal),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Fold the submission into the existing contact.
    Merge,
    /// Save as submitted, leaving both records.
    KeepSeparate,
    Cancel,
}

#[derive(Debug)]
enum Pending {
    Request,
    AwaitingMerge(MergeProposal),
}

#[derive(Debug, Default)]
pub struct ContactStore {
    contacts: Vec<Contact>,
    view: ViewState,
    selected: Option<String>,
    pending: Option<Pending>,
    subscribers: Subscribers<StoreEvent>,
}

impl ContactStore {
    pub fn new(view: ViewState) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn view(&self) -> ContactView<'_> {
        view::compute(&self.contacts, &self.view)
    }

    /// Change view inputs, then pull the page and selection back into range.
    pub fn update_view(&mut self, change: impl FnOnce(&mut ViewState)) {
        change(&mut self.view);
        self.normalize_page();
        self.reconcile_selection();
    }

    pub fn selected(&self) -> Option<&Contact> {
        self.selected.as_deref().and_then(|id| self.contact(id))
    }

    pub fn select(&mut self, id: Option<&str>) {
        let next = id.filter(|id| self.contact(id).is_some()).map(str::to_string);
        self.set_selection(next);
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_merge(&self) -> Option<&MergeProposal> {
        match &self.pending {
            Some(Pending::AwaitingMerge(proposal)) => Some(proposal),
            _ => None,
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&StoreEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Replace the collection with the repository's current list.
    pub fn load<R: ContactRepository + ?Sized>(&mut self, repo: &mut R) -> StoreResult<()> {
        let contacts = self.with_pending(|| repo.list())?;
        self.replace_all(contacts);
        Ok(())
    }

    fn replace_all(&mut self, contacts: Vec<Contact>) {
        tracing::debug!(count = contacts.len(), "collection replaced");
        self.contacts = contacts;
        self.normalize_page();
        self.subscribers.emit(&StoreEvent::CollectionReplaced);
        self.reconcile_selection();
    }

    /// Validate and persist a draft. A phone collision is not saved yet: the
    /// proposal comes back for confirmation through [`Self::resolve_merge`].
    pub fn save<R: ContactRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        draft: ContactDraft,
        editing_id: Option<&str>,
    ) -> StoreResult<SaveOutcome> {
        self.ensure_idle()?;
        let draft = draft.normalized();
        draft.validate()?;
        if let Some(id) = editing_id {
            if self.contact(id).is_none() {
                return Err(StoreError::UnknownContact(id.to_string()));
            }
        }

        match merge::resolve(&self.contacts, &draft, editing_id) {
            Resolution::Create => self.create(repo, &draft),
            Resolution::Update { id } => self.update(repo, &id, &draft),
            Resolution::Merge {
                target_id,
                editing_id,
            } => {
                let target = self
                    .contact(&target_id)
                    .cloned()
                    .ok_or(StoreError::UnknownContact(target_id))?;
                let proposal = MergeProposal {
                    target,
                    draft,
                    editing_id,
                };
                tracing::debug!(target = %proposal.target.id, "duplicate phone, awaiting merge decision");
                self.pending = Some(Pending::AwaitingMerge(proposal.clone()));
                Ok(SaveOutcome::NeedsConfirmation(proposal))
            }
        }
    }

    /// Answer the outstanding merge proposal.
    pub fn resolve_merge<R: ContactRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        decision: MergeDecision,
    ) -> StoreResult<SaveOutcome> {
        let proposal = match self.pending.take() {
            Some(Pending::AwaitingMerge(proposal)) => proposal,
            other => {
                self.pending = other;
                return Ok(SaveOutcome::Cancelled);
            }
        };

        match decision {
            MergeDecision::Cancel => Ok(SaveOutcome::Cancelled),
            MergeDecision::KeepSeparate => match &proposal.editing_id {
                Some(id) => self.update(repo, id, &proposal.draft),
                None => self.create(repo, &proposal.draft),
            },
            MergeDecision::Merge => self.merge_into(repo, proposal),
        }
    }

    /// Overlay the draft onto the target. When an edit caused the collision
    /// the edited record is deleted, leaving one contact for the phone.
    fn merge_into<R: ContactRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        proposal: MergeProposal,
    ) -> StoreResult<SaveOutcome> {
        let target_id = proposal.target.id.clone();
        let saved = self.with_pending(|| repo.update(&target_id, &proposal.draft))?;
        self.put(saved);
        self.subscribers.emit(&StoreEvent::ContactSaved(target_id.clone()));

        if let Some(editing_id) = proposal.editing_id.filter(|id| *id != target_id) {
            let removed = self.with_pending(|| repo.delete(&editing_id))?;
            if removed {
                self.remove_local(&editing_id);
            }
        }

        self.set_selection(Some(target_id.clone()));
        self.normalize_page();
        self.reconcile_selection();
        Ok(SaveOutcome::Merged(target_id))
    }

    fn create<R: ContactRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        draft: &ContactDraft,
    ) -> StoreResult<SaveOutcome> {
        let saved = self.with_pending(|| repo.create(draft))?;
        let id = saved.id.clone();
        tracing::info!(%id, "contact created");
        self.put(saved);
        self.subscribers.emit(&StoreEvent::ContactSaved(id.clone()));
        self.set_selection(Some(id.clone()));
        self.normalize_page();
        self.reconcile_selection();
        Ok(SaveOutcome::Created(id))
    }

    fn update<R: ContactRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        id: &str,
        draft: &ContactDraft,
    ) -> StoreResult<SaveOutcome> {
        let saved = self.with_pending(|| repo.update(id, draft))?;
        tracing::info!(%id, "contact updated");
        self.put(saved);
        self.subscribers.emit(&StoreEvent::ContactSaved(id.to_string()));
        self.normalize_page();
        self.reconcile_selection();
        Ok(SaveOutcome::Updated(id.to_string()))
    }

    /// Returns whether the server removed the contact.
    pub fn delete<R: ContactRepository + ?Sized>(&mut self, repo: &mut R, id: &str) -> StoreResult<bool> {
        self.ensure_idle()?;
        if self.contact(id).is_none() {
            return Err(StoreError::UnknownContact(id.to_string()));
        }
        let removed = self.with_pending(|| repo.delete(id))?;
        if removed {
            tracing::info!(%id, "contact deleted");
            self.remove_local(id);
            self.normalize_page();
            self.reconcile_selection();
        }
        Ok(removed)
    }

    /// Flip the star flag. Returns the new value.
    pub fn toggle_star<R: ContactRepository + ?Sized>(&mut self, repo: &mut R, id: &str) -> StoreResult<bool> {
        self.ensure_idle()?;
        let current = self
            .contact(id)
            .map(|c| c.starred)
            .ok_or_else(|| StoreError::UnknownContact(id.to_string()))?;
        let saved = self.with_pending(|| repo.update(id, &ContactDraft::starred(!current)))?;
        let starred = saved.starred;
        self.put(saved);
        self.subscribers.emit(&StoreEvent::ContactSaved(id.to_string()));
        self.normalize_page();
        self.reconcile_selection();
        Ok(starred)
    }

    /// Import rows one by one, then refetch the whole collection.
    pub fn import<R: ContactRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        drafts: Vec<ContactDraft>,
        options: ImportOptions,
        progress: &mut dyn ImportProgress,
    ) -> StoreResult<ImportReport> {
        self.ensure_idle()?;
        let existing = self.contacts.clone();
        let report =
            self.with_pending(|| import::import_drafts(repo, &existing, drafts, options, progress))?;
        self.load(repo)?;
        Ok(report)
    }

    fn ensure_idle(&self) -> StoreResult<()> {
        if self.pending.is_some() {
            tracing::debug!("mutation refused while another is pending");
            return Err(StoreError::Busy);
        }
        Ok(())
    }

    fn with_pending<T>(&mut self, call: impl FnOnce() -> Result<T, ApiError>) -> StoreResult<T> {
        self.pending = Some(Pending::Request);
        let result = call();
        self.pending = None;
        Ok(result?)
    }

    /// Insert or replace by id.
    fn put(&mut self, contact: Contact) {
        match self.contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(slot) => *slot = contact,
            None => self.contacts.push(contact),
        }
    }

    fn remove_local(&mut self, id: &str) {
        let before = self.contacts.len();
        self.contacts.retain(|c| c.id != id);
        if self.contacts.len() != before {
            self.subscribers.emit(&StoreEvent::ContactRemoved(id.to_string()));
        }
    }

    fn normalize_page(&mut self) {
        let filtered = view::filter(&self.contacts, &self.view).len();
        let total = view::total_pages(filtered, self.view.page_size);
        self.view.page = view::clamp_page(self.view.page, total);
    }

    /// Keep the selection inside the filtered set, defaulting to its first
    /// contact.
    fn reconcile_selection(&mut self) {
        let next = {
            let view = self.view();
            let still_visible = self
                .selected
                .as_deref()
                .filter(|id| view.filtered.iter().any(|c| c.id == *id));
            match still_visible {
                Some(id) => Some(id.to_string()),
                None => view.filtered.first().map(|c| c.id.clone()),
            }
        };
        self.set_selection(next);
    }

    fn set_selection(&mut self, next: Option<String>) {
        if self.selected != next {
            self.selected = next;
            self.subscribers
                .emit(&StoreEvent::SelectionChanged(self.selected.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryRepository;
    use crate::contact::sample;
    use crate::import::NoProgress;
    use crate::view::FilterMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn draft(first: &str, phone: &str) -> ContactDraft {
        ContactDraft {
            first_name: Some(first.into()),
            last_name: Some(String::new()),
            phone: Some(phone.into()),
            ..ContactDraft::default()
        }
    }

    fn loaded(contacts: Vec<Contact>) -> (ContactStore, MemoryRepository) {
        let mut repo = MemoryRepository::with_contacts(contacts);
        let mut store = ContactStore::new(ViewState::default());
        store.load(&mut repo).unwrap();
        (store, repo)
    }

    fn record_events(store: &mut ContactStore) -> Rc<RefCell<Vec<StoreEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn load_selects_first_filtered_contact() {
        let (store, _) = loaded(vec![
            sample("b", "Bea", "", "09170000002", 2),
            sample("a", "Ana", "", "09170000001", 1),
        ]);
        assert_eq!(store.selected().map(|c| c.id.as_str()), Some("a"));
    }

    #[test]
    fn create_adds_contact_and_selects_it() {
        let (mut store, mut repo) = loaded(vec![sample("a", "Ana", "", "09170000001", 1)]);
        let events = record_events(&mut store);

        let outcome = store.save(&mut repo, draft("Zed", "09189999999"), None).unwrap();
        let SaveOutcome::Created(id) = outcome else {
            panic!("expected a create");
        };
        assert_eq!(store.contacts().len(), 2);
        assert_eq!(store.selected().map(|c| c.id.clone()), Some(id.clone()));
        assert!(events.borrow().contains(&StoreEvent::ContactSaved(id)));
    }

    #[test]
    fn invalid_draft_is_not_submitted() {
        let (mut store, mut repo) = loaded(Vec::new());
        let err = store.save(&mut repo, draft("", "12"), None).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(repo.calls.iter().all(|call| call == "list"));
    }

    #[test]
    fn duplicate_phone_waits_for_confirmation_and_blocks_other_mutations() {
        let (mut store, mut repo) = loaded(vec![sample("a", "Ana", "", "0917-123-4567", 1)]);

        let outcome = store.save(&mut repo, draft("Anna", "09171234567"), None).unwrap();
        let SaveOutcome::NeedsConfirmation(proposal) = outcome else {
            panic!("expected a merge proposal");
        };
        assert_eq!(proposal.target.id, "a");
        assert_eq!(proposal.preview().first_name, "Anna");
        assert!(store.is_busy());
        assert!(matches!(store.toggle_star(&mut repo, "a"), Err(StoreError::Busy)));

        let merged = store.resolve_merge(&mut repo, MergeDecision::Merge).unwrap();
        assert_eq!(merged, SaveOutcome::Merged("a".into()));
        assert!(!store.is_busy());
        assert_eq!(store.contacts().len(), 1);
        assert_eq!(store.contact("a").unwrap().first_name, "Anna");
        assert_eq!(store.contact("a").unwrap().created_at, Some(1));
    }

    #[test]
    fn keep_separate_saves_as_submitted() {
        let (mut store, mut repo) = loaded(vec![sample("a", "Ana", "", "0917-123-4567", 1)]);
        store.save(&mut repo, draft("Anna", "09171234567"), None).unwrap();
        let outcome = store
            .resolve_merge(&mut repo, MergeDecision::KeepSeparate)
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Created(_)));
        assert_eq!(store.contacts().len(), 2);
    }

    #[test]
    fn cancel_leaves_collection_untouched() {
        let (mut store, mut repo) = loaded(vec![sample("a", "Ana", "", "0917-123-4567", 1)]);
        store.save(&mut repo, draft("Anna", "09171234567"), None).unwrap();
        let outcome = store.resolve_merge(&mut repo, MergeDecision::Cancel).unwrap();
        assert_eq!(outcome, SaveOutcome::Cancelled);
        assert!(!store.is_busy());
        assert_eq!(store.contact("a").unwrap().first_name, "Ana");
    }

    #[test]
    fn edit_merge_removes_the_edited_record() {
        let (mut store, mut repo) = loaded(vec![
            sample("a", "Ana", "", "0917-123-4567", 1),
            sample("b", "Ben", "", "0918-000-0000", 2),
        ]);
        let events = record_events(&mut store);

        store
            .save(&mut repo, draft("Ben", "09171234567"), Some("b"))
            .unwrap();
        store.resolve_merge(&mut repo, MergeDecision::Merge).unwrap();

        assert!(store.contact("b").is_none());
        assert_eq!(store.contact("a").unwrap().first_name, "Ben");
        assert_eq!(repo.contacts.len(), 1);
        assert!(events
            .borrow()
            .contains(&StoreEvent::ContactRemoved("b".into())));
    }

    #[test]
    fn failed_update_leaves_collection_unchanged() {
        let (mut store, mut repo) = loaded(vec![sample("a", "Ana", "", "09170000001", 1)]);
        repo.contacts.clear();
        let err = store
            .save(&mut repo, draft("Changed", "09170000001"), Some("a"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Api(ApiError::NotFound(_))));
        assert_eq!(store.contact("a").unwrap().first_name, "Ana");
        assert!(!store.is_busy());
    }

    #[test]
    fn delete_moves_selection_to_next_contact() {
        let (mut store, mut repo) = loaded(vec![
            sample("a", "Ana", "", "09170000001", 1),
            sample("b", "Ben", "", "09170000002", 2),
        ]);
        assert!(store.delete(&mut repo, "a").unwrap());
        assert_eq!(store.selected().map(|c| c.id.as_str()), Some("b"));
    }

    #[test]
    fn toggle_star_sends_only_the_flag() {
        let (mut store, mut repo) = loaded(vec![sample("a", "Ana", "", "09170000001", 1)]);
        assert!(store.toggle_star(&mut repo, "a").unwrap());
        assert!(store.contact("a").unwrap().starred);
        assert_eq!(store.contact("a").unwrap().first_name, "Ana");
    }

    #[test]
    fn starred_filter_clears_selection_of_unstarred_contact() {
        let (mut store, _) = loaded(vec![sample("a", "Ana", "", "09170000001", 1)]);
        store.update_view(|view| view.filter = FilterMode::Starred);
        assert!(store.selected().is_none());
    }

    #[test]
    fn deleting_last_item_on_last_page_clamps_page() {
        let contacts = (0..8)
            .map(|i| sample(&format!("c{i}"), &format!("N{i}"), "", &format!("091700000{i:02}"), i))
            .collect();
        let (mut store, mut repo) = loaded(contacts);
        store.update_view(|view| view.page = 2);
        assert_eq!(store.view().visible.len(), 1);

        store.delete(&mut repo, "c7").unwrap();
        assert_eq!(store.view_state().page, 1);
    }

    #[test]
    fn unstarring_last_item_on_last_starred_page_clamps_page() {
        let contacts = (0..8)
            .map(|i| {
                let mut contact =
                    sample(&format!("c{i}"), &format!("N{i}"), "", &format!("091700000{i:02}"), i);
                contact.starred = true;
                contact
            })
            .collect();
        let (mut store, mut repo) = loaded(contacts);
        store.update_view(|view| {
            view.filter = FilterMode::Starred;
            view.page = 2;
        });
        assert_eq!(store.view().total_pages, 2);

        assert!(!store.toggle_star(&mut repo, "c7").unwrap());
        assert_eq!(store.view().total_pages, 1);
        assert_eq!(store.view_state().page, 1);
    }

    #[test]
    fn import_refetches_collection() {
        let (mut store, mut repo) = loaded(Vec::new());
        let events = record_events(&mut store);
        let drafts = vec![draft("Ana", "09171112222"), draft("", "")];

        let report = store
            .import(&mut repo, drafts, ImportOptions::default(), &mut NoProgress)
            .unwrap();
        assert_eq!((report.success_count, report.fail_count), (1, 1));
        assert_eq!(store.contacts().len(), 1);
        assert!(events.borrow().contains(&StoreEvent::CollectionReplaced));
    }

    #[test]
    fn expired_session_surfaces_as_unauthorized() {
        let (mut store, mut repo) = loaded(vec![sample("a", "Ana", "", "09170000001", 1)]);
        repo.expired = true;
        let err = store.delete(&mut repo, "a").unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(store.contacts().len(), 1);
    }
}
