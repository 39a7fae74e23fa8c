use std::cell::{Cell, RefCell};
use std::fs;
use std::io::stdout;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;
use tui_widgets::popup::PopupState;

use crate::api::ApiClient;
use crate::config::{Config, UiColors};
use crate::contact::{Contact, ContactDraft};
use crate::csv_io;
use crate::import::{ImportOptions, NoProgress};
use crate::session::{Session, SessionEvent};
use crate::store::{ContactStore, MergeDecision, SaveOutcome, StoreError, StoreEvent};
use crate::view::FilterMode;

use super::draw;
use super::form::{AuthForm, ContactForm, Credentials};

const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub error: bool,
}

pub struct ConfirmModal {
    pub title: String,
    pub message: String,
    pub action: ConfirmAction,
}

pub enum ConfirmAction {
    DeleteContact(String),
}

/// Blocking modal shown while a request runs.
#[derive(Debug, Clone)]
pub struct BusyModal {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPurpose {
    Import,
    Export,
}

pub struct PathPrompt {
    pub purpose: PathPurpose,
    pub input: Input,
}

impl PathPrompt {
    pub fn title(&self) -> &'static str {
        match self.purpose {
            PathPurpose::Import => "IMPORT CSV",
            PathPurpose::Export => "EXPORT CSV",
        }
    }
}

pub struct HelpModal {
    /// Line index at the top of the viewport
    pub scroll: usize,
    pub total_lines: usize,
    /// Updated on every render
    pub viewport_height: usize,
}

impl HelpModal {
    pub fn new(total_lines: usize) -> Self {
        Self {
            scroll: 0,
            total_lines,
            viewport_height: 10,
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = (self.scroll + lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn can_scroll_up(&self) -> bool {
        self.scroll > 0
    }

    pub fn can_scroll_down(&self) -> bool {
        self.scroll + self.viewport_height < self.total_lines
    }
}

pub struct HelpSection {
    pub title: &'static str,
    pub entries: Vec<HelpEntry>,
}

pub struct HelpEntry {
    pub action: &'static str,
    pub keys: String,
}

/// Work run on the next loop turn, after the busy modal has been drawn.
enum PendingAction {
    Load,
    Save {
        draft: ContactDraft,
        editing_id: Option<String>,
    },
    ResolveMerge(MergeDecision),
    Delete(String),
    ToggleStar(String),
    Import {
        drafts: Vec<ContactDraft>,
        unreadable: usize,
    },
    SignIn {
        credentials: Credentials,
        register: bool,
    },
}

impl PendingAction {
    fn busy_label(&self) -> &'static str {
        match self {
            PendingAction::Load => "LOADING...",
            PendingAction::Import { .. } => "IMPORTING...",
            PendingAction::SignIn { .. } => "SIGNING IN...",
            _ => "SAVING...",
        }
    }
}

pub struct App<'a> {
    config: &'a Config,
    client: ApiClient,
    pub store: ContactStore,
    pub search_input: Input,
    pub search_active: bool,
    pub status: Option<Status>,
    pub form: Option<ContactForm>,
    pub auth: Option<AuthForm>,
    pub confirm_modal: Option<ConfirmModal>,
    pub help_modal: Option<HelpModal>,
    pub busy_modal: Option<BusyModal>,
    pub path_prompt: Option<PathPrompt>,
    pub modal_popup: PopupState,
    /// Contact touched by the last successful save, highlighted in the list.
    pub last_saved: Rc<RefCell<Option<String>>>,
    pending: Option<PendingAction>,
    session_expired: Rc<Cell<bool>>,
}

impl<'a> App<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        let mut session = Session::load(&config.session_file);
        let session_expired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&session_expired);
        session.subscribe(move |event| {
            if matches!(event, SessionEvent::SignedOut) {
                flag.set(true);
            }
        });
        let signed_in = session.is_active();

        let client = ApiClient::new(
            &config.api_url,
            Duration::from_secs(config.timeout_secs),
            session,
        )?;
        let last_saved = Rc::new(RefCell::new(None));

        Ok(Self {
            config,
            client,
            store: new_store(config, &last_saved),
            search_input: Input::default(),
            search_active: false,
            status: None,
            form: None,
            auth: (!signed_in).then(|| AuthForm::new(None)),
            confirm_modal: None,
            help_modal: None,
            busy_modal: None,
            path_prompt: None,
            modal_popup: PopupState::default(),
            last_saved,
            pending: signed_in.then_some(PendingAction::Load),
            session_expired,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            if self.session_expired.replace(false) {
                self.on_session_expired();
            }

            draw::render(terminal, self)?;

            if let Some(action) = self.pending.take() {
                self.busy_modal = Some(BusyModal {
                    message: action.busy_label().to_string(),
                });
                draw::render(terminal, self)?;
                self.perform(action);
                self.busy_modal = None;
                continue;
            }

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Requests
    // =========================================================================

    fn perform(&mut self, action: PendingAction) {
        match action {
            PendingAction::Load => match self.store.load(&mut self.client) {
                Ok(()) => {
                    let count = self.store.contacts().len();
                    self.set_status(format!("Loaded {} contacts", count));
                }
                Err(err) => self.report(err),
            },
            PendingAction::Save { draft, editing_id } => {
                match self
                    .store
                    .save(&mut self.client, draft, editing_id.as_deref())
                {
                    Ok(outcome) => self.after_save(outcome),
                    Err(StoreError::Invalid(errors)) => {
                        if let Some(form) = self.form.as_mut() {
                            form.errors = errors;
                        }
                        self.set_error("Please fix the highlighted fields.");
                    }
                    Err(err) => self.report(err),
                }
            }
            PendingAction::ResolveMerge(decision) => {
                match self.store.resolve_merge(&mut self.client, decision) {
                    Ok(outcome) => self.after_save(outcome),
                    Err(err) => self.report(err),
                }
            }
            PendingAction::Delete(id) => match self.store.delete(&mut self.client, &id) {
                Ok(true) => self.set_status("Contact deleted."),
                Ok(false) => self.set_error("The server did not delete the contact."),
                Err(err) => self.report(err),
            },
            PendingAction::ToggleStar(id) => {
                match self.store.toggle_star(&mut self.client, &id) {
                    Ok(true) => self.set_status("Starred."),
                    Ok(false) => self.set_status("Unstarred."),
                    Err(err) => self.report(err),
                }
            }
            PendingAction::Import { drafts, unreadable } => {
                match self.store.import(
                    &mut self.client,
                    drafts,
                    ImportOptions::default(),
                    &mut NoProgress,
                ) {
                    Ok(mut report) => {
                        report.unreadable_count = unreadable;
                        if report.fail_count > 0 || unreadable > 0 {
                            self.set_error(report.summary());
                        } else {
                            self.set_status(report.summary());
                        }
                    }
                    Err(err) => self.report(err),
                }
            }
            PendingAction::SignIn {
                credentials,
                register,
            } => {
                let result = if register {
                    self.client.register(
                        &credentials.username,
                        &credentials.email,
                        &credentials.password,
                    )
                } else {
                    self.client
                        .login(&credentials.email, &credentials.password)
                };
                match result {
                    Ok(user) => {
                        self.auth = None;
                        self.set_status(format!("Signed in as {}", user.username));
                        self.pending = Some(PendingAction::Load);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "sign in failed");
                        if let Some(auth) = self.auth.as_mut() {
                            auth.message = Some(err.to_string());
                        }
                    }
                }
            }
        }
    }

    fn after_save(&mut self, outcome: SaveOutcome) {
        match outcome {
            SaveOutcome::Created(_) => {
                self.form = None;
                self.set_status("Contact added.");
            }
            SaveOutcome::Updated(_) => {
                self.form = None;
                self.set_status("Contact saved.");
            }
            SaveOutcome::Merged(_) => {
                self.form = None;
                self.set_status("Contacts merged.");
            }
            SaveOutcome::NeedsConfirmation(_) => {
                self.modal_popup = PopupState::default();
                self.set_status("Duplicate phone number found.");
            }
            SaveOutcome::Cancelled => self.set_status("Merge cancelled."),
        }
    }

    /// An expired session is picked up by the session listener on the next
    /// loop turn; here it only needs a status line.
    fn report(&mut self, err: StoreError) {
        tracing::warn!(error = %err, "request failed");
        self.set_error(err.to_string());
    }

    fn on_session_expired(&mut self) {
        tracing::info!("session ended, returning to sign in");
        self.form = None;
        self.confirm_modal = None;
        self.path_prompt = None;
        self.search_active = false;
        self.search_input.reset();
        self.store = new_store(self.config, &self.last_saved);
        self.last_saved.replace(None);
        self.auth = Some(AuthForm::new(Some(SESSION_EXPIRED.to_string())));
    }

    // =========================================================================
    // Keys
    // =========================================================================

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Ok(true);
        }

        if self.busy_modal.is_some() {
            return Ok(false);
        }

        if self.help_modal.is_some() {
            self.handle_help_modal_key(key);
            return Ok(false);
        }

        if self.auth.is_some() {
            return Ok(self.handle_auth_key(key));
        }

        if self.store.pending_merge().is_some() {
            self.handle_merge_key(key);
            return Ok(false);
        }

        if self.confirm_modal.is_some() {
            self.handle_confirm_modal_key(key);
            return Ok(false);
        }

        if self.path_prompt.is_some() {
            self.handle_path_prompt_key(key);
            return Ok(false);
        }

        if self.form.is_some() {
            self.handle_form_key(key);
            return Ok(false);
        }

        if self.search_active {
            self.handle_search_key(key);
            return Ok(false);
        }

        Ok(self.handle_list_key(key))
    }

    fn handle_auth_key(&mut self, key: KeyEvent) -> bool {
        let config = self.config;
        let form_keys = &config.keys.form;
        let Some(auth) = self.auth.as_mut() else {
            return false;
        };

        if key_matches_any(&key, &form_keys.cancel) {
            return true;
        }
        if matches!(key.code, KeyCode::F(3)) {
            auth.toggle_mode();
            return false;
        }
        if matches!(key.code, KeyCode::Enter) || key_matches_any(&key, &form_keys.save) {
            match auth.credentials() {
                Ok(credentials) => {
                    auth.message = None;
                    self.pending = Some(PendingAction::SignIn {
                        credentials,
                        register: auth.register,
                    });
                }
                Err(message) => auth.message = Some(message),
            }
            return false;
        }
        if key_matches_any(&key, &form_keys.next) {
            auth.focus_next();
            return false;
        }
        if key_matches_any(&key, &form_keys.prev) {
            auth.focus_prev();
            return false;
        }
        auth.handle_key(key);
        false
    }

    fn handle_merge_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let modal_keys = &config.keys.modal;
        let decision = if key_matches_any(&key, &modal_keys.confirm) {
            MergeDecision::Merge
        } else if key_matches_any(&key, &modal_keys.keep) {
            MergeDecision::KeepSeparate
        } else if key_matches_any(&key, &modal_keys.cancel) {
            MergeDecision::Cancel
        } else {
            return;
        };
        self.pending = Some(PendingAction::ResolveMerge(decision));
    }

    fn handle_confirm_modal_key(&mut self, key: KeyEvent) {
        let Some(modal) = self.confirm_modal.take() else {
            return;
        };
        let config = self.config;
        let modal_keys = &config.keys.modal;

        if key_matches_any(&key, &modal_keys.cancel) || key_matches_any(&key, &modal_keys.keep) {
            return;
        }

        if key_matches_any(&key, &modal_keys.confirm) {
            match modal.action {
                ConfirmAction::DeleteContact(id) => {
                    self.pending = Some(PendingAction::Delete(id));
                }
            }
            return;
        }

        self.confirm_modal = Some(modal);
    }

    fn handle_path_prompt_key(&mut self, key: KeyEvent) {
        let Some(mut prompt) = self.path_prompt.take() else {
            return;
        };

        match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter => {
                let path = PathBuf::from(prompt.input.value().trim());
                let result = match prompt.purpose {
                    PathPurpose::Import => self.start_import(&path),
                    PathPurpose::Export => self.export_to(&path),
                };
                if let Err(err) = result {
                    self.set_error(format!("{:#}", err));
                }
            }
            _ => {
                prompt.input.handle_event(&Event::Key(key));
                self.path_prompt = Some(prompt);
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let form_keys = &config.keys.form;
        let Some(form) = self.form.as_mut() else {
            return;
        };

        if key_matches_any(&key, &form_keys.cancel) {
            self.form = None;
            self.set_status("Cancelled.");
            return;
        }
        if key_matches_any(&key, &form_keys.save) {
            match form.to_draft() {
                Ok(draft) => {
                    self.pending = Some(PendingAction::Save {
                        draft,
                        editing_id: form.editing_id.clone(),
                    });
                }
                Err(errors) => {
                    form.errors = errors;
                    self.set_error("Please fix the highlighted fields.");
                }
            }
            return;
        }
        if key_matches_any(&key, &form_keys.next) {
            form.focus_next();
            return;
        }
        if key_matches_any(&key, &form_keys.prev) {
            form.focus_prev();
            return;
        }
        form.handle_key(key);
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let search_keys = &config.keys.search;

        if key_matches_any(&key, &search_keys.cancel) {
            self.search_active = false;
            self.search_input.reset();
            self.apply_query();
            return;
        }
        if key_matches_any(&key, &search_keys.confirm) {
            self.search_active = false;
            return;
        }
        if let Some(change) = self.search_input.handle_event(&Event::Key(key)) {
            if change.value {
                self.apply_query();
            }
        }
    }

    fn apply_query(&mut self) {
        let query = self.search_input.value().to_string();
        self.store.update_view(|state| {
            state.query = query;
            state.page = 1;
        });
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> bool {
        let config = self.config;
        let global = &config.keys.global;
        let list = &config.keys.list;

        if key_matches_any(&key, &global.quit) {
            return true;
        }
        if key_matches_any(&key, &global.help) {
            self.show_help();
        } else if key_matches_any(&key, &global.search) {
            self.search_active = true;
        } else if key_matches_any(&key, &global.refresh) {
            self.pending = Some(PendingAction::Load);
        } else if key_matches_any(&key, &list.next) {
            self.move_selection(1);
        } else if key_matches_any(&key, &list.prev) {
            self.move_selection(-1);
        } else if key_matches_any(&key, &list.page_next) {
            self.change_page(1);
        } else if key_matches_any(&key, &list.page_prev) {
            self.change_page(-1);
        } else if key_matches_any(&key, &list.add) {
            self.form = Some(ContactForm::new());
        } else if key_matches_any(&key, &list.edit) {
            if let Some(contact) = self.store.selected() {
                self.form = Some(ContactForm::edit(contact));
            }
        } else if key_matches_any(&key, &list.delete) {
            if let Some(contact) = self.store.selected() {
                self.modal_popup = PopupState::default();
                self.confirm_modal = Some(ConfirmModal {
                    title: "DELETE CONTACT".to_string(),
                    message: format!("Delete {}?", contact.display_name()),
                    action: ConfirmAction::DeleteContact(contact.id.clone()),
                });
            }
        } else if key_matches_any(&key, &list.star) {
            if let Some(id) = self.store.selected().map(|c| c.id.clone()) {
                self.pending = Some(PendingAction::ToggleStar(id));
            }
        } else if key_matches_any(&key, &list.sort) {
            self.store.update_view(|state| {
                state.sort = state.sort.toggled();
                state.page = 1;
            });
        } else if key_matches_any(&key, &list.order) {
            self.store.update_view(|state| {
                state.direction = state.direction.toggled();
                state.page = 1;
            });
        } else if key_matches_any(&key, &list.starred) {
            self.store.update_view(|state| {
                state.filter = match state.filter {
                    FilterMode::All => FilterMode::Starred,
                    FilterMode::Starred => FilterMode::All,
                };
                state.page = 1;
            });
        } else if key_matches_any(&key, &list.import) {
            self.path_prompt = Some(PathPrompt {
                purpose: PathPurpose::Import,
                input: Input::default(),
            });
        } else if key_matches_any(&key, &list.export) {
            if self.store.contacts().is_empty() {
                self.set_error("No contacts to export.");
            } else {
                self.path_prompt = Some(PathPrompt {
                    purpose: PathPurpose::Export,
                    input: Input::new(csv_io::export_file_name_today()),
                });
            }
        }
        false
    }

    fn handle_help_modal_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
            self.help_modal = None;
            return;
        }
        let Some(modal) = self.help_modal.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => modal.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => modal.scroll_up(1),
            KeyCode::PageDown => modal.scroll_down(modal.viewport_height.max(1)),
            KeyCode::PageUp => modal.scroll_up(modal.viewport_height.max(1)),
            _ => {}
        }
    }

    // =========================================================================
    // List navigation
    // =========================================================================

    /// Index of the selected contact on the current page.
    pub fn selected_row(&self) -> Option<usize> {
        let selected = self.store.selected()?;
        self.store
            .view()
            .visible
            .iter()
            .position(|c| c.id == selected.id)
    }

    fn move_selection(&mut self, delta: isize) {
        let ids: Vec<String> = self
            .store
            .view()
            .visible
            .iter()
            .map(|c| c.id.clone())
            .collect();
        if ids.is_empty() {
            return;
        }
        let next = match self.selected_row() {
            Some(row) => (row as isize + delta).clamp(0, ids.len() as isize - 1) as usize,
            None => 0,
        };
        self.store.select(Some(ids[next].as_str()));
    }

    fn change_page(&mut self, delta: isize) {
        let before = self.store.view_state().page;
        self.store.update_view(|state| {
            state.page = (state.page as isize + delta).max(1) as usize;
        });
        if self.store.view_state().page != before {
            let first = self.store.view().visible.first().map(|c| c.id.clone());
            self.store.select(first.as_deref());
        }
    }

    // =========================================================================
    // CSV
    // =========================================================================

    fn start_import(&mut self, path: &std::path::Path) -> Result<()> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let decoded = csv_io::decode(&text);
        let unreadable = decoded.errors.len();
        if decoded.drafts.is_empty() {
            if unreadable > 0 {
                self.set_error(format!(
                    "No contacts found in CSV ({} unreadable row(s)).",
                    unreadable
                ));
            } else {
                self.set_error("No contacts found in CSV.");
            }
            return Ok(());
        }
        self.pending = Some(PendingAction::Import {
            drafts: decoded.drafts,
            unreadable,
        });
        Ok(())
    }

    fn export_to(&mut self, path: &std::path::Path) -> Result<()> {
        let text = csv_io::encode(self.store.contacts())?;
        fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.set_status(format!(
            "Exported {} contacts to {}",
            self.store.contacts().len(),
            path.display()
        ));
        Ok(())
    }

    // =========================================================================
    // Accessors for drawing
    // =========================================================================

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn user_label(&self) -> Option<String> {
        self.client
            .session()
            .user()
            .map(|user| format!("{} <{}>", user.username, user.email))
    }

    pub fn is_last_saved(&self, contact: &Contact) -> bool {
        self.last_saved.borrow().as_deref() == Some(contact.id.as_str())
    }

    fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some(Status {
            text: message.into(),
            error: false,
        });
    }

    fn set_error<S: Into<String>>(&mut self, message: S) {
        self.status = Some(Status {
            text: message.into(),
            error: true,
        });
    }

    // =========================================================================
    // Help
    // =========================================================================

    pub fn help_entries(&self) -> Vec<HelpSection> {
        let keys = &self.config.keys;
        let entry = |action, bindings: &[String]| HelpEntry {
            action,
            keys: bindings.join(", "),
        };

        vec![
            HelpSection {
                title: "Global",
                entries: vec![
                    entry("Quit", &keys.global.quit),
                    entry("Help", &keys.global.help),
                    entry("Search", &keys.global.search),
                    entry("Reload", &keys.global.refresh),
                ],
            },
            HelpSection {
                title: "List",
                entries: vec![
                    entry("Next", &keys.list.next),
                    entry("Previous", &keys.list.prev),
                    entry("Next page", &keys.list.page_next),
                    entry("Previous page", &keys.list.page_prev),
                    entry("Add", &keys.list.add),
                    entry("Edit", &keys.list.edit),
                    entry("Delete", &keys.list.delete),
                    entry("Star", &keys.list.star),
                    entry("Sort field", &keys.list.sort),
                    entry("Sort order", &keys.list.order),
                    entry("Starred only", &keys.list.starred),
                    entry("Import CSV", &keys.list.import),
                    entry("Export CSV", &keys.list.export),
                ],
            },
            HelpSection {
                title: "Search",
                entries: vec![
                    entry("Clear and close", &keys.search.cancel),
                    entry("Close", &keys.search.confirm),
                ],
            },
            HelpSection {
                title: "Form",
                entries: vec![
                    entry("Next field", &keys.form.next),
                    entry("Previous field", &keys.form.prev),
                    entry("Save", &keys.form.save),
                    entry("Cancel", &keys.form.cancel),
                ],
            },
            HelpSection {
                title: "Prompts",
                entries: vec![
                    entry("Confirm / merge", &keys.modal.confirm),
                    entry("Keep both", &keys.modal.keep),
                    entry("Cancel", &keys.modal.cancel),
                ],
            },
        ]
    }

    fn show_help(&mut self) {
        let total = self
            .help_entries()
            .iter()
            .map(|section| section.entries.len() + 2)
            .sum();
        self.help_modal = Some(HelpModal::new(total));
    }
}

/// Store with a listener that remembers the last saved contact.
fn new_store(config: &Config, last_saved: &Rc<RefCell<Option<String>>>) -> ContactStore {
    let mut store = ContactStore::new(config.view.initial_state());
    let last_saved = Rc::clone(last_saved);
    store.subscribe(move |event| match event {
        StoreEvent::ContactSaved(id) => {
            last_saved.replace(Some(id.clone()));
        }
        StoreEvent::ContactRemoved(id) => {
            let mut slot = last_saved.borrow_mut();
            if slot.as_deref() == Some(id.as_str()) {
                *slot = None;
            }
        }
        StoreEvent::CollectionReplaced | StoreEvent::SelectionChanged(_) => {}
    });
    store
}

/// Check if the key event matches any of the bindings in the list
pub fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Named keys are case-insensitive; single characters are not, so `o` and
/// `O` are different bindings.
pub fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "delete" | "del" => matches!(event.code, KeyCode::Delete),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        name if name.len() > 1 && name.starts_with('f') => match name[1..].parse::<u8>() {
            Ok(n) if (1..=12).contains(&n) => matches!(event.code, KeyCode::F(f) if f == n),
            _ => false,
        },
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn named_keys_ignore_case() {
        assert!(key_matches_single(&key(KeyCode::Enter), "Enter"));
        assert!(key_matches_single(&key(KeyCode::PageDown), "pagedown"));
        assert!(key_matches_single(&key(KeyCode::F(5)), "F5"));
        assert!(key_matches_single(&key(KeyCode::Delete), "Delete"));
        assert!(!key_matches_single(&key(KeyCode::F(5)), "F13"));
    }

    #[test]
    fn single_characters_are_case_sensitive() {
        assert!(key_matches_single(&key(KeyCode::Char('o')), "o"));
        assert!(!key_matches_single(&key(KeyCode::Char('O')), "o"));
        let shifted = KeyEvent::new(KeyCode::Char('O'), KeyModifiers::SHIFT);
        assert!(key_matches_single(&shifted, "O"));
    }

    #[test]
    fn control_chords_never_match() {
        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert!(!key_matches_any(&ctrl_s, &["s".to_string()]));
    }

    #[test]
    fn help_modal_scroll_stays_in_range() {
        let mut modal = HelpModal::new(30);
        modal.viewport_height = 10;
        modal.scroll_down(100);
        assert_eq!(modal.scroll, 20);
        assert!(!modal.can_scroll_down());
        modal.scroll_up(25);
        assert_eq!(modal.scroll, 0);
        assert!(!modal.can_scroll_up());
    }
}
