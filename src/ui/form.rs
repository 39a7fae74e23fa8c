use std::path::Path;

use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::contact::{
    is_valid_email, normalize_links, Contact, ContactDraft, Field, FieldError, ValidationErrors,
};
use crate::photo;

/// Rows of the add/edit form, top to bottom.
pub const FORM_FIELDS: [Field; 11] = [
    Field::FirstName,
    Field::LastName,
    Field::Phone,
    Field::Email,
    Field::Company,
    Field::JobTitle,
    Field::Address,
    Field::SocialMedia,
    Field::Notes,
    Field::ProfilePicture,
    Field::Starred,
];

pub struct FormRow {
    pub field: Field,
    pub input: Input,
}

/// Add or edit dialog. Every row is free text except `Starred`, which
/// toggles on space.
pub struct ContactForm {
    pub editing_id: Option<String>,
    pub rows: Vec<FormRow>,
    pub focus: usize,
    pub starred: bool,
    pub errors: ValidationErrors,
}

impl ContactForm {
    pub fn new() -> Self {
        Self {
            editing_id: None,
            rows: FORM_FIELDS
                .iter()
                .filter(|field| **field != Field::Starred)
                .map(|field| FormRow {
                    field: *field,
                    input: Input::default(),
                })
                .collect(),
            focus: 0,
            starred: false,
            errors: ValidationErrors::default(),
        }
    }

    pub fn edit(contact: &Contact) -> Self {
        let mut form = Self::new();
        form.editing_id = Some(contact.id.clone());
        form.starred = contact.starred;
        for row in &mut form.rows {
            let value = match row.field {
                Field::FirstName => contact.first_name.clone(),
                Field::LastName => contact.last_name.clone(),
                Field::Phone => contact.phone.clone(),
                Field::Email => contact.email.clone(),
                Field::Company => contact.company.clone(),
                Field::JobTitle => contact.job_title.clone(),
                Field::Address => contact.address.clone(),
                Field::SocialMedia => contact.social_media.join(", "),
                Field::Notes => contact.notes.clone(),
                Field::ProfilePicture => contact.profile_picture.clone(),
                Field::Starred => String::new(),
            };
            row.input = Input::new(value);
        }
        form
    }

    pub fn title(&self) -> &'static str {
        if self.editing_id.is_some() {
            "EDIT CONTACT"
        } else {
            "ADD CONTACT"
        }
    }

    /// Number of focusable rows, the star toggle included.
    pub fn len(&self) -> usize {
        self.rows.len() + 1
    }

    pub fn focused_field(&self) -> Field {
        self.rows
            .get(self.focus)
            .map(|row| row.field)
            .unwrap_or(Field::Starred)
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.len();
    }

    pub fn focus_prev(&mut self) {
        self.focus = (self.focus + self.len() - 1) % self.len();
    }

    /// Feed a key to the focused row. Returns true when it was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.rows.get_mut(self.focus) {
            Some(row) => row.input.handle_event(&Event::Key(key)).is_some(),
            None => {
                if matches!(key.code, crossterm::event::KeyCode::Char(' ')) {
                    self.starred = !self.starred;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn value(&self, field: Field) -> &str {
        self.rows
            .iter()
            .find(|row| row.field == field)
            .map(|row| row.input.value())
            .unwrap_or("")
    }

    pub fn error_for(&self, field: Field) -> Option<&str> {
        self.errors.for_field(field).map(|e| e.message.as_str())
    }

    /// Build the draft to save. A picture value naming an existing file is
    /// embedded as a data URL; anything else is kept as typed.
    pub fn to_draft(&self) -> Result<ContactDraft, ValidationErrors> {
        let text = |field| Some(self.value(field).to_string());
        let picture = self.value(Field::ProfilePicture).trim();
        let profile_picture = if !picture.is_empty()
            && !picture.starts_with("data:")
            && Path::new(picture).is_file()
        {
            photo::load_data_url(Path::new(picture)).map_err(|err| {
                ValidationErrors(vec![FieldError {
                    field: Field::ProfilePicture,
                    message: err.to_string(),
                }])
            })?
        } else {
            picture.to_string()
        };

        Ok(ContactDraft {
            first_name: text(Field::FirstName),
            last_name: text(Field::LastName),
            email: text(Field::Email),
            phone: text(Field::Phone),
            profile_picture: Some(profile_picture),
            company: text(Field::Company),
            job_title: text(Field::JobTitle),
            address: text(Field::Address),
            notes: text(Field::Notes),
            social_media: Some(normalize_links(self.value(Field::SocialMedia).split(','))),
            starred: Some(self.starred),
        })
    }
}

impl Default for ContactForm {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Username,
    Email,
    Password,
}

impl AuthField {
    pub fn label(self) -> &'static str {
        match self {
            AuthField::Username => "Username",
            AuthField::Email => "Email",
            AuthField::Password => "Password",
        }
    }
}

/// Sign-in screen shown while no session is active. Switches to account
/// creation on request.
pub struct AuthForm {
    pub register: bool,
    pub username: Input,
    pub email: Input,
    pub password: Input,
    pub focus: usize,
    pub message: Option<String>,
}

pub struct Credentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl AuthForm {
    pub fn new(message: Option<String>) -> Self {
        Self {
            register: false,
            username: Input::default(),
            email: Input::default(),
            password: Input::default(),
            focus: 0,
            message,
        }
    }

    pub fn fields(&self) -> &'static [AuthField] {
        if self.register {
            &[AuthField::Username, AuthField::Email, AuthField::Password]
        } else {
            &[AuthField::Email, AuthField::Password]
        }
    }

    pub fn focused(&self) -> AuthField {
        let fields = self.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    pub fn toggle_mode(&mut self) {
        self.register = !self.register;
        self.focus = 0;
        self.message = None;
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.fields().len();
    }

    pub fn focus_prev(&mut self) {
        let len = self.fields().len();
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn input(&self, field: AuthField) -> &Input {
        match field {
            AuthField::Username => &self.username,
            AuthField::Email => &self.email,
            AuthField::Password => &self.password,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let input = match self.focused() {
            AuthField::Username => &mut self.username,
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        };
        input.handle_event(&Event::Key(key)).is_some()
    }

    /// Check the fields the way the server would before sending them.
    pub fn credentials(&self) -> Result<Credentials, String> {
        let username = self.username.value().trim().to_string();
        let email = self.email.value().trim().to_string();
        let password = self.password.value().to_string();

        if self.register {
            if username.is_empty() {
                return Err("Username is required.".into());
            }
            if email.is_empty() {
                return Err("Email is required.".into());
            }
            if !is_valid_email(&email) {
                return Err("Invalid email.".into());
            }
            if password.chars().count() < 6 {
                return Err("Password must be at least 6 characters.".into());
            }
        } else if email.is_empty() || password.is_empty() {
            return Err("Email and password are required.".into());
        }

        Ok(Credentials {
            username,
            email,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::sample;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn type_text(form: &mut ContactForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[test]
    fn editing_prefills_every_row() {
        let mut contact = sample("c1", "Ana", "Reyes", "0917-111-2222", 1);
        contact.social_media = vec!["https://a.example".into(), "https://b.example".into()];
        contact.starred = true;

        let form = ContactForm::edit(&contact);
        assert_eq!(form.title(), "EDIT CONTACT");
        assert_eq!(form.value(Field::Phone), "0917-111-2222");
        assert_eq!(form.value(Field::SocialMedia), "https://a.example, https://b.example");

        let draft = form.to_draft().unwrap();
        assert_eq!(draft.social_media.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(draft.starred, Some(true));
    }

    #[test]
    fn typing_goes_to_the_focused_row_and_space_toggles_star() {
        let mut form = ContactForm::new();
        type_text(&mut form, "Ben");
        form.focus_next();
        form.focus_next();
        type_text(&mut form, "09181234567");
        assert_eq!(form.value(Field::FirstName), "Ben");
        assert_eq!(form.value(Field::Phone), "09181234567");

        form.focus_prev();
        form.focus_prev();
        form.focus_prev();
        assert_eq!(form.focused_field(), Field::Starred);
        type_text(&mut form, " ");
        assert!(form.starred);
    }

    #[test]
    fn unreadable_picture_file_is_a_field_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();

        let mut form = ContactForm::new();
        form.focus = FORM_FIELDS
            .iter()
            .position(|f| *f == Field::ProfilePicture)
            .unwrap();
        type_text(&mut form, path.to_str().unwrap());

        let errors = form.to_draft().unwrap_err();
        assert_eq!(
            errors.for_field(Field::ProfilePicture).map(|e| e.message.as_str()),
            Some("Please select an image file.")
        );
    }

    #[test]
    fn register_mode_checks_password_length() {
        let mut auth = AuthForm::new(None);
        auth.toggle_mode();
        auth.username = Input::new("ana".into());
        auth.email = Input::new("ana@example.com".into());
        auth.password = Input::new("abc".into());
        assert_eq!(
            auth.credentials().err().as_deref(),
            Some("Password must be at least 6 characters.")
        );

        auth.toggle_mode();
        assert_eq!(auth.fields(), &[AuthField::Email, AuthField::Password]);
        assert!(auth.credentials().is_ok());
    }
}
