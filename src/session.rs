//! Signed-in user and bearer token, persisted to a small JSON file between
//! runs. Changes are announced to explicit subscribers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::events::{Subscribers, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// Kept client-side only; the API does not store avatars.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_picture: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(User),
    /// Logout or an expired token.
    SignedOut,
    ProfileChanged(User),
}

#[derive(Debug)]
pub struct Session {
    path: Option<PathBuf>,
    state: Option<StoredSession>,
    subscribers: Subscribers<SessionEvent>,
}

impl Session {
    /// Session that lives only in memory.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            state: None,
            subscribers: Subscribers::default(),
        }
    }

    /// Read the session file. A missing or unreadable file means signed out.
    pub fn load(path: &Path) -> Self {
        let state = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<StoredSession>(&raw) {
                Ok(stored) if !stored.token.is_empty() => Some(stored),
                Ok(_) => None,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "ignoring corrupt session file");
                    None
                }
            },
            Err(_) => None,
        };
        Self {
            path: Some(path.to_path_buf()),
            state,
            subscribers: Subscribers::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.token.as_str())
    }

    pub fn user(&self) -> Option<&User> {
        self.state.as_ref().and_then(|s| s.user.as_ref())
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&SessionEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn sign_in(&mut self, token: String, user: Option<User>) -> Result<()> {
        let stored = StoredSession { token, user };
        self.persist(Some(&stored))?;
        let announced = stored.user.clone();
        self.state = Some(stored);
        if let Some(user) = announced {
            self.subscribers.emit(&SessionEvent::SignedIn(user));
        }
        Ok(())
    }

    /// Forget the token and user. Safe to call when already signed out.
    pub fn clear(&mut self) -> Result<()> {
        let was_active = self.state.take().is_some();
        self.persist(None)?;
        if was_active {
            self.subscribers.emit(&SessionEvent::SignedOut);
        }
        Ok(())
    }

    /// Replace the stored user, keeping the local avatar when the new record
    /// does not carry one.
    pub fn update_user(&mut self, mut user: User) -> Result<()> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        if user.profile_picture.is_empty() {
            if let Some(previous) = &state.user {
                user.profile_picture = previous.profile_picture.clone();
            }
        }
        state.user = Some(user.clone());
        let snapshot = state.clone();
        self.persist(Some(&snapshot))?;
        self.subscribers.emit(&SessionEvent::ProfileChanged(user));
        Ok(())
    }

    /// Empty string removes the avatar.
    pub fn set_profile_picture(&mut self, picture: String) -> Result<()> {
        let Some(user) = self.user().cloned() else {
            anyhow::bail!("no signed-in user to attach a profile picture to");
        };
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        let updated = User {
            profile_picture: picture,
            ..user
        };
        state.user = Some(updated.clone());
        let snapshot = state.clone();
        self.persist(Some(&snapshot))?;
        self.subscribers.emit(&SessionEvent::ProfileChanged(updated));
        Ok(())
    }

    fn persist(&self, state: Option<&StoredSession>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match state {
            Some(state) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create session dir: {}", parent.display())
                    })?;
                }
                let raw = serde_json::to_string_pretty(state).context("failed to encode session")?;
                fs::write(path, raw)
                    .with_context(|| format!("failed to write session file {}", path.display()))?;
                restrict_permissions(path)?;
            }
            None => {
                if path.exists() {
                    fs::remove_file(path).with_context(|| {
                        format!("failed to remove session file {}", path.display())
                    })?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn user() -> User {
        User {
            id: "u1".into(),
            username: "maria".into(),
            email: "maria@example.com".into(),
            profile_picture: String::new(),
        }
    }

    #[test]
    fn sign_in_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = Session::load(&path);
        assert!(!session.is_active());
        session.sign_in("tok".into(), Some(user())).unwrap();

        let reloaded = Session::load(&path);
        assert!(reloaded.is_active());
        assert_eq!(reloaded.token(), Some("tok"));
        assert_eq!(reloaded.user().map(|u| u.username.as_str()), Some("maria"));
    }

    #[test]
    fn clear_removes_file_and_notifies_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut session = Session::load(&path);
        {
            let events = Rc::clone(&events);
            session.subscribe(move |event| events.borrow_mut().push(event.clone()));
        }
        session.sign_in("tok".into(), Some(user())).unwrap();
        session.clear().unwrap();
        session.clear().unwrap();

        assert!(!path.exists());
        assert_eq!(
            *events.borrow(),
            vec![SessionEvent::SignedIn(user()), SessionEvent::SignedOut]
        );
    }

    #[test]
    fn profile_update_keeps_local_avatar() {
        let mut session = Session::ephemeral();
        session.sign_in("tok".into(), Some(user())).unwrap();
        session.set_profile_picture("data:image/png;base64,AAAA".into()).unwrap();

        let renamed = User {
            username: "maria.s".into(),
            ..user()
        };
        session.update_user(renamed).unwrap();

        let current = session.user().unwrap();
        assert_eq!(current.username, "maria.s");
        assert_eq!(current.profile_picture, "data:image/png;base64,AAAA");
    }

    #[test]
    fn corrupt_file_means_signed_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        assert!(!Session::load(&path).is_active());
    }
}
