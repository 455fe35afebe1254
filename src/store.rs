use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::config::data_dir;
use crate::error::DeskError;
use crate::model::session::Session;

pub const SESSION_KEY: &str = "bsm_user";
/// Keys older builds stored the session under. Read, never written.
pub const LEGACY_SESSION_KEYS: &[&str] = &["user", "currentUser"];
pub const TOKEN_KEY: &str = "auth_token";
pub const AUTH_METHOD_KEY: &str = "auth_method";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Session),
    Updated(Session),
    SignedOut,
}

/// The signed-in identity, persisted as a flat string key/value file.
///
/// Every change is written through to disk and published to subscribers.
/// Unreadable state is logged, cleared, and treated as signed out.
pub struct SessionStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
    current: Option<Session>,
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new() -> Result<Self> {
        Self::init(data_dir().join("session.json"))
    }

    pub fn init(path: PathBuf) -> Result<Self> {
        let (tx, _) = broadcast::channel(16);
        let mut store = Self {
            path,
            values: BTreeMap::new(),
            current: None,
            tx,
        };
        store.load()?;
        Ok(store)
    }

    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
            Ok(values) => self.values = values,
            Err(e) => {
                let err = DeskError::Parse(format!("{}: {e}", self.path.display()));
                tracing::warn!("discarding session state: {err}");
                self.values.clear();
                self.save()?;
                return Ok(());
            }
        }

        let mut dirty = false;
        for key in std::iter::once(SESSION_KEY).chain(LEGACY_SESSION_KEYS.iter().copied()) {
            let Some(raw) = self.values.get(key) else {
                continue;
            };
            match serde_json::from_str::<Session>(raw) {
                Ok(mut session) => {
                    if session.auth_method.is_none() {
                        session.auth_method = self.values.get(AUTH_METHOD_KEY).cloned();
                    }
                    self.current = Some(session);
                    break;
                }
                Err(e) => {
                    tracing::warn!("discarding malformed session under '{key}': {e}");
                    self.values.remove(key);
                    dirty = true;
                }
            }
        }
        if dirty {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.values.get(TOKEN_KEY).map(String::as_str)
    }

    pub fn sign_in(&mut self, session: Session, token: String) -> Result<()> {
        for key in LEGACY_SESSION_KEYS {
            self.values.remove(*key);
        }
        self.values
            .insert(SESSION_KEY.into(), serde_json::to_string(&session)?);
        self.values.insert(TOKEN_KEY.into(), token);
        match &session.auth_method {
            Some(method) => self.values.insert(AUTH_METHOD_KEY.into(), method.clone()),
            None => self.values.remove(AUTH_METHOD_KEY),
        };
        self.save()?;
        tracing::info!(email = %session.email, "signed in");
        self.current = Some(session.clone());
        self.publish(SessionEvent::SignedIn(session));
        Ok(())
    }

    pub fn update(&mut self, f: impl FnOnce(&mut Session)) -> Result<()> {
        let Some(session) = self.current.as_mut() else {
            anyhow::bail!("not signed in");
        };
        f(session);
        let session = session.clone();
        self.values
            .insert(SESSION_KEY.into(), serde_json::to_string(&session)?);
        self.save()?;
        self.publish(SessionEvent::Updated(session));
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<()> {
        for key in std::iter::once(SESSION_KEY)
            .chain(LEGACY_SESSION_KEYS.iter().copied())
            .chain([TOKEN_KEY, AUTH_METHOD_KEY])
        {
            self.values.remove(key);
        }
        self.save()?;
        if self.current.take().is_some() {
            tracing::info!("signed out");
        }
        self.publish(SessionEvent::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::session::Role;

    fn temp_store() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        (dir, path)
    }

    #[test]
    fn starts_signed_out_without_a_file() {
        let (_dir, path) = temp_store();
        let store = SessionStore::init(path.clone()).unwrap();
        assert!(store.current().is_none());
        assert!(store.token().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn sign_in_writes_through_and_survives_restart() {
        let (_dir, path) = temp_store();
        let mut store = SessionStore::init(path.clone()).unwrap();
        store
            .sign_in(Session::new("kim@example.com", "Kim", Role::Agent), "tok-1".into())
            .unwrap();

        let reopened = SessionStore::init(path).unwrap();
        let session = reopened.current().unwrap();
        assert_eq!(session.email, "kim@example.com");
        assert_eq!(session.role, Role::Agent);
        assert_eq!(reopened.token(), Some("tok-1"));
    }

    #[test]
    fn reads_legacy_key_and_auth_method() {
        let (_dir, path) = temp_store();
        std::fs::write(
            &path,
            r#"{"currentUser": "{\"email\":\"old@example.com\",\"display_name\":\"Old\"}", "auth_method": "sso"}"#,
        )
        .unwrap();
        let store = SessionStore::init(path).unwrap();
        let session = store.current().unwrap();
        assert_eq!(session.name, "Old");
        assert_eq!(session.auth_method.as_deref(), Some("sso"));
    }

    #[test]
    fn malformed_file_is_cleared() {
        let (_dir, path) = temp_store();
        std::fs::write(&path, "{not json").unwrap();
        let store = SessionStore::init(path.clone()).unwrap();
        assert!(store.current().is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn malformed_session_value_falls_back_to_next_key() {
        let (_dir, path) = temp_store();
        std::fs::write(
            &path,
            r#"{"bsm_user": "oops", "user": "{\"email\":\"u@example.com\"}"}"#,
        )
        .unwrap();
        let store = SessionStore::init(path.clone()).unwrap();
        assert_eq!(store.current().unwrap().email, "u@example.com");
        assert!(!std::fs::read_to_string(&path).unwrap().contains("oops"));
    }

    #[test]
    fn subscribers_see_every_change() {
        let (_dir, path) = temp_store();
        let mut store = SessionStore::init(path).unwrap();
        let mut rx = store.subscribe();

        let session = Session::new("a@example.com", "A", Role::Customer);
        store.sign_in(session.clone(), "t".into()).unwrap();
        store.update(|s| s.name = "Alex".into()).unwrap();
        store.sign_out().unwrap();

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SignedIn(session));
        match rx.try_recv().unwrap() {
            SessionEvent::Updated(s) => assert_eq!(s.name, "Alex"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SignedOut);
        assert!(store.current().is_none());
        assert!(store.update(|_| {}).is_err());
    }

    #[test]
    fn sign_out_removes_legacy_keys_too() {
        let (_dir, path) = temp_store();
        std::fs::write(&path, r#"{"user": "{\"email\":\"u@example.com\"}", "auth_token": "x"}"#).unwrap();
        let mut store = SessionStore::init(path.clone()).unwrap();
        store.sign_out().unwrap();
        let reopened = SessionStore::init(path).unwrap();
        assert!(reopened.current().is_none());
        assert!(reopened.token().is_none());
    }
}
