use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime, Document};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::errors::UserError;
use crate::users::repo::UserStore;
use crate::users::repo_types::{Consultation, Profile, UserDocument};

/// In-process store keyed by email, used by tests and `AppState::fake`.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserDocument>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory user store");
        Self::default()
    }

    async fn update<F>(&self, email: &str, f: F) -> bool
    where
        F: FnOnce(&mut UserDocument) -> bool + Send,
    {
        let mut users = self.users.lock().await;
        users.get_mut(email).map(f).unwrap_or(false)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn init(&self) -> Result<(), UserError> {
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDocument>, UserError> {
        Ok(self.users.lock().await.get(email).cloned())
    }

    async fn find_by_google_id(
        &self,
        google_id: &str,
    ) -> Result<Option<UserDocument>, UserError> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn insert(&self, mut user: UserDocument) -> Result<UserDocument, UserError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.email) {
            return Err(UserError::AlreadyExists);
        }
        user.id = Some(ObjectId::new());
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn set_otp(&self, email: &str, otp: &str, expires: DateTime) -> Result<bool, UserError> {
        Ok(self
            .update(email, |u| {
                u.otp = Some(otp.to_string());
                u.otp_expires = Some(expires);
                true
            })
            .await)
    }

    async fn consume_otp(&self, email: &str, otp: &str, now: DateTime) -> Result<bool, UserError> {
        Ok(self
            .update(email, |u| {
                let valid = u.otp.as_deref() == Some(otp)
                    && u.otp_expires.is_some_and(|expires| expires > now);
                if valid {
                    u.verified = true;
                    u.otp = None;
                    u.otp_expires = None;
                }
                valid
            })
            .await)
    }

    async fn push_consultation(
        &self,
        email: &str,
        consultation: Consultation,
    ) -> Result<bool, UserError> {
        Ok(self
            .update(email, |u| {
                u.consultations.push(consultation);
                true
            })
            .await)
    }

    async fn consultations(&self, email: &str) -> Result<Option<Vec<Consultation>>, UserError> {
        let users = self.users.lock().await;
        Ok(users.get(email).map(|u| u.consultations.clone()))
    }

    async fn set_profile(&self, email: &str, profile: &Profile) -> Result<bool, UserError> {
        Ok(self
            .update(email, |u| {
                u.profile = profile.clone();
                true
            })
            .await)
    }

    async fn push_reminder(&self, email: &str, reminder: Document) -> Result<bool, UserError> {
        Ok(self
            .update(email, |u| {
                u.reminders.get_or_insert_with(Vec::new).push(reminder);
                true
            })
            .await)
    }

    async fn remove_reminder(&self, email: &str, index: usize) -> Result<bool, UserError> {
        Ok(self
            .update(email, |u| match u.reminders.as_mut() {
                Some(reminders) if index < reminders.len() => {
                    reminders.remove(index);
                    true
                }
                _ => false,
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> UserDocument {
        UserDocument {
            id: None,
            email: email.into(),
            name: None,
            password_hash: None,
            google_id: Some(format!("gid-{email}")),
            created_at: DateTime::now(),
            verified: true,
            otp: None,
            otp_expires: None,
            consultations: vec![],
            profile: Profile::default(),
            reminders: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_rejects_duplicates() {
        let store = MemoryUserStore::new();
        let inserted = store.insert(user("a@x.com")).await.expect("insert");
        assert!(inserted.id.is_some());

        let err = store.insert(user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, UserError::AlreadyExists));
    }

    #[tokio::test]
    async fn find_by_google_id_matches_federated_key() {
        let store = MemoryUserStore::new();
        store.insert(user("a@x.com")).await.expect("insert");
        let found = store
            .find_by_google_id("gid-a@x.com")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found.email, "a@x.com");
        assert!(store.find_by_google_id("nope").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn writes_against_missing_user_report_no_match() {
        let store = MemoryUserStore::new();
        assert!(!store
            .set_otp("ghost@x.com", "123456", DateTime::now())
            .await
            .expect("set_otp"));
        assert!(!store
            .push_reminder("ghost@x.com", Document::new())
            .await
            .expect("push"));
        assert!(store.consultations("ghost@x.com").await.expect("read").is_none());
    }
}
