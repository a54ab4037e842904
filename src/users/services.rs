use bson::{DateTime, Document};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::auth::{otp, password};
use crate::errors::UserError;
use crate::users::dto::{NewUser, UserStats};
use crate::users::repo::UserStore;
use crate::users::repo_types::{Consultation, Profile, UserDocument};

pub const DEFAULT_CONSULTATION_LIMIT: usize = 10;

/// Newest first; entries without a timestamp go last.
pub(crate) fn latest_first(mut consultations: Vec<Consultation>, limit: usize) -> Vec<Consultation> {
    consultations.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    consultations.truncate(limit);
    consultations
}

/// User record operations over a shared store.
#[derive(Clone)]
pub struct Users {
    store: Arc<dyn UserStore>,
}

impl Users {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserDocument>, UserError> {
        self.store.find_by_email(email).await
    }

    pub async fn find_by_google_id(
        &self,
        google_id: &str,
    ) -> Result<Option<UserDocument>, UserError> {
        self.store.find_by_google_id(google_id).await
    }

    /// Create an account. Identity-provider accounts start out verified.
    #[tracing::instrument(skip(self, new_user), fields(email = %new_user.email))]
    pub async fn create_user(&self, new_user: NewUser) -> Result<UserDocument, UserError> {
        if self.store.find_by_email(&new_user.email).await?.is_some() {
            warn!("user already exists");
            return Err(UserError::AlreadyExists);
        }

        let password_hash = new_user
            .password
            .as_deref()
            .map(password::hash_password)
            .transpose()?;
        let verified = new_user.google_id.is_some();

        let user = UserDocument {
            id: None,
            email: new_user.email,
            name: Some(new_user.name),
            password_hash,
            google_id: new_user.google_id,
            created_at: DateTime::now(),
            verified,
            otp: None,
            otp_expires: None,
            consultations: Vec::new(),
            profile: Profile::default(),
            reminders: None,
        };
        let user = self.store.insert(user).await?;
        debug!(id = ?user.id, verified, "user created");
        Ok(user)
    }

    /// `false` for unknown users and for accounts without a local password.
    #[tracing::instrument(skip(self, plain))]
    pub async fn verify_password(&self, email: &str, plain: &str) -> Result<bool, UserError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            return Ok(false);
        };
        match user.password_hash {
            Some(hash) => Ok(password::verify_password(plain, &hash)),
            None => Ok(false),
        }
    }

    pub fn generate_otp() -> String {
        otp::generate_otp()
    }

    /// Store a code valid for ten minutes, replacing any earlier one.
    #[tracing::instrument(skip(self, code))]
    pub async fn set_otp(&self, email: &str, code: &str) -> Result<(), UserError> {
        let expires = DateTime::from_time_0_3(otp::otp_expiry(OffsetDateTime::now_utc()));
        if !self.store.set_otp(email, code, expires).await? {
            return Err(UserError::NotFound);
        }
        debug!(expires = %expires, "otp stored");
        Ok(())
    }

    /// Generate and store a fresh code, returning it for delivery.
    pub async fn issue_otp(&self, email: &str) -> Result<String, UserError> {
        let code = Self::generate_otp();
        self.set_otp(email, &code).await?;
        Ok(code)
    }

    /// Marks the user verified when the code matches and has not expired.
    /// A failed check changes nothing.
    #[tracing::instrument(skip(self, code))]
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<bool, UserError> {
        let verified = self.store.consume_otp(email, code, DateTime::now()).await?;
        if verified {
            debug!("otp accepted");
        } else {
            warn!("otp rejected");
        }
        Ok(verified)
    }

    #[tracing::instrument(skip(self, details))]
    pub async fn add_consultation(&self, email: &str, details: Document) -> Result<(), UserError> {
        let consultation = Consultation::stamped(details, DateTime::now());
        if !self.store.push_consultation(email, consultation).await? {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    pub async fn get_consultations(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<Consultation>, UserError> {
        let consultations = self.store.consultations(email).await?.unwrap_or_default();
        Ok(latest_first(consultations, limit))
    }

    /// Replaces the whole profile.
    #[tracing::instrument(skip(self, profile))]
    pub async fn update_profile(&self, email: &str, profile: &Profile) -> Result<(), UserError> {
        if !self.store.set_profile(email, profile).await? {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    pub async fn get_user_stats(&self, email: &str) -> Result<Option<UserStats>, UserError> {
        Ok(self
            .store
            .find_by_email(email)
            .await?
            .as_ref()
            .map(UserStats::from))
    }

    #[tracing::instrument(skip(self, reminder))]
    pub async fn add_reminder(&self, email: &str, reminder: Document) -> Result<(), UserError> {
        if !self.store.push_reminder(email, reminder).await? {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    pub async fn get_reminders(&self, email: &str) -> Result<Vec<Document>, UserError> {
        Ok(self
            .store
            .find_by_email(email)
            .await?
            .and_then(|u| u.reminders)
            .unwrap_or_default())
    }

    /// Remove the reminder at `index`; `false` when there is nothing there.
    #[tracing::instrument(skip(self))]
    pub async fn delete_reminder(&self, email: &str, index: usize) -> Result<bool, UserError> {
        let deleted = self.store.remove_reminder(email, index).await?;
        debug!(deleted, "reminder delete");
        Ok(deleted)
    }
}
