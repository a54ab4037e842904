use async_trait::async_trait;
use bson::{bson, doc, Bson, DateTime, Document};
use mongodb::{options::IndexOptions, Collection, IndexModel};
use serde::Deserialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::errors::UserError;
use crate::users::repo_types::{Consultation, Profile, UserDocument, USERS_COLLECTION};

/// Document-level access to user records.
///
/// Writes addressed by email return `false` when no document matched.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn init(&self) -> Result<(), UserError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDocument>, UserError>;
    async fn find_by_google_id(&self, google_id: &str)
        -> Result<Option<UserDocument>, UserError>;
    /// Insert a new document, returning it with its generated `_id`.
    async fn insert(&self, user: UserDocument) -> Result<UserDocument, UserError>;
    async fn set_otp(&self, email: &str, otp: &str, expires: DateTime) -> Result<bool, UserError>;
    /// Clear a matching, unexpired code and mark the user verified.
    async fn consume_otp(&self, email: &str, otp: &str, now: DateTime) -> Result<bool, UserError>;
    async fn push_consultation(
        &self,
        email: &str,
        consultation: Consultation,
    ) -> Result<bool, UserError>;
    /// `None` when the user does not exist.
    async fn consultations(&self, email: &str) -> Result<Option<Vec<Consultation>>, UserError>;
    async fn set_profile(&self, email: &str, profile: &Profile) -> Result<bool, UserError>;
    async fn push_reminder(&self, email: &str, reminder: Document) -> Result<bool, UserError>;
    async fn remove_reminder(&self, email: &str, index: usize) -> Result<bool, UserError>;
}

#[derive(Debug, Default, Deserialize)]
struct ConsultationsOnly {
    #[serde(default)]
    consultations: Vec<Consultation>,
}

/// Filter and update that consume a matching, unexpired code. Run as one
/// `update_one`, so a code can only be consumed once.
pub(crate) fn consume_otp_update(email: &str, otp: &str, now: DateTime) -> (Document, Document) {
    let filter = doc! { "email": email, "otp": otp, "otp_expires": { "$gt": now } };
    let update = doc! {
        "$set": { "verified": true, "otp": Bson::Null, "otp_expires": Bson::Null }
    };
    (filter, update)
}

/// Filter matching only when `reminders[index]` exists, and a pipeline that
/// rebuilds the array without it.
pub(crate) fn remove_reminder_update(
    email: &str,
    index: usize,
) -> Result<(Document, Vec<Document>), UserError> {
    let position = i64::try_from(index)
        .map_err(|_| UserError::InvalidData(format!("reminder index {index} out of range")))?;

    let mut filter = doc! { "email": email };
    filter.insert(format!("reminders.{index}"), doc! { "$exists": true });

    // index 0 has no head; avoid a zero-length $slice
    let head = if position == 0 {
        Bson::Array(Vec::new())
    } else {
        bson!({ "$slice": ["$reminders", position] })
    };
    let tail = bson!({ "$slice": ["$reminders", position + 1, { "$size": "$reminders" }] });
    let pipeline = vec![doc! {
        "$set": { "reminders": { "$concatArrays": [head, tail] } }
    }];
    Ok((filter, pipeline))
}

#[derive(Clone, Debug)]
pub struct MongoUserStore {
    db: Database,
}

impl MongoUserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn users(&self) -> Result<Collection<UserDocument>, UserError> {
        self.db.collection::<UserDocument>(USERS_COLLECTION)
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn init(&self) -> Result<(), UserError> {
        let email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let google_id = IndexModel::builder()
            .keys(doc! { "google_id": 1 })
            .options(IndexOptions::builder().unique(true).sparse(true).build())
            .build();
        self.users()?.create_indexes(vec![email, google_id]).await?;
        info!(collection = USERS_COLLECTION, "user indexes ensured");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDocument>, UserError> {
        Ok(self.users()?.find_one(doc! { "email": email }).await?)
    }

    async fn find_by_google_id(
        &self,
        google_id: &str,
    ) -> Result<Option<UserDocument>, UserError> {
        Ok(self
            .users()?
            .find_one(doc! { "google_id": google_id })
            .await?)
    }

    async fn insert(&self, mut user: UserDocument) -> Result<UserDocument, UserError> {
        let result = self.users()?.insert_one(&user).await?;
        user.id = result.inserted_id.as_object_id();
        debug!(id = ?user.id, "user document inserted");
        Ok(user)
    }

    async fn set_otp(&self, email: &str, otp: &str, expires: DateTime) -> Result<bool, UserError> {
        let result = self
            .users()?
            .update_one(
                doc! { "email": email },
                doc! { "$set": { "otp": otp, "otp_expires": expires } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn consume_otp(&self, email: &str, otp: &str, now: DateTime) -> Result<bool, UserError> {
        let (filter, update) = consume_otp_update(email, otp, now);
        let result = self.users()?.update_one(filter, update).await?;
        Ok(result.matched_count > 0)
    }

    async fn push_consultation(
        &self,
        email: &str,
        consultation: Consultation,
    ) -> Result<bool, UserError> {
        let result = self
            .users()?
            .update_one(
                doc! { "email": email },
                doc! { "$push": { "consultations": consultation.0 } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn consultations(&self, email: &str) -> Result<Option<Vec<Consultation>>, UserError> {
        let found = self
            .users()?
            .clone_with_type::<ConsultationsOnly>()
            .find_one(doc! { "email": email })
            .projection(doc! { "_id": 0, "consultations": 1 })
            .await?;
        Ok(found.map(|f| f.consultations))
    }

    async fn set_profile(&self, email: &str, profile: &Profile) -> Result<bool, UserError> {
        let profile = bson::to_bson(profile)?;
        let result = self
            .users()?
            .update_one(doc! { "email": email }, doc! { "$set": { "profile": profile } })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn push_reminder(&self, email: &str, reminder: Document) -> Result<bool, UserError> {
        let result = self
            .users()?
            .update_one(
                doc! { "email": email },
                doc! { "$push": { "reminders": reminder } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn remove_reminder(&self, email: &str, index: usize) -> Result<bool, UserError> {
        let (filter, pipeline) = remove_reminder_update(email, index)?;
        let result = self.users()?.update_one(filter, pipeline).await?;
        Ok(result.modified_count > 0)
    }
}
