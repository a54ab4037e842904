use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::repo_types::{Profile, UserDocument};

/// Input for account creation. A local password, an identity provider key,
/// or both.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub google_id: Option<String>,
}

impl NewUser {
    pub fn with_password(email: &str, name: &str, password: &str) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            password: Some(password.into()),
            google_id: None,
        }
    }

    pub fn federated(email: &str, name: &str, google_id: &str) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            password: None,
            google_id: Some(google_id.into()),
        }
    }
}

/// Read-only summary derived from a user document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserStats {
    pub name: Option<String>,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub joined: OffsetDateTime,
    pub total_consultations: usize,
    pub verified: bool,
    pub profile: Profile,
}

impl From<&UserDocument> for UserStats {
    fn from(user: &UserDocument) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            joined: user.created_at.to_time_0_3(),
            total_consultations: user.consultations.len(),
            verified: user.verified,
            profile: user.profile.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::DateTime;

    #[test]
    fn stats_serialize_joined_as_rfc3339() {
        let user = UserDocument {
            id: None,
            email: "a@x.com".into(),
            name: Some("Alice".into()),
            password_hash: Some("$argon2id$...".into()),
            google_id: None,
            created_at: DateTime::from_millis(0),
            verified: false,
            otp: None,
            otp_expires: None,
            consultations: vec![Default::default(), Default::default()],
            profile: Profile::default(),
            reminders: None,
        };
        let stats = UserStats::from(&user);
        assert_eq!(stats.total_consultations, 2);

        let json = serde_json::to_value(&stats).expect("serialize");
        assert_eq!(json["joined"], "1970-01-01T00:00:00Z");
        assert_eq!(json["name"], "Alice");
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["profile"]["allergies"], serde_json::json!([]));
    }

    #[test]
    fn new_user_deserializes_without_optional_keys() {
        let body = r#"{"email":"g@x.com","name":"G","google_id":"g-1"}"#;
        let new_user: NewUser = serde_json::from_str(body).expect("deserialize");
        assert!(new_user.password.is_none());
        assert_eq!(new_user.google_id.as_deref(), Some("g-1"));
    }
}
