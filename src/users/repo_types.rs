use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use serde::{Deserialize, Serialize};

pub const USERS_COLLECTION: &str = "users";

/// User document stored in the `users` collection, one per email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    // absent for accounts that only sign in through an identity provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    pub created_at: DateTime,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(default)]
    pub otp_expires: Option<DateTime>,
    #[serde(default)]
    pub consultations: Vec<Consultation>,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<Document>>,
}

/// Free-form health profile. Whatever the caller stores is kept as-is;
/// the accessors read the usual fields leniently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Profile(pub Document);

impl Default for Profile {
    fn default() -> Self {
        Self(doc! {
            "age": Bson::Null,
            "weight": Bson::Null,
            "allergies": [],
            "medical_conditions": [],
        })
    }
}

impl From<Document> for Profile {
    fn from(doc: Document) -> Self {
        Self(doc)
    }
}

impl Profile {
    pub fn age(&self) -> Option<i64> {
        match self.0.get("age")? {
            Bson::Int32(v) => Some(i64::from(*v)),
            Bson::Int64(v) => Some(*v),
            Bson::Double(v) if v.is_finite() => Some(v.trunc() as i64),
            Bson::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn weight(&self) -> Option<f64> {
        match self.0.get("weight")? {
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            Bson::Double(v) => Some(*v),
            Bson::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn allergies(&self) -> Vec<&str> {
        self.strings("allergies")
    }

    pub fn medical_conditions(&self) -> Vec<&str> {
        self.strings("medical_conditions")
    }

    fn strings(&self, key: &str) -> Vec<&str> {
        match self.0.get(key) {
            Some(Bson::Array(items)) => items.iter().filter_map(Bson::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn fields(&self) -> &Document {
        &self.0
    }
}

/// A consultation entry: whatever the caller recorded, plus the
/// `timestamp` the server stamped on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Consultation(pub Document);

impl Consultation {
    pub const TIMESTAMP: &'static str = "timestamp";

    pub fn stamped(mut details: Document, at: DateTime) -> Self {
        details.insert(Self::TIMESTAMP, at);
        Self(details)
    }

    pub fn timestamp(&self) -> Option<DateTime> {
        self.0.get_datetime(Self::TIMESTAMP).ok().copied()
    }

    pub fn details(&self) -> &Document {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamping_overrides_caller_timestamp() {
        let at = DateTime::from_millis(1_700_000_000_000);
        let c = Consultation::stamped(doc! { "timestamp": "yesterday", "symptoms": "cough" }, at);
        assert_eq!(c.timestamp(), Some(at));
        assert_eq!(c.details().get_str("symptoms").unwrap(), "cough");
    }

    #[test]
    fn legacy_document_without_optional_fields_decodes() {
        let raw = doc! {
            "email": "old@x.com",
            "name": "Old",
            "created_at": DateTime::from_millis(0),
        };
        let user: UserDocument = bson::from_document(raw).expect("decode");
        assert_eq!(user.profile, Profile::default());
        assert!(user.consultations.is_empty());
        assert!(user.reminders.is_none());
        assert!(!user.verified);
    }

    #[test]
    fn profile_keeps_unknown_keys_through_a_round_trip() {
        let raw = doc! {
            "email": "a@x.com",
            "created_at": DateTime::from_millis(0),
            "profile": { "age": "34", "weight": 70, "blood_type": "O+", "allergies": ["nuts", 3] },
        };
        let user: UserDocument = bson::from_document(raw).expect("decode");
        assert_eq!(user.profile.age(), Some(34));
        assert_eq!(user.profile.weight(), Some(70.0));
        assert_eq!(user.profile.allergies(), vec!["nuts"]);
        assert!(user.profile.medical_conditions().is_empty());

        let stored = bson::to_document(&user).expect("encode");
        let profile = stored.get_document("profile").unwrap();
        assert_eq!(profile.get_str("blood_type").unwrap(), "O+");
        assert_eq!(profile.get_str("age").unwrap(), "34");
    }

    #[test]
    fn default_profile_has_the_four_fields() {
        let profile = Profile::default();
        let keys: Vec<&str> = profile.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["age", "weight", "allergies", "medical_conditions"]);
        assert_eq!(profile.age(), None);
        assert!(profile.allergies().is_empty());
    }

    #[test]
    fn federated_account_omits_password_hash() {
        let user = UserDocument {
            id: None,
            email: "g@x.com".into(),
            name: Some("G".into()),
            password_hash: None,
            google_id: Some("g-123".into()),
            created_at: DateTime::from_millis(0),
            verified: true,
            otp: None,
            otp_expires: None,
            consultations: vec![],
            profile: Profile::default(),
            reminders: None,
        };
        let raw = bson::to_document(&user).expect("encode");
        assert!(!raw.contains_key("password_hash"));
        assert!(!raw.contains_key("_id"));
        assert!(!raw.contains_key("reminders"));
        assert!(raw.contains_key("otp"));
    }
}
