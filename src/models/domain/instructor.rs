use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Instructor {
    pub id: String, // INS###, assigned once
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Instructor {
    pub const ROLE: &'static str = "instructor";

    pub fn new(
        id: String,
        full_name: &str,
        email: &str,
        contact_number: Option<String>,
        department: Option<String>,
        password_hash: String,
    ) -> Self {
        Instructor {
            id,
            full_name: full_name.trim().to_string(),
            email: email.trim().to_lowercase(),
            contact_number,
            department,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Instructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.full_name)
    }
}

#[cfg(test)]
impl Instructor {
    pub fn test_instructor(id: &str) -> Self {
        Instructor::new(
            id.to_string(),
            "Test Instructor",
            &format!("{}@example.com", id.to_lowercase()),
            None,
            Some("Computing".to_string()),
            "hash".to_string(),
        )
    }
}
