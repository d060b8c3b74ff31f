use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Student {
    pub id: String, // STU###, assigned once
    pub full_name: String,
    pub email: String,
    pub matric_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub const ROLE: &'static str = "student";

    pub fn new(
        id: String,
        full_name: &str,
        email: &str,
        matric_number: &str,
        contact_number: Option<String>,
        password_hash: String,
    ) -> Self {
        Student {
            id,
            full_name: full_name.trim().to_string(),
            email: email.trim().to_lowercase(),
            matric_number: matric_number.trim().to_string(),
            contact_number,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.full_name)
    }
}

#[cfg(test)]
impl Student {
    pub fn test_student(id: &str, email: &str) -> Self {
        Student::new(
            id.to_string(),
            "Test Student",
            email,
            "PPE0001",
            None,
            "hash".to_string(),
        )
    }
}
