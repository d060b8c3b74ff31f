use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{AppError, AppResult};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Exam {
    pub id: String, // EX-###, global sequence
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_by: String, // owning instructor id
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    pub fn new(
        id: String,
        created_by: &str,
        title: &str,
        description: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> AppResult<Self> {
        validate_window(start_time, end_time)?;

        let now = Utc::now();
        Ok(Exam {
            id,
            title: title.trim().to_string(),
            description: description.to_string(),
            start_time,
            end_time,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Open iff `start_time <= now <= end_time`; both bounds are inclusive.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    pub fn is_owned_by(&self, instructor_id: &str) -> bool {
        self.created_by == instructor_id
    }
}

pub fn validate_window(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> AppResult<()> {
    if end_time <= start_time {
        return Err(AppError::ValidationError(
            "End time must be after start time.".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for Exam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.title)
    }
}
