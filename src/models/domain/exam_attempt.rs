use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::codes::new_attempt_code;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum AttemptState {
    InProgress,
    Submitted,
}

/// One student's pass at one exam; at most one per (exam, student).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExamAttempt {
    pub id: String, // ATT-XXXXXX
    pub exam_id: String,
    pub student_id: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    /// Touched by every answer write so answer writes and submission serialize.
    #[serde(default)]
    pub last_answered_at: Option<DateTime<Utc>>,
}

impl ExamAttempt {
    pub fn start(exam_id: &str, student_id: &str, now: DateTime<Utc>) -> Self {
        ExamAttempt {
            id: new_attempt_code(),
            exam_id: exam_id.to_string(),
            student_id: student_id.to_string(),
            started_at: now,
            submitted_at: None,
            score: None,
            last_answered_at: None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn state(&self) -> AttemptState {
        if self.is_submitted() {
            AttemptState::Submitted
        } else {
            AttemptState::InProgress
        }
    }
}

impl fmt::Display for ExamAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.student_id)
    }
}

/// A student's response to one question within an attempt.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Answer {
    pub id: String,
    pub attempt_id: String,
    pub question_id: String,
    pub selected_choice_id: Option<String>,
    pub text_answer: String,
    pub marks: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(attempt_id: &str, question_id: &str) -> Self {
        Answer {
            id: Uuid::new_v4().to_string(),
            attempt_id: attempt_id.to_string(),
            question_id: question_id.to_string(),
            selected_choice_id: None,
            text_answer: String::new(),
            marks: None,
            updated_at: Utc::now(),
        }
    }

    pub fn awarded(&self) -> f64 {
        self.marks.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_attempt_is_in_progress() {
        let now = Utc::now();
        let attempt = ExamAttempt::start("EX-001", "STU001", now);

        assert_eq!(attempt.state(), AttemptState::InProgress);
        assert_eq!(attempt.started_at, now);
        assert!(attempt.score.is_none());
        assert!(attempt.id.starts_with("ATT-"));
        assert_eq!(attempt.to_string(), format!("{} (STU001)", attempt.id));
    }

    #[test]
    fn submitted_follows_timestamp() {
        let mut attempt = ExamAttempt::start("EX-001", "STU001", Utc::now());
        attempt.submitted_at = Some(Utc::now());

        assert!(attempt.is_submitted());
        assert_eq!(attempt.state(), AttemptState::Submitted);
    }

    #[test]
    fn unset_marks_count_as_zero() {
        let mut answer = Answer::new("ATT-ABC123", "q-1");
        assert_eq!(answer.awarded(), 0.0);

        answer.marks = Some(2.5);
        assert_eq!(answer.awarded(), 2.5);
    }
}
