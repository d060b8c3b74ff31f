use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use validator::{Validate, ValidationError};

use crate::models::domain::QuestionType;

static EMAIL_REGEX: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("EMAIL_REGEX is a valid regex pattern")
});

static MATRIC_REGEX: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^PPE\d{4}$").expect("MATRIC_REGEX is a valid regex pattern")
});

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterStudentRequest {
    #[validate(custom(function = validate_full_name))]
    pub full_name: String,

    #[validate(custom(function = validate_email))]
    pub email: String,

    #[validate(custom(function = validate_matric_number))]
    pub matric_number: String,

    /// Empty when not supplied.
    #[serde(default)]
    #[validate(custom(function = validate_contact_number))]
    pub contact_number: String,

    #[validate(custom(function = validate_password))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInstructorRequest {
    #[validate(custom(function = validate_full_name))]
    pub full_name: String,

    #[validate(custom(function = validate_email))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = validate_contact_number))]
    pub contact_number: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub department: String,

    #[validate(custom(function = validate_password))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStudentProfileRequest {
    #[validate(custom(function = validate_full_name))]
    pub full_name: String,

    #[validate(custom(function = validate_email))]
    pub email: String,

    #[validate(custom(function = validate_matric_number))]
    pub matric_number: String,

    #[serde(default)]
    #[validate(custom(function = validate_contact_number))]
    pub contact_number: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateInstructorProfileRequest {
    #[validate(custom(function = validate_full_name))]
    pub full_name: String,

    #[validate(custom(function = validate_email))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = validate_contact_number))]
    pub contact_number: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub department: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(custom(function = validate_title))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[validate(required(message = "Start time is required"))]
    pub start_time: Option<DateTime<Utc>>,

    #[validate(required(message = "End time is required"))]
    pub end_time: Option<DateTime<Utc>>,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    pub description: Option<String>,

    pub start_time: Option<DateTime<Utc>>,

    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(custom(function = validate_not_blank))]
    pub text: String,

    pub question_type: QuestionType,

    #[validate(range(min = 0.0))]
    pub marks: Option<f64>,

    #[validate(range(min = 1))]
    pub order_no: Option<u32>,

    /// Inline MCQ choices, in display order.
    #[serde(default)]
    pub choices: Vec<String>,

    /// Index into `choices` of the correct one.
    pub correct_choice: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1))]
    pub text: Option<String>,

    #[validate(range(min = 0.0))]
    pub marks: Option<f64>,

    #[validate(range(min = 1))]
    pub order_no: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangeQuestionTypeRequest {
    pub question_type: QuestionType,

    #[serde(default)]
    pub choices: Vec<String>,

    pub correct_choice: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChoiceRequest {
    #[validate(length(max = 255), custom(function = validate_not_blank))]
    pub text: String,

    #[serde(default)]
    pub is_correct: bool,
}

/// What a student submitted for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AnswerInput {
    Choice(String),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Keyed by question id; questions without an entry are skipped.
    pub responses: HashMap<String, AnswerInput>,
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub fn validate_full_name(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.chars().count() < 3 {
        return Err(rule("name_too_short", "Name must be at least 3 characters"));
    }
    if !trimmed.chars().any(|c| c.is_alphabetic()) {
        return Err(rule("name_without_letters", "Name must contain letters"));
    }
    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    if !EMAIL_REGEX.is_match(value.trim()) {
        return Err(rule("invalid_email", "Invalid email format"));
    }
    Ok(())
}

pub fn validate_matric_number(value: &str) -> Result<(), ValidationError> {
    if !MATRIC_REGEX.is_match(value.trim()) {
        return Err(rule(
            "invalid_matric_number",
            "Matric number must look like PPE1234",
        ));
    }
    Ok(())
}

pub fn validate_contact_number(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(rule(
            "contact_not_numeric",
            "Contact number must contain digits only",
        ));
    }
    if !(10..=11).contains(&trimmed.len()) {
        return Err(rule(
            "contact_length",
            "Contact number must be 10 or 11 digits",
        ));
    }
    Ok(())
}

pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < 8 {
        return Err(rule(
            "password_too_short",
            "Password must be at least 8 characters",
        ));
    }
    if !value.chars().any(|c| c.is_alphabetic()) || !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(rule(
            "password_too_weak",
            "Password must contain both letters and digits",
        ));
    }
    Ok(())
}

pub fn validate_title(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(rule("title_required", "Title is required"));
    }
    if trimmed.chars().count() > 200 {
        return Err(rule("title_too_long", "Title must be at most 200 characters"));
    }
    Ok(())
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule("blank", "Value cannot be blank"));
    }
    Ok(())
}

/// Empty input means "not supplied".
pub fn none_if_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
