use thiserror::Error;

/// Coarse error classes the delivery layer branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    InvalidOperation,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("A question cannot have more than {limit} choices")]
    ChoiceLimitExceeded { limit: usize },

    #[error("Duplicate choice: '{0}' already exists for this question")]
    DuplicateChoice(String),

    #[error("Only one choice can be marked as correct")]
    MultipleCorrectAnswers,

    #[error("Exam closed: {0}")]
    ExamClosed(String),

    #[error("Attempt already submitted: {0}")]
    AlreadySubmitted(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidOperation(_) => "INVALID_OPERATION",
            AppError::ChoiceLimitExceeded { .. } => "CHOICE_LIMIT_EXCEEDED",
            AppError::DuplicateChoice(_) => "DUPLICATE_CHOICE",
            AppError::MultipleCorrectAnswers => "MULTIPLE_CORRECT_ANSWERS",
            AppError::ExamClosed(_) => "EXAM_CLOSED",
            AppError::AlreadySubmitted(_) => "ALREADY_SUBMITTED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) | AppError::InvalidCredentials => ErrorKind::Validation,
            AppError::AlreadyExists(_)
            | AppError::DuplicateChoice(_)
            | AppError::MultipleCorrectAnswers => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidOperation(_)
            | AppError::ChoiceLimitExceeded { .. }
            | AppError::ExamClosed(_)
            | AppError::AlreadySubmitted(_) => ErrorKind::InvalidOperation,
            AppError::DatabaseError(_) | AppError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        if crate::db::is_duplicate_key(&err) {
            return AppError::AlreadyExists(err.to_string());
        }
        AppError::DatabaseError(err.to_string())
    }
}
impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::InternalError(format!("BSON serialization error: {}", err))
    }
}
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = err.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let message = fields
            .into_iter()
            .filter_map(|(field, errors)| {
                errors.first().map(|e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect::<Vec<_>>()
            .join("; ");

        AppError::ValidationError(message)
    }
}
impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::InternalError(format!("Password hashing error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
