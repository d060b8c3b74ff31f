use crate::{
    errors::{AppError, AppResult},
    models::domain::{Exam, ExamAttempt, Instructor, Student},
};

/// Another instructor's exam is reported as missing so its existence does not leak.
pub fn ensure_exam_owner(exam: &Exam, instructor: &Instructor) -> AppResult<()> {
    if !exam.is_owned_by(&instructor.id) {
        log::warn!(
            "Instructor {} tried to access exam {} owned by someone else",
            instructor.id,
            exam.id
        );
        return Err(AppError::NotFound(format!(
            "Exam with id '{}' not found",
            exam.id
        )));
    }
    Ok(())
}

pub fn ensure_attempt_owner(attempt: &ExamAttempt, student: &Student) -> AppResult<()> {
    if attempt.student_id != student.id {
        return Err(AppError::NotFound(format!(
            "Attempt with id '{}' not found",
            attempt.id
        )));
    }
    Ok(())
}
