use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{
    Answer, Exam, ExamAttempt, ExamQuestion, Instructor, LetterGrade, PassFail, Student,
};

/// Public view of a student, without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct StudentDto {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub matric_number: String,
    pub contact_number: Option<String>,
    pub role: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<Student> for StudentDto {
    fn from(student: Student) -> Self {
        StudentDto {
            id: student.id,
            full_name: student.full_name,
            email: student.email,
            matric_number: student.matric_number,
            contact_number: student.contact_number,
            role: Student::ROLE,
            created_at: student.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorDto {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub contact_number: Option<String>,
    pub department: Option<String>,
    pub role: &'static str,
}

impl From<Instructor> for InstructorDto {
    fn from(instructor: Instructor) -> Self {
        InstructorDto {
            id: instructor.id,
            full_name: instructor.full_name,
            email: instructor.email,
            contact_number: instructor.contact_number,
            department: instructor.department,
            role: Instructor::ROLE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamDetail {
    pub exam: Exam,
    pub questions: Vec<ExamQuestion>,
}

/// Result of `start_or_resume`; callers show a read-only view when `already_submitted`.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSession {
    pub attempt: ExamAttempt,
    pub created: bool,
    pub already_submitted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt: ExamAttempt,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptReport {
    pub attempt_id: String,
    pub student_id: String,
    pub total_awarded: f64,
    pub total_possible: f64,
    pub percentage: Option<f64>,
    pub letter_grade: LetterGrade,
    pub pass_fail: PassFail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamReport {
    pub exam_id: String,
    pub attempts: Vec<AttemptReport>,
    pub submitted_count: usize,
    pub average_percentage: Option<f64>,
    pub pass_count: usize,
}
