use std::sync::Arc;

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    auth::ensure_exam_owner,
    errors::{AppError, AppResult},
    models::{
        domain::{exam::validate_window, Exam, Instructor, SequenceKind},
        dto::{
            request::{CreateExamRequest, UpdateExamRequest},
            response::ExamDetail,
        },
    },
    repositories::{ExamRepository, QuestionRepository, SequenceRepository},
};

pub struct ExamService {
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    sequences: Arc<dyn SequenceRepository>,
    reject_past_start: bool,
}

impl ExamService {
    pub fn new(
        exams: Arc<dyn ExamRepository>,
        questions: Arc<dyn QuestionRepository>,
        sequences: Arc<dyn SequenceRepository>,
        reject_past_start: bool,
    ) -> Self {
        Self {
            exams,
            questions,
            sequences,
            reject_past_start,
        }
    }

    /// Authoring path; honours the past-start policy.
    pub async fn create_exam(
        &self,
        owner: &Instructor,
        request: CreateExamRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Exam> {
        self.insert_exam(owner, request, Some(now)).await
    }

    /// Seeding and import path; any valid window is accepted.
    pub async fn seed_exam(&self, owner: &Instructor, request: CreateExamRequest) -> AppResult<Exam> {
        self.insert_exam(owner, request, None).await
    }

    pub async fn update_exam(
        &self,
        exam_id: &str,
        owner: &Instructor,
        request: UpdateExamRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Exam> {
        request.validate()?;
        let mut exam = self.get_owned_exam(exam_id, owner).await?;

        if let Some(title) = request.title {
            if title.trim().is_empty() {
                return Err(AppError::ValidationError("Title is required".to_string()));
            }
            exam.title = title.trim().to_string();
        }
        if let Some(description) = request.description {
            exam.description = description;
        }

        let start_time = request.start_time.unwrap_or(exam.start_time);
        let end_time = request.end_time.unwrap_or(exam.end_time);
        validate_window(start_time, end_time)?;
        if start_time != exam.start_time {
            self.check_start_policy(start_time, Some(now))?;
        }
        exam.start_time = start_time;
        exam.end_time = end_time;
        exam.updated_at = now;

        let exam = self.exams.update(exam).await?;
        log::info!("Updated exam {}", exam);
        Ok(exam)
    }

    /// Removes the exam together with its questions, attempts and answers.
    pub async fn delete_exam(&self, exam_id: &str, owner: &Instructor) -> AppResult<()> {
        let exam = self.get_owned_exam(exam_id, owner).await?;
        self.exams.delete_cascade(&exam.id).await
    }

    pub async fn get_exam(&self, exam_id: &str) -> AppResult<Exam> {
        self.exams
            .find_by_id(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam with id '{}' not found", exam_id)))
    }

    pub async fn get_owned_exam(&self, exam_id: &str, owner: &Instructor) -> AppResult<Exam> {
        let exam = self.get_exam(exam_id).await?;
        ensure_exam_owner(&exam, owner)?;
        Ok(exam)
    }

    /// The exam with its questions in display order, for its owner only.
    pub async fn exam_detail(&self, exam_id: &str, owner: &Instructor) -> AppResult<ExamDetail> {
        let exam = self.get_owned_exam(exam_id, owner).await?;
        let questions = self.questions.list_by_exam(&exam.id).await?;
        Ok(ExamDetail { exam, questions })
    }

    /// Newest first.
    pub async fn list_owned(&self, owner: &Instructor) -> AppResult<Vec<Exam>> {
        self.exams.list_by_owner(&owner.id).await
    }

    /// Exams whose window contains `now`, for students to browse.
    pub async fn list_available(&self, now: DateTime<Utc>) -> AppResult<Vec<Exam>> {
        let exams = self.exams.list_all().await?;
        Ok(exams.into_iter().filter(|e| e.is_open(now)).collect())
    }

    pub fn is_open(exam: &Exam, now: DateTime<Utc>) -> bool {
        exam.is_open(now)
    }

    /// Moves the EX- counter past every exam identifier already stored.
    pub async fn sync_sequence(&self) -> AppResult<()> {
        let exams = self.exams.list_all().await?;
        let floor = SequenceKind::Exam.max_suffix(exams.iter().map(|e| e.id.as_str()));
        self.sequences.raise_floor(SequenceKind::Exam, floor).await
    }

    async fn insert_exam(
        &self,
        owner: &Instructor,
        request: CreateExamRequest,
        authored_at: Option<DateTime<Utc>>,
    ) -> AppResult<Exam> {
        request.validate()?;

        let (start_time, end_time) = match (request.start_time, request.end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(AppError::ValidationError(
                    "Start and end time are required".to_string(),
                ))
            }
        };
        validate_window(start_time, end_time)?;
        self.check_start_policy(start_time, authored_at)?;

        let id = SequenceKind::Exam.format(self.sequences.next_value(SequenceKind::Exam).await?);
        let exam = Exam::new(
            id,
            &owner.id,
            &request.title,
            &request.description,
            start_time,
            end_time,
        )?;
        let exam = self.exams.create(exam).await?;

        log::info!("Instructor {} created exam {}", owner.id, exam);
        Ok(exam)
    }

    fn check_start_policy(
        &self,
        start_time: DateTime<Utc>,
        authored_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        match authored_at {
            Some(now) if self.reject_past_start && start_time < now => {
                Err(AppError::ValidationError(
                    "Start time cannot be in the past.".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}
