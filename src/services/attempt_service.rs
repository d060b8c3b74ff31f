use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    auth::{ensure_attempt_owner, ensure_exam_owner},
    errors::{AppError, AppResult},
    models::{
        domain::{Answer, AttemptState, Exam, ExamAttempt, ExamQuestion, Instructor, Student},
        dto::{
            request::{AnswerInput, SubmitAttemptRequest},
            response::{AttemptResult, AttemptSession},
        },
    },
    repositories::{AttemptRepository, ExamRepository, QuestionRepository},
    services::grading,
};

/// Fresh attempt codes tried before a code collision is reported.
const ATTEMPT_CODE_TRIES: usize = 3;

/// Drives an attempt from start to submission and grades it on the way.
pub struct AttemptService {
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptService {
    pub fn new(
        exams: Arc<dyn ExamRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            exams,
            questions,
            attempts,
        }
    }

    /// Returns the student's attempt for the exam, creating it on first visit.
    ///
    /// An existing attempt is returned unchanged whatever its state; callers
    /// branch on `already_submitted` to show a read-only view.
    pub async fn start_or_resume(
        &self,
        exam_id: &str,
        student: &Student,
        now: DateTime<Utc>,
    ) -> AppResult<AttemptSession> {
        let exam = self.get_exam(exam_id).await?;
        ensure_open(&exam, now)?;

        let mut tries = 0;
        let (attempt, created) = loop {
            tries += 1;
            match self
                .attempts
                .get_or_create(ExamAttempt::start(&exam.id, &student.id, now))
                .await
            {
                Err(AppError::AlreadyExists(reason)) if tries < ATTEMPT_CODE_TRIES => {
                    log::warn!("Attempt code collision on exam {}: {}", exam.id, reason);
                }
                result => break result?,
            }
        };

        log::info!(
            "Student {} {} attempt {} on exam {}",
            student.id,
            if created { "started" } else { "resumed" },
            attempt.id,
            exam.id
        );

        Ok(AttemptSession {
            already_submitted: attempt.state() == AttemptState::Submitted,
            attempt,
            created,
        })
    }

    /// Upserts and grades one answer of an in-progress attempt.
    pub async fn record_answer(
        &self,
        attempt_id: &str,
        student: &Student,
        question_id: &str,
        input: AnswerInput,
        now: DateTime<Utc>,
    ) -> AppResult<Answer> {
        let attempt = self.owned_attempt(attempt_id, student).await?;
        ensure_in_progress(&attempt)?;
        let exam = self.get_exam(&attempt.exam_id).await?;
        ensure_open(&exam, now)?;

        let question = self
            .questions
            .find_by_id(question_id)
            .await?
            .filter(|q| q.exam_id == attempt.exam_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Question with id '{}' not found", question_id))
            })?;

        let answers = self.attempts.find_answers(&attempt.id).await?;
        let prior = answers.iter().find(|a| a.question_id == question.id);
        let answer = grading::grade_response(&question, &attempt.id, &input, prior, now)?;

        self.attempts.upsert_answer(answer).await
    }

    /// Sums the recorded marks into the score and closes the attempt.
    pub async fn finalize(
        &self,
        attempt_id: &str,
        student: &Student,
        now: DateTime<Utc>,
    ) -> AppResult<ExamAttempt> {
        let attempt = self.owned_attempt(attempt_id, student).await?;
        ensure_in_progress(&attempt)?;
        let exam = self.get_exam(&attempt.exam_id).await?;
        ensure_open(&exam, now)?;

        self.close(attempt, now).await
    }

    /// Start or resume, record every provided response, then finalize.
    ///
    /// Questions without a response get no answer row. Every response is
    /// checked before the first answer is written, so a rejected batch
    /// stores no answers and leaves the attempt in progress.
    pub async fn submit(
        &self,
        exam_id: &str,
        student: &Student,
        request: SubmitAttemptRequest,
        now: DateTime<Utc>,
    ) -> AppResult<AttemptResult> {
        let session = self.start_or_resume(exam_id, student, now).await?;
        let attempt = session.attempt;
        ensure_in_progress(&attempt)?;

        let questions = self.questions.list_by_exam(exam_id).await?;
        let known: HashMap<&str, &ExamQuestion> =
            questions.iter().map(|q| (q.id.as_str(), q)).collect();
        if let Some(unknown) = request
            .responses
            .keys()
            .find(|id| !known.contains_key(id.as_str()))
        {
            return Err(AppError::ValidationError(format!(
                "Question '{}' is not part of exam '{}'",
                unknown, exam_id
            )));
        }

        let existing = self.attempts.find_answers(&attempt.id).await?;
        let mut graded = Vec::with_capacity(request.responses.len());
        for question in &questions {
            if let Some(input) = request.responses.get(&question.id) {
                let prior = existing.iter().find(|a| a.question_id == question.id);
                graded.push(grading::grade_response(question, &attempt.id, input, prior, now)?);
            }
        }

        for answer in graded {
            self.attempts.upsert_answer(answer).await?;
        }

        let attempt = self.close(attempt, now).await?;
        let answers = self.attempts.find_answers(&attempt.id).await?;
        Ok(AttemptResult { attempt, answers })
    }

    /// The attempt with its answers, visible only to the student who made it.
    pub async fn attempt_result(
        &self,
        attempt_id: &str,
        student: &Student,
    ) -> AppResult<AttemptResult> {
        let attempt = self.owned_attempt(attempt_id, student).await?;
        let answers = self.attempts.find_answers(&attempt.id).await?;
        Ok(AttemptResult { attempt, answers })
    }

    /// Manual review of one answer on a submitted attempt; the score follows.
    pub async fn override_marks(
        &self,
        answer_id: &str,
        reviewer: &Instructor,
        marks: f64,
    ) -> AppResult<Answer> {
        let mut answer = self
            .attempts
            .find_answer(answer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Answer with id '{}' not found", answer_id)))?;
        let attempt = self
            .attempts
            .find_by_id(&answer.attempt_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Attempt with id '{}' not found", answer.attempt_id))
            })?;
        let exam = self.get_exam(&attempt.exam_id).await?;
        ensure_exam_owner(&exam, reviewer)?;

        if !attempt.is_submitted() {
            return Err(AppError::InvalidOperation(
                "Marks can only be reviewed once the attempt is submitted".to_string(),
            ));
        }

        let question = self
            .questions
            .find_by_id(&answer.question_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Question with id '{}' not found", answer.question_id))
            })?;
        if !marks.is_finite() || marks < 0.0 || marks > question.marks {
            return Err(AppError::ValidationError(format!(
                "Marks must be between 0 and {}",
                question.marks
            )));
        }

        let score = self.attempts.set_answer_marks(&answer.id, marks).await?;

        log::info!(
            "Instructor {} set marks {} on answer {} (attempt {} score {})",
            reviewer.id,
            marks,
            answer.id,
            attempt.id,
            score
        );
        answer.marks = Some(marks);
        Ok(answer)
    }

    async fn close(&self, attempt: ExamAttempt, now: DateTime<Utc>) -> AppResult<ExamAttempt> {
        let Some(closed) = self.attempts.finalize(&attempt.id, now).await? else {
            log::warn!("Attempt {} was finalized concurrently", attempt.id);
            return Err(AppError::AlreadySubmitted(attempt.id));
        };

        log::info!(
            "Submitted attempt {} with score {}",
            closed,
            closed.score.unwrap_or_default()
        );
        Ok(closed)
    }

    async fn get_exam(&self, exam_id: &str) -> AppResult<Exam> {
        self.exams
            .find_by_id(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam with id '{}' not found", exam_id)))
    }

    async fn owned_attempt(&self, attempt_id: &str, student: &Student) -> AppResult<ExamAttempt> {
        let attempt = self
            .attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Attempt with id '{}' not found", attempt_id))
            })?;
        ensure_attempt_owner(&attempt, student)?;
        Ok(attempt)
    }
}

fn ensure_open(exam: &Exam, now: DateTime<Utc>) -> AppResult<()> {
    if !exam.is_open(now) {
        log::warn!("Exam {} is not open at {}", exam.id, now);
        return Err(AppError::ExamClosed(format!(
            "Exam '{}' accepts attempts between {} and {}",
            exam.id, exam.start_time, exam.end_time
        )));
    }
    Ok(())
}

fn ensure_in_progress(attempt: &ExamAttempt) -> AppResult<()> {
    match attempt.state() {
        AttemptState::InProgress => Ok(()),
        AttemptState::Submitted => {
            log::warn!("Rejected change to submitted attempt {}", attempt.id);
            Err(AppError::AlreadySubmitted(attempt.id.clone()))
        }
    }
}
