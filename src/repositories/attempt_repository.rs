use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, to_document, Bson, Document},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client, ClientSession, Collection, IndexModel,
};

use crate::{
    db::{
        abort_transaction, commit_with_retry, is_duplicate_key, is_transient_transaction_error,
        Database, TRANSACTION_RETRIES,
    },
    errors::{AppError, AppResult},
    models::domain::{Answer, ExamAttempt},
};

/// Attempts and their answers; the two are always written together.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Inserts `attempt` unless one already exists for its (exam, student) pair.
    /// Returns the stored attempt and whether it was created by this call.
    /// Fails with `AlreadyExists` when only the attempt id is taken.
    async fn get_or_create(&self, attempt: ExamAttempt) -> AppResult<(ExamAttempt, bool)>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamAttempt>>;
    async fn find_by_exam_and_student(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> AppResult<Option<ExamAttempt>>;
    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<ExamAttempt>>;
    /// Inserts or updates the answer for its (attempt, question) pair.
    /// An existing row keeps its id. The attempt must still be in progress
    /// when the write lands, otherwise `AlreadySubmitted`.
    async fn upsert_answer(&self, answer: Answer) -> AppResult<Answer>;
    async fn find_answers(&self, attempt_id: &str) -> AppResult<Vec<Answer>>;
    async fn find_answer(&self, id: &str) -> AppResult<Option<Answer>>;
    /// Scores the attempt from its stored answers and sets the submission
    /// timestamp, atomically with respect to answer writes. Returns `None`
    /// when the attempt was already submitted.
    async fn finalize(
        &self,
        attempt_id: &str,
        submitted_at: DateTime<Utc>,
    ) -> AppResult<Option<ExamAttempt>>;
    /// Overrides one answer's marks and returns the attempt's recomputed score.
    async fn set_answer_marks(&self, answer_id: &str, marks: f64) -> AppResult<f64>;
    /// Drops references to removed choices; returns how many answers changed.
    async fn clear_selected_choices(&self, choice_ids: &[String]) -> AppResult<u64>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub(crate) fn sum_marks(answers: &[Answer]) -> f64 {
    answers.iter().map(Answer::awarded).sum()
}

/// Runs `$step` inside a transaction on `$session` and commits it. The whole
/// step is rerun while the server reports a transient conflict.
macro_rules! in_transaction {
    ($session:ident, $what:expr, $step:expr) => {{
        let mut tries = 0;
        loop {
            tries += 1;
            $session.start_transaction().await?;
            let outcome = match $step.await {
                Ok(value) => commit_with_retry(&mut $session).await.map(|_| value),
                Err(err) => {
                    abort_transaction(&mut $session).await;
                    Err(err)
                }
            };
            match outcome {
                Ok(value) => break value,
                Err(err) if is_transient_transaction_error(&err) && tries < TRANSACTION_RETRIES => {
                    log::warn!(
                        "{} hit a write conflict, retrying ({}/{})",
                        $what,
                        tries,
                        TRANSACTION_RETRIES
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }};
}

pub struct MongoAttemptRepository {
    client: Client,
    collection: Collection<ExamAttempt>,
    answers: Collection<Answer>,
}

impl MongoAttemptRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            client: db.client(),
            collection: db.get_collection("exam_attempts"),
            answers: db.get_collection("answers"),
        }
    }

    async fn answers_in(
        &self,
        session: &mut ClientSession,
        attempt_id: &str,
    ) -> mongodb::error::Result<Vec<Answer>> {
        let mut cursor = self
            .answers
            .find(doc! { "attempt_id": attempt_id })
            .session(&mut *session)
            .await?;
        cursor.stream(session).try_collect().await
    }

    /// Touches the attempt first so a concurrent finalize conflicts with this
    /// write. `None` when the attempt is missing or already submitted.
    async fn upsert_answer_in(
        &self,
        session: &mut ClientSession,
        answer: &Answer,
        fields: &Document,
        touched_at: &Bson,
    ) -> mongodb::error::Result<Option<Answer>> {
        let touched = self
            .collection
            .update_one(
                doc! { "id": answer.attempt_id.as_str(), "submitted_at": Bson::Null },
                doc! { "$set": { "last_answered_at": touched_at.clone() } },
            )
            .session(&mut *session)
            .await?;
        if touched.matched_count == 0 {
            return Ok(None);
        }

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        self.answers
            .find_one_and_update(
                doc! {
                    "attempt_id": answer.attempt_id.as_str(),
                    "question_id": answer.question_id.as_str()
                },
                doc! {
                    "$set": fields.clone(),
                    "$setOnInsert": { "id": answer.id.as_str() }
                },
            )
            .with_options(options)
            .session(&mut *session)
            .await
    }

    async fn finalize_in(
        &self,
        session: &mut ClientSession,
        attempt_id: &str,
        submitted_at: &Bson,
    ) -> mongodb::error::Result<Option<ExamAttempt>> {
        let score = sum_marks(&self.answers_in(session, attempt_id).await?);

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection
            .find_one_and_update(
                doc! { "id": attempt_id, "submitted_at": Bson::Null },
                doc! {
                    "$set": {
                        "submitted_at": submitted_at.clone(),
                        "score": score
                    }
                },
            )
            .with_options(options)
            .session(&mut *session)
            .await
    }

    /// `None` when the answer does not exist.
    async fn set_answer_marks_in(
        &self,
        session: &mut ClientSession,
        answer_id: &str,
        marks: f64,
    ) -> mongodb::error::Result<Option<f64>> {
        let Some(answer) = self
            .answers
            .find_one_and_update(
                doc! { "id": answer_id },
                doc! { "$set": { "marks": marks } },
            )
            .session(&mut *session)
            .await?
        else {
            return Ok(None);
        };

        let score = sum_marks(&self.answers_in(session, &answer.attempt_id).await?);
        self.collection
            .update_one(
                doc! { "id": answer.attempt_id.as_str() },
                doc! { "$set": { "score": score } },
            )
            .session(&mut *session)
            .await?;
        Ok(Some(score))
    }
}

#[async_trait]
impl AttemptRepository for MongoAttemptRepository {
    async fn get_or_create(&self, attempt: ExamAttempt) -> AppResult<(ExamAttempt, bool)> {
        let mut on_insert = to_document(&attempt)?;
        on_insert.remove("exam_id");
        on_insert.remove("student_id");

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .build();

        let result = self
            .collection
            .find_one_and_update(
                doc! {
                    "exam_id": attempt.exam_id.as_str(),
                    "student_id": attempt.student_id.as_str()
                },
                doc! { "$setOnInsert": on_insert },
            )
            .with_options(options)
            .await;

        match result {
            Ok(None) => Ok((attempt, true)),
            Ok(Some(existing)) => Ok((existing, false)),
            // Either a concurrent upsert for the same pair won, or the random
            // attempt id already belongs to another pair.
            Err(err) if is_duplicate_key(&err) => {
                match self
                    .find_by_exam_and_student(&attempt.exam_id, &attempt.student_id)
                    .await?
                {
                    Some(existing) => Ok((existing, false)),
                    None => Err(AppError::AlreadyExists(format!(
                        "Attempt with id '{}' already exists",
                        attempt.id
                    ))),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamAttempt>> {
        let attempt = self.collection.find_one(doc! { "id": id }).await?;
        Ok(attempt)
    }

    async fn find_by_exam_and_student(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> AppResult<Option<ExamAttempt>> {
        let attempt = self
            .collection
            .find_one(doc! {
                "exam_id": exam_id,
                "student_id": student_id
            })
            .await?;
        Ok(attempt)
    }

    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<ExamAttempt>> {
        let mut attempts: Vec<ExamAttempt> = self
            .collection
            .find(doc! { "exam_id": exam_id })
            .await?
            .try_collect()
            .await?;
        attempts.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(attempts)
    }

    async fn upsert_answer(&self, answer: Answer) -> AppResult<Answer> {
        let mut fields = to_document(&answer)?;
        fields.remove("id");
        fields.remove("attempt_id");
        fields.remove("question_id");
        let touched_at = to_bson(&answer.updated_at)?;

        let mut session = self.client.start_session().await?;
        let stored = in_transaction!(
            session,
            "Answer write",
            self.upsert_answer_in(&mut session, &answer, &fields, &touched_at)
        );

        stored.ok_or_else(|| {
            log::warn!(
                "Rejected answer for question {} on closed attempt {}",
                answer.question_id,
                answer.attempt_id
            );
            AppError::AlreadySubmitted(answer.attempt_id.clone())
        })
    }

    async fn find_answers(&self, attempt_id: &str) -> AppResult<Vec<Answer>> {
        let answers = self
            .answers
            .find(doc! { "attempt_id": attempt_id })
            .await?
            .try_collect()
            .await?;
        Ok(answers)
    }

    async fn find_answer(&self, id: &str) -> AppResult<Option<Answer>> {
        let answer = self.answers.find_one(doc! { "id": id }).await?;
        Ok(answer)
    }

    async fn finalize(
        &self,
        attempt_id: &str,
        submitted_at: DateTime<Utc>,
    ) -> AppResult<Option<ExamAttempt>> {
        let submitted_at = to_bson(&submitted_at)?;

        let mut session = self.client.start_session().await?;
        let finalized = in_transaction!(
            session,
            "Attempt finalize",
            self.finalize_in(&mut session, attempt_id, &submitted_at)
        );
        Ok(finalized)
    }

    async fn set_answer_marks(&self, answer_id: &str, marks: f64) -> AppResult<f64> {
        let mut session = self.client.start_session().await?;
        let score = in_transaction!(
            session,
            "Marks override",
            self.set_answer_marks_in(&mut session, answer_id, marks)
        );

        score.ok_or_else(|| AppError::NotFound(format!("Answer with id '{}' not found", answer_id)))
    }

    async fn clear_selected_choices(&self, choice_ids: &[String]) -> AppResult<u64> {
        if choice_ids.is_empty() {
            return Ok(0);
        }

        let result = self
            .answers
            .update_many(
                doc! { "selected_choice_id": { "$in": choice_ids.to_vec() } },
                doc! { "$set": { "selected_choice_id": Bson::Null } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for exam_attempts and answers collections");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let exam_student_index = IndexModel::builder()
            .keys(doc! { "exam_id": 1, "student_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("exam_student_unique".to_string())
                    .build(),
            )
            .build();

        let answer_id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let attempt_question_index = IndexModel::builder()
            .keys(doc! { "attempt_id": 1, "question_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("attempt_question_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(exam_student_index).await?;
        self.answers.create_index(answer_id_index).await?;
        self.answers.create_index(attempt_question_index).await?;

        log::info!("Successfully created indexes for exam_attempts and answers collections");
        Ok(())
    }
}
