use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{Exam, ExamAttempt},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExamRepository: Send + Sync {
    async fn create(&self, exam: Exam) -> AppResult<Exam>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Exam>>;
    async fn update(&self, exam: Exam) -> AppResult<Exam>;
    /// Newest first.
    async fn list_by_owner(&self, instructor_id: &str) -> AppResult<Vec<Exam>>;
    async fn list_all(&self) -> AppResult<Vec<Exam>>;
    /// Removes the exam with its questions, attempts and answers.
    async fn delete_cascade(&self, id: &str) -> AppResult<()>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoExamRepository {
    collection: Collection<Exam>,
    questions: Collection<Document>,
    attempts: Collection<ExamAttempt>,
    answers: Collection<Document>,
}

impl MongoExamRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.get_collection("exams"),
            questions: db.get_collection("exam_questions"),
            attempts: db.get_collection("exam_attempts"),
            answers: db.get_collection("answers"),
        }
    }
}

#[async_trait]
impl ExamRepository for MongoExamRepository {
    async fn create(&self, exam: Exam) -> AppResult<Exam> {
        self.collection.insert_one(&exam).await?;
        Ok(exam)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Exam>> {
        let exam = self.collection.find_one(doc! { "id": id }).await?;
        Ok(exam)
    }

    async fn update(&self, exam: Exam) -> AppResult<Exam> {
        let result = self
            .collection
            .replace_one(doc! { "id": exam.id.as_str() }, &exam)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Exam with id '{}' not found",
                exam.id
            )));
        }

        Ok(exam)
    }

    async fn list_by_owner(&self, instructor_id: &str) -> AppResult<Vec<Exam>> {
        let mut exams: Vec<Exam> = self
            .collection
            .find(doc! { "created_by": instructor_id })
            .await?
            .try_collect()
            .await?;
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(exams)
    }

    async fn list_all(&self) -> AppResult<Vec<Exam>> {
        let mut exams: Vec<Exam> = self.collection.find(doc! {}).await?.try_collect().await?;
        exams.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(exams)
    }

    async fn delete_cascade(&self, id: &str) -> AppResult<()> {
        let attempts: Vec<ExamAttempt> = self
            .attempts
            .find(doc! { "exam_id": id })
            .await?
            .try_collect()
            .await?;
        let attempt_ids: Vec<String> = attempts.into_iter().map(|a| a.id).collect();

        // Leaf collections first; the exam document goes last.
        let answers = self
            .answers
            .delete_many(doc! { "attempt_id": { "$in": attempt_ids } })
            .await?;
        let attempts = self.attempts.delete_many(doc! { "exam_id": id }).await?;
        let questions = self.questions.delete_many(doc! { "exam_id": id }).await?;
        let result = self.collection.delete_one(doc! { "id": id }).await?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Exam with id '{}' not found", id)));
        }

        log::info!(
            "Deleted exam {} ({} questions, {} attempts, {} answers)",
            id,
            questions.deleted_count,
            attempts.deleted_count,
            answers.deleted_count
        );
        Ok(())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for exams collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let owner_index = IndexModel::builder()
            .keys(doc! { "created_by": 1 })
            .options(
                IndexOptions::builder()
                    .name("created_by".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(owner_index).await?;

        log::info!("Successfully created indexes for exams collection");
        Ok(())
    }
}
