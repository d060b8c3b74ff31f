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
    models::domain::ExamQuestion,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn create(&self, question: ExamQuestion) -> AppResult<ExamQuestion>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamQuestion>>;
    /// Ordered by `order_no`, ties broken by creation time.
    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<ExamQuestion>>;
    /// Replaces the question document, choices included.
    async fn update(&self, question: ExamQuestion) -> AppResult<ExamQuestion>;
    /// Removes the question and every answer given to it.
    async fn delete(&self, id: &str) -> AppResult<()>;
    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoQuestionRepository {
    collection: Collection<ExamQuestion>,
    answers: Collection<Document>,
}

impl MongoQuestionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.get_collection("exam_questions"),
            answers: db.get_collection("answers"),
        }
    }
}

pub(crate) fn sort_questions(questions: &mut [ExamQuestion]) {
    questions.sort_by(|a, b| {
        a.order_no
            .cmp(&b.order_no)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[async_trait]
impl QuestionRepository for MongoQuestionRepository {
    async fn create(&self, question: ExamQuestion) -> AppResult<ExamQuestion> {
        self.collection.insert_one(&question).await?;
        Ok(question)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamQuestion>> {
        let question = self.collection.find_one(doc! { "id": id }).await?;
        Ok(question)
    }

    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<ExamQuestion>> {
        let mut questions: Vec<ExamQuestion> = self
            .collection
            .find(doc! { "exam_id": exam_id })
            .await?
            .try_collect()
            .await?;
        sort_questions(&mut questions);
        Ok(questions)
    }

    async fn update(&self, question: ExamQuestion) -> AppResult<ExamQuestion> {
        let result = self
            .collection
            .replace_one(doc! { "id": question.id.as_str() }, &question)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Question with id '{}' not found",
                question.id
            )));
        }

        Ok(question)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let answers = self.answers.delete_many(doc! { "question_id": id }).await?;
        let result = self.collection.delete_one(doc! { "id": id }).await?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!(
                "Question with id '{}' not found",
                id
            )));
        }

        log::info!(
            "Deleted question {} and {} answers",
            id,
            answers.deleted_count
        );
        Ok(())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for exam_questions collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let exam_index = IndexModel::builder()
            .keys(doc! { "exam_id": 1, "order_no": 1 })
            .options(IndexOptions::builder().name("exam_order".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(exam_index).await?;

        log::info!("Successfully created indexes for exam_questions collection");
        Ok(())
    }
}
