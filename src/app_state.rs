use std::sync::Arc;

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    repositories::{
        AttemptRepository, ExamRepository, InMemoryStore, InstructorRepository,
        MongoAttemptRepository, MongoExamRepository, MongoInstructorRepository,
        MongoQuestionRepository, MongoSequenceRepository, MongoStudentRepository,
        QuestionRepository, SequenceRepository, StudentRepository,
    },
    services::{AttemptService, ExamService, IdentityService, QuestionService, ReportService},
};

#[derive(Clone)]
pub struct AppState {
    pub identity_service: Arc<IdentityService>,
    pub exam_service: Arc<ExamService>,
    pub question_service: Arc<QuestionService>,
    pub attempt_service: Arc<AttemptService>,
    pub report_service: Arc<ReportService>,
    pub config: Arc<Config>,
    database: Option<Database>,
}

struct Repositories {
    students: Arc<dyn StudentRepository>,
    instructors: Arc<dyn InstructorRepository>,
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    sequences: Arc<dyn SequenceRepository>,
}

impl AppState {
    /// Connects to MongoDB, creates indexes and aligns identifier sequences
    /// with the data already stored.
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Database::connect(&config).await?;

        let students = Arc::new(MongoStudentRepository::new(&db));
        students.ensure_indexes().await?;
        let instructors = Arc::new(MongoInstructorRepository::new(&db));
        instructors.ensure_indexes().await?;
        let exams = Arc::new(MongoExamRepository::new(&db));
        exams.ensure_indexes().await?;
        let questions = Arc::new(MongoQuestionRepository::new(&db));
        questions.ensure_indexes().await?;
        let attempts = Arc::new(MongoAttemptRepository::new(&db));
        attempts.ensure_indexes().await?;

        let repositories = Repositories {
            students,
            instructors,
            exams,
            questions,
            attempts,
            sequences: Arc::new(MongoSequenceRepository::new(&db)),
        };

        let state = Self::wire(config, repositories, Some(db));
        state.identity_service.sync_sequences().await?;
        state.exam_service.sync_sequence().await?;
        Ok(state)
    }

    /// Same services over a fresh in-memory store.
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let repositories = Repositories {
            students: store.clone(),
            instructors: store.clone(),
            exams: store.clone(),
            questions: store.clone(),
            attempts: store.clone(),
            sequences: store,
        };
        Self::wire(config, repositories, None)
    }

    /// Pings the database; always healthy when running in memory.
    pub async fn health_check(&self) -> AppResult<()> {
        match &self.database {
            Some(db) => db.health_check().await,
            None => Ok(()),
        }
    }

    fn wire(config: Config, repos: Repositories, database: Option<Database>) -> Self {
        let identity_service = Arc::new(IdentityService::new(
            repos.students,
            repos.instructors,
            repos.sequences.clone(),
        ));
        let exam_service = Arc::new(ExamService::new(
            repos.exams.clone(),
            repos.questions.clone(),
            repos.sequences,
            config.reject_past_exam_start,
        ));
        let question_service = Arc::new(QuestionService::new(
            repos.exams.clone(),
            repos.questions.clone(),
            repos.attempts.clone(),
        ));
        let attempt_service = Arc::new(AttemptService::new(
            repos.exams.clone(),
            repos.questions.clone(),
            repos.attempts.clone(),
        ));
        let report_service = Arc::new(ReportService::new(
            repos.exams,
            repos.questions,
            repos.attempts,
            config.pass_threshold,
        ));

        Self {
            identity_service,
            exam_service,
            question_service,
            attempt_service,
            report_service,
            config: Arc::new(config),
            database,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_cloneable() {
        fn assert_clone<T: Clone + Send + Sync>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_in_memory_state_is_healthy() {
        let state = AppState::in_memory(Config::test_config());

        assert!(state.health_check().await.is_ok());
        assert!(state.config.reject_past_exam_start);
    }
}
