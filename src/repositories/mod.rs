pub mod attempt_repository;
pub mod exam_repository;
pub mod instructor_repository;
pub mod memory;
pub mod question_repository;
pub mod sequence_repository;
pub mod student_repository;

pub use attempt_repository::{AttemptRepository, MongoAttemptRepository};
pub use exam_repository::{ExamRepository, MongoExamRepository};
pub use instructor_repository::{InstructorRepository, MongoInstructorRepository};
pub use memory::InMemoryStore;
pub use question_repository::{MongoQuestionRepository, QuestionRepository};
pub use sequence_repository::{MongoSequenceRepository, SequenceRepository};
pub use student_repository::{MongoStudentRepository, StudentRepository};
