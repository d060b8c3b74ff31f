pub mod codes;
pub mod exam;
pub mod exam_attempt;
pub mod exam_question;
pub mod grade;
pub mod instructor;
pub mod principal;
pub mod student;
pub use codes::SequenceKind;
pub use exam::Exam;
pub use exam_attempt::{Answer, AttemptState, ExamAttempt};
pub use exam_question::{Choice, ExamQuestion, QuestionType};
pub use grade::{LetterGrade, PassFail};
pub use instructor::Instructor;
pub use principal::Principal;
pub use student::Student;
