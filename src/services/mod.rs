pub mod attempt_service;
pub mod exam_service;
pub mod grading;
pub mod identity_service;
pub mod question_service;
pub mod report_service;

pub use attempt_service::AttemptService;
pub use exam_service::ExamService;
pub use identity_service::IdentityService;
pub use question_service::QuestionService;
pub use report_service::ReportService;
