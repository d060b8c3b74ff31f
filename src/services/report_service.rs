use std::sync::Arc;

use crate::{
    auth::{ensure_attempt_owner, ensure_exam_owner},
    errors::{AppError, AppResult},
    models::{
        domain::{
            Answer, Exam, ExamAttempt, ExamQuestion, Instructor, LetterGrade, PassFail, Principal,
        },
        dto::response::{AttemptReport, ExamReport},
    },
    repositories::{AttemptRepository, ExamRepository, QuestionRepository},
    services::grading,
};

/// Read-only grade summaries derived from stored attempts.
pub struct ReportService {
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    pass_threshold: f64,
}

impl ReportService {
    pub fn new(
        exams: Arc<dyn ExamRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
        pass_threshold: f64,
    ) -> Self {
        Self {
            exams,
            questions,
            attempts,
            pass_threshold,
        }
    }

    /// Visible to the student who made the attempt and to the exam's owner.
    pub async fn attempt_report(
        &self,
        attempt_id: &str,
        viewer: &Principal,
    ) -> AppResult<AttemptReport> {
        let attempt = self
            .attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Attempt with id '{}' not found", attempt_id))
            })?;
        let exam = self.get_exam(&attempt.exam_id).await?;

        match viewer {
            Principal::Student(student) => ensure_attempt_owner(&attempt, student)?,
            Principal::Instructor(instructor) => ensure_exam_owner(&exam, instructor)?,
        }

        let questions = self.questions.list_by_exam(&exam.id).await?;
        let answers = self.attempts.find_answers(&attempt.id).await?;
        Ok(self.build_report(&attempt, &answers, &questions))
    }

    /// Per-attempt reports over the exam's submitted attempts, plus aggregates.
    pub async fn exam_report(&self, exam_id: &str, owner: &Instructor) -> AppResult<ExamReport> {
        let exam = self.get_exam(exam_id).await?;
        ensure_exam_owner(&exam, owner)?;

        let questions = self.questions.list_by_exam(&exam.id).await?;
        let mut reports = Vec::new();
        for attempt in self.attempts.list_by_exam(&exam.id).await? {
            if !attempt.is_submitted() {
                continue;
            }
            let answers = self.attempts.find_answers(&attempt.id).await?;
            reports.push(self.build_report(&attempt, &answers, &questions));
        }

        let percentages: Vec<f64> = reports.iter().filter_map(|r| r.percentage).collect();
        let average_percentage = if percentages.is_empty() {
            None
        } else {
            Some(percentages.iter().sum::<f64>() / percentages.len() as f64)
        };
        let pass_count = reports
            .iter()
            .filter(|r| r.pass_fail == PassFail::Pass)
            .count();

        log::info!(
            "Built report for exam {} over {} submitted attempts",
            exam.id,
            reports.len()
        );

        Ok(ExamReport {
            exam_id: exam.id,
            submitted_count: reports.len(),
            attempts: reports,
            average_percentage,
            pass_count,
        })
    }

    fn build_report(
        &self,
        attempt: &ExamAttempt,
        answers: &[Answer],
        questions: &[ExamQuestion],
    ) -> AttemptReport {
        let total_awarded = grading::total_awarded(answers);
        let total_possible = grading::total_possible(answers, questions);
        let percentage = grading::percentage(total_awarded, total_possible);

        AttemptReport {
            attempt_id: attempt.id.clone(),
            student_id: attempt.student_id.clone(),
            total_awarded,
            total_possible,
            percentage,
            letter_grade: LetterGrade::from_percentage(percentage),
            pass_fail: PassFail::from_percentage(percentage, self.pass_threshold),
        }
    }

    async fn get_exam(&self, exam_id: &str) -> AppResult<Exam> {
        self.exams
            .find_by_id(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam with id '{}' not found", exam_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::{QuestionType, Student};
    use crate::repositories::InMemoryStore;
    use crate::test_utils::fixtures::open_exam;
    use chrono::Utc;

    async fn seeded() -> (ReportService, Arc<InMemoryStore>, Exam, ExamQuestion) {
        let store = Arc::new(InMemoryStore::new());
        let exam = open_exam("EX-001", "INS001", Utc::now());
        ExamRepository::create(store.as_ref(), exam.clone())
            .await
            .unwrap();
        let question = ExamQuestion::new(&exam.id, "Explain", QuestionType::Text, 4.0, 1);
        QuestionRepository::create(store.as_ref(), question.clone())
            .await
            .unwrap();

        let service = ReportService::new(store.clone(), store.clone(), store.clone(), 0.5);
        (service, store, exam, question)
    }

    async fn submitted_attempt(
        store: &InMemoryStore,
        exam: &Exam,
        student_id: &str,
        answer: Option<(&ExamQuestion, f64)>,
    ) -> ExamAttempt {
        let (attempt, _) = store
            .get_or_create(ExamAttempt::start(&exam.id, student_id, Utc::now()))
            .await
            .unwrap();
        if let Some((question, marks)) = answer {
            let mut row = Answer::new(&attempt.id, &question.id);
            row.marks = Some(marks);
            store.upsert_answer(row).await.unwrap();
        }
        store
            .finalize(&attempt.id, Utc::now())
            .await
            .unwrap()
            .expect("attempt was in progress")
    }

    #[tokio::test]
    async fn test_attempt_report_grades() {
        let (service, store, exam, question) = seeded().await;
        let attempt = submitted_attempt(&store, &exam, "STU001", Some((&question, 3.0))).await;
        let student = Principal::Student(Student::test_student("STU001", "s@example.com"));

        let report = service.attempt_report(&attempt.id, &student).await.unwrap();

        assert_eq!(report.total_awarded, 3.0);
        assert_eq!(report.total_possible, 4.0);
        assert_eq!(report.percentage, Some(0.75));
        assert_eq!(report.letter_grade, LetterGrade::C);
        assert_eq!(report.pass_fail, PassFail::Pass);
    }

    #[tokio::test]
    async fn test_empty_attempt_is_not_applicable() {
        let (service, store, exam, _) = seeded().await;
        let attempt = submitted_attempt(&store, &exam, "STU001", None).await;
        let owner = Principal::Instructor(Instructor::test_instructor("INS001"));

        let report = service.attempt_report(&attempt.id, &owner).await.unwrap();

        assert_eq!(report.percentage, None);
        assert_eq!(report.letter_grade, LetterGrade::NotApplicable);
        assert_eq!(report.pass_fail, PassFail::NotApplicable);
    }

    #[tokio::test]
    async fn test_report_hidden_from_strangers() {
        let (service, store, exam, _) = seeded().await;
        let attempt = submitted_attempt(&store, &exam, "STU001", None).await;

        let other_student = Principal::Student(Student::test_student("STU002", "o@example.com"));
        let other_owner = Principal::Instructor(Instructor::test_instructor("INS002"));

        assert!(matches!(
            service.attempt_report(&attempt.id, &other_student).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.attempt_report(&attempt.id, &other_owner).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_exam_report_aggregates_submitted_attempts() {
        let (service, store, exam, question) = seeded().await;
        submitted_attempt(&store, &exam, "STU001", Some((&question, 4.0))).await;
        submitted_attempt(&store, &exam, "STU002", Some((&question, 1.0))).await;
        submitted_attempt(&store, &exam, "STU003", None).await;
        store
            .get_or_create(ExamAttempt::start(&exam.id, "STU004", Utc::now()))
            .await
            .unwrap();

        let owner = Instructor::test_instructor("INS001");
        let report = service.exam_report(&exam.id, &owner).await.unwrap();

        assert_eq!(report.submitted_count, 3);
        assert_eq!(report.pass_count, 1);
        assert_eq!(report.average_percentage, Some(0.625));
    }
}
