use chrono::{DateTime, Duration, Utc};

use crate::models::domain::{Exam, ExamQuestion, QuestionType};

#[cfg(test)]
pub mod fixtures {
    use super::*;

    /// An exam owned by `owner` running from ten minutes before `now` to fifty after.
    pub fn open_exam(id: &str, owner: &str, now: DateTime<Utc>) -> Exam {
        exam_between(
            id,
            owner,
            now - Duration::minutes(10),
            now + Duration::minutes(50),
        )
    }

    pub fn exam_between(id: &str, owner: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Exam {
        Exam::new(id.to_string(), owner, "Arithmetic", "", start, end)
            .expect("fixture window is valid")
    }

    /// "2+2" worth one mark, choices "3" (wrong) and "4" (correct).
    pub fn two_plus_two(exam_id: &str) -> ExamQuestion {
        let mut question = ExamQuestion::new(exam_id, "2+2", QuestionType::Mcq, 1.0, 1);
        question.add_choice("3", false).expect("first choice");
        question.add_choice("4", true).expect("second choice");
        question
    }

    pub fn explain(exam_id: &str) -> ExamQuestion {
        ExamQuestion::new(exam_id, "explain", QuestionType::Text, 1.0, 2)
    }

    pub fn choice_id(question: &ExamQuestion, text: &str) -> String {
        question
            .choices
            .iter()
            .find(|c| c.text == text)
            .map(|c| c.id.clone())
            .expect("choice text exists on the question")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_fixtures_open_exam() {
        let now = Utc::now();
        let exam = open_exam("EX-001", "INS001", now);
        assert!(exam.is_open(now));
        assert_eq!(exam.created_by, "INS001");
    }

    #[test]
    fn test_fixtures_questions() {
        let mcq = two_plus_two("EX-001");
        assert_eq!(mcq.correct_choice().map(|c| c.id.clone()), Some(choice_id(&mcq, "4")));
        assert_eq!(explain("EX-001").question_type, QuestionType::Text);
    }
}
