use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{Answer, ExamQuestion, QuestionType},
        dto::request::AnswerInput,
    },
};

/// Builds the answer row for one response.
///
/// MCQ responses must name a choice of this very question and earn either the
/// full question marks or nothing. TEXT responses keep their raw text and the
/// marks already awarded by a reviewer, zero when none were.
pub fn grade_response(
    question: &ExamQuestion,
    attempt_id: &str,
    input: &AnswerInput,
    prior: Option<&Answer>,
    now: DateTime<Utc>,
) -> AppResult<Answer> {
    let mut answer = match prior {
        Some(existing) => existing.clone(),
        None => Answer::new(attempt_id, &question.id),
    };
    answer.updated_at = now;

    match (question.question_type, input) {
        (QuestionType::Mcq, AnswerInput::Choice(choice_id)) => {
            let choice = question.find_choice(choice_id).ok_or_else(|| {
                AppError::ValidationError(format!(
                    "Please select a valid choice for question '{}'",
                    question.id
                ))
            })?;

            let marks = if choice.is_correct { question.marks } else { 0.0 };
            log::debug!(
                "Graded MCQ {} for attempt {}: {} of {}",
                question.id,
                attempt_id,
                marks,
                question.marks
            );

            answer.selected_choice_id = Some(choice.id.clone());
            answer.text_answer = String::new();
            answer.marks = Some(marks);
        }
        (QuestionType::Mcq, AnswerInput::Text(_)) => {
            return Err(AppError::ValidationError(format!(
                "Please select a choice for question '{}'",
                question.id
            )));
        }
        (QuestionType::Text, AnswerInput::Text(text)) => {
            if text.trim().is_empty() {
                return Err(AppError::ValidationError(format!(
                    "Answer text cannot be empty for question '{}'",
                    question.id
                )));
            }
            answer.selected_choice_id = None;
            answer.text_answer = text.clone();
            answer.marks = Some(answer.marks.unwrap_or(0.0));
        }
        (QuestionType::Text, AnswerInput::Choice(_)) => {
            return Err(AppError::ValidationError(format!(
                "Question '{}' expects a written answer",
                question.id
            )));
        }
    }

    Ok(answer)
}

/// Sum of awarded marks; unset marks count as zero.
pub fn total_awarded(answers: &[Answer]) -> f64 {
    answers.iter().map(Answer::awarded).sum()
}

/// Sum of question marks over the questions that received an answer.
///
/// Unanswered questions do not count towards the total.
pub fn total_possible(answers: &[Answer], questions: &[ExamQuestion]) -> f64 {
    let marks_by_question: HashMap<&str, f64> = questions
        .iter()
        .map(|q| (q.id.as_str(), q.marks))
        .collect();

    answers
        .iter()
        .filter_map(|a| marks_by_question.get(a.question_id.as_str()))
        .sum()
}

/// `awarded / possible` as a fraction, undefined when nothing was possible.
pub fn percentage(awarded: f64, possible: f64) -> Option<f64> {
    if possible > 0.0 {
        Some(awarded / possible)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{choice_id, explain, two_plus_two};

    fn mcq() -> ExamQuestion {
        two_plus_two("EX-001")
    }

    fn text_question() -> ExamQuestion {
        explain("EX-001")
    }

    #[test]
    fn correct_choice_earns_full_marks() {
        let question = mcq();
        let input = AnswerInput::Choice(choice_id(&question, "4"));

        let answer = grade_response(&question, "ATT-1", &input, None, Utc::now()).unwrap();

        assert_eq!(answer.marks, Some(1.0));
        assert_eq!(answer.selected_choice_id, Some(choice_id(&question, "4")));
        assert!(answer.text_answer.is_empty());
    }

    #[test]
    fn wrong_choice_earns_zero() {
        let question = mcq();
        let input = AnswerInput::Choice(choice_id(&question, "3"));

        let answer = grade_response(&question, "ATT-1", &input, None, Utc::now()).unwrap();
        assert_eq!(answer.marks, Some(0.0));
    }

    #[test]
    fn choice_from_another_question_is_rejected() {
        let question = mcq();
        let other = mcq();
        let input = AnswerInput::Choice(choice_id(&other, "4"));

        let result = grade_response(&question, "ATT-1", &input, None, Utc::now());
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn text_answer_keeps_reviewed_marks() {
        let question = text_question();
        let mut prior = Answer::new("ATT-1", &question.id);
        prior.marks = Some(0.5);
        let input = AnswerInput::Text("because".to_string());

        let answer =
            grade_response(&question, "ATT-1", &input, Some(&prior), Utc::now()).unwrap();

        assert_eq!(answer.id, prior.id);
        assert_eq!(answer.text_answer, "because");
        assert_eq!(answer.marks, Some(0.5));
        assert!(answer.selected_choice_id.is_none());
    }

    #[test]
    fn blank_text_is_rejected() {
        let question = text_question();
        let input = AnswerInput::Text("   ".to_string());

        let result = grade_response(&question, "ATT-1", &input, None, Utc::now());
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn mismatched_input_kinds_are_rejected() {
        let result = grade_response(
            &mcq(),
            "ATT-1",
            &AnswerInput::Text("4".to_string()),
            None,
            Utc::now(),
        );
        assert!(result.is_err());

        let result = grade_response(
            &text_question(),
            "ATT-1",
            &AnswerInput::Choice("c-1".to_string()),
            None,
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn totals_only_count_answered_questions() {
        let answered = mcq();
        let skipped = ExamQuestion::new("EX-001", "Skipped", QuestionType::Mcq, 3.0, 3);
        let mut answer = Answer::new("ATT-1", &answered.id);
        answer.marks = Some(1.0);
        let unmarked = Answer::new("ATT-1", "q-unknown");

        let answers = vec![answer, unmarked];
        let questions = vec![answered, skipped];

        assert_eq!(total_awarded(&answers), 1.0);
        assert_eq!(total_possible(&answers, &questions), 1.0);
    }

    #[test]
    fn percentage_is_undefined_without_possible_marks() {
        assert_eq!(percentage(0.0, 0.0), None);
        assert_eq!(percentage(3.0, 4.0), Some(0.75));
    }
}
