use std::sync::Arc;

use validator::Validate;

use crate::{
    auth::ensure_exam_owner,
    errors::{AppError, AppResult},
    models::{
        domain::{Choice, Exam, ExamQuestion, Instructor},
        dto::request::{
            ChangeQuestionTypeRequest, ChoiceRequest, CreateQuestionRequest, UpdateQuestionRequest,
        },
    },
    repositories::{AttemptRepository, ExamRepository, QuestionRepository},
};

const MAX_CHOICE_TEXT: usize = 255;

pub struct QuestionService {
    exams: Arc<dyn ExamRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

fn check_marks(marks: Option<f64>) -> AppResult<()> {
    match marks {
        Some(value) if !value.is_finite() || value < 0.0 => Err(AppError::ValidationError(
            "Marks must be a non-negative number".to_string(),
        )),
        _ => Ok(()),
    }
}

fn check_choice_texts(texts: &[String]) -> AppResult<()> {
    for text in texts {
        if text.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Choice text cannot be blank".to_string(),
            ));
        }
        if text.chars().count() > MAX_CHOICE_TEXT {
            return Err(AppError::ValidationError(format!(
                "Choice text must be at most {} characters",
                MAX_CHOICE_TEXT
            )));
        }
    }
    Ok(())
}

impl QuestionService {
    pub fn new(
        exams: Arc<dyn ExamRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            exams,
            questions,
            attempts,
        }
    }

    /// Adds a question to an owned exam, with an optional inline set of MCQ choices.
    pub async fn add_question(
        &self,
        exam_id: &str,
        owner: &Instructor,
        request: CreateQuestionRequest,
    ) -> AppResult<ExamQuestion> {
        request.validate()?;
        check_marks(request.marks)?;
        check_choice_texts(&request.choices)?;
        let exam = self.owned_exam(exam_id, owner).await?;

        let mut question = ExamQuestion::new(
            &exam.id,
            &request.text,
            request.question_type,
            request.marks.unwrap_or(ExamQuestion::DEFAULT_MARKS),
            request.order_no.unwrap_or(ExamQuestion::DEFAULT_ORDER),
        );
        if !request.choices.is_empty() || request.correct_choice.is_some() {
            question.fill_choices(&request.choices, request.correct_choice)?;
        }

        let question = self.questions.create(question).await?;
        log::info!("Added {} to exam {}", question, exam.id);
        Ok(question)
    }

    /// Questions of an exam in display order.
    pub async fn list_questions(&self, exam_id: &str) -> AppResult<Vec<ExamQuestion>> {
        if self.exams.find_by_id(exam_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Exam with id '{}' not found",
                exam_id
            )));
        }
        self.questions.list_by_exam(exam_id).await
    }

    pub async fn update_question(
        &self,
        question_id: &str,
        owner: &Instructor,
        request: UpdateQuestionRequest,
    ) -> AppResult<ExamQuestion> {
        request.validate()?;
        check_marks(request.marks)?;
        let mut question = self.owned_question(question_id, owner).await?;

        if let Some(text) = request.text {
            if text.trim().is_empty() {
                return Err(AppError::ValidationError(
                    "Question text cannot be blank".to_string(),
                ));
            }
            question.text = text.trim().to_string();
        }
        if let Some(marks) = request.marks {
            question.marks = marks;
        }
        if let Some(order_no) = request.order_no {
            question.order_no = order_no;
        }

        self.questions.update(question).await
    }

    /// Switches between MCQ and TEXT, or re-syncs an MCQ choice set by position.
    /// Answers pointing at choices that disappear lose their selection.
    pub async fn change_question_type(
        &self,
        question_id: &str,
        owner: &Instructor,
        request: ChangeQuestionTypeRequest,
    ) -> AppResult<ExamQuestion> {
        check_choice_texts(&request.choices)?;
        let mut question = self.owned_question(question_id, owner).await?;
        let previous = question.question_type;

        let removed =
            question.change_type(request.question_type, &request.choices, request.correct_choice)?;
        let question = self.questions.update(question).await?;
        let cleared = self.attempts.clear_selected_choices(&removed).await?;

        log::info!(
            "Question {} changed from {} to {} ({} choices removed, {} answers cleared)",
            question.id,
            previous,
            question.question_type,
            removed.len(),
            cleared
        );
        Ok(question)
    }

    pub async fn add_choice(
        &self,
        question_id: &str,
        owner: &Instructor,
        request: ChoiceRequest,
    ) -> AppResult<Choice> {
        request.validate()?;
        let mut question = self.owned_question(question_id, owner).await?;

        let choice = question.add_choice(&request.text, request.is_correct)?.clone();
        self.questions.update(question).await?;
        Ok(choice)
    }

    pub async fn update_choice(
        &self,
        question_id: &str,
        choice_id: &str,
        owner: &Instructor,
        request: ChoiceRequest,
    ) -> AppResult<Choice> {
        request.validate()?;
        let mut question = self.owned_question(question_id, owner).await?;

        question.update_choice(choice_id, &request.text, request.is_correct)?;
        let choice = question
            .find_choice(choice_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Choice '{}' not found", choice_id)))?;
        self.questions.update(question).await?;
        Ok(choice)
    }

    pub async fn delete_choice(
        &self,
        question_id: &str,
        choice_id: &str,
        owner: &Instructor,
    ) -> AppResult<()> {
        let mut question = self.owned_question(question_id, owner).await?;

        let removed = question.remove_choice(choice_id)?;
        self.questions.update(question).await?;
        self.attempts.clear_selected_choices(&[removed.id]).await?;
        Ok(())
    }

    /// Removes the question and every answer given to it.
    pub async fn delete_question(&self, question_id: &str, owner: &Instructor) -> AppResult<()> {
        let question = self.owned_question(question_id, owner).await?;
        self.questions.delete(&question.id).await
    }

    async fn owned_exam(&self, exam_id: &str, owner: &Instructor) -> AppResult<Exam> {
        let exam = self
            .exams
            .find_by_id(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam with id '{}' not found", exam_id)))?;
        ensure_exam_owner(&exam, owner)?;
        Ok(exam)
    }

    async fn owned_question(&self, question_id: &str, owner: &Instructor) -> AppResult<ExamQuestion> {
        let question = self
            .questions
            .find_by_id(question_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Question with id '{}' not found", question_id))
            })?;
        self.owned_exam(&question.exam_id, owner).await?;
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::QuestionType;
    use crate::repositories::InMemoryStore;
    use crate::test_utils::fixtures::open_exam;
    use chrono::Utc;

    struct Fixture {
        service: QuestionService,
        owner: Instructor,
        exam: Exam,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let owner = Instructor::test_instructor("INS001");
        let exam = open_exam("EX-001", &owner.id, Utc::now());
        ExamRepository::create(store.as_ref(), exam.clone())
            .await
            .unwrap();

        Fixture {
            service: QuestionService::new(store.clone(), store.clone(), store),
            owner,
            exam,
        }
    }

    fn mcq_request(choices: &[&str], correct: Option<usize>) -> CreateQuestionRequest {
        CreateQuestionRequest {
            text: "2+2?".to_string(),
            question_type: QuestionType::Mcq,
            marks: None,
            order_no: None,
            choices: choices.iter().map(|c| c.to_string()).collect(),
            correct_choice: correct,
        }
    }

    fn choice(text: &str, is_correct: bool) -> ChoiceRequest {
        ChoiceRequest {
            text: text.to_string(),
            is_correct,
        }
    }

    #[tokio::test]
    async fn test_add_question_defaults_and_inline_choices() {
        let f = fixture().await;

        let question = f
            .service
            .add_question(&f.exam.id, &f.owner, mcq_request(&["3", "4"], Some(1)))
            .await
            .unwrap();

        assert_eq!(question.marks, 1.0);
        assert_eq!(question.order_no, 1);
        assert_eq!(question.choices.len(), 2);
        assert_eq!(question.correct_choice().map(|c| c.text.as_str()), Some("4"));
    }

    #[tokio::test]
    async fn test_inline_duplicate_choices_are_rejected() {
        let f = fixture().await;

        let result = f
            .service
            .add_question(&f.exam.id, &f.owner, mcq_request(&["Four", "four"], Some(0)))
            .await;

        assert!(matches!(result, Err(AppError::DuplicateChoice(_))));
        assert!(f.service.list_questions(&f.exam.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_exam_is_not_found() {
        let f = fixture().await;
        let stranger = Instructor::test_instructor("INS009");

        let result = f
            .service
            .add_question(&f.exam.id, &stranger, mcq_request(&[], None))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_choice_rules_are_persisted() {
        let f = fixture().await;
        let question = f
            .service
            .add_question(&f.exam.id, &f.owner, mcq_request(&[], None))
            .await
            .unwrap();

        for (text, correct) in [("1", false), ("2", false), ("3", false), ("4", true)] {
            f.service
                .add_choice(&question.id, &f.owner, choice(text, correct))
                .await
                .unwrap();
        }
        let fifth = f
            .service
            .add_choice(&question.id, &f.owner, choice("5", false))
            .await;
        assert!(matches!(fifth, Err(AppError::ChoiceLimitExceeded { limit: 4 })));

        let stored = f.service.list_questions(&f.exam.id).await.unwrap();
        assert_eq!(stored[0].choices.len(), 4);
    }

    #[tokio::test]
    async fn test_text_question_rejects_choices() {
        let f = fixture().await;
        let mut request = mcq_request(&[], None);
        request.question_type = QuestionType::Text;
        let question = f
            .service
            .add_question(&f.exam.id, &f.owner, request)
            .await
            .unwrap();

        let result = f
            .service
            .add_choice(&question.id, &f.owner, choice("anything", false))
            .await;
        assert!(matches!(result, Err(AppError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_change_type_round_trip() {
        let f = fixture().await;
        let question = f
            .service
            .add_question(&f.exam.id, &f.owner, mcq_request(&["3", "4"], Some(1)))
            .await
            .unwrap();

        let text = f
            .service
            .change_question_type(
                &question.id,
                &f.owner,
                ChangeQuestionTypeRequest {
                    question_type: QuestionType::Text,
                    choices: Vec::new(),
                    correct_choice: None,
                },
            )
            .await
            .unwrap();
        assert!(text.choices.is_empty());

        let missing_set = f
            .service
            .change_question_type(
                &question.id,
                &f.owner,
                ChangeQuestionTypeRequest {
                    question_type: QuestionType::Mcq,
                    choices: Vec::new(),
                    correct_choice: None,
                },
            )
            .await;
        assert!(matches!(missing_set, Err(AppError::ValidationError(_))));

        let mcq = f
            .service
            .change_question_type(
                &question.id,
                &f.owner,
                ChangeQuestionTypeRequest {
                    question_type: QuestionType::Mcq,
                    choices: vec!["yes".to_string(), "no".to_string()],
                    correct_choice: Some(0),
                },
            )
            .await
            .unwrap();
        assert_eq!(mcq.question_type, QuestionType::Mcq);
        assert_eq!(mcq.correct_choice().map(|c| c.text.as_str()), Some("yes"));
    }

    #[tokio::test]
    async fn test_update_and_delete_choice() {
        let f = fixture().await;
        let question = f
            .service
            .add_question(&f.exam.id, &f.owner, mcq_request(&["3", "4"], Some(1)))
            .await
            .unwrap();
        let three = question.choices[0].id.clone();

        let conflict = f
            .service
            .update_choice(&question.id, &three, &f.owner, choice("3", true))
            .await;
        assert!(matches!(conflict, Err(AppError::MultipleCorrectAnswers)));

        let renamed = f
            .service
            .update_choice(&question.id, &three, &f.owner, choice("Three", false))
            .await
            .unwrap();
        assert_eq!(renamed.text, "Three");

        f.service
            .delete_choice(&question.id, &three, &f.owner)
            .await
            .unwrap();
        let stored = f.service.list_questions(&f.exam.id).await.unwrap();
        assert_eq!(stored[0].choices.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_question() {
        let f = fixture().await;
        let question = f
            .service
            .add_question(&f.exam.id, &f.owner, mcq_request(&[], None))
            .await
            .unwrap();

        let negative = f
            .service
            .update_question(
                &question.id,
                &f.owner,
                UpdateQuestionRequest {
                    marks: Some(-1.0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(negative, Err(AppError::ValidationError(_))));

        let updated = f
            .service
            .update_question(
                &question.id,
                &f.owner,
                UpdateQuestionRequest {
                    marks: Some(2.5),
                    order_no: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.marks, 2.5);
        assert_eq!(updated.order_no, 3);

        f.service
            .delete_question(&question.id, &f.owner)
            .await
            .unwrap();
        assert!(f.service.list_questions(&f.exam.id).await.unwrap().is_empty());
    }
}
