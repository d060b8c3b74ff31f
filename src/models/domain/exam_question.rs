use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

pub const MAX_CHOICES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq, // auto-graded against the correct choice
    #[serde(rename = "TEXT")]
    Text, // stored, graded manually
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Mcq => f.write_str("MCQ"),
            QuestionType::Text => f.write_str("TEXT"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

impl Choice {
    fn new(text: &str, is_correct: bool) -> Self {
        Choice {
            id: Uuid::new_v4().to_string(),
            text: text.trim().to_string(),
            is_correct,
        }
    }

    fn same_text(&self, other: &str) -> bool {
        self.text.trim().to_lowercase() == other.trim().to_lowercase()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExamQuestion {
    pub id: String,
    pub exam_id: String,
    pub text: String,
    pub question_type: QuestionType,
    pub order_no: u32,
    pub marks: f64,
    pub choices: Vec<Choice>, // always empty for TEXT
    pub created_at: DateTime<Utc>,
}

impl ExamQuestion {
    pub const DEFAULT_MARKS: f64 = 1.0;
    pub const DEFAULT_ORDER: u32 = 1;

    pub fn new(
        exam_id: &str,
        text: &str,
        question_type: QuestionType,
        marks: f64,
        order_no: u32,
    ) -> Self {
        ExamQuestion {
            id: Uuid::new_v4().to_string(),
            exam_id: exam_id.to_string(),
            text: text.trim().to_string(),
            question_type,
            order_no,
            marks,
            choices: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn find_choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }

    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| c.is_correct)
    }

    /// Appends a choice, enforcing type, count, uniqueness and single-correct rules in that order.
    pub fn add_choice(&mut self, text: &str, is_correct: bool) -> AppResult<&Choice> {
        self.ensure_mcq()?;
        if self.choices.len() >= MAX_CHOICES {
            return Err(AppError::ChoiceLimitExceeded { limit: MAX_CHOICES });
        }
        self.check_choice(text, is_correct, None)?;

        self.choices.push(Choice::new(text, is_correct));
        Ok(&self.choices[self.choices.len() - 1])
    }

    pub fn update_choice(&mut self, choice_id: &str, text: &str, is_correct: bool) -> AppResult<()> {
        self.ensure_mcq()?;
        if self.find_choice(choice_id).is_none() {
            return Err(AppError::NotFound(format!(
                "Choice '{}' not found on this question",
                choice_id
            )));
        }
        self.check_choice(text, is_correct, Some(choice_id))?;

        if let Some(choice) = self.choices.iter_mut().find(|c| c.id == choice_id) {
            choice.text = text.trim().to_string();
            choice.is_correct = is_correct;
        }
        Ok(())
    }

    pub fn remove_choice(&mut self, choice_id: &str) -> AppResult<Choice> {
        let position = self
            .choices
            .iter()
            .position(|c| c.id == choice_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Choice '{}' not found on this question", choice_id))
            })?;
        Ok(self.choices.remove(position))
    }

    /// Switches the question type, returning the ids of choices that were dropped.
    ///
    /// * TEXT -> MCQ discards any choices and requires a fresh set plus the correct index.
    /// * MCQ -> TEXT discards every choice.
    /// * MCQ -> MCQ re-synchronises existing choices by position.
    ///
    /// The question is left untouched when the supplied set breaks a choice invariant.
    pub fn change_type(
        &mut self,
        new_type: QuestionType,
        choice_texts: &[String],
        correct_index: Option<usize>,
    ) -> AppResult<Vec<String>> {
        let mut next = self.clone();
        next.question_type = new_type;

        let removed = match (self.question_type, new_type) {
            (QuestionType::Text, QuestionType::Mcq) => {
                if choice_texts.is_empty() || correct_index.is_none() {
                    return Err(AppError::ValidationError(
                        "Switching to MCQ requires choices and the index of the correct one"
                            .to_string(),
                    ));
                }
                let removed = next.choices.drain(..).map(|c| c.id).collect();
                next.fill_choices(choice_texts, correct_index)?;
                removed
            }
            (QuestionType::Mcq, QuestionType::Text) => {
                next.choices.drain(..).map(|c| c.id).collect()
            }
            (QuestionType::Mcq, QuestionType::Mcq) => next.resync_choices(choice_texts, correct_index)?,
            (QuestionType::Text, QuestionType::Text) => Vec::new(),
        };

        *self = next;
        Ok(removed)
    }

    /// Adds an inline set of choices to a freshly created question.
    pub fn fill_choices(
        &mut self,
        choice_texts: &[String],
        correct_index: Option<usize>,
    ) -> AppResult<()> {
        check_correct_index(choice_texts, correct_index)?;
        for (idx, text) in choice_texts.iter().enumerate() {
            self.add_choice(text, Some(idx) == correct_index)?;
        }
        Ok(())
    }

    fn resync_choices(
        &mut self,
        choice_texts: &[String],
        correct_index: Option<usize>,
    ) -> AppResult<Vec<String>> {
        check_correct_index(choice_texts, correct_index)?;
        if choice_texts.len() > MAX_CHOICES {
            return Err(AppError::ChoiceLimitExceeded { limit: MAX_CHOICES });
        }

        let synced: Vec<Choice> = choice_texts
            .iter()
            .enumerate()
            .map(|(idx, text)| Choice {
                id: self
                    .choices
                    .get(idx)
                    .map(|c| c.id.clone())
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                text: text.trim().to_string(),
                is_correct: Some(idx) == correct_index,
            })
            .collect();

        for (idx, choice) in synced.iter().enumerate() {
            if synced[..idx].iter().any(|c| c.same_text(&choice.text)) {
                return Err(AppError::DuplicateChoice(choice.text.clone()));
            }
        }

        let removed = self
            .choices
            .iter()
            .skip(choice_texts.len())
            .map(|c| c.id.clone())
            .collect();
        self.choices = synced;
        Ok(removed)
    }

    fn ensure_mcq(&self) -> AppResult<()> {
        match self.question_type {
            QuestionType::Mcq => Ok(()),
            QuestionType::Text => Err(AppError::InvalidOperation(
                "Choices can only be added to MCQ questions".to_string(),
            )),
        }
    }

    fn check_choice(&self, text: &str, is_correct: bool, excluding: Option<&str>) -> AppResult<()> {
        let mut others = self
            .choices
            .iter()
            .filter(|c| Some(c.id.as_str()) != excluding);

        if others.clone().any(|c| c.same_text(text)) {
            return Err(AppError::DuplicateChoice(text.trim().to_string()));
        }
        if is_correct && others.any(|c| c.is_correct) {
            return Err(AppError::MultipleCorrectAnswers);
        }
        Ok(())
    }
}

fn check_correct_index(choice_texts: &[String], correct_index: Option<usize>) -> AppResult<()> {
    match correct_index {
        Some(idx) if idx >= choice_texts.len() => Err(AppError::ValidationError(format!(
            "Correct choice index {} is out of range for {} choices",
            idx,
            choice_texts.len()
        ))),
        _ => Ok(()),
    }
}

impl fmt::Display for ExamQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.text.chars().take(30).collect();
        write!(f, "Q{}: {}", self.order_no, preview)
    }
}
