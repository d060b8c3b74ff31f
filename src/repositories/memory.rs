use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{
        Answer, AttemptState, Exam, ExamAttempt, ExamQuestion, Instructor, SequenceKind,
        Student,
    },
};

use super::{
    attempt_repository::{sum_marks, AttemptRepository},
    exam_repository::ExamRepository,
    instructor_repository::InstructorRepository,
    question_repository::{sort_questions, QuestionRepository},
    sequence_repository::SequenceRepository,
    student_repository::StudentRepository,
};

#[derive(Default)]
struct MemoryState {
    sequences: HashMap<SequenceKind, u32>,
    students: HashMap<String, Student>,
    instructors: HashMap<String, Instructor>,
    exams: HashMap<String, Exam>,
    questions: HashMap<String, ExamQuestion>,
    attempts: HashMap<String, ExamAttempt>,
    answers: HashMap<String, Answer>,
}

impl MemoryState {
    fn answers_of(&self, attempt_id: &str) -> Vec<Answer> {
        self.answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect()
    }

    fn remove_answers_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Answer) -> bool,
    {
        let before = self.answers.len();
        self.answers.retain(|_, answer| !predicate(answer));
        before - self.answers.len()
    }
}

/// Storage engine backing every repository trait with plain maps.
///
/// All collections sit behind one lock, so each call observes and leaves a
/// consistent state, and uniqueness rules match the MongoDB indexes.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn already_exists(what: &str, field: &str, value: &str) -> AppError {
    AppError::AlreadyExists(format!("{} with {} '{}' already exists", what, field, value))
}

#[async_trait]
impl SequenceRepository for InMemoryStore {
    async fn next_value(&self, kind: SequenceKind) -> AppResult<u32> {
        let mut state = self.state.write().await;
        let counter = state.sequences.entry(kind).or_insert(0);
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| AppError::InternalError(format!("Sequence '{}' overflowed", kind)))?;
        Ok(*counter)
    }

    async fn raise_floor(&self, kind: SequenceKind, floor: u32) -> AppResult<()> {
        let mut state = self.state.write().await;
        let counter = state.sequences.entry(kind).or_insert(0);
        *counter = (*counter).max(floor);
        Ok(())
    }
}

#[async_trait]
impl StudentRepository for InMemoryStore {
    async fn create(&self, student: Student) -> AppResult<Student> {
        let mut state = self.state.write().await;
        if state.students.contains_key(&student.id) {
            return Err(already_exists("Student", "id", &student.id));
        }
        if state.students.values().any(|s| s.email == student.email) {
            return Err(already_exists("Student", "email", &student.email));
        }
        if state
            .students
            .values()
            .any(|s| s.matric_number == student.matric_number)
        {
            return Err(already_exists(
                "Student",
                "matric number",
                &student.matric_number,
            ));
        }
        state.students.insert(student.id.clone(), student.clone());
        Ok(student)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Student>> {
        let state = self.state.read().await;
        Ok(state.students.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Student>> {
        let state = self.state.read().await;
        Ok(state.students.values().find(|s| s.email == email).cloned())
    }

    async fn find_by_matric_number(&self, matric_number: &str) -> AppResult<Option<Student>> {
        let state = self.state.read().await;
        Ok(state
            .students
            .values()
            .find(|s| s.matric_number == matric_number)
            .cloned())
    }

    async fn update(&self, student: Student) -> AppResult<Student> {
        let mut state = self.state.write().await;
        if !state.students.contains_key(&student.id) {
            return Err(AppError::NotFound(format!(
                "Student with id '{}' not found",
                student.id
            )));
        }
        let others = || state.students.values().filter(|s| s.id != student.id);
        if others().any(|s| s.email == student.email) {
            return Err(already_exists("Student", "email", &student.email));
        }
        if others().any(|s| s.matric_number == student.matric_number) {
            return Err(already_exists(
                "Student",
                "matric number",
                &student.matric_number,
            ));
        }
        state.students.insert(student.id.clone(), student.clone());
        Ok(student)
    }

    async fn list_ids(&self) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.students.keys().cloned().collect())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl InstructorRepository for InMemoryStore {
    async fn create(&self, instructor: Instructor) -> AppResult<Instructor> {
        let mut state = self.state.write().await;
        if state.instructors.contains_key(&instructor.id) {
            return Err(already_exists("Instructor", "id", &instructor.id));
        }
        if state
            .instructors
            .values()
            .any(|i| i.email == instructor.email)
        {
            return Err(already_exists("Instructor", "email", &instructor.email));
        }
        state
            .instructors
            .insert(instructor.id.clone(), instructor.clone());
        Ok(instructor)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Instructor>> {
        let state = self.state.read().await;
        Ok(state.instructors.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Instructor>> {
        let state = self.state.read().await;
        Ok(state
            .instructors
            .values()
            .find(|i| i.email == email)
            .cloned())
    }

    async fn update(&self, instructor: Instructor) -> AppResult<Instructor> {
        let mut state = self.state.write().await;
        if !state.instructors.contains_key(&instructor.id) {
            return Err(AppError::NotFound(format!(
                "Instructor with id '{}' not found",
                instructor.id
            )));
        }
        if state
            .instructors
            .values()
            .any(|i| i.id != instructor.id && i.email == instructor.email)
        {
            return Err(already_exists("Instructor", "email", &instructor.email));
        }
        state
            .instructors
            .insert(instructor.id.clone(), instructor.clone());
        Ok(instructor)
    }

    async fn list_ids(&self) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.instructors.keys().cloned().collect())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ExamRepository for InMemoryStore {
    async fn create(&self, exam: Exam) -> AppResult<Exam> {
        let mut state = self.state.write().await;
        if state.exams.contains_key(&exam.id) {
            return Err(already_exists("Exam", "id", &exam.id));
        }
        state.exams.insert(exam.id.clone(), exam.clone());
        Ok(exam)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Exam>> {
        let state = self.state.read().await;
        Ok(state.exams.get(id).cloned())
    }

    async fn update(&self, exam: Exam) -> AppResult<Exam> {
        let mut state = self.state.write().await;
        match state.exams.get_mut(&exam.id) {
            Some(stored) => {
                *stored = exam.clone();
                Ok(exam)
            }
            None => Err(AppError::NotFound(format!(
                "Exam with id '{}' not found",
                exam.id
            ))),
        }
    }

    async fn list_by_owner(&self, instructor_id: &str) -> AppResult<Vec<Exam>> {
        let state = self.state.read().await;
        let mut exams: Vec<Exam> = state
            .exams
            .values()
            .filter(|e| e.created_by == instructor_id)
            .cloned()
            .collect();
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(exams)
    }

    async fn list_all(&self) -> AppResult<Vec<Exam>> {
        let state = self.state.read().await;
        let mut exams: Vec<Exam> = state.exams.values().cloned().collect();
        exams.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Ok(exams)
    }

    async fn delete_cascade(&self, id: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.exams.remove(id).is_none() {
            return Err(AppError::NotFound(format!("Exam with id '{}' not found", id)));
        }

        let attempt_ids: Vec<String> = state
            .attempts
            .values()
            .filter(|a| a.exam_id == id)
            .map(|a| a.id.clone())
            .collect();
        let answers = state.remove_answers_where(|a| attempt_ids.contains(&a.attempt_id));
        state.attempts.retain(|_, a| a.exam_id != id);
        let before = state.questions.len();
        state.questions.retain(|_, q| q.exam_id != id);
        let questions = before - state.questions.len();

        log::info!(
            "Deleted exam {} ({} questions, {} attempts, {} answers)",
            id,
            questions,
            attempt_ids.len(),
            answers
        );
        Ok(())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryStore {
    async fn create(&self, question: ExamQuestion) -> AppResult<ExamQuestion> {
        let mut state = self.state.write().await;
        if state.questions.contains_key(&question.id) {
            return Err(already_exists("Question", "id", &question.id));
        }
        state.questions.insert(question.id.clone(), question.clone());
        Ok(question)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamQuestion>> {
        let state = self.state.read().await;
        Ok(state.questions.get(id).cloned())
    }

    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<ExamQuestion>> {
        let state = self.state.read().await;
        let mut questions: Vec<ExamQuestion> = state
            .questions
            .values()
            .filter(|q| q.exam_id == exam_id)
            .cloned()
            .collect();
        sort_questions(&mut questions);
        Ok(questions)
    }

    async fn update(&self, question: ExamQuestion) -> AppResult<ExamQuestion> {
        let mut state = self.state.write().await;
        match state.questions.get_mut(&question.id) {
            Some(stored) => {
                *stored = question.clone();
                Ok(question)
            }
            None => Err(AppError::NotFound(format!(
                "Question with id '{}' not found",
                question.id
            ))),
        }
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.questions.remove(id).is_none() {
            return Err(AppError::NotFound(format!(
                "Question with id '{}' not found",
                id
            )));
        }
        let answers = state.remove_answers_where(|a| a.question_id == id);
        log::info!("Deleted question {} and {} answers", id, answers);
        Ok(())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryStore {
    async fn get_or_create(&self, attempt: ExamAttempt) -> AppResult<(ExamAttempt, bool)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .attempts
            .values()
            .find(|a| a.exam_id == attempt.exam_id && a.student_id == attempt.student_id)
        {
            return Ok((existing.clone(), false));
        }
        if state.attempts.contains_key(&attempt.id) {
            return Err(already_exists("Attempt", "id", &attempt.id));
        }
        state.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok((attempt, true))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamAttempt>> {
        let state = self.state.read().await;
        Ok(state.attempts.get(id).cloned())
    }

    async fn find_by_exam_and_student(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> AppResult<Option<ExamAttempt>> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .values()
            .find(|a| a.exam_id == exam_id && a.student_id == student_id)
            .cloned())
    }

    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<ExamAttempt>> {
        let state = self.state.read().await;
        let mut attempts: Vec<ExamAttempt> = state
            .attempts
            .values()
            .filter(|a| a.exam_id == exam_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(attempts)
    }

    async fn upsert_answer(&self, answer: Answer) -> AppResult<Answer> {
        let mut state = self.state.write().await;
        let attempt = state.attempts.get_mut(&answer.attempt_id).ok_or_else(|| {
            AppError::NotFound(format!("Attempt with id '{}' not found", answer.attempt_id))
        })?;
        if attempt.state() == AttemptState::Submitted {
            return Err(AppError::AlreadySubmitted(attempt.id.clone()));
        }
        attempt.last_answered_at = Some(answer.updated_at);

        let existing = state
            .answers
            .values_mut()
            .find(|a| a.attempt_id == answer.attempt_id && a.question_id == answer.question_id);

        if let Some(stored) = existing {
            stored.selected_choice_id = answer.selected_choice_id;
            stored.text_answer = answer.text_answer;
            stored.marks = answer.marks;
            stored.updated_at = answer.updated_at;
            return Ok(stored.clone());
        }

        state.answers.insert(answer.id.clone(), answer.clone());
        Ok(answer)
    }

    async fn find_answers(&self, attempt_id: &str) -> AppResult<Vec<Answer>> {
        let state = self.state.read().await;
        Ok(state.answers_of(attempt_id))
    }

    async fn find_answer(&self, id: &str) -> AppResult<Option<Answer>> {
        let state = self.state.read().await;
        Ok(state.answers.get(id).cloned())
    }

    async fn finalize(
        &self,
        attempt_id: &str,
        submitted_at: DateTime<Utc>,
    ) -> AppResult<Option<ExamAttempt>> {
        let mut state = self.state.write().await;
        let score = sum_marks(&state.answers_of(attempt_id));
        match state.attempts.get_mut(attempt_id) {
            Some(attempt) if attempt.state() == AttemptState::InProgress => {
                attempt.submitted_at = Some(submitted_at);
                attempt.score = Some(score);
                Ok(Some(attempt.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_answer_marks(&self, answer_id: &str, marks: f64) -> AppResult<f64> {
        let mut state = self.state.write().await;
        let answer = state.answers.get_mut(answer_id).ok_or_else(|| {
            AppError::NotFound(format!("Answer with id '{}' not found", answer_id))
        })?;
        answer.marks = Some(marks);
        let attempt_id = answer.attempt_id.clone();

        let score = sum_marks(&state.answers_of(&attempt_id));
        if let Some(attempt) = state.attempts.get_mut(&attempt_id) {
            attempt.score = Some(score);
        }
        Ok(score)
    }

    async fn clear_selected_choices(&self, choice_ids: &[String]) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut cleared = 0;
        for answer in state.answers.values_mut() {
            let removed = answer
                .selected_choice_id
                .as_ref()
                .is_some_and(|id| choice_ids.contains(id));
            if removed {
                answer.selected_choice_id = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}
