use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use exam_engine::{
    app_state::AppState,
    config::Config,
    errors::AppError,
    models::{
        domain::{ExamQuestion, Instructor, LetterGrade, PassFail, Principal, QuestionType, Student},
        dto::request::{
            AnswerInput, ChoiceRequest, CreateExamRequest, CreateQuestionRequest, LoginRequest,
            RegisterInstructorRequest, RegisterStudentRequest, SubmitAttemptRequest,
        },
    },
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn lenient_state() -> AppState {
    let mut config = Config::test_config();
    config.reject_past_exam_start = false;
    AppState::in_memory(config)
}

async fn register_instructor(state: &AppState, email: &str) -> Instructor {
    state
        .identity_service
        .register_instructor(RegisterInstructorRequest {
            full_name: "Grace Hopper".to_string(),
            email: email.to_string(),
            contact_number: String::new(),
            department: "Computing".to_string(),
            password: "teach1234".to_string(),
        })
        .await
        .expect("instructor registers")
}

async fn register_student(state: &AppState, email: &str, matric: &str) -> Student {
    state
        .identity_service
        .register_student(RegisterStudentRequest {
            full_name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            matric_number: matric.to_string(),
            contact_number: "08012345678".to_string(),
            password: "learn1234".to_string(),
        })
        .await
        .expect("student registers")
}

fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> CreateExamRequest {
    CreateExamRequest {
        title: "Arithmetic".to_string(),
        description: "Warm-up".to_string(),
        start_time: Some(start),
        end_time: Some(end),
    }
}

/// Open exam with "2+2" (choices 3/4, 4 correct) and an unscored "explain" question.
async fn arithmetic_exam(
    state: &AppState,
    owner: &Instructor,
    now: DateTime<Utc>,
) -> (String, ExamQuestion, ExamQuestion) {
    let exam = state
        .exam_service
        .create_exam(
            owner,
            window(now - Duration::minutes(10), now + Duration::minutes(50)),
            now,
        )
        .await
        .expect("exam is created");

    let mcq = state
        .question_service
        .add_question(
            &exam.id,
            owner,
            CreateQuestionRequest {
                text: "2+2".to_string(),
                question_type: QuestionType::Mcq,
                marks: Some(1.0),
                order_no: Some(1),
                choices: Vec::new(),
                correct_choice: None,
            },
        )
        .await
        .expect("mcq is added");
    for (text, is_correct) in [("3", false), ("4", true)] {
        state
            .question_service
            .add_choice(
                &mcq.id,
                owner,
                ChoiceRequest {
                    text: text.to_string(),
                    is_correct,
                },
            )
            .await
            .expect("choice is added");
    }

    let text = state
        .question_service
        .add_question(
            &exam.id,
            owner,
            CreateQuestionRequest {
                text: "explain".to_string(),
                question_type: QuestionType::Text,
                marks: Some(1.0),
                order_no: Some(2),
                choices: Vec::new(),
                correct_choice: None,
            },
        )
        .await
        .expect("text question is added");

    let questions = state
        .question_service
        .list_questions(&exam.id)
        .await
        .expect("questions are listed");
    let mcq = questions
        .iter()
        .find(|q| q.id == mcq.id)
        .cloned()
        .expect("mcq is stored");

    (exam.id, mcq, text)
}

fn correct_choice(question: &ExamQuestion) -> String {
    question
        .correct_choice()
        .map(|c| c.id.clone())
        .expect("question has a correct choice")
}

#[tokio::test]
async fn end_to_end_submission_scores_mcq_only() {
    init_logging();
    let state = lenient_state();
    let now = Utc::now();
    let owner = register_instructor(&state, "grace@example.com").await;
    let student = register_student(&state, "ada@example.com", "PPE0001").await;
    let (exam_id, mcq, text) = arithmetic_exam(&state, &owner, now).await;

    let mut responses = HashMap::new();
    responses.insert(mcq.id.clone(), AnswerInput::Choice(correct_choice(&mcq)));
    responses.insert(text.id.clone(), AnswerInput::Text("because".to_string()));

    let result = state
        .attempt_service
        .submit(&exam_id, &student, SubmitAttemptRequest { responses }, now)
        .await
        .unwrap();

    assert_eq!(result.attempt.score, Some(1.0));
    assert!(result.attempt.submitted_at.is_some());

    let mcq_answer = result
        .answers
        .iter()
        .find(|a| a.question_id == mcq.id)
        .unwrap();
    assert_eq!(mcq_answer.marks, Some(1.0));
    assert_eq!(mcq_answer.selected_choice_id, Some(correct_choice(&mcq)));

    let text_answer = result
        .answers
        .iter()
        .find(|a| a.question_id == text.id)
        .unwrap();
    assert_eq!(text_answer.text_answer, "because");
    assert!(matches!(text_answer.marks, None | Some(0.0)));
}

#[tokio::test]
async fn resubmission_changes_nothing() {
    init_logging();
    let state = lenient_state();
    let now = Utc::now();
    let owner = register_instructor(&state, "grace@example.com").await;
    let student = register_student(&state, "ada@example.com", "PPE0001").await;
    let (exam_id, mcq, _) = arithmetic_exam(&state, &owner, now).await;

    let mut responses = HashMap::new();
    responses.insert(mcq.id.clone(), AnswerInput::Choice(correct_choice(&mcq)));
    let first = state
        .attempt_service
        .submit(&exam_id, &student, SubmitAttemptRequest { responses }, now)
        .await
        .unwrap();

    let wrong = mcq
        .choices
        .iter()
        .find(|c| !c.is_correct)
        .map(|c| c.id.clone())
        .unwrap();
    let mut responses = HashMap::new();
    responses.insert(mcq.id.clone(), AnswerInput::Choice(wrong));
    let second = state
        .attempt_service
        .submit(
            &exam_id,
            &student,
            SubmitAttemptRequest { responses },
            now + Duration::minutes(1),
        )
        .await;
    assert!(matches!(second, Err(AppError::AlreadySubmitted(_))));

    let session = state
        .attempt_service
        .start_or_resume(&exam_id, &student, now + Duration::minutes(2))
        .await
        .unwrap();
    assert!(session.already_submitted);
    assert!(!session.created);

    let after = state
        .attempt_service
        .attempt_result(&first.attempt.id, &student)
        .await
        .unwrap();
    assert_eq!(after.attempt, first.attempt);
    assert_eq!(after.answers, first.answers);
}

#[tokio::test]
async fn closed_window_rejects_attempts() {
    init_logging();
    let state = lenient_state();
    let now = Utc::now();
    let owner = register_instructor(&state, "grace@example.com").await;
    let student = register_student(&state, "ada@example.com", "PPE0001").await;

    let finished = state
        .exam_service
        .create_exam(
            &owner,
            window(now - Duration::hours(2), now - Duration::hours(1)),
            now,
        )
        .await
        .unwrap();
    let upcoming = state
        .exam_service
        .create_exam(
            &owner,
            window(now + Duration::hours(1), now + Duration::hours(2)),
            now,
        )
        .await
        .unwrap();

    for exam_id in [&finished.id, &upcoming.id] {
        let result = state
            .attempt_service
            .start_or_resume(exam_id, &student, now)
            .await;
        assert!(matches!(result, Err(AppError::ExamClosed(_))));
    }

    // Both bounds are part of the window.
    for instant in [upcoming.start_time, upcoming.end_time] {
        assert!(state
            .attempt_service
            .start_or_resume(&upcoming.id, &student, instant)
            .await
            .is_ok());
    }
}

#[tokio::test]
async fn identifiers_follow_creation_order() {
    init_logging();
    let state = lenient_state();
    let now = Utc::now();

    let first = register_instructor(&state, "one@example.com").await;
    let second = register_instructor(&state, "two@example.com").await;
    assert_eq!((first.id.as_str(), second.id.as_str()), ("INS001", "INS002"));

    let mut student_ids = Vec::new();
    for n in 1..=3 {
        let student = register_student(
            &state,
            &format!("s{}@example.com", n),
            &format!("PPE000{}", n),
        )
        .await;
        student_ids.push(student.id);
    }
    assert_eq!(student_ids, vec!["STU001", "STU002", "STU003"]);

    let mut exam_ids = Vec::new();
    for owner in [&first, &second, &first, &second] {
        let exam = state
            .exam_service
            .create_exam(owner, window(now, now + Duration::hours(1)), now)
            .await
            .unwrap();
        exam_ids.push(exam.id);
    }
    assert_eq!(exam_ids, vec!["EX-001", "EX-002", "EX-003", "EX-004"]);
}

#[tokio::test]
async fn login_returns_typed_principal() {
    init_logging();
    let state = lenient_state();
    let student = register_student(&state, "ada@example.com", "PPE0001").await;

    let principal = state
        .identity_service
        .authenticate(LoginRequest {
            email: "ada@example.com".to_string(),
            password: "learn1234".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(principal.role(), "student");
    assert_eq!(principal, Principal::Student(student));
}

#[tokio::test]
async fn reports_follow_review() {
    init_logging();
    let state = lenient_state();
    let now = Utc::now();
    let owner = register_instructor(&state, "grace@example.com").await;
    let student = register_student(&state, "ada@example.com", "PPE0001").await;
    let (exam_id, mcq, text) = arithmetic_exam(&state, &owner, now).await;

    let mut responses = HashMap::new();
    responses.insert(mcq.id.clone(), AnswerInput::Choice(correct_choice(&mcq)));
    responses.insert(text.id.clone(), AnswerInput::Text("because".to_string()));
    let result = state
        .attempt_service
        .submit(&exam_id, &student, SubmitAttemptRequest { responses }, now)
        .await
        .unwrap();

    let viewer = Principal::Student(student.clone());
    let before = state
        .report_service
        .attempt_report(&result.attempt.id, &viewer)
        .await
        .unwrap();
    assert_eq!(before.total_possible, 2.0);
    assert_eq!(before.percentage, Some(0.5));
    assert_eq!(before.letter_grade, LetterGrade::F);
    assert_eq!(before.pass_fail, PassFail::Pass);

    let text_answer = result
        .answers
        .iter()
        .find(|a| a.question_id == text.id)
        .unwrap();
    state
        .attempt_service
        .override_marks(&text_answer.id, &owner, 0.9)
        .await
        .unwrap();

    let report = state
        .report_service
        .exam_report(&exam_id, &owner)
        .await
        .unwrap();
    assert_eq!(report.submitted_count, 1);
    assert_eq!(report.pass_count, 1);
    assert_eq!(report.attempts[0].letter_grade, LetterGrade::A);
}

#[tokio::test]
async fn deleting_an_exam_removes_attempts() {
    init_logging();
    let state = lenient_state();
    let now = Utc::now();
    let owner = register_instructor(&state, "grace@example.com").await;
    let student = register_student(&state, "ada@example.com", "PPE0001").await;
    let (exam_id, _, _) = arithmetic_exam(&state, &owner, now).await;

    let session = state
        .attempt_service
        .start_or_resume(&exam_id, &student, now)
        .await
        .unwrap();

    let stranger = register_instructor(&state, "other@example.com").await;
    assert!(matches!(
        state.exam_service.delete_exam(&exam_id, &stranger).await,
        Err(AppError::NotFound(_))
    ));

    state.exam_service.delete_exam(&exam_id, &owner).await.unwrap();

    assert!(matches!(
        state.exam_service.get_exam(&exam_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        state
            .attempt_service
            .attempt_result(&session.attempt.id, &student)
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn authoring_rules_hold_through_services() {
    init_logging();
    let state = AppState::in_memory(Config::test_config());
    let now = Utc::now();
    let owner = register_instructor(&state, "grace@example.com").await;

    let inverted = state
        .exam_service
        .create_exam(&owner, window(now + Duration::hours(2), now + Duration::hours(1)), now)
        .await;
    assert!(matches!(inverted, Err(AppError::ValidationError(_))));

    let already_started = state
        .exam_service
        .create_exam(&owner, window(now - Duration::minutes(5), now + Duration::hours(1)), now)
        .await;
    assert!(already_started.is_err());

    let seeded = state
        .exam_service
        .seed_exam(&owner, window(now - Duration::minutes(5), now + Duration::hours(1)))
        .await
        .unwrap();

    let question = state
        .question_service
        .add_question(
            &seeded.id,
            &owner,
            CreateQuestionRequest {
                text: "Pick one".to_string(),
                question_type: QuestionType::Mcq,
                marks: None,
                order_no: None,
                choices: vec!["a".to_string(), "b".to_string()],
                correct_choice: Some(0),
            },
        )
        .await
        .unwrap();

    let add = |text: &str, is_correct: bool| ChoiceRequest {
        text: text.to_string(),
        is_correct,
    };
    assert!(state
        .question_service
        .add_choice(&question.id, &owner, add("a", false))
        .await
        .is_err());
    assert!(state
        .question_service
        .add_choice(&question.id, &owner, add("c", true))
        .await
        .is_err());
    for text in ["c", "d"] {
        state
            .question_service
            .add_choice(&question.id, &owner, add(text, false))
            .await
            .unwrap();
    }
    assert!(matches!(
        state
            .question_service
            .add_choice(&question.id, &owner, add("e", false))
            .await,
        Err(AppError::ChoiceLimitExceeded { .. })
    ));

    let stored = state.question_service.list_questions(&seeded.id).await.unwrap();
    assert_eq!(stored[0].choices.len(), 4);
    assert_eq!(stored[0].choices.iter().filter(|c| c.is_correct).count(), 1);
}
