use std::sync::Arc;

use validator::Validate;

use crate::{
    auth::{hash_password, verify_password},
    errors::{AppError, AppResult},
    models::{
        domain::{Instructor, Principal, SequenceKind, Student},
        dto::request::{
            none_if_empty, LoginRequest, RegisterInstructorRequest, RegisterStudentRequest,
            UpdateInstructorProfileRequest, UpdateStudentProfileRequest,
        },
    },
    repositories::{InstructorRepository, SequenceRepository, StudentRepository},
};

pub struct IdentityService {
    students: Arc<dyn StudentRepository>,
    instructors: Arc<dyn InstructorRepository>,
    sequences: Arc<dyn SequenceRepository>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl IdentityService {
    pub fn new(
        students: Arc<dyn StudentRepository>,
        instructors: Arc<dyn InstructorRepository>,
        sequences: Arc<dyn SequenceRepository>,
    ) -> Self {
        Self {
            students,
            instructors,
            sequences,
        }
    }

    pub async fn register_student(&self, request: RegisterStudentRequest) -> AppResult<Student> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let matric_number = request.matric_number.trim();
        self.ensure_email_free(&email, None).await?;
        if self
            .students
            .find_by_matric_number(matric_number)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyExists(
                "This matric number is already registered.".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let id = SequenceKind::Student
            .format(self.sequences.next_value(SequenceKind::Student).await?);

        let student = Student::new(
            id,
            &request.full_name,
            &email,
            matric_number,
            none_if_empty(&request.contact_number),
            password_hash,
        );
        let student = self.students.create(student).await?;

        log::info!("Registered student {}", student);
        Ok(student)
    }

    pub async fn register_instructor(
        &self,
        request: RegisterInstructorRequest,
    ) -> AppResult<Instructor> {
        request.validate()?;

        let email = normalize_email(&request.email);
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&request.password)?;
        let id = SequenceKind::Instructor
            .format(self.sequences.next_value(SequenceKind::Instructor).await?);

        let instructor = Instructor::new(
            id,
            &request.full_name,
            &email,
            none_if_empty(&request.contact_number),
            none_if_empty(&request.department),
            password_hash,
        );
        let instructor = self.instructors.create(instructor).await?;

        log::info!("Registered instructor {}", instructor);
        Ok(instructor)
    }

    /// Resolves an email/password pair to the principal it belongs to.
    pub async fn authenticate(&self, request: LoginRequest) -> AppResult<Principal> {
        request.validate()?;
        let email = normalize_email(&request.email);

        let principal = match self.students.find_by_email(&email).await? {
            Some(student) => Principal::Student(student),
            None => match self.instructors.find_by_email(&email).await? {
                Some(instructor) => Principal::Instructor(instructor),
                None => {
                    return Err(AppError::NotFound(format!(
                        "No account registered with email '{}'",
                        email
                    )))
                }
            },
        };

        if !verify_password(&request.password, principal.password_hash())? {
            log::warn!("Failed login for {} {}", principal.role(), principal.id());
            return Err(AppError::InvalidCredentials);
        }

        log::info!("Authenticated {} {}", principal.role(), principal.id());
        Ok(principal)
    }

    pub async fn update_student_profile(
        &self,
        student_id: &str,
        request: UpdateStudentProfileRequest,
    ) -> AppResult<Student> {
        request.validate()?;
        let mut student = self.get_student(student_id).await?;

        let email = normalize_email(&request.email);
        let matric_number = request.matric_number.trim();
        self.ensure_email_free(&email, Some(student_id)).await?;
        if let Some(other) = self.students.find_by_matric_number(matric_number).await? {
            if other.id != student.id {
                return Err(AppError::AlreadyExists(
                    "This matric number is already registered.".to_string(),
                ));
            }
        }

        student.full_name = request.full_name.trim().to_string();
        student.email = email;
        student.matric_number = matric_number.to_string();
        student.contact_number = none_if_empty(&request.contact_number);

        let student = self.students.update(student).await?;
        log::info!("Updated profile of student {}", student.id);
        Ok(student)
    }

    pub async fn update_instructor_profile(
        &self,
        instructor_id: &str,
        request: UpdateInstructorProfileRequest,
    ) -> AppResult<Instructor> {
        request.validate()?;
        let mut instructor = self.get_instructor(instructor_id).await?;

        let email = normalize_email(&request.email);
        self.ensure_email_free(&email, Some(instructor_id)).await?;

        instructor.full_name = request.full_name.trim().to_string();
        instructor.email = email;
        instructor.contact_number = none_if_empty(&request.contact_number);
        instructor.department = none_if_empty(&request.department);

        let instructor = self.instructors.update(instructor).await?;
        log::info!("Updated profile of instructor {}", instructor.id);
        Ok(instructor)
    }

    pub async fn get_student(&self, id: &str) -> AppResult<Student> {
        self.students
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student with id '{}' not found", id)))
    }

    pub async fn get_instructor(&self, id: &str) -> AppResult<Instructor> {
        self.instructors
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Instructor with id '{}' not found", id)))
    }

    /// Moves the STU/INS counters past every identifier already stored.
    pub async fn sync_sequences(&self) -> AppResult<()> {
        let student_ids = self.students.list_ids().await?;
        let floor = SequenceKind::Student.max_suffix(student_ids.iter().map(String::as_str));
        self.sequences.raise_floor(SequenceKind::Student, floor).await?;

        let instructor_ids = self.instructors.list_ids().await?;
        let floor = SequenceKind::Instructor.max_suffix(instructor_ids.iter().map(String::as_str));
        self.sequences
            .raise_floor(SequenceKind::Instructor, floor)
            .await?;

        Ok(())
    }

    /// An email may belong to at most one principal of either role.
    async fn ensure_email_free(&self, email: &str, owner_id: Option<&str>) -> AppResult<()> {
        let taken_by_student = self
            .students
            .find_by_email(email)
            .await?
            .is_some_and(|s| Some(s.id.as_str()) != owner_id);
        let taken_by_instructor = self
            .instructors
            .find_by_email(email)
            .await?
            .is_some_and(|i| Some(i.id.as_str()) != owner_id);

        if taken_by_student || taken_by_instructor {
            return Err(AppError::AlreadyExists(
                "This email is already registered.".to_string(),
            ));
        }
        Ok(())
    }
}
