use super::{Instructor, Student};

/// The resolved acting identity, threaded explicitly into every call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    Student(Student),
    Instructor(Instructor),
}

impl Principal {
    pub fn id(&self) -> &str {
        match self {
            Principal::Student(s) => &s.id,
            Principal::Instructor(i) => &i.id,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Principal::Student(_) => Student::ROLE,
            Principal::Instructor(_) => Instructor::ROLE,
        }
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Principal::Student(s) => &s.password_hash,
            Principal::Instructor(i) => &i.password_hash,
        }
    }
}
