use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Dense, human-readable identifier namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    Student,
    Instructor,
    Exam,
}

impl SequenceKind {
    pub const ALL: [SequenceKind; 3] = [
        SequenceKind::Student,
        SequenceKind::Instructor,
        SequenceKind::Exam,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            SequenceKind::Student => "STU",
            SequenceKind::Instructor => "INS",
            SequenceKind::Exam => "EX-",
        }
    }

    /// Key of the counter document backing this namespace.
    pub fn key(self) -> &'static str {
        match self {
            SequenceKind::Student => "student",
            SequenceKind::Instructor => "instructor",
            SequenceKind::Exam => "exam",
        }
    }

    pub fn format(self, value: u32) -> String {
        format!("{}{:03}", self.prefix(), value)
    }

    pub fn parse_suffix(self, code: &str) -> Option<u32> {
        code.strip_prefix(self.prefix())
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
    }

    /// Highest numeric suffix among `codes`, zero when there are none.
    pub fn max_suffix<'a, I>(self, codes: I) -> u32
    where
        I: IntoIterator<Item = &'a str>,
    {
        codes
            .into_iter()
            .filter_map(|code| self.parse_suffix(code))
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub const ATTEMPT_PREFIX: &str = "ATT-";
const ATTEMPT_TOKEN_LEN: usize = 6;

/// `ATT-` followed by six uppercase hex characters from a v4 UUID.
pub fn new_attempt_code() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}",
        ATTEMPT_PREFIX,
        token[..ATTEMPT_TOKEN_LEN].to_ascii_uppercase()
    )
}
