use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl LetterGrade {
    /// A >= 0.90, B >= 0.80, C >= 0.70, D >= 0.60, otherwise F.
    pub fn from_percentage(percentage: Option<f64>) -> Self {
        match percentage {
            None => LetterGrade::NotApplicable,
            Some(p) if p >= 0.90 => LetterGrade::A,
            Some(p) if p >= 0.80 => LetterGrade::B,
            Some(p) if p >= 0.70 => LetterGrade::C,
            Some(p) if p >= 0.60 => LetterGrade::D,
            Some(_) => LetterGrade::F,
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
            LetterGrade::NotApplicable => "N/A",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum PassFail {
    Pass,
    Fail,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl PassFail {
    pub const DEFAULT_THRESHOLD: f64 = 0.5;

    pub fn from_percentage(percentage: Option<f64>, threshold: f64) -> Self {
        match percentage {
            None => PassFail::NotApplicable,
            Some(p) if p >= threshold => PassFail::Pass,
            Some(_) => PassFail::Fail,
        }
    }
}

impl fmt::Display for PassFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PassFail::Pass => "Pass",
            PassFail::Fail => "Fail",
            PassFail::NotApplicable => "N/A",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_grade_boundaries() {
        assert_eq!(LetterGrade::from_percentage(Some(0.95)), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(Some(0.90)), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(Some(0.80)), LetterGrade::B);
        assert_eq!(LetterGrade::from_percentage(Some(0.75)), LetterGrade::C);
        assert_eq!(LetterGrade::from_percentage(Some(0.65)), LetterGrade::D);
        assert_eq!(LetterGrade::from_percentage(Some(0.40)), LetterGrade::F);
        assert_eq!(LetterGrade::from_percentage(None).to_string(), "N/A");
    }

    #[test]
    fn pass_fail_uses_threshold() {
        let t = PassFail::DEFAULT_THRESHOLD;
        assert_eq!(PassFail::from_percentage(Some(0.5), t), PassFail::Pass);
        assert_eq!(PassFail::from_percentage(Some(0.49), t), PassFail::Fail);
        assert_eq!(PassFail::from_percentage(None, t).to_string(), "N/A");
    }
}
