pub mod differ;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub use differ::{diff, diff_with, merge_marks, Delta, DiffMode};

pub type SubjectMarks = BTreeMap<String, Grade>;

pub type Marks = BTreeMap<String, SubjectMarks>;

/// A published grade. The portal shows either a number out of 20 or a free
/// text marker such as "absent" or "not graded yet"; both are legitimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Grade {
    Numeric(f64),
    Placeholder(String),
}

impl Grade {
    /// Parses a raw table cell. Accepts `,` as the decimal separator.
    pub fn parse_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.replace(',', ".").parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Numeric(value),
            _ => Self::Placeholder(trimmed.to_string()),
        }
    }

    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Placeholder(_) => None,
        }
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(v) if v.fract() == 0.0 => write!(f, "{v:.0}"),
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Placeholder(text) => write!(f, "{text}"),
        }
    }
}

impl From<f64> for Grade {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl From<&str> for Grade {
    fn from(value: &str) -> Self {
        Self::Placeholder(value.to_string())
    }
}

/// Observed state of the portal at one point in time.
///
/// `test_count` is reported by the portal independently of the table and is
/// only used as a cheap "something changed" signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(rename = "tests")]
    pub test_count: u64,
    #[serde(default)]
    pub marks: Marks,
}

impl Snapshot {
    pub fn new(test_count: u64, marks: Marks) -> Self {
        Self { test_count, marks }
    }

    pub fn grade(&self, subject: &str, test: &str) -> Option<&Grade> {
        self.marks.get(subject).and_then(|tests| tests.get(test))
    }

    pub fn entry_count(&self) -> usize {
        self.marks.values().map(BTreeMap::len).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMark {
    pub subject: String,
    pub test: String,
    pub grade: Grade,
}

impl NewMark {
    pub fn new(subject: impl Into<String>, test: impl Into<String>, grade: impl Into<Grade>) -> Self {
        Self {
            subject: subject.into(),
            test: test.into(),
            grade: grade.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Grade, Snapshot};

    #[test]
    fn parses_grade_cells() {
        assert_eq!(Grade::parse_cell(" 14,5 "), Grade::Numeric(14.5));
        assert_eq!(Grade::parse_cell("18"), Grade::Numeric(18.0));
        assert_eq!(
            Grade::parse_cell("Absent "),
            Grade::Placeholder("Absent".to_string())
        );
        assert_eq!(Grade::parse_cell("NaN"), Grade::Placeholder("NaN".to_string()));
    }

    #[test]
    fn displays_whole_grades_without_fraction() {
        assert_eq!(Grade::Numeric(15.0).to_string(), "15");
        assert_eq!(Grade::Numeric(12.25).to_string(), "12.25");
        assert_eq!(Grade::from("absent").to_string(), "absent");
    }

    #[test]
    fn reads_legacy_state_document() {
        let raw = r#"{
	"tests": 3,
	"marks": {
    "Math": {"Midterm": 15.0, "Quiz": "ABI"},
    "Physics": {"Lab1": 12}
}
}"#;
        let snapshot: Snapshot = serde_json::from_str(raw).expect("legacy document parses");
        assert_eq!(snapshot.test_count, 3);
        assert_eq!(snapshot.grade("Math", "Midterm"), Some(&Grade::Numeric(15.0)));
        assert_eq!(snapshot.grade("Math", "Quiz"), Some(&Grade::from("ABI")));
        assert_eq!(snapshot.grade("Physics", "Lab1"), Some(&Grade::Numeric(12.0)));
        assert_eq!(snapshot.entry_count(), 3);
    }
}
