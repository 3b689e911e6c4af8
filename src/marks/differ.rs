use serde::{Deserialize, Serialize};

use crate::marks::{Grade, Marks, NewMark, Snapshot, SubjectMarks};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// Single slot per subject: a later unseen test replaces an earlier one,
    /// so each subject yields at most one new mark per cycle.
    #[default]
    Legacy,
    Accumulate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    marks: Marks,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.marks.values().map(|tests| tests.len()).sum()
    }

    pub fn subject(&self, subject: &str) -> Option<&SubjectMarks> {
        self.marks.get(subject)
    }

    /// The single new entry recorded for `subject`, if any.
    pub fn single(&self, subject: &str) -> Option<(&str, &Grade)> {
        self.marks
            .get(subject)
            .and_then(|tests| tests.iter().next_back())
            .map(|(test, grade)| (test.as_str(), grade))
    }

    pub fn iter(&self) -> impl Iterator<Item = NewMark> + '_ {
        self.marks.iter().flat_map(|(subject, tests)| {
            tests
                .iter()
                .map(move |(test, grade)| NewMark::new(subject.clone(), test.clone(), grade.clone()))
        })
    }

    pub fn marks(&self) -> &Marks {
        &self.marks
    }

    pub fn into_marks(self) -> Marks {
        self.marks
    }
}

pub fn diff(fresh: &Snapshot, stored: &Snapshot) -> Delta {
    diff_with(DiffMode::Legacy, fresh, stored)
}

pub fn diff_with(mode: DiffMode, fresh: &Snapshot, stored: &Snapshot) -> Delta {
    let mut marks = Marks::new();
    for (subject, tests) in &fresh.marks {
        let known = stored.marks.get(subject);
        for (test, grade) in tests {
            if known.is_some_and(|known| known.contains_key(test)) {
                continue;
            }
            let slot = marks.entry(subject.clone()).or_insert_with(SubjectMarks::new);
            if mode == DiffMode::Legacy {
                slot.clear();
            }
            slot.insert(test.clone(), grade.clone());
        }
    }
    Delta { marks }
}

/// Union of both mappings; grades from `fresh` win on conflicting keys.
pub fn merge_marks(stored: &Marks, fresh: &Marks) -> Marks {
    let mut merged = stored.clone();
    for (subject, tests) in fresh {
        let slot = merged.entry(subject.clone()).or_default();
        for (test, grade) in tests {
            slot.insert(test.clone(), grade.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{diff, diff_with, merge_marks, DiffMode};
    use crate::marks::{Grade, Marks, NewMark, Snapshot};

    fn snapshot(test_count: u64, entries: &[(&str, &str, Grade)]) -> Snapshot {
        let mut marks = Marks::new();
        for (subject, test, grade) in entries {
            marks
                .entry(subject.to_string())
                .or_insert_with(BTreeMap::new)
                .insert(test.to_string(), grade.clone());
        }
        Snapshot::new(test_count, marks)
    }

    #[test]
    fn self_diff_is_empty() {
        let s = snapshot(
            4,
            &[
                ("Math", "Midterm", 15.0.into()),
                ("Math", "Final", "absent".into()),
                ("Physics", "Lab1", 12.0.into()),
            ],
        );
        assert!(diff(&s, &s).is_empty());
        assert!(diff_with(DiffMode::Accumulate, &s, &s).is_empty());
    }

    #[test]
    fn new_test_in_known_subject() {
        let stored = snapshot(1, &[("Math", "Midterm", 15.0.into())]);
        let fresh = snapshot(
            2,
            &[("Math", "Midterm", 15.0.into()), ("Math", "Final", 18.0.into())],
        );
        let delta = diff(&fresh, &stored);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.single("Math"), Some(("Final", &Grade::Numeric(18.0))));
        assert_eq!(
            delta.iter().collect::<Vec<_>>(),
            vec![NewMark::new("Math", "Final", 18.0)]
        );
    }

    #[test]
    fn new_subject_keeps_only_last_test() {
        let stored = Snapshot::default();
        let fresh = snapshot(
            2,
            &[("Physics", "Lab1", 12.0.into()), ("Physics", "Lab2", "absent".into())],
        );
        let delta = diff(&fresh, &stored);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.single("Physics"), Some(("Lab2", &Grade::from("absent"))));
    }

    #[test]
    fn several_unseen_tests_collapse_to_one_slot() {
        let stored = snapshot(1, &[("Math", "Midterm", 15.0.into())]);
        let fresh = snapshot(
            3,
            &[
                ("Math", "Midterm", 15.0.into()),
                ("Math", "Quiz1", 11.0.into()),
                ("Math", "Quiz2", 13.0.into()),
            ],
        );
        let delta = diff(&fresh, &stored);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.single("Math"), Some(("Quiz2", &Grade::Numeric(13.0))));
    }

    #[test]
    fn accumulate_mode_keeps_every_unseen_test() {
        let stored = Snapshot::default();
        let fresh = snapshot(
            2,
            &[("Physics", "Lab1", 12.0.into()), ("Physics", "Lab2", "absent".into())],
        );
        let delta = diff_with(DiffMode::Accumulate, &fresh, &stored);
        assert_eq!(delta.len(), 2);
        let physics = delta.subject("Physics").expect("physics entries");
        assert_eq!(physics.get("Lab1"), Some(&Grade::Numeric(12.0)));
        assert_eq!(physics.get("Lab2"), Some(&Grade::from("absent")));
    }

    #[test]
    fn grade_corrections_are_not_new() {
        let stored = snapshot(1, &[("Math", "Midterm", "not graded".into())]);
        let fresh = snapshot(2, &[("Math", "Midterm", 16.0.into())]);
        assert!(diff(&fresh, &stored).is_empty());
    }

    #[test]
    fn removed_entries_are_ignored() {
        let stored = snapshot(
            2,
            &[("Math", "Midterm", 15.0.into()), ("History", "Essay", 9.0.into())],
        );
        let fresh = snapshot(3, &[("Math", "Midterm", 15.0.into())]);
        assert!(diff(&fresh, &stored).is_empty());
    }

    #[test]
    fn merge_prefers_fresh_grades() {
        let stored = snapshot(
            2,
            &[("Math", "Midterm", "pending".into()), ("History", "Essay", 9.0.into())],
        );
        let fresh = snapshot(
            3,
            &[("Math", "Midterm", 14.0.into()), ("Math", "Final", 17.0.into())],
        );
        let merged = merge_marks(&stored.marks, &fresh.marks);
        assert_eq!(merged["Math"]["Midterm"], Grade::Numeric(14.0));
        assert_eq!(merged["Math"]["Final"], Grade::Numeric(17.0));
        assert_eq!(merged["History"]["Essay"], Grade::Numeric(9.0));
    }
}
