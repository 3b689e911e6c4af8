use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::marks::{Grade, Snapshot};
use crate::notify::{ChannelOutcome, NotifyOutcome};

pub fn render_snapshot_table(snapshot: &Snapshot) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Subject", "Test", "Grade"]);

    for (subject, tests) in &snapshot.marks {
        for (test, grade) in tests {
            let grade_cell = match grade {
                Grade::Numeric(v) if *v < 10.0 => Cell::new(format!("{grade}/20")).fg(Color::Red),
                Grade::Numeric(_) => Cell::new(format!("{grade}/20")).fg(Color::Green),
                Grade::Placeholder(text) => Cell::new(text).fg(Color::Yellow),
            };
            table.add_row(Row::from(vec![
                Cell::new(subject),
                Cell::new(test),
                grade_cell,
            ]));
        }
    }
    format!(
        "{table}\n{} tests published, {} marks recorded",
        snapshot.test_count,
        snapshot.entry_count()
    )
}

pub fn render_outcomes_table(outcomes: &[NotifyOutcome]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Subject", "Test", "Instant message", "Emails"]);

    for outcome in outcomes {
        let sent = outcome
            .email
            .iter()
            .filter(|r| r.outcome == ChannelOutcome::Sent)
            .count();
        table.add_row(vec![
            outcome.mark.subject.clone(),
            outcome.mark.test.clone(),
            channel_label(&outcome.instant),
            format!("{sent}/{}", outcome.email.len()),
        ]);
    }
    table.to_string()
}

fn channel_label(outcome: &ChannelOutcome) -> String {
    match outcome {
        ChannelOutcome::Disabled => "disabled".to_string(),
        ChannelOutcome::Sent => "sent".to_string(),
        ChannelOutcome::Failed(reason) => format!("failed: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{render_outcomes_table, render_snapshot_table};
    use crate::marks::{Grade, NewMark, Snapshot};
    use crate::notify::{ChannelOutcome, NotifyOutcome, RecipientOutcome};

    #[test]
    fn snapshot_table_lists_every_mark() {
        let mut math = BTreeMap::new();
        math.insert("Midterm".to_string(), Grade::Numeric(15.0));
        math.insert("Oral".to_string(), Grade::from("absent"));
        let mut marks = BTreeMap::new();
        marks.insert("Math".to_string(), math);
        let rendered = render_snapshot_table(&Snapshot::new(2, marks));
        assert!(rendered.contains("Midterm"));
        assert!(rendered.contains("15/20"));
        assert!(rendered.contains("absent"));
        assert!(rendered.ends_with("2 tests published, 2 marks recorded"));
    }

    #[test]
    fn outcome_table_counts_delivered_emails() {
        let outcome = NotifyOutcome {
            mark: NewMark::new("Math", "Final", 18.0),
            instant: ChannelOutcome::Failed("HTTP 500".to_string()),
            email: vec![
                RecipientOutcome {
                    recipient: "a@example.org".to_string(),
                    outcome: ChannelOutcome::Sent,
                },
                RecipientOutcome {
                    recipient: "b@example.org".to_string(),
                    outcome: ChannelOutcome::Failed("reset".to_string()),
                },
            ],
        };
        let rendered = render_outcomes_table(&[outcome]);
        assert!(rendered.contains("1/2"));
        assert!(rendered.contains("failed: HTTP 500"));
    }
}
