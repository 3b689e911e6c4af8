use scraper::{ElementRef, Html, Selector};

use crate::error::FetchError;
use crate::marks::{Grade, Marks, Snapshot};

const SUBJECT_SEPARATOR: &str = " — ";
const MIN_ROW_CELLS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub test_count_id: String,
    pub marks_table_id: String,
}

impl PageLayout {
    /// The counter id embeds the account, academic year and semester,
    /// e.g. `TestsSemester21900789_2023_1`.
    pub fn for_account(account_id: &str, year: i32, semester: &str, marks_table_id: &str) -> Self {
        Self {
            test_count_id: format!("TestsSemester{account_id}_{year}_{semester}"),
            marks_table_id: marks_table_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
    pub account_id: String,
    pub semester: String,
    pub marks_table_id: String,
    pub year_offset: i32,
}

impl PageTemplate {
    pub fn layout_for_year(&self, calendar_year: i32) -> PageLayout {
        PageLayout::for_account(
            &self.account_id,
            calendar_year - self.year_offset,
            &self.semester,
            &self.marks_table_id,
        )
    }
}

pub fn parse_snapshot(html: &str, layout: &PageLayout) -> Result<Snapshot, FetchError> {
    let document = Html::parse_document(html);
    let test_count = parse_test_count(&document, &layout.test_count_id)?;
    let marks = parse_marks(&document, &layout.marks_table_id)?;
    Ok(Snapshot::new(test_count, marks))
}

fn parse_test_count(document: &Html, element_id: &str) -> Result<u64, FetchError> {
    let selector = id_selector(element_id, "")?;
    let element = document.select(&selector).next().ok_or_else(|| {
        FetchError::UnexpectedStructure(format!("test counter #{element_id} not found"))
    })?;
    let text = element_text(element);
    text.split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .and_then(|(count, _)| count.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            FetchError::UnexpectedStructure(format!(
                "test counter #{element_id} has no count: {text:?}"
            ))
        })
}

fn parse_marks(document: &Html, table_id: &str) -> Result<Marks, FetchError> {
    let table_selector = id_selector(table_id, "")?;
    if document.select(&table_selector).next().is_none() {
        return Err(FetchError::UnexpectedStructure(format!(
            "marks table #{table_id} not found"
        )));
    }
    let row_selector = id_selector(table_id, " tbody tr")?;
    let cell_selector = selector("td")?;

    let mut marks = Marks::new();
    for (index, row) in document.select(&row_selector).enumerate() {
        let cells: Vec<String> = row.select(&cell_selector).map(element_text).collect();
        if cells.len() < MIN_ROW_CELLS {
            return Err(FetchError::UnexpectedStructure(format!(
                "row {index} of #{table_id} has {} cells, expected at least {MIN_ROW_CELLS}",
                cells.len()
            )));
        }
        let subject = cells[0]
            .split(SUBJECT_SEPARATOR)
            .nth(1)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                FetchError::UnexpectedStructure(format!(
                    "row {index} of #{table_id} has no subject name: {:?}",
                    cells[0]
                ))
            })?;
        let test = cells[1].trim();
        marks
            .entry(subject.to_string())
            .or_default()
            .insert(test.to_string(), Grade::parse_cell(&cells[3]));
    }
    Ok(marks)
}

fn id_selector(id: &str, suffix: &str) -> Result<Selector, FetchError> {
    selector(&format!("[id=\"{id}\"]{suffix}"))
}

fn selector(raw: &str) -> Result<Selector, FetchError> {
    Selector::parse(raw)
        .map_err(|err| FetchError::UnexpectedStructure(format!("bad selector {raw:?}: {err}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}
