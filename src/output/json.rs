use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::render_json;
    use crate::controller::CycleReport;

    #[test]
    fn tags_cycle_reports_with_state() {
        let rendered = render_json(&CycleReport::NoChange {
            fetched: 3,
            stored: 3,
        })
        .expect("renders");
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value["state"], "no_change");
        assert_eq!(value["fetched"], 3);
    }
}
