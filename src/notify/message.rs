use html_escape::{encode_single_quoted_attribute, encode_text};

use crate::marks::{Grade, NewMark};

pub const DEFAULT_EMAIL_SUBJECT: &str = "🤖 New mark published";

/// Styled text for the instant-message relay (`**bold**`, `*italic*`).
pub fn render_instant(mark: &NewMark) -> String {
    let grade = match &mark.grade {
        Grade::Numeric(_) => format!("**{}/20**", mark.grade),
        Grade::Placeholder(text) => format!("**{text}**"),
    };
    format!(
        "New mark in « {} »: {grade} for « *{}* »",
        mark.subject, mark.test
    )
}

/// HTML email body. The grade itself is left out; recipients follow the
/// link to read it.
pub fn render_email(mark: &NewMark, portal_link: &str) -> String {
    let mut body = format!(
        "New mark in « <strong>{}</strong> » for « {} »",
        encode_text(&mark.subject),
        encode_text(&mark.test)
    );
    if !portal_link.trim().is_empty() {
        body.push_str(&format!(
            "<br /><br /><a href='{}' target='_blank'>Open the portal</a>",
            encode_single_quoted_attribute(portal_link)
        ));
    }
    format!("<html><body><p>{body}</p></body></html>")
}
