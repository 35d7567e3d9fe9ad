//! Text extraction helpers shared by enrichers and scrapers.

use scraper::Html;

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the visible text content of an HTML document.
///
/// Parsing happens entirely inside this function; the parsed tree is not
/// `Send` and must never be held across an await point.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text: Vec<&str> = document.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = "<html><body><h1>Kids  Club</h1><p>Join the <b>family</b> pack!</p></body></html>";
        assert_eq!(html_to_text(html), "Kids Club Join the family pack!");
    }
}
