use htmd::HtmlToMarkdown;
use scraper::Html;
use tracing::warn;

const SKIPPED_TAGS: [&str; 5] = ["script", "style", "noscript", "svg", "iframe"];

/// Convert rendered HTML to markdown, keeping link targets so the model can quote listing URLs.
pub fn html_to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    match converter.convert(html) {
        Ok(markdown) => collapse_blank_lines(&markdown),
        Err(e) => {
            // Plain text loses links but still gives the model something to read
            warn!("Markdown conversion failed, falling back to plain text: {}", e);
            let document = Html::parse_document(html);
            let text = document.root_element().text().collect::<Vec<_>>().join(" ");
            collapse_blank_lines(&text)
        }
    }
}

/// Trim every line and squeeze runs of blank lines down to one
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank = false;

    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if !blank && !out.is_empty() {
                out.push('\n');
            }
            blank = true;
            continue;
        }
        blank = false;
        out.push_str(line);
        out.push('\n');
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_links_and_drops_scripts() {
        let html = r#"<html><head><style>.x{}</style></head><body>
            <script>var tracking = 1;</script>
            <h2>Cozy 2BHK</h2>
            <a href="https://example.test/listing/42">View listing</a>
        </body></html>"#;

        let md = html_to_markdown(html);
        assert!(md.contains("Cozy 2BHK"));
        assert!(md.contains("https://example.test/listing/42"));
        assert!(!md.contains("tracking"));
        assert!(!md.contains(".x{}"));
    }

    #[test]
    fn squeezes_blank_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n   \n"), "a\n\nb");
        assert_eq!(collapse_blank_lines("\n\nfirst"), "first");
    }
}
