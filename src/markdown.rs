use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag};

/// Grammar used for code blocks that carry no language tag.
pub const DEFAULT_LANGUAGE: &str = "text";

/// Render article Markdown to sanitized HTML.
///
/// Fenced code blocks come out as `<pre><code class="language-<tag>">` so a
/// client-side highlighter can pick its grammar. Raw HTML in the source is
/// sanitized away along with anything else ammonia rejects.
pub fn render(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let events = Parser::new_ext(source, options).map(|event| match event {
        Event::Start(Tag::CodeBlock(kind)) => {
            let language = code_language(&kind).to_string();
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(CowStr::from(language))))
        }
        other => other,
    });

    let mut unsafe_html = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut unsafe_html, events);

    // Task list items render as inputs; pin them to disabled checkboxes
    ammonia::Builder::default()
        .add_tag_attributes("code", &["class"])
        .add_tags(&["input"])
        .add_tag_attributes("input", &["checked"])
        .set_tag_attribute_value("input", "type", "checkbox")
        .set_tag_attribute_value("input", "disabled", "")
        .clean(&unsafe_html)
        .to_string()
}

/// Leading word of a fenced block's info string, e.g. `rust` for "rust,ignore".
fn code_language<'a>(kind: &'a CodeBlockKind<'_>) -> &'a str {
    match kind {
        CodeBlockKind::Fenced(info) => info
            .split(|c: char| c.is_whitespace() || c == ',')
            .find(|word| !word.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE),
        CodeBlockKind::Indented => DEFAULT_LANGUAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_keeps_language_class() {
        let html = render("```rust,ignore\nfn main() {}\n```\n");
        assert!(html.contains(r#"<code class="language-rust">"#), "{}", html);
    }

    #[test]
    fn untagged_blocks_default_to_text() {
        let html = render("```\nplain\n```\n");
        assert!(html.contains(r#"<code class="language-text">"#), "{}", html);

        let indented = render("    indented code\n");
        assert!(indented.contains(r#"<code class="language-text">"#), "{}", indented);
    }

    #[test]
    fn script_tags_and_handlers_are_stripped() {
        let html = render("Hello <script>alert(1)</script>\n\n<img src=x onerror=alert(1)>");
        assert!(!html.contains("<script"));
        assert!(!html.contains("onerror"));
        assert!(html.contains("Hello"));
    }

    #[test]
    fn task_lists_keep_their_checkboxes() {
        let html = render("- [x] shipped\n- [ ] pending\n");
        assert_eq!(html.matches("<input").count(), 2, "{}", html);
        assert_eq!(html.matches(r#"type="checkbox""#).count(), 2, "{}", html);
        assert_eq!(html.matches("checked").count(), 1, "{}", html);
        assert!(html.contains("disabled"), "{}", html);

        let raw = render("<input type=\"text\" name=\"q\" value=\"x\">");
        assert!(!raw.contains(r#"type="text""#), "{}", raw);
        assert!(!raw.contains("name="), "{}", raw);
    }

    #[test]
    fn common_markdown_survives_sanitizing() {
        let html = render("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~ [link](https://example.com)");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains(r#"href="https://example.com""#));
    }
}
