use pulldown_cmark::{html, Options, Parser};

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts the whole accumulated answer to HTML.
///
/// Always called on the full text so an unterminated construct (an open code
/// fence, half of a `**`) renders as whatever the complete prefix means.
pub fn render_markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, markdown_options());
    let mut rendered = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut rendered, parser);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_stable_across_calls() {
        let text = "# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(render_markdown(text), render_markdown(text));
    }

    #[test]
    fn test_split_emphasis_renders_once_complete() {
        let partial = render_markdown("Hi **the");
        assert!(!partial.contains("<strong>"));

        let complete = render_markdown("Hi **there**");
        assert!(complete.contains("<strong>there</strong>"));
    }

    #[test]
    fn test_tables_and_strikethrough_enabled() {
        let rendered = render_markdown("~~old~~\n\n| k | v |\n|---|---|\n| x | y |\n");
        assert!(rendered.contains("<del>old</del>"));
        assert!(rendered.contains("<table>"));
    }

    #[test]
    fn test_empty_text_renders_empty() {
        assert_eq!(render_markdown(""), "");
    }
}
