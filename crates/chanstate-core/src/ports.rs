//! Boundaries to collaborators the state core never looks inside.

/// Markdown → HTML for message bodies. Stateless; no access to channel state.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// Syntax highlighting for fenced code blocks.
///
/// Returns already-escaped HTML for `code`, or `None` when `lang` is unknown,
/// in which case the renderer falls back to escaped plain text.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, lang: &str, code: &str) -> Option<String>;
}

/// Highlighter that knows no languages.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainText;

impl Highlighter for PlainText {
    fn highlight(&self, _lang: &str, _code: &str) -> Option<String> {
        None
    }
}
