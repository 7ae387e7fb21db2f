//! Message body rendering (Markdown → HTML).
//!
//! Raw HTML in the input is always escaped. Fenced code goes through a
//! [`Highlighter`], and every anchor in the output gets the configured
//! `target`, replacing whatever target it already had.

use std::sync::Arc;

use regex::{Captures, Regex};

use crate::ports::{Highlighter, MarkdownRenderer, PlainText};

#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Single newlines inside a paragraph become `<br>`.
    pub hard_breaks: bool,
    /// Bare `http(s)://` URLs become links.
    pub linkify: bool,
    pub link_target: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            hard_breaks: true,
            linkify: true,
            link_target: "_blank".to_string(),
        }
    }
}

/// Escape HTML special characters.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct CodeBlock {
    lang: String,
    code: String,
}

pub struct MarkdownHtmlRenderer {
    opts: RenderOptions,
    highlighter: Arc<dyn Highlighter>,
    link_re: Regex,
    url_re: Regex,
    anchor_re: Regex,
    target_re: Regex,
}

impl MarkdownHtmlRenderer {
    pub fn new(opts: RenderOptions) -> Self {
        Self::with_highlighter(opts, Arc::new(PlainText))
    }

    pub fn with_highlighter(opts: RenderOptions, highlighter: Arc<dyn Highlighter>) -> Self {
        Self {
            opts,
            highlighter,
            link_re: Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid regex"),
            url_re: Regex::new(r"https?://[^\s<\x00]+").expect("valid regex"),
            anchor_re: Regex::new(r"<a(\s[^>]*)?>").expect("valid regex"),
            target_re: Regex::new(r#"\s+target\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
                .expect("valid regex"),
        }
    }

    fn code_block_html(&self, block: &CodeBlock) -> String {
        if block.lang.is_empty() {
            return format!("<pre><code>{}</code></pre>", escape_html(&block.code));
        }
        let body = self
            .highlighter
            .highlight(&block.lang, &block.code)
            .unwrap_or_else(|| escape_html(&block.code));
        format!(
            r#"<pre><code class="language-{}">{body}</code></pre>"#,
            escape_html(&block.lang)
        )
    }

    fn force_link_target(&self, html: &str) -> String {
        let target = escape_html(&self.opts.link_target);
        self.anchor_re
            .replace_all(html, |c: &Captures| {
                let attrs = c.get(1).map_or("", |m| m.as_str());
                let attrs = self.target_re.replace_all(attrs, "");
                format!(r#"<a{attrs} target="{target}">"#)
            })
            .into_owned()
    }
}

impl Default for MarkdownHtmlRenderer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl MarkdownRenderer for MarkdownHtmlRenderer {
    fn render(&self, markdown: &str) -> String {
        let (text, code_blocks) = extract_code_blocks(markdown);
        let (text, inline_codes) = extract_inline_codes(&text);
        let text = escape_html(&text);

        // Links are parked behind placeholders so emphasis never rewrites URLs.
        let mut anchors: Vec<String> = Vec::new();
        let mut text = self
            .link_re
            .replace_all(&text, |c: &Captures| {
                if !is_safe_href(&c[2]) {
                    return c[0].to_string();
                }
                park(&mut anchors, format!(r#"<a href="{}">{}</a>"#, &c[2], &c[1]))
            })
            .into_owned();

        if self.opts.linkify {
            text = self
                .url_re
                .replace_all(&text, |c: &Captures| {
                    let (url, rest) = split_trailing(&c[0]);
                    let placeholder =
                        park(&mut anchors, format!(r#"<a href="{url}">{url}</a>"#));
                    format!("{placeholder}{rest}")
                })
                .into_owned();
        }

        let line_sep = if self.opts.hard_breaks { "<br>\n" } else { "\n" };
        let mut blocks: Vec<String> = Vec::new();
        let mut para: Vec<String> = Vec::new();
        for line in text.split('\n') {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                flush_paragraph(&mut para, &mut blocks, line_sep);
                continue;
            }
            if is_code_block_placeholder(trimmed) {
                flush_paragraph(&mut para, &mut blocks, line_sep);
                blocks.push(trimmed.to_string());
                continue;
            }
            if let Some(heading) = convert_heading(trimmed) {
                flush_paragraph(&mut para, &mut blocks, line_sep);
                blocks.push(heading);
                continue;
            }
            para.push(convert_emphasis(line));
        }
        flush_paragraph(&mut para, &mut blocks, line_sep);

        let mut html = blocks.join("\n");

        for (i, anchor) in anchors.iter().enumerate() {
            html = html.replace(&format!("\0LINK{i}\0"), anchor);
        }
        for (i, code) in inline_codes.iter().enumerate() {
            html = html.replace(
                &format!("\0INLINECODE{i}\0"),
                &format!("<code>{}</code>", escape_html(code)),
            );
        }
        for (i, block) in code_blocks.iter().enumerate() {
            html = html.replace(&format!("\0CODEBLOCK{i}\0"), &self.code_block_html(block));
        }

        self.force_link_target(&html)
    }
}

/// Link destinations we turn into anchors: `http`, `https`, `mailto` or relative.
///
/// Anything with another scheme (`javascript:`, `data:`, ...) or with control
/// characters a browser might strip before reading the scheme stays plain text.
fn is_safe_href(url: &str) -> bool {
    if url.chars().any(|c| c.is_control()) {
        return false;
    }
    let scheme_end = url.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(i) if url[i..].starts_with(':') => {
            let scheme = url[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

fn park(slots: &mut Vec<String>, html: String) -> String {
    let idx = slots.len();
    slots.push(html);
    format!("\0LINK{idx}\0")
}

/// Split trailing punctuation (and escaped quotes/brackets) off an autolinked URL.
fn split_trailing(raw: &str) -> (&str, &str) {
    let mut end = raw.len();
    for entity in ["&quot;", "&lt;", "&gt;"] {
        if let Some(i) = raw.find(entity) {
            end = end.min(i);
        }
    }
    let url = raw[..end]
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'));
    (url, &raw[url.len()..])
}

fn flush_paragraph(para: &mut Vec<String>, blocks: &mut Vec<String>, line_sep: &str) {
    if para.is_empty() {
        return;
    }
    blocks.push(format!("<p>{}</p>", para.join(line_sep)));
    para.clear();
}

fn is_code_block_placeholder(line: &str) -> bool {
    line.strip_prefix("\0CODEBLOCK")
        .and_then(|rest| rest.strip_suffix('\0'))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Info string of a backtick fence line, or `None` if `line` is not a fence.
///
/// Fences must open the line (up to three spaces of indent allowed); a run of
/// backticks anywhere else is left for the inline code pass.
fn fence_info(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\n', '\r']);
    let indent = line.bytes().take_while(|b| *b == b' ').count();
    if indent > 3 {
        return None;
    }
    let info = line[indent..].strip_prefix("```")?;
    if info.contains('`') {
        return None;
    }
    Some(info.trim())
}

fn extract_code_blocks(input: &str) -> (String, Vec<CodeBlock>) {
    let mut blocks = Vec::new();
    let mut out = String::new();

    let mut lines = input.split_inclusive('\n');
    while let Some(line) = lines.next() {
        let Some(info) = fence_info(line) else {
            out.push_str(line);
            continue;
        };
        let lang = info.split_whitespace().next().unwrap_or_default().to_string();

        let mut code = String::new();
        let mut closing = None;
        for body in lines.by_ref() {
            if fence_info(body).is_some_and(str::is_empty) {
                closing = Some(body);
                break;
            }
            code.push_str(body);
        }

        // Without a closing fence the backticks are ordinary text.
        let Some(closing) = closing else {
            out.push_str(line);
            out.push_str(&code);
            break;
        };

        let idx = blocks.len();
        blocks.push(CodeBlock { lang, code });
        out.push_str(&format!("\0CODEBLOCK{idx}\0"));
        if closing.ends_with('\n') {
            out.push('\n');
        }
    }

    (out, blocks)
}

/// Replace code spans with placeholders.
///
/// A span opens with a run of N backticks and closes at the next run of
/// exactly N. Line breaks inside become spaces, and one surrounding space is
/// dropped when present on both ends.
fn extract_inline_codes(input: &str) -> (String, Vec<String>) {
    let mut codes = Vec::new();
    let mut out = String::new();

    let mut i = 0usize;
    while let Some(rel) = input[i..].find('`') {
        let start = i + rel;
        out.push_str(&input[i..start]);

        let run = backtick_run(&input[start..]);
        let content_start = start + run;
        match find_closing_run(&input[content_start..], run) {
            Some(end_rel) => {
                let raw = input[content_start..content_start + end_rel].replace(['\r', '\n'], " ");
                let code = match raw.strip_prefix(' ').and_then(|r| r.strip_suffix(' ')) {
                    Some(inner) if !raw.trim().is_empty() => inner.to_string(),
                    _ => raw,
                };
                let idx = codes.len();
                codes.push(code);
                out.push_str(&format!("\0INLINECODE{idx}\0"));
                i = content_start + end_rel + run;
            }
            None => {
                out.push_str(&input[start..content_start]);
                i = content_start;
            }
        }
    }

    out.push_str(&input[i..]);
    (out, codes)
}

fn backtick_run(s: &str) -> usize {
    s.bytes().take_while(|b| *b == b'`').count()
}

fn find_closing_run(s: &str, len: usize) -> Option<usize> {
    let mut i = 0usize;
    while let Some(rel) = s[i..].find('`') {
        let start = i + rel;
        let run = backtick_run(&s[start..]);
        if run == len {
            return Some(start);
        }
        i = start + run;
    }
    None
}

fn convert_heading(line: &str) -> Option<String> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = line[level..].strip_prefix(' ')?;
    Some(format!("<h{level}>{}</h{level}>", convert_emphasis(rest.trim())))
}

fn convert_emphasis(line: &str) -> String {
    let l = replace_delimited(line, "**", "<strong>", "</strong>");
    let l = replace_delimited(&l, "__", "<strong>", "</strong>");
    replace_single_delim(&l, '*', "<em>", "</em>")
}

fn replace_delimited(text: &str, delim: &str, open: &str, close: &str) -> String {
    let mut out = String::new();
    let mut i = 0usize;
    while let Some(rel) = text[i..].find(delim) {
        let start = i + rel;
        out.push_str(&text[i..start]);
        let content_start = start + delim.len();
        if let Some(end_rel) = text[content_start..].find(delim) {
            let end = content_start + end_rel;
            out.push_str(open);
            out.push_str(&text[content_start..end]);
            out.push_str(close);
            i = end + delim.len();
            continue;
        }
        out.push_str(&text[start..]);
        return out;
    }
    out.push_str(&text[i..]);
    out
}

fn replace_single_delim(text: &str, delim: char, open: &str, close: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i] != delim {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        match chars[i + 1..].iter().position(|c| *c == delim) {
            Some(rel) if rel > 0 => {
                let j = i + 1 + rel;
                out.push_str(open);
                out.extend(&chars[i + 1..j]);
                out.push_str(close);
                i = j + 1;
            }
            _ => {
                out.push(delim);
                i += 1;
            }
        }
    }

    out
}
