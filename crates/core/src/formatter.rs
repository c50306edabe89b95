use crate::models::{Document, Heading, LogicalLine};
use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("whitespace pattern is valid"));

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{2,3})\s+([^#\s].*)$").expect("marker pattern is valid"));

/// Renders reassembled lines as Markdown-flavored text.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn format(&self, lines: &[LogicalLine]) -> Document {
        let mut rendered: Vec<String> = Vec::with_capacity(lines.len() * 2);
        let heading_count = lines.iter().filter(|line| line.is_heading()).count();

        for line in lines {
            match line {
                LogicalLine::Heading(heading) => {
                    rendered.push(String::new());
                    rendered.push(render_heading(heading));
                    rendered.push(String::new());
                }
                LogicalLine::Body(text) => rendered.push(text.clone()),
            }
        }

        Document {
            text: normalize_lines(rendered.iter().map(String::as_str)),
            heading_count,
        }
    }
}

fn render_heading(heading: &Heading) -> String {
    format!("{} {}", heading.level.marker(), heading.text.trim())
}

/// Normalizes already-rendered text: single spaces, trimmed lines, no
/// repeated blank lines, no blank lines at either end, headings set apart by
/// blank lines, one space between a marker and its text.
pub fn normalize_markdown(text: &str) -> String {
    let mut rendered: Vec<String> = Vec::new();

    for line in text.lines() {
        let collapsed = HORIZONTAL_WS.replace_all(line.trim(), " ");
        if let Some(captures) = MARKER.captures(&collapsed) {
            rendered.push(String::new());
            rendered.push(format!("{} {}", &captures[1], captures[2].trim()));
            rendered.push(String::new());
        } else {
            rendered.push(collapsed.into_owned());
        }
    }

    normalize_lines(rendered.iter().map(String::as_str))
}

fn normalize_lines<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut output: Vec<String> = Vec::new();

    for line in lines {
        let collapsed = HORIZONTAL_WS.replace_all(line.trim(), " ").into_owned();
        let after_blank = output.last().map_or(true, |last| last.is_empty());
        if collapsed.is_empty() && after_blank {
            continue;
        }
        output.push(collapsed);
    }

    while output.last().is_some_and(|last| last.is_empty()) {
        output.pop();
    }

    output.join("\n")
}
