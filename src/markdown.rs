//! Markdown-subset parser for assistant messages: fenced code blocks,
//! `<think>` sections, and inline `**bold**`, `*italic*`, `` `code` ``
//! spans with an optional leading heading marker. Deliberately small;
//! model output rarely needs more, and `<think>` is not Markdown at all.

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Code(String),
    Think(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub heading: bool,
}

impl SpanStyle {
    fn heading() -> Self {
        SpanStyle {
            heading: true,
            ..SpanStyle::default()
        }
    }

    fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn with_italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn with_code(mut self) -> Self {
        self.code = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

/// Splits raw message text into blocks. `<think>…</think>` sections are
/// extracted first, in document order; the remainder is partitioned into
/// fenced code blocks and blank-line-separated paragraphs.
pub fn parse_blocks(input: &str) -> Vec<Block> {
    let think_re = Regex::new(r"(?s)<think>(.*?)</think>").unwrap();

    let mut blocks = Vec::new();
    let mut last_index = 0;
    for captures in think_re.captures_iter(input) {
        let whole = captures.get(0).unwrap();
        let before = &input[last_index..whole.start()];
        if !before.trim().is_empty() {
            blocks.extend(parse_blocks_no_think(before));
        }
        let inner = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        blocks.push(Block::Think(inner.trim().to_string()));
        last_index = whole.end();
    }
    if last_index < input.len() {
        let remaining = &input[last_index..];
        if !remaining.trim().is_empty() {
            blocks.extend(parse_blocks_no_think(remaining));
        }
    }
    blocks
}

fn parse_blocks_no_think(input: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut code_buffer = String::new();
    let mut in_code = false;
    let mut paragraph_buffer: Vec<&str> = Vec::new();

    fn flush_paragraph(blocks: &mut Vec<Block>, buffer: &mut Vec<&str>) {
        if !buffer.is_empty() {
            let paragraph = buffer.join("\n");
            blocks.push(Block::Paragraph(style_inline(&paragraph)));
            buffer.clear();
        }
    }

    for raw in input.lines() {
        let line = raw.trim_end();
        if line.starts_with("```") {
            if in_code {
                blocks.push(Block::Code(code_buffer.trim_end().to_string()));
                code_buffer.clear();
                in_code = false;
            } else {
                flush_paragraph(&mut blocks, &mut paragraph_buffer);
                in_code = true;
            }
            continue;
        }
        if in_code {
            code_buffer.push_str(raw);
            code_buffer.push('\n');
        } else if line.is_empty() {
            flush_paragraph(&mut blocks, &mut paragraph_buffer);
        } else {
            paragraph_buffer.push(line);
        }
    }

    // An unterminated fence still renders as code.
    if !code_buffer.is_empty() {
        blocks.push(Block::Code(code_buffer.trim_end().to_string()));
    }
    flush_paragraph(&mut blocks, &mut paragraph_buffer);
    blocks
}

/// Styles one paragraph. A leading `#`–`######` marker puts the whole
/// line in heading style; inline markers are then scanned left to right
/// with `` ` `` taking precedence over `**` over `*`.
pub fn style_inline(text: &str) -> Vec<Span> {
    let heading_re = Regex::new(r"^(#{1,6})\s+(.*)").unwrap();

    let (content, base) = match heading_re.captures(text) {
        Some(captures) => {
            let content = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            (content, SpanStyle::heading())
        }
        None => (text, SpanStyle::default()),
    };

    let mut spans = Vec::new();
    append_styled(&mut spans, content, base);
    spans
}

fn push_span(spans: &mut Vec<Span>, text: &str, style: SpanStyle) {
    if !text.is_empty() {
        spans.push(Span {
            text: text.to_string(),
            style,
        });
    }
}

fn append_styled(spans: &mut Vec<Span>, text: &str, base: SpanStyle) {
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with('`') {
            match rest[1..].find('`') {
                Some(offset) => {
                    let end = i + 1 + offset;
                    push_span(spans, &text[i + 1..end], base.with_code());
                    i = end + 1;
                }
                None => {
                    push_span(spans, rest, base);
                    break;
                }
            }
        } else if rest.starts_with("**") {
            match rest[2..].find("**") {
                Some(offset) => {
                    let end = i + 2 + offset;
                    push_span(spans, &text[i + 2..end], base.with_bold());
                    i = end + 2;
                }
                None => {
                    push_span(spans, rest, base);
                    break;
                }
            }
        } else if rest.starts_with('*') {
            match rest[1..].find('*') {
                Some(offset) => {
                    let end = i + 1 + offset;
                    push_span(spans, &text[i + 1..end], base.with_italic());
                    i = end + 1;
                }
                None => {
                    push_span(spans, rest, base);
                    break;
                }
            }
        } else {
            // Plain run up to the next marker.
            let next = [rest.find('`'), rest.find("**"), rest.find('*')]
                .into_iter()
                .flatten()
                .min();
            let end = match next {
                Some(offset) => i + offset,
                None => text.len(),
            };
            push_span(spans, &text[i..end], base);
            i = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Span {
        Span {
            text: text.to_string(),
            style: SpanStyle::default(),
        }
    }

    #[test]
    fn splits_paragraphs_on_blank_lines() {
        let blocks = parse_blocks("first paragraph\nstill first\n\nsecond paragraph\n");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![plain("first paragraph\nstill first")]),
                Block::Paragraph(vec![plain("second paragraph")]),
            ]
        );
    }

    #[test]
    fn extracts_fenced_code_blocks() {
        let blocks = parse_blocks("before\n```\nlet x = 1;\nlet y = 2;\n```\nafter");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![plain("before")]),
                Block::Code("let x = 1;\nlet y = 2;".to_string()),
                Block::Paragraph(vec![plain("after")]),
            ]
        );
    }

    #[test]
    fn language_tag_on_fence_is_ignored() {
        let blocks = parse_blocks("```rust\nfn main() {}\n```");
        assert_eq!(blocks, vec![Block::Code("fn main() {}".to_string())]);
    }

    #[test]
    fn unterminated_fence_flushes_as_code() {
        let blocks = parse_blocks("```\nincomplete");
        assert_eq!(blocks, vec![Block::Code("incomplete".to_string())]);
    }

    #[test]
    fn think_sections_keep_document_order() {
        let blocks = parse_blocks("<think>planning</think>answer here\n\n<think>more</think>");
        assert_eq!(
            blocks,
            vec![
                Block::Think("planning".to_string()),
                Block::Paragraph(vec![plain("answer here")]),
                Block::Think("more".to_string()),
            ]
        );
    }

    #[test]
    fn think_content_spans_newlines_and_is_trimmed() {
        let blocks = parse_blocks("<think>\nstep one\nstep two\n</think>");
        assert_eq!(blocks, vec![Block::Think("step one\nstep two".to_string())]);
    }

    #[test]
    fn inline_styles_bold_italic_code() {
        let spans = style_inline("mix of **bold**, *italic* and `code` here");
        assert_eq!(
            spans,
            vec![
                plain("mix of "),
                Span {
                    text: "bold".to_string(),
                    style: SpanStyle::default().with_bold(),
                },
                plain(", "),
                Span {
                    text: "italic".to_string(),
                    style: SpanStyle::default().with_italic(),
                },
                plain(" and "),
                Span {
                    text: "code".to_string(),
                    style: SpanStyle::default().with_code(),
                },
                plain(" here"),
            ]
        );
    }

    #[test]
    fn backtick_takes_precedence_over_asterisks() {
        let spans = style_inline("`**not bold**`");
        assert_eq!(
            spans,
            vec![Span {
                text: "**not bold**".to_string(),
                style: SpanStyle::default().with_code(),
            }]
        );
    }

    #[test]
    fn unclosed_markers_render_literally() {
        let spans = style_inline("dangling **marker");
        assert_eq!(spans, vec![plain("dangling "), plain("**marker")]);

        let spans = style_inline("lonely `tick");
        assert_eq!(spans, vec![plain("lonely "), plain("`tick")]);
    }

    #[test]
    fn heading_marker_styles_the_line() {
        let spans = style_inline("## Section title");
        assert_eq!(
            spans,
            vec![Span {
                text: "Section title".to_string(),
                style: SpanStyle::heading(),
            }]
        );
    }

    #[test]
    fn heading_style_combines_with_inline_markers() {
        let spans = style_inline("# A **bold** title");
        assert_eq!(
            spans,
            vec![
                Span {
                    text: "A ".to_string(),
                    style: SpanStyle::heading(),
                },
                Span {
                    text: "bold".to_string(),
                    style: SpanStyle::heading().with_bold(),
                },
                Span {
                    text: " title".to_string(),
                    style: SpanStyle::heading(),
                },
            ]
        );
    }

    #[test]
    fn trailing_whitespace_is_stripped_from_paragraph_lines() {
        let blocks = parse_blocks("line one   \nline two\t\n");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![plain("line one\nline two")])]
        );
    }
}
