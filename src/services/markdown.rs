use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Flatten assistant markdown into plain terminal text.
///
/// Emphasis markers are dropped, lists keep their bullets or numbers,
/// code blocks are indented and links keep their target in parentheses.
pub fn to_terminal_text(input: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut out = TerminalWriter::default();
    for event in Parser::new_ext(input, options) {
        out.handle(event);
    }
    out.finish()
}

#[derive(Default)]
struct TerminalWriter {
    out: String,
    /// `Some(n)` for an ordered list at the next number, `None` for bullets.
    lists: Vec<Option<u64>>,
    in_code_block: bool,
    link_target: Option<String>,
    heading_start: Option<usize>,
}

impl TerminalWriter {
    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    for line in text.lines() {
                        self.out.push_str("    ");
                        self.out.push_str(line);
                        self.out.push('\n');
                    }
                } else {
                    self.out.push_str(&text);
                }
            }
            Event::Code(code) => {
                self.out.push('`');
                self.out.push_str(&code);
                self.out.push('`');
            }
            Event::SoftBreak => self.out.push(' '),
            Event::HardBreak => self.newline(),
            Event::Rule => {
                self.block_gap();
                self.out.push_str("----------\n");
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.block_gap();
                }
            }
            Tag::Heading { .. } => {
                self.block_gap();
                self.heading_start = Some(self.out.len());
            }
            Tag::CodeBlock(kind) => {
                self.block_gap();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.trim().is_empty() {
                        self.out.push_str(&format!("  [{}]\n", lang.trim()));
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_gap();
                } else {
                    self.newline();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{}. ", n));
                        *n += 1;
                    }
                    _ => self.out.push_str("- "),
                }
            }
            Tag::BlockQuote(_) => {
                self.block_gap();
                self.out.push_str("> ");
            }
            Tag::Link { dest_url, .. } => self.link_target = Some(dest_url.to_string()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.newline(),
            TagEnd::Heading(_) => {
                if let Some(start) = self.heading_start.take() {
                    let width = self.out[start..].chars().count().max(3);
                    self.out.push('\n');
                    self.out.push_str(&"=".repeat(width));
                }
                self.newline();
            }
            TagEnd::CodeBlock => self.in_code_block = false,
            TagEnd::List(_) => {
                self.lists.pop();
            }
            TagEnd::Item => self.newline(),
            TagEnd::Link => {
                if let Some(url) = self.link_target.take() {
                    self.out.push_str(&format!(" ({})", url));
                }
            }
            _ => {}
        }
    }

    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    /// Separate blocks with one blank line.
    fn block_gap(&mut self) {
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        self.newline();
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }
}
