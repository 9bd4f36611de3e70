//! Rich-text engine seam and the built-in markup document.
//!
//! Notes store their content as a small HTML subset. [`RichText`] is the
//! contract the editor bridge needs from a rich-text engine; any engine that
//! can load that markup, apply the formatting chain, and serialize back can
//! sit behind a note. [`MarkupDocument`] is the engine the crate ships with.
//!
//! The caret model is deliberately narrow: formatting applies to the active
//! block (the last one unless another is selected), and insertions append
//! to it.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Paragraph alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    /// Accepts both CSS names and the canvas toolbar's start/middle/end
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "left" | "start" => Some(Align::Left),
            "center" | "middle" => Some(Align::Center),
            "right" | "end" => Some(Align::Right),
            "justify" => Some(Align::Justify),
            _ => None,
        }
    }

    pub fn as_css(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Justify => "justify",
        }
    }
}

/// One step of the engine's formatting chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCommand {
    ToggleBold,
    ToggleItalic,
    ToggleHeading(u8),
    ToggleBulletList,
    SetTextAlign(Align),
    SetColor(String),
    InsertContent(String),
}

/// What the editor bridge needs from a rich-text engine.
pub trait RichText {
    /// Build an instance seeded with serialized content
    fn from_markup(markup: &str) -> Self
    where
        Self: Sized;

    /// Serialize the current document
    fn to_markup(&self) -> String;

    /// Run one formatting command. Returns whether the document changed.
    fn apply(&mut self, command: &FormatCommand) -> bool;

    /// Type text at the caret
    fn insert_text(&mut self, text: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    BulletItem,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub align: Option<Align>,
    pub runs: Vec<Run>,
}

impl Block {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            align: None,
            runs: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn push_run(&mut self, text: &str, marks: Marks) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.marks == marks => last.text.push_str(text),
            _ => self.runs.push(Run {
                text: text.to_string(),
                marks,
            }),
        }
    }
}

/// Block/mark document that reads and writes the note markup subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    blocks: Vec<Block>,
    active: usize,
    /// Marks applied to the next insertion
    pending: Marks,
}

impl Default for MarkupDocument {
    fn default() -> Self {
        Self {
            blocks: vec![Block::new(BlockKind::Paragraph)],
            active: 0,
            pending: Marks::default(),
        }
    }
}

impl MarkupDocument {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn active_block(&self) -> &Block {
        &self.blocks[self.active]
    }

    /// Move the caret into block `index`. Out-of-range indexes are ignored.
    pub fn select_block(&mut self, index: usize) {
        if index < self.blocks.len() {
            self.active = index;
            self.pending = self.blocks[index]
                .runs
                .last()
                .map(|r| r.marks.clone())
                .unwrap_or_default();
        }
    }

    /// Plain text, one line per block
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn active_mut(&mut self) -> &mut Block {
        &mut self.blocks[self.active]
    }

    fn toggle_mark(&mut self, get: fn(&Marks) -> bool, set: fn(&mut Marks, bool)) -> bool {
        let block = &self.blocks[self.active];
        let on = if block.runs.is_empty() {
            !get(&self.pending)
        } else {
            !block.runs.iter().all(|r| get(&r.marks))
        };
        for run in &mut self.active_mut().runs {
            set(&mut run.marks, on);
        }
        set(&mut self.pending, on);
        true
    }
}

impl RichText for MarkupDocument {
    fn from_markup(markup: &str) -> Self {
        let blocks = parse_blocks(markup);
        let mut doc = if blocks.is_empty() {
            Self::default()
        } else {
            Self {
                blocks,
                active: 0,
                pending: Marks::default(),
            }
        };
        doc.select_block(doc.blocks.len() - 1);
        doc
    }

    fn to_markup(&self) -> String {
        let mut out = String::new();
        let mut in_list = false;
        for block in &self.blocks {
            let is_item = block.kind == BlockKind::BulletItem;
            if is_item && !in_list {
                out.push_str("<ul>");
            } else if !is_item && in_list {
                out.push_str("</ul>");
            }
            in_list = is_item;

            let style = block
                .align
                .map(|a| format!(" style=\"text-align: {}\"", a.as_css()))
                .unwrap_or_default();
            let mut inner = String::new();
            for run in &block.runs {
                write_run(&mut inner, run);
            }
            match block.kind {
                BlockKind::Paragraph => {
                    let _ = write!(out, "<p{style}>{inner}</p>");
                }
                BlockKind::Heading(level) => {
                    let _ = write!(out, "<h{level}{style}>{inner}</h{level}>");
                }
                BlockKind::BulletItem => {
                    let _ = write!(out, "<li><p{style}>{inner}</p></li>");
                }
            }
        }
        if in_list {
            out.push_str("</ul>");
        }
        out
    }

    fn apply(&mut self, command: &FormatCommand) -> bool {
        match command {
            FormatCommand::ToggleBold => self.toggle_mark(|m| m.bold, |m, on| m.bold = on),
            FormatCommand::ToggleItalic => self.toggle_mark(|m| m.italic, |m, on| m.italic = on),
            FormatCommand::ToggleHeading(level) => {
                let level = (*level).clamp(1, 6);
                let block = self.active_mut();
                block.kind = if block.kind == BlockKind::Heading(level) {
                    BlockKind::Paragraph
                } else {
                    BlockKind::Heading(level)
                };
                true
            }
            FormatCommand::ToggleBulletList => {
                let block = self.active_mut();
                block.kind = if block.kind == BlockKind::BulletItem {
                    BlockKind::Paragraph
                } else {
                    BlockKind::BulletItem
                };
                true
            }
            FormatCommand::SetTextAlign(align) => {
                let block = self.active_mut();
                if block.align == Some(*align) {
                    return false;
                }
                block.align = Some(*align);
                true
            }
            FormatCommand::SetColor(color) => {
                let color = Some(color.clone());
                for run in &mut self.active_mut().runs {
                    run.marks.color = color.clone();
                }
                self.pending.color = color;
                true
            }
            FormatCommand::InsertContent(text) => {
                if text.is_empty() {
                    return false;
                }
                self.insert_text(text);
                true
            }
        }
    }

    fn insert_text(&mut self, text: &str) {
        let marks = self.pending.clone();
        self.active_mut().push_run(text, marks);
    }
}

fn write_run(out: &mut String, run: &Run) {
    let text = escape(&run.text);
    let mut s = match &run.marks.color {
        Some(color) => format!("<span style=\"color: {}\">{text}</span>", escape(color)),
        None => text,
    };
    if run.marks.italic {
        s = format!("<em>{s}</em>");
    }
    if run.marks.bold {
        s = format!("<strong>{s}</strong>");
    }
    out.push_str(&s);
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

enum Token<'a> {
    Open { name: String, attrs: &'a str },
    Close { name: String },
    Text(&'a str),
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        if let Some(tag_body) = rest.strip_prefix('<') {
            let Some(end) = tag_body.find('>') else {
                // Unterminated tag: keep it as text
                tokens.push(Token::Text(rest));
                break;
            };
            let body = tag_body[..end].trim().trim_end_matches('/');
            rest = &tag_body[end + 1..];
            if let Some(name) = body.strip_prefix('/') {
                tokens.push(Token::Close {
                    name: name.trim().to_ascii_lowercase(),
                });
            } else {
                let split = body.find(char::is_whitespace).unwrap_or(body.len());
                tokens.push(Token::Open {
                    name: body[..split].to_ascii_lowercase(),
                    attrs: &body[split..],
                });
            }
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            tokens.push(Token::Text(&rest[..end]));
            rest = &rest[end..];
        }
    }
    tokens
}

/// Value of one CSS property inside a `style="..."` attribute
fn style_prop(attrs: &str, prop: &str) -> Option<String> {
    let start = attrs.find("style=")? + "style=".len();
    let quoted = &attrs[start..];
    let quote = quoted.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &quoted[1..];
    let body = &body[..body.find(quote)?];
    body.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        (key.trim() == prop).then(|| value.trim().to_string())
    })
}

fn parse_blocks(markup: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    let mut in_item = false;
    let mut bold = 0usize;
    let mut italic = 0usize;
    let mut colors: Vec<Option<String>> = Vec::new();

    for token in tokenize(markup) {
        match token {
            Token::Open { name, attrs } => match name.as_str() {
                "p" if in_item => {
                    if let Some(block) = current.as_mut() {
                        block.align = style_prop(attrs, "text-align").and_then(|a| Align::parse(&a));
                    }
                }
                "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" => {
                    blocks.extend(current.take());
                    let kind = match name.as_str() {
                        "p" => BlockKind::Paragraph,
                        "li" => BlockKind::BulletItem,
                        h => BlockKind::Heading(h[1..].parse().unwrap_or(1)),
                    };
                    in_item = kind == BlockKind::BulletItem;
                    let mut block = Block::new(kind);
                    block.align = style_prop(attrs, "text-align").and_then(|a| Align::parse(&a));
                    current = Some(block);
                }
                "strong" | "b" => bold += 1,
                "em" | "i" => italic += 1,
                "span" => colors.push(style_prop(attrs, "color")),
                "br" => {
                    if let Some(block) = current.as_mut() {
                        let marks = current_marks(bold, italic, &colors);
                        block.push_run("\n", marks);
                    }
                }
                _ => {}
            },
            Token::Close { name } => match name.as_str() {
                "p" if in_item => {}
                "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" => {
                    blocks.extend(current.take());
                    in_item = false;
                }
                "strong" | "b" => bold = bold.saturating_sub(1),
                "em" | "i" => italic = italic.saturating_sub(1),
                "span" => {
                    colors.pop();
                }
                _ => {}
            },
            Token::Text(raw) => {
                let text = unescape(raw);
                if current.is_none() {
                    if text.trim().is_empty() {
                        continue;
                    }
                    current = Some(Block::new(BlockKind::Paragraph));
                }
                if let Some(block) = current.as_mut() {
                    block.push_run(&text, current_marks(bold, italic, &colors));
                }
            }
        }
    }
    blocks.extend(current);
    blocks
}

fn current_marks(bold: usize, italic: usize, colors: &[Option<String>]) -> Marks {
    Marks {
        bold: bold > 0,
        italic: italic > 0,
        color: colors.iter().rev().find_map(|c| c.clone()),
    }
}
