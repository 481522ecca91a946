// HTML <-> editor tree conversion
//
// Stored rich text is the small HTML subset the editor exports. Anything
// outside that subset is dropped while its text content is kept.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::node::{Block, EditorDocument, Inline, Mention, TextFormat};

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)([a-zA-Z][a-zA-Z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*?)/?>"#)
        .expect("tag pattern is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute pattern is valid")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("entity pattern is valid")
});

/// Escape text for element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Decode named and numeric character references. Unknown names are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let reference = &caps[1];
            let decoded = match reference {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => numeric_reference(reference),
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn numeric_reference(reference: &str) -> Option<char> {
    let digits = reference.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|value| decode_entities(value.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn mention_from_attributes(attributes: &[(String, String)]) -> Option<Mention> {
    let is_mention = attribute(attributes, "data-lexical-mention").is_some()
        || attribute(attributes, "data-user-id").is_some();
    if !is_mention {
        return None;
    }

    Some(Mention {
        user_pk: attribute(attributes, "data-user-id")
            .and_then(|id| id.trim().parse().ok())
            .unwrap_or(0),
        email: attribute(attributes, "data-user-email")
            .unwrap_or_default()
            .to_string(),
        name: attribute(attributes, "data-user-name")
            .unwrap_or_default()
            .to_string(),
        text: String::new(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Paragraph,
    Heading(u8),
    Quote,
}

#[derive(Debug)]
struct OpenList {
    ordered: bool,
    items: Vec<Vec<Inline>>,
    depth: u32,
    in_item: bool,
}

#[derive(Debug, Default)]
struct HtmlParser {
    blocks: Vec<Block>,
    block: Option<BlockKind>,
    inlines: Vec<Inline>,
    list: Option<OpenList>,
    bold: u32,
    italic: u32,
    underline: u32,
    strikethrough: u32,
    spans: Vec<Option<Mention>>,
}

impl HtmlParser {
    fn format(&self) -> TextFormat {
        TextFormat {
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: self.underline > 0,
            strikethrough: self.strikethrough > 0,
        }
    }

    fn open(&mut self, tag: &str, raw_attributes: &str) {
        match tag {
            "p" | "div" => self.open_block(BlockKind::Paragraph),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<u8>().unwrap_or(1).min(3);
                self.open_block(BlockKind::Heading(level));
            }
            "blockquote" => self.open_block(BlockKind::Quote),
            "ul" | "ol" => self.open_list(tag == "ol"),
            "li" => self.open_item(),
            "br" => self.push_inline(Inline::LineBreak),
            "b" | "strong" => self.bold += 1,
            "i" | "em" => self.italic += 1,
            "u" => self.underline += 1,
            "s" | "strike" | "del" => self.strikethrough += 1,
            "span" => {
                let attributes = parse_attributes(raw_attributes);
                self.spans.push(mention_from_attributes(&attributes));
            }
            _ => {}
        }
    }

    fn close(&mut self, tag: &str) {
        match tag {
            "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" => {
                if self.list.is_none() {
                    self.flush_block();
                }
            }
            "ul" | "ol" => self.close_list(),
            "li" => {
                if let Some(list) = self.list.as_mut() {
                    list.in_item = false;
                }
            }
            "b" | "strong" => self.bold = self.bold.saturating_sub(1),
            "i" | "em" => self.italic = self.italic.saturating_sub(1),
            "u" => self.underline = self.underline.saturating_sub(1),
            "s" | "strike" | "del" => self.strikethrough = self.strikethrough.saturating_sub(1),
            "span" => {
                if let Some(Some(mut mention)) = self.spans.pop() {
                    if mention.name.is_empty() {
                        mention.name = mention.text.trim_start_matches('@').trim().to_string();
                    }
                    if mention.text.is_empty() {
                        mention.text = format!("@{}", mention.name);
                    }
                    self.push_inline(Inline::Mention(mention));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let text = decode_entities(raw);

        if let Some(mention) = self.spans.iter_mut().rev().find_map(Option::as_mut) {
            mention.text.push_str(&text);
            return;
        }

        let between_blocks = match &self.list {
            Some(list) => !list.in_item,
            None => self.block.is_none() && self.inlines.is_empty(),
        };
        if between_blocks && text.trim().is_empty() {
            return;
        }

        let format = self.format();
        self.push_inline(Inline::Text { text, format });
    }

    fn open_block(&mut self, kind: BlockKind) {
        if self.list.is_some() {
            return;
        }
        self.flush_block();
        self.block = Some(kind);
    }

    fn flush_block(&mut self) {
        if self.block.is_none() && self.inlines.is_empty() {
            return;
        }
        let children = std::mem::take(&mut self.inlines);
        let block = match self.block.take().unwrap_or(BlockKind::Paragraph) {
            BlockKind::Paragraph => Block::Paragraph { children },
            BlockKind::Heading(level) => Block::Heading { level, children },
            BlockKind::Quote => Block::Quote { children },
        };
        self.blocks.push(block);
    }

    fn open_list(&mut self, ordered: bool) {
        // Nested lists are flattened into the outer one.
        if let Some(list) = self.list.as_mut() {
            list.depth += 1;
            return;
        }
        self.flush_block();
        self.list = Some(OpenList {
            ordered,
            items: Vec::new(),
            depth: 1,
            in_item: false,
        });
    }

    fn open_item(&mut self) {
        if self.list.is_none() {
            self.open_list(false);
        }
        if let Some(list) = self.list.as_mut() {
            list.items.push(Vec::new());
            list.in_item = true;
        }
    }

    fn close_list(&mut self) {
        let Some(list) = self.list.as_mut() else {
            return;
        };
        list.depth = list.depth.saturating_sub(1);
        if list.depth > 0 {
            return;
        }
        if let Some(list) = self.list.take() {
            self.blocks.push(Block::List {
                ordered: list.ordered,
                items: list.items,
            });
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        let target = match self.list.as_mut() {
            Some(list) => {
                if list.items.is_empty() {
                    list.items.push(Vec::new());
                }
                match list.items.last_mut() {
                    Some(item) => item,
                    None => return,
                }
            }
            None => {
                if self.block.is_none() {
                    self.block = Some(BlockKind::Paragraph);
                }
                &mut self.inlines
            }
        };

        if let Inline::Text { text, format } = &inline {
            if let Some(Inline::Text {
                text: previous,
                format: previous_format,
            }) = target.last_mut()
            {
                if previous_format == format {
                    previous.push_str(text);
                    return;
                }
            }
        }
        target.push(inline);
    }

    fn finish(mut self) -> EditorDocument {
        // Unclosed mention spans still yield their text.
        while !self.spans.is_empty() {
            self.close("span");
        }
        if let Some(list) = self.list.as_mut() {
            list.depth = 1;
        }
        self.close_list();
        self.flush_block();
        EditorDocument::new(self.blocks)
    }
}

/// Parse stored HTML (or plain text) into an editor tree.
pub fn parse_html(html: &str) -> EditorDocument {
    let mut parser = HtmlParser::default();
    let mut cursor = 0;

    for caps in TAG.captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        parser.text(&html[cursor..whole.start()]);

        let tag = caps[2].to_ascii_lowercase();
        if caps[1].is_empty() {
            parser.open(&tag, &caps[3]);
        } else {
            parser.close(&tag);
        }
        cursor = whole.end();
    }
    parser.text(&html[cursor..]);

    let document = parser.finish();
    tracing::trace!(blocks = document.blocks.len(), "Parsed rich text");
    document
}

/// Serialize an editor tree to the HTML the API stores.
pub fn to_html(document: &EditorDocument) -> String {
    let mut html = String::new();
    for block in &document.blocks {
        match block {
            Block::Paragraph { children } => write_element(&mut html, "p", children),
            Block::Heading { level, children } => {
                write_element(&mut html, &format!("h{}", (*level).clamp(1, 3)), children)
            }
            Block::Quote { children } => write_element(&mut html, "blockquote", children),
            Block::List { ordered, items } => {
                let tag = if *ordered { "ol" } else { "ul" };
                html.push_str(&format!("<{tag}>"));
                for item in items {
                    write_element(&mut html, "li", item);
                }
                html.push_str(&format!("</{tag}>"));
            }
        }
    }
    html
}

fn write_element(html: &mut String, tag: &str, children: &[Inline]) {
    html.push_str(&format!("<{tag}>"));
    for inline in children {
        write_inline(html, inline);
    }
    html.push_str(&format!("</{tag}>"));
}

fn write_inline(html: &mut String, inline: &Inline) {
    match inline {
        Inline::Text { text, format } => {
            let tags: Vec<&str> = [
                (format.bold, "strong"),
                (format.italic, "em"),
                (format.underline, "u"),
                (format.strikethrough, "s"),
            ]
            .into_iter()
            .filter_map(|(enabled, tag)| enabled.then_some(tag))
            .collect();

            for tag in &tags {
                html.push_str(&format!("<{tag}>"));
            }
            html.push_str(&escape(text));
            for tag in tags.iter().rev() {
                html.push_str(&format!("</{tag}>"));
            }
        }
        Inline::LineBreak => html.push_str("<br>"),
        Inline::Mention(mention) => html.push_str(&format!(
            r#"<span data-lexical-mention="true" data-user-id="{}" data-user-email="{}" data-user-name="{}">{}</span>"#,
            mention.user_pk,
            escape(&mention.email),
            escape(&mention.name),
            escape(&mention.text),
        )),
    }
}
