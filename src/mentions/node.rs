use serde::{Deserialize, Serialize};

/// Inline formatting carried by a text run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl TextFormat {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// A mention token. `text` is what the reader sees, normally `@` + name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_pk: u64,
    pub email: String,
    pub name: String,
    pub text: String,
}

impl Mention {
    pub fn new(user_pk: u64, email: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            user_pk,
            email: email.into(),
            text: format!("@{name}"),
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String, format: TextFormat },
    LineBreak,
    Mention(Mention),
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            format: TextFormat::plain(),
        }
    }

    pub fn plain_text(&self) -> &str {
        match self {
            Inline::Text { text, .. } => text,
            Inline::LineBreak => "\n",
            Inline::Mention(mention) => &mention.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph { children: Vec<Inline> },
    Heading { level: u8, children: Vec<Inline> },
    Quote { children: Vec<Inline> },
    List { ordered: bool, items: Vec<Vec<Inline>> },
}

impl Block {
    pub fn paragraph(children: Vec<Inline>) -> Self {
        Block::Paragraph { children }
    }

    /// Inline runs of the block; list items are visited in order.
    pub fn inlines(&self) -> Box<dyn Iterator<Item = &Inline> + '_> {
        match self {
            Block::Paragraph { children }
            | Block::Heading { children, .. }
            | Block::Quote { children } => Box::new(children.iter()),
            Block::List { items, .. } => Box::new(items.iter().flatten()),
        }
    }

    fn plain_text(&self) -> String {
        match self {
            Block::List { items, .. } => items
                .iter()
                .map(|item| item.iter().map(Inline::plain_text).collect::<String>())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.inlines().map(Inline::plain_text).collect(),
        }
    }
}

/// Editor state reconstructed from stored HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorDocument {
    pub blocks: Vec<Block>,
}

impl EditorDocument {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| block.inlines().next().is_none())
    }

    /// Text content as the reader sees it, one line per block.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn mentions(&self) -> impl Iterator<Item = &Mention> {
        self.blocks
            .iter()
            .flat_map(|block| block.inlines())
            .filter_map(|inline| match inline {
                Inline::Mention(mention) => Some(mention),
                _ => None,
            })
    }
}
