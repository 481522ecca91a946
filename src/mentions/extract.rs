use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::html::parse_html;
use super::node::{Block, EditorDocument, Inline, Mention, TextFormat};
use crate::domain::UserSummary;

/// `@` at the start of text or after whitespace or an opening parenthesis.
static TRIGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(])@").expect("trigger pattern is valid"));

#[derive(Debug, Error, PartialEq)]
pub enum MentionError {
    #[error("roster entry {pk} has no display name")]
    UnnamedUser { pk: u64 },
    #[error("roster entries {first} and {second} share the display name {name:?}")]
    AmbiguousName { name: String, first: u64, second: u64 },
}

/// A user referenced by a mention, in the shape the notification endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MentionedUser {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl From<&Mention> for MentionedUser {
    fn from(mention: &Mention) -> Self {
        Self {
            id: mention.user_pk,
            name: mention.name.clone(),
            email: mention.email.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct RosterEntry {
    name: String,
    user: UserSummary,
}

/// Finds `@Name` references to known users in plain text.
#[derive(Debug, Clone, Default)]
pub struct MentionScanner {
    // Longest name first so "Jane Doe" wins over "Jane".
    roster: Vec<RosterEntry>,
}

impl MentionScanner {
    pub fn new(users: &[UserSummary]) -> Result<Self, MentionError> {
        let mut roster: Vec<RosterEntry> = Vec::with_capacity(users.len());
        for user in users {
            let name = user.display_name();
            if name.is_empty() {
                return Err(MentionError::UnnamedUser { pk: user.pk });
            }
            if let Some(existing) = roster.iter().find(|entry| entry.name == name) {
                if existing.user.pk == user.pk {
                    continue;
                }
                return Err(MentionError::AmbiguousName {
                    name,
                    first: existing.user.pk,
                    second: user.pk,
                });
            }
            roster.push(RosterEntry {
                name,
                user: user.clone(),
            });
        }
        roster.sort_by(|a, b| b.name.chars().count().cmp(&a.name.chars().count()));

        Ok(Self { roster })
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Split `text` into text and mention runs.
    ///
    /// `preceded_by` is the last character emitted before this text in the
    /// same block, so a run that continues a word does not start a mention.
    pub fn scan(&self, text: &str, preceded_by: Option<char>) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for trigger in TRIGGER.find_iter(text) {
            // The match ends right after the '@'.
            let at = trigger.end() - 1;
            if at < cursor {
                continue;
            }
            if at == 0 && preceded_by.is_some_and(|c| !c.is_whitespace() && c != '(') {
                continue;
            }

            let rest = &text[at + 1..];
            let Some(entry) = self.roster.iter().find(|entry| {
                rest.starts_with(&entry.name)
                    && rest[entry.name.len()..]
                        .chars()
                        .next()
                        .map_or(true, |next| !next.is_alphanumeric() && next != '_')
            }) else {
                continue;
            };

            if at > cursor {
                segments.push(Segment::Text(text[cursor..at].to_string()));
            }
            segments.push(Segment::Mention(Mention::new(
                entry.user.pk,
                entry.user.email.clone(),
                entry.name.clone(),
            )));
            cursor = at + 1 + entry.name.len();
        }

        if cursor < text.len() {
            segments.push(Segment::Text(text[cursor..].to_string()));
        }
        segments
    }

    /// Turn `@Name` runs inside the document's text into mention nodes.
    pub fn apply(&self, document: &EditorDocument) -> EditorDocument {
        if self.is_empty() {
            return document.clone();
        }
        let blocks = document
            .blocks
            .iter()
            .map(|block| match block {
                Block::Paragraph { children } => Block::Paragraph {
                    children: self.apply_inlines(children),
                },
                Block::Heading { level, children } => Block::Heading {
                    level: *level,
                    children: self.apply_inlines(children),
                },
                Block::Quote { children } => Block::Quote {
                    children: self.apply_inlines(children),
                },
                Block::List { ordered, items } => Block::List {
                    ordered: *ordered,
                    items: items.iter().map(|item| self.apply_inlines(item)).collect(),
                },
            })
            .collect();
        EditorDocument::new(blocks)
    }

    fn apply_inlines(&self, inlines: &[Inline]) -> Vec<Inline> {
        let mut output = Vec::with_capacity(inlines.len());
        let mut previous: Option<char> = None;

        for inline in inlines {
            match inline {
                Inline::Text { text, format } => {
                    for segment in self.scan(text, previous) {
                        output.push(segment.into_inline(*format));
                    }
                }
                other => output.push(other.clone()),
            }
            previous = inline.plain_text().chars().last().or(previous);
        }
        output
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Mention(Mention),
}

impl Segment {
    fn into_inline(self, format: TextFormat) -> Inline {
        match self {
            Segment::Text(text) => Inline::Text { text, format },
            Segment::Mention(mention) => Inline::Mention(mention),
        }
    }
}

/// Parse stored HTML or plain text and resolve `@Name` references against `roster`.
pub fn prepopulate(html: &str, roster: &[UserSummary]) -> Result<EditorDocument, MentionError> {
    let scanner = MentionScanner::new(roster)?;
    let document = scanner.apply(&parse_html(html));
    tracing::debug!(
        roster = roster.len(),
        mentions = document.mentions().count(),
        "Prepopulated editor"
    );
    Ok(document)
}

/// Distinct mentioned users in order of first appearance.
///
/// Mentions without a user id or email cannot be notified and are skipped.
pub fn mentioned_users(document: &EditorDocument) -> Vec<MentionedUser> {
    let mut seen = HashSet::new();
    document
        .mentions()
        .filter(|mention| mention.user_pk != 0 && !mention.email.is_empty())
        .filter(|mention| seen.insert(mention.user_pk))
        .map(MentionedUser::from)
        .collect()
}
