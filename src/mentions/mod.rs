// Rich text with user mentions
//
// Comments and document sections are stored as HTML. This module parses that
// HTML into an editor tree, turns `@Name` text into mention nodes using the
// project roster, and serializes the tree back.

pub mod extract;
pub mod html;
pub mod node;

pub use extract::{mentioned_users, prepopulate, MentionError, MentionScanner, MentionedUser, Segment};
pub use html::{decode_entities, escape, parse_html, to_html};
pub use node::{Block, EditorDocument, Inline, Mention, TextFormat};
