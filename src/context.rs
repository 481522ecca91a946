// Application context
//
// Theme, layout and open-editor state owned by the application root and
// passed down by reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn toggled(self) -> Self {
        match self {
            ColorMode::Light => ColorMode::Dark,
            ColorMode::Dark => ColorMode::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Traditional,
    #[default]
    Modern,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("section {open:?} has unsaved edits")]
    Blocked { open: String },
}

/// Tracks open rich-text editors so only one section is edited at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorBlocker {
    open: BTreeSet<String>,
}

impl EditorBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `section` for editing unless a different section is already open.
    pub fn open(&mut self, section: &str) -> Result<(), EditorError> {
        if let Some(other) = self.open.iter().find(|open| open.as_str() != section) {
            return Err(EditorError::Blocked {
                open: other.clone(),
            });
        }
        self.open.insert(section.to_string());
        Ok(())
    }

    pub fn close(&mut self, section: &str) -> bool {
        self.open.remove(section)
    }

    pub fn close_all(&mut self) {
        self.open.clear();
    }

    pub fn is_open(&self, section: &str) -> bool {
        self.open.contains(section)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Gate a navigation away from the current view.
    ///
    /// With open editors the navigation is refused unless the caller chose
    /// to discard them, in which case every editor is closed first.
    pub fn leave(&mut self, discard_unsaved: bool) -> Result<(), EditorError> {
        match self.open.iter().next() {
            Some(open) if !discard_unsaved => Err(EditorError::Blocked { open: open.clone() }),
            _ => {
                self.close_all();
                Ok(())
            }
        }
    }
}

/// UI state that used to live in global providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContext {
    pub color_mode: ColorMode,
    pub layout: LayoutKind,
    #[serde(skip)]
    pub editors: EditorBlocker,
}

impl AppContext {
    pub fn new(color_mode: ColorMode, layout: LayoutKind) -> Self {
        Self {
            color_mode,
            layout,
            editors: EditorBlocker::new(),
        }
    }

    pub fn toggle_color_mode(&mut self) -> ColorMode {
        self.color_mode = self.color_mode.toggled();
        self.color_mode
    }

    pub fn set_layout(&mut self, layout: LayoutKind) {
        self.layout = layout;
    }
}
