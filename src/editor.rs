//! Editable text regions.
//!
//! An [`Editor`] holds the text of one region and reports every committed edit
//! to its change callback. The editing primitive underneath appends a
//! synthetic trailing newline to what it hands over; it is stripped here.

/// Highlighting hint for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Feel,
    Json,
}

type ChangeCallback = Box<dyn FnMut(&str) + Send>;

pub struct Editor {
    language: Language,
    content: String,
    on_change: Option<ChangeCallback>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("language", &self.language)
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl Editor {
    pub fn new(language: Language, initial: impl Into<String>) -> Self {
        Self {
            language,
            content: initial.into(),
            on_change: None,
        }
    }

    pub fn on_change(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.set_on_change(callback);
        self
    }

    /// Attaches a change callback to an editor owned elsewhere.
    pub fn set_on_change(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Commits raw text from the editing primitive.
    pub fn commit(&mut self, raw: &str) -> &str {
        let text = raw.strip_suffix('\n').unwrap_or(raw);
        self.set(text);
        &self.content
    }

    /// Replaces the content with text that carries no synthetic newline.
    pub fn set(&mut self, text: &str) {
        self.content = text.to_string();
        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.content);
        }
    }
}
