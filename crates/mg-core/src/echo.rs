//! The echo line: messages and prompts on the last screen row.
//!
//! A message stays until the next key is read. While a prompt is open the
//! echo line shows the prompt label followed by the reply being typed, and
//! the terminal cursor sits at the end of the reply.
//!
//! # Architecture
//!
//! [`PromptLine`] is a byte buffer with a cursor. The key loop that edits
//! it lives on the editor (it needs input and redisplay); this module only
//! holds state.

// ---------------------------------------------------------------------------
// PromptLine
// ---------------------------------------------------------------------------

/// A reply being typed at a prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptLine {
    label: String,
    input: Vec<u8>,
}

impl PromptLine {
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            input: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The reply typed so far.
    #[inline]
    #[must_use]
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub fn push(&mut self, b: u8) {
        self.input.push(b);
    }

    /// Delete the last byte. Returns `true` if there was one.
    pub fn backspace(&mut self) -> bool {
        self.input.pop().is_some()
    }

    pub fn clear(&mut self) {
        self.input.clear();
    }

    pub fn set_input(&mut self, text: &[u8]) {
        self.input.clear();
        self.input.extend_from_slice(text);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Echo
// ---------------------------------------------------------------------------

/// Echo line state.
#[derive(Debug, Default)]
pub struct Echo {
    message: Vec<u8>,
    prompt: Option<PromptLine>,
    dirty: bool,
}

impl Echo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a message, replacing whatever was there.
    pub fn message(&mut self, text: &str) {
        self.message.clear();
        self.message.extend_from_slice(text.as_bytes());
        self.dirty = true;
    }

    /// Clear the message if one is showing.
    pub fn clear(&mut self) {
        if !self.message.is_empty() {
            self.message.clear();
            self.dirty = true;
        }
    }

    /// The current message.
    #[must_use]
    pub fn current(&self) -> &[u8] {
        &self.message
    }

    /// Open a prompt.
    pub fn open_prompt(&mut self, label: &str) {
        self.prompt = Some(PromptLine::new(label));
        self.dirty = true;
    }

    /// Close the prompt, returning it.
    pub fn close_prompt(&mut self) -> Option<PromptLine> {
        self.dirty = true;
        self.prompt.take()
    }

    /// The open prompt, for editing.
    pub fn prompt_mut(&mut self) -> Option<&mut PromptLine> {
        self.dirty = true;
        self.prompt.as_mut()
    }

    #[must_use]
    pub const fn prompt(&self) -> Option<&PromptLine> {
        self.prompt.as_ref()
    }

    /// Bytes to draw on the echo row.
    #[must_use]
    pub fn line(&self) -> Vec<u8> {
        match &self.prompt {
            Some(p) => {
                let mut out = p.label.as_bytes().to_vec();
                out.extend_from_slice(&p.input);
                out
            }
            None => self.message.clone(),
        }
    }

    /// Terminal column of the cursor while a prompt is open.
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.prompt.as_ref().map(|p| p.label.len() + p.input.len())
    }

    /// Whether the echo row needs redrawing.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
